//! # Host Targets
//!
//! Turns the compact host notation accepted on the command line and in the
//! settings file into concrete `address:port` targets.
//!
//! Supported token forms:
//! * **Host**: `192.168.1.5`, `::1`
//! * **Host with port**: `192.168.1.5:2222`, `[fe80::1]:2222`
//! * **Range**: `192.168.1.2-192.168.1.6`, abbreviated `192.168.1.2-6`
//! * **Range with port**: `10.0.0.1-10.0.0.9:2222`
//! * **Comma lists** of any of the above: `10.0.0.1,10.0.0.5-7`

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::error::{MigrationError, Result};
use crate::network::range::IpRange;

pub const DEFAULT_SSH_PORT: u16 = 22;

/// A resolved remote migration target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostSpec {
    pub address: IpAddr,
    pub port: u16,
}

impl HostSpec {
    pub fn new(address: IpAddr, port: u16) -> Self {
        Self { address, port }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

impl From<IpAddr> for HostSpec {
    fn from(address: IpAddr) -> Self {
        Self::new(address, DEFAULT_SSH_PORT)
    }
}

impl fmt::Display for HostSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}

/// Expands every token into its targets, preserving token order.
///
/// Ranges are flattened in ascending address order and a range whose start is
/// above its end contributes nothing. Any token whose address part does not
/// parse fails the whole call with [`MigrationError::InvalidAddress`].
pub fn resolve<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<HostSpec>> {
    let mut hosts: Vec<HostSpec> = Vec::new();

    for token in tokens {
        for part in token.as_ref().split(',') {
            let part: &str = part.trim();
            if part.is_empty() {
                continue;
            }
            resolve_token(part, &mut hosts)?;
        }
    }

    Ok(hosts)
}

fn resolve_token(token: &str, hosts: &mut Vec<HostSpec>) -> Result<()> {
    let (addr_part, port) = split_port(token)?;

    let bounds: Vec<&str> = addr_part.split('-').collect();
    if let [start_str, end_str] = bounds[..] {
        let range: IpRange = parse_range(token, start_str, end_str)?;
        hosts.extend(range.iter().map(|address| HostSpec::new(address, port)));
        return Ok(());
    }

    let address: IpAddr = parse_addr(token, addr_part)?;
    hosts.push(HostSpec::new(address, port));
    Ok(())
}

/// Splits off an optional port.
///
/// Only a single `:` is treated as a port separator so bare IPv6 literals pass
/// through untouched; IPv6 with a port must use brackets.
fn split_port(token: &str) -> Result<(&str, u16)> {
    if let Some(rest) = token.strip_prefix('[') {
        let Some((addr, tail)) = rest.split_once(']') else {
            return Err(MigrationError::invalid_address(token, "unclosed '['"));
        };
        return match tail.strip_prefix(':') {
            Some(port_str) => Ok((addr, parse_port(token, port_str)?)),
            None if tail.is_empty() => Ok((addr, DEFAULT_SSH_PORT)),
            None => Err(MigrationError::invalid_address(
                token,
                format!("unexpected '{tail}' after address"),
            )),
        };
    }

    let parts: Vec<&str> = token.split(':').collect();
    match parts[..] {
        [addr, port_str] => Ok((addr, parse_port(token, port_str)?)),
        _ => Ok((token, DEFAULT_SSH_PORT)),
    }
}

fn parse_port(token: &str, port_str: &str) -> Result<u16> {
    port_str
        .parse::<u16>()
        .map_err(|e| MigrationError::invalid_address(token, format!("invalid port '{port_str}': {e}")))
}

fn parse_addr(token: &str, addr_str: &str) -> Result<IpAddr> {
    addr_str
        .parse::<IpAddr>()
        .map_err(|e| MigrationError::invalid_address(token, format!("'{addr_str}': {e}")))
}

fn parse_range(token: &str, start_str: &str, end_str: &str) -> Result<IpRange> {
    let start_addr: IpAddr = parse_addr(token, start_str)?;

    let end_addr: IpAddr = match (end_str.parse::<IpAddr>(), start_addr) {
        (Ok(full_addr), _) => full_addr,
        (Err(_), IpAddr::V4(start_v4)) => IpAddr::V4(parse_range_end_addr(token, end_str, &start_v4)?),
        (Err(e), IpAddr::V6(_)) => {
            return Err(MigrationError::invalid_address(token, format!("'{end_str}': {e}")));
        }
    };

    IpRange::new(start_addr, end_addr).ok_or_else(|| {
        MigrationError::invalid_address(token, "range mixes IPv4 and IPv6 addresses")
    })
}

/// Parses the end of an IPv4 range.
///
/// Handles abbreviated forms like "192.168.1.1-50" (implies 192.168.1.50)
/// by overwriting the trailing octets of the start address.
fn parse_range_end_addr(token: &str, end_str: &str, start_addr: &Ipv4Addr) -> Result<Ipv4Addr> {
    let mut end_octets: [u8; 4] = start_addr.octets();
    let partial_octets: Vec<u8> = end_str
        .split('.')
        .map(|octet_str| octet_str.parse::<u8>())
        .collect::<std::result::Result<Vec<u8>, _>>()
        .map_err(|e| MigrationError::invalid_address(token, format!("invalid range end '{end_str}': {e}")))?;

    if partial_octets.len() > 4 {
        return Err(MigrationError::invalid_address(
            token,
            format!("range end has too many octets: {end_str}"),
        ));
    }

    let start_index: usize = 4 - partial_octets.len();
    end_octets[start_index..].copy_from_slice(&partial_octets);

    Ok(Ipv4Addr::from(end_octets))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
