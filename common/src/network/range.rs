//! # IP Range Model
//!
//! Continuous, inclusive ranges of IPv4 or IPv6 addresses.
//!
//! Addresses are walked as unsigned integers (`u32` widened to `u128` for v4,
//! `u128` for v6) so both families share one iterator.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// An inclusive range of addresses of a single family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpRange {
    pub start_addr: IpAddr,
    pub end_addr: IpAddr,
}

impl IpRange {
    /// Returns `None` when the two ends belong to different families.
    pub fn new(start_addr: IpAddr, end_addr: IpAddr) -> Option<Self> {
        if start_addr.is_ipv4() != end_addr.is_ipv4() {
            return None;
        }
        Some(Self {
            start_addr,
            end_addr,
        })
    }

    /// Ascending walk from start to end. Empty when `start > end`.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = IpAddr> + Clone + use<> {
        let is_v4: bool = self.start_addr.is_ipv4();
        let start: u128 = to_u128(self.start_addr);
        let end: u128 = to_u128(self.end_addr);
        (start..=end).map(move |n| from_u128(n, is_v4))
    }

    pub fn len(&self) -> u128 {
        let start: u128 = to_u128(self.start_addr);
        let end: u128 = to_u128(self.end_addr);
        if start > end { 0 } else { end - start + 1 }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn to_u128(addr: IpAddr) -> u128 {
    match addr {
        IpAddr::V4(v4) => u128::from(u32::from(v4)),
        IpAddr::V6(v6) => u128::from(v6),
    }
}

fn from_u128(n: u128, is_v4: bool) -> IpAddr {
    if is_v4 {
        IpAddr::V4(Ipv4Addr::from(n as u32))
    } else {
        IpAddr::V6(Ipv6Addr::from(n))
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
