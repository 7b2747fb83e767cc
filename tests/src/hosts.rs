#![cfg(test)]
use std::net::IpAddr;

use cmover_common::network::host::{self, HostSpec, DEFAULT_SSH_PORT};
use cmover_common::MigrationError;

fn addrs(hosts: &[HostSpec]) -> Vec<String> {
    hosts.iter().map(HostSpec::to_string).collect()
}

#[test]
fn mixed_token_list_keeps_input_order() {
    let hosts = host::resolve(&["10.0.0.9", "192.168.1.254-192.168.2.1:2200", "[::1]:2022"]).unwrap();
    assert_eq!(
        addrs(&hosts),
        vec![
            "10.0.0.9:22",
            "192.168.1.254:2200",
            "192.168.1.255:2200",
            "192.168.2.0:2200",
            "192.168.2.1:2200",
            "[::1]:2022",
        ]
    );
}

#[test]
fn range_length_is_inclusive() {
    let hosts = host::resolve(&["172.16.0.10-172.16.0.19"]).unwrap();
    assert_eq!(hosts.len(), 10);
    assert!(hosts.iter().all(|h| h.port == DEFAULT_SSH_PORT));
    assert!(hosts.windows(2).all(|w| w[0].address < w[1].address));
}

#[test]
fn reversed_range_is_empty() {
    assert!(host::resolve(&["10.0.0.9-10.0.0.1"]).unwrap().is_empty());
}

#[test]
fn garbage_is_an_invalid_address() {
    let err = host::resolve(&["10.0.0.1", "not-an-ip"]).unwrap_err();
    assert!(matches!(err, MigrationError::InvalidAddress { .. }), "{err:?}");
}

#[test]
fn ipv6_ranges_expand() {
    let hosts = host::resolve(&["fe80::1-fe80::3"]).unwrap();
    let expected: Vec<IpAddr> = ["fe80::1", "fe80::2", "fe80::3"]
        .iter()
        .map(|s| s.parse().unwrap())
        .collect();
    assert_eq!(hosts.iter().map(|h| h.address).collect::<Vec<_>>(), expected);
}
