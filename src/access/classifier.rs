//! Internal network classification.
//!
//! Loopback, RFC 1918 and unique-local (fc00::/7) addresses are always
//! trusted. Anything that does not parse as an IP address is not.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Returns true if `identity` is an address that bypasses the allow-list.
pub fn is_internal(identity: &str) -> bool {
    match identity.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => is_internal_v4(v4),
        Ok(IpAddr::V6(v6)) => match v6.to_ipv4_mapped() {
            Some(v4) => is_internal_v4(v4),
            None => is_internal_v6(v6),
        },
        Err(_) => false,
    }
}

fn is_internal_v4(ip: Ipv4Addr) -> bool {
    let [a, b, _, _] = ip.octets();
    ip.is_loopback() || a == 10 || (a == 172 && (16..=31).contains(&b)) || (a == 192 && b == 168)
}

fn is_internal_v6(ip: Ipv6Addr) -> bool {
    ip.is_loopback() || (ip.octets()[0] & 0xfe) == 0xfc
}
