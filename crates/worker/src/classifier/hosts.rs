//! Local development host detection.
//!
//! Requests to the machine itself or to a configured dev host are never
//! intercepted, so a local dev server is always hit directly.
use std::net::IpAddr;

use url::Host;

/// Check if an IP address refers to this machine.
///
/// This covers:
/// - Loopback addresses (127.0.0.0/8, ::1)
/// - Unspecified addresses (0.0.0.0, ::)
/// - IPv4-mapped IPv6 loopback (::ffff:127.0.0.1)
pub fn is_local_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_unspecified(),
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || v6.to_ipv4_mapped().is_some_and(|v4| v4.is_loopback() || v4.is_unspecified())
        }
    }
}

/// Whether a URL host is a loopback or configured development host.
///
/// `dev_hosts` entries are compared case-insensitively against the host as
/// it appears in the URL (IPv6 hosts without brackets).
pub fn is_dev_host(host: &Host<&str>, dev_hosts: &[String]) -> bool {
    let listed = |name: &str| dev_hosts.iter().any(|h| h.trim_matches(['[', ']']).eq_ignore_ascii_case(name));

    match host {
        Host::Domain(domain) => {
            let domain = domain.trim_end_matches('.');
            domain.eq_ignore_ascii_case("localhost")
                || domain.to_ascii_lowercase().ends_with(".localhost")
                || listed(domain)
        }
        Host::Ipv4(v4) => is_local_ip(IpAddr::V4(*v4)) || listed(&v4.to_string()),
        Host::Ipv6(v6) => is_local_ip(IpAddr::V6(*v6)) || listed(&v6.to_string()),
    }
}
