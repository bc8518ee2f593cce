//! Endpoint validation and the outbound character filter

use crate::traits::{LinkError, Result};
use std::net::{IpAddr, SocketAddr};

/// Check that `host` is an IPv4 or IPv6 literal
///
/// Host names are not resolved; the robot is always addressed by IP.
pub fn is_valid_ip_address(host: &str) -> bool {
    host.parse::<IpAddr>().is_ok()
}

/// Check that `port` is within 1..=65535
#[inline]
pub fn is_valid_port(port: i32) -> bool {
    (1..=65535).contains(&port)
}

/// Validate an endpoint and turn it into a socket address
pub fn socket_addr(host: &str, port: i32) -> Result<SocketAddr> {
    let ip: IpAddr = host
        .parse()
        .map_err(|_| LinkError::InvalidAddress(host.to_string()))?;
    let port = u16::try_from(port)
        .ok()
        .filter(|p| *p != 0)
        .ok_or(LinkError::InvalidPort(port))?;
    Ok(SocketAddr::new(ip, port))
}

/// Whether a character may appear on the wire
///
/// Tab, line feed and carriage return are the only control characters kept.
#[inline]
pub fn is_legal_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r') || c >= '\u{20}'
}

/// Remove every control character except tab, LF and CR
pub fn strip_illegal_characters(text: &str) -> String {
    text.chars().filter(|c| is_legal_char(*c)).collect()
}
