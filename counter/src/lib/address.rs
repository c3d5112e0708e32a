use std::net::{IpAddr, Ipv4Addr};

use thiserror::Error;

/// Fixed-width key the counter works with: an IPv4 address as a big-endian `u32`.
pub type IpKey = u32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The text is not an address, or not one that fits in an IPv4 key.
    #[error("wrong ip address format: {0:?}")]
    InvalidAddressFormat(String),
}

/// Parse a textual address into its key.
///
/// Dotted-quad IPv4 is accepted as is, and IPv4-mapped IPv6
/// (`::ffff:a.b.c.d`) maps to the embedded IPv4 address. Any other IPv6
/// address is rejected rather than truncated.
pub fn ip_to_key(text: &str) -> Result<IpKey, AddressError> {
    let invalid = || AddressError::InvalidAddressFormat(text.to_string());

    let v4 = match text.parse::<IpAddr>().map_err(|_| invalid())? {
        IpAddr::V4(v4) => v4,
        IpAddr::V6(v6) => v6.to_ipv4_mapped().ok_or_else(invalid)?,
    };
    Ok(u32::from(v4))
}

pub fn key_to_ip(key: IpKey) -> Ipv4Addr {
    Ipv4Addr::from(key)
}

pub fn key_to_string(key: IpKey) -> String {
    key_to_ip(key).to_string()
}
