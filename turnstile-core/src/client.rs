//! Client identity derivation
//!
//! Rate-limit counters key off a stable identity for the requesting client:
//! the remote address in canonical string form, plus the normalized
//! username when the request carries one. Deriving the identity up front
//! keeps the policy and the admin reset working from the same key material.

use std::net::{IpAddr, SocketAddr};

/// Sentinel identifier for traffic whose remote address cannot be parsed.
///
/// Such requests still share one bounded counter rather than escaping the
/// limit entirely.
pub const UNPARSEABLE_ADDR: &str = "unparseable";

/// A stable identity for the client behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientId {
    ip: String,
    username: Option<String>,
}

impl ClientId {
    /// Derive a client identity from the raw remote address and the
    /// username the request presented, if any.
    ///
    /// Accepts a bare IP (`203.0.113.7`, `::1`) or an address with a port
    /// (`203.0.113.7:54321`). Anything else maps to [`UNPARSEABLE_ADDR`].
    pub fn from_parts(remote_addr: &str, username: Option<&str>) -> Self {
        let ip = canonical_ip(remote_addr);

        let username = username
            .map(|name| name.trim().to_lowercase())
            .filter(|name| !name.is_empty());

        Self { ip, username }
    }

    /// Canonical remote address, or the unparseable sentinel.
    pub fn ip(&self) -> &str {
        &self.ip
    }

    /// Normalized (lowercased) username, when the request carried one.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }
}

fn canonical_ip(remote_addr: &str) -> String {
    let trimmed = remote_addr.trim();

    if let Ok(addr) = trimmed.parse::<IpAddr>() {
        return addr.to_string();
    }

    if let Ok(addr) = trimmed.parse::<SocketAddr>() {
        return addr.ip().to_string();
    }

    UNPARSEABLE_ADDR.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_ipv4() {
        let client = ClientId::from_parts("203.0.113.7", None);
        assert_eq!(client.ip(), "203.0.113.7");
        assert!(client.username().is_none());
    }

    #[test]
    fn test_socket_addr_drops_port() {
        let client = ClientId::from_parts("203.0.113.7:54321", None);
        assert_eq!(client.ip(), "203.0.113.7");
    }

    #[test]
    fn test_ipv6_canonical_form() {
        let client = ClientId::from_parts("0:0:0:0:0:0:0:1", None);
        assert_eq!(client.ip(), "::1");
    }

    #[test]
    fn test_unparseable_address_uses_sentinel() {
        let client = ClientId::from_parts("not-an-address", Some("alice"));
        assert_eq!(client.ip(), UNPARSEABLE_ADDR);
        assert_eq!(client.username(), Some("alice"));
    }

    #[test]
    fn test_username_is_normalized() {
        let client = ClientId::from_parts("10.0.0.1", Some("  Bob "));
        assert_eq!(client.username(), Some("bob"));
    }

    #[test]
    fn test_empty_username_is_none() {
        let client = ClientId::from_parts("10.0.0.1", Some("   "));
        assert!(client.username().is_none());
    }
}
