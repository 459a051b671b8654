//! # Client Identifier
//!
//! Visitors have no accounts. Rate limits are keyed on a salted SHA-256 of
//! the requester's apparent address instead. This is a heuristic identity,
//! not authentication: anyone behind the same NAT shares an identifier, and
//! anyone who can spoof proxy headers can mint new ones.
//!
//! The services only ever see [`ClientIdentifier`], so swapping in sessions
//! later only touches this module and the handlers.

use axum::http::HeaderMap;
use sha2::{Digest, Sha256};
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Address used when nothing usable was found.
pub const UNKNOWN_ADDRESS: &str = "unknown";

/// Opaque, hashed pseudo-identity of a visitor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentifier(String);

impl ClientIdentifier {
    /// Hash an already-resolved address with `salt`.
    pub fn from_address(address: &str, salt: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(address.as_bytes());
        hasher.update(salt.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Turns request metadata into a [`ClientIdentifier`].
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    salt: String,
    trust_proxy_headers: bool,
}

impl IdentityResolver {
    pub fn new(salt: impl Into<String>, trust_proxy_headers: bool) -> Self {
        Self {
            salt: salt.into(),
            trust_proxy_headers,
        }
    }

    pub fn identify(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> ClientIdentifier {
        let address = self.client_address(headers, peer);
        ClientIdentifier::from_address(&address, &self.salt)
    }

    /// Resolve the apparent client address.
    ///
    /// Preference: `Client-IP`, then the first hop of `X-Forwarded-For`, then
    /// the socket peer. Whatever is picked must parse as an IP literal or the
    /// result is [`UNKNOWN_ADDRESS`].
    pub fn client_address(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        let header_value = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let candidate = if self.trust_proxy_headers {
            header_value("client-ip").or_else(|| {
                header_value("x-forwarded-for")
                    .and_then(|v| v.split(',').next().map(|hop| hop.trim().to_string()))
            })
        } else {
            None
        };

        let candidate = candidate.or_else(|| peer.map(|addr| addr.ip().to_string()));

        candidate
            .and_then(|raw| raw.parse::<IpAddr>().ok())
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for &(name, value) in pairs {
            map.insert(name, HeaderValue::from_static(value));
        }
        map
    }

    fn peer() -> Option<SocketAddr> {
        Some("10.0.0.7:51234".parse().unwrap())
    }

    #[test]
    fn test_client_ip_header_wins() {
        let resolver = IdentityResolver::new("salt", true);
        let h = headers(&[("client-ip", "1.2.3.4"), ("x-forwarded-for", "5.6.7.8")]);
        assert_eq!(resolver.client_address(&h, peer()), "1.2.3.4");
    }

    #[test]
    fn test_forwarded_for_first_hop() {
        let resolver = IdentityResolver::new("salt", true);
        let h = headers(&[("x-forwarded-for", " 5.6.7.8 , 9.9.9.9")]);
        assert_eq!(resolver.client_address(&h, peer()), "5.6.7.8");
    }

    #[test]
    fn test_falls_back_to_peer() {
        let resolver = IdentityResolver::new("salt", true);
        assert_eq!(resolver.client_address(&HeaderMap::new(), peer()), "10.0.0.7");
    }

    #[test]
    fn test_invalid_candidate_is_unknown() {
        let resolver = IdentityResolver::new("salt", true);
        let h = headers(&[("x-forwarded-for", "not-an-ip")]);
        assert_eq!(resolver.client_address(&h, peer()), UNKNOWN_ADDRESS);
        assert_eq!(resolver.client_address(&HeaderMap::new(), None), UNKNOWN_ADDRESS);
    }

    #[test]
    fn test_proxy_headers_ignored_when_untrusted() {
        let resolver = IdentityResolver::new("salt", false);
        let h = headers(&[("client-ip", "1.2.3.4")]);
        assert_eq!(resolver.client_address(&h, peer()), "10.0.0.7");
    }

    #[test]
    fn test_identifier_is_salted_sha256() {
        let id = ClientIdentifier::from_address("1.2.3.4", "salt");
        assert_eq!(id.as_str().len(), 64);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));

        assert_eq!(id, ClientIdentifier::from_address("1.2.3.4", "salt"));
        assert_ne!(id, ClientIdentifier::from_address("1.2.3.4", "other"));
        assert_ne!(id, ClientIdentifier::from_address("1.2.3.5", "salt"));
    }

    #[test]
    fn test_ipv6_is_accepted() {
        let resolver = IdentityResolver::new("salt", true);
        let h = headers(&[("client-ip", "2001:db8::1")]);
        assert_eq!(resolver.client_address(&h, None), "2001:db8::1");
    }
}
