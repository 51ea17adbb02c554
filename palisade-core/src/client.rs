//! Client address resolution.

/// The network origin an attempt is attributed to.
pub struct ClientAddress;

impl ClientAddress {
    /// Pick the address to record for a request.
    ///
    /// A non-blank `X-Forwarded-For` value wins over the transport peer and is
    /// used verbatim after trimming, proxy chains included. The header is
    /// caller-controlled, so deployments must only pass it through when it
    /// is set by a trusted proxy.
    pub fn resolve(forwarded_for: Option<&str>, peer: &str) -> String {
        match forwarded_for.map(str::trim) {
            Some(forwarded) if !forwarded.is_empty() => forwarded.to_string(),
            _ => peer.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_prefers_forwarded_for() {
        assert_eq!(
            ClientAddress::resolve(Some("203.0.113.9"), "10.0.0.1"),
            "203.0.113.9"
        );
    }

    #[test]
    fn test_resolve_keeps_chain_verbatim() {
        assert_eq!(
            ClientAddress::resolve(Some(" 203.0.113.9, 10.1.1.1 "), "10.0.0.1"),
            "203.0.113.9, 10.1.1.1"
        );
    }

    #[test]
    fn test_resolve_falls_back_to_peer() {
        assert_eq!(ClientAddress::resolve(None, "10.0.0.1"), "10.0.0.1");
        assert_eq!(ClientAddress::resolve(Some(""), "10.0.0.1"), "10.0.0.1");
        assert_eq!(ClientAddress::resolve(Some("   "), "10.0.0.1"), "10.0.0.1");
    }
}
