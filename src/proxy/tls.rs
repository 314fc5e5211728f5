//! TLS client settings for `https` and `wss` backends.
//!
//! The proxy originates TLS towards backends; it never terminates it. One
//! client configuration serves both the HTTP forwarder and the WebSocket dialer.

use std::sync::Arc;

use rustls::{ClientConfig, RootCertStore};

/// Client configuration trusting the bundled Mozilla roots.
pub fn client_config() -> Result<Arc<ClientConfig>, rustls::Error> {
    let roots = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    with_roots(roots)
}

/// Client configuration trusting exactly `roots`.
pub fn with_roots(roots: RootCertStore) -> Result<Arc<ClientConfig>, rustls::Error> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Arc::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_roots_are_loaded() {
        let config = client_config().unwrap();
        assert!(config.alpn_protocols.is_empty());
        assert!(!webpki_roots::TLS_SERVER_ROOTS.is_empty());
    }

    #[test]
    fn empty_root_store_still_builds() {
        assert!(with_roots(RootCertStore::empty()).is_ok());
    }
}
