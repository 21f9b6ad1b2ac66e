//! rustls certificate resolution.
//!
//! SNI → per-host certificate, then the fallback (self-signed mode).
//! A host with no certificate gets `None`: the handshake fails closed
//! and the connection is refused, never downgraded to plaintext.

use std::sync::Arc;

use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use rustls::ServerConfig;
use tracing::debug;

use crate::store::CertStore;

/// Certificate resolver over the shared [`CertStore`].
pub struct CertResolver {
    store: CertStore,
}

impl CertResolver {
    pub fn new(store: CertStore) -> Self {
        Self { store }
    }

    fn resolve_name(&self, server_name: Option<&str>) -> Option<Arc<CertifiedKey>> {
        if let Some(name) = server_name {
            if let Some(key) = self.store.get(name) {
                return Some(key);
            }
        }
        let fallback = self.store.fallback();
        if fallback.is_none() {
            debug!(?server_name, "no certificate for handshake, failing closed");
        }
        fallback
    }
}

impl std::fmt::Debug for CertResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertResolver").finish_non_exhaustive()
    }
}

impl ResolvesServerCert for CertResolver {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        self.resolve_name(client_hello.server_name())
    }
}

/// Build the rustls server config the TLS listener accepts with.
pub fn server_config(store: CertStore) -> Arc<ServerConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .expect("ring provider supports the default protocol versions")
        .with_no_client_auth()
        .with_cert_resolver(Arc::new(CertResolver::new(store)));
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Arc::new(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::self_signed;

    fn certified(host: &str) -> CertifiedKey {
        self_signed::generate(&[host.to_string()])
            .unwrap()
            .to_certified_key()
            .unwrap()
    }

    #[test]
    fn exact_host_match_wins() {
        let store = CertStore::new();
        store.insert("a.example.com", certified("a.example.com"));
        let resolver = CertResolver::new(store);

        assert!(resolver.resolve_name(Some("a.example.com")).is_some());
    }

    #[test]
    fn unknown_host_without_fallback_fails_closed() {
        let store = CertStore::new();
        store.insert("a.example.com", certified("a.example.com"));
        let resolver = CertResolver::new(store);

        assert!(resolver.resolve_name(Some("evil.example.com")).is_none());
        assert!(resolver.resolve_name(None).is_none());
    }

    #[test]
    fn fallback_serves_any_host() {
        let store = CertStore::new();
        store.set_fallback(certified("anything"));
        let resolver = CertResolver::new(store);

        assert!(resolver.resolve_name(Some("whatever.example.com")).is_some());
        assert!(resolver.resolve_name(None).is_some());
    }

    #[test]
    fn server_config_builds() {
        let store = CertStore::new();
        store.set_fallback(certified("a.example.com"));
        let config = server_config(store);
        assert_eq!(config.alpn_protocols, vec![b"http/1.1".to_vec()]);
    }
}
