//! Shared certificate and challenge state.
//!
//! `CertStore` holds the certificates the TLS resolver serves; the ACME
//! manager and self-signed loader write into it. `ChallengeStore` holds
//! pending HTTP-01 tokens for the plaintext listener to answer. Both are
//! cheap clones over shared state.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use rustls::crypto::ring::sign::any_supported_type;
use rustls::pki_types::PrivateKeyDer;
use rustls::sign::CertifiedKey;

use crate::error::{CertError, CertResult};

/// A PEM certificate/key pair as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertKeyPem {
    pub cert_pem: String,
    pub key_pem: String,
}

impl CertKeyPem {
    /// Parse into the form rustls serves from.
    pub fn to_certified_key(&self) -> CertResult<CertifiedKey> {
        let certs = rustls_pemfile::certs(&mut self.cert_pem.as_bytes())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CertError::Pem(format!("certificate chain: {e}")))?;
        if certs.is_empty() {
            return Err(CertError::Pem("no certificates in PEM".to_string()));
        }
        let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut self.key_pem.as_bytes())
            .map_err(|e| CertError::Pem(format!("private key: {e}")))?
            .ok_or_else(|| CertError::Pem("no private key in PEM".to_string()))?;
        let signing_key =
            any_supported_type(&key).map_err(|e| CertError::Tls(e.to_string()))?;
        Ok(CertifiedKey::new(certs, signing_key))
    }
}

#[derive(Default)]
struct CertStoreState {
    per_host: HashMap<String, Arc<CertifiedKey>>,
    fallback: Option<Arc<CertifiedKey>>,
}

/// In-memory certificate store consulted on every TLS handshake.
#[derive(Clone, Default)]
pub struct CertStore {
    state: Arc<RwLock<CertStoreState>>,
}

impl CertStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a per-host certificate (ACME mode).
    pub fn insert(&self, host: &str, key: CertifiedKey) {
        let mut state = self.state.write().expect("cert store lock");
        state.per_host.insert(host.to_string(), Arc::new(key));
    }

    /// Install the certificate served for every host (self-signed mode).
    pub fn set_fallback(&self, key: CertifiedKey) {
        let mut state = self.state.write().expect("cert store lock");
        state.fallback = Some(Arc::new(key));
    }

    /// Certificate for an exact host, if one is installed.
    pub fn get(&self, host: &str) -> Option<Arc<CertifiedKey>> {
        let state = self.state.read().expect("cert store lock");
        state.per_host.get(host).cloned()
    }

    /// The fallback certificate, if one is installed.
    pub fn fallback(&self) -> Option<Arc<CertifiedKey>> {
        let state = self.state.read().expect("cert store lock");
        state.fallback.clone()
    }

    /// Hosts with a per-host certificate installed.
    pub fn hosts(&self) -> Vec<String> {
        let state = self.state.read().expect("cert store lock");
        let mut hosts: Vec<String> = state.per_host.keys().cloned().collect();
        hosts.sort();
        hosts
    }
}

/// Pending HTTP-01 challenge tokens, keyed by token, valued by key
/// authorization.
#[derive(Clone, Default)]
pub struct ChallengeStore {
    tokens: Arc<RwLock<HashMap<String, String>>>,
}

impl ChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, token: &str, key_auth: &str) {
        let mut tokens = self.tokens.write().expect("challenge lock");
        tokens.insert(token.to_string(), key_auth.to_string());
    }

    pub fn remove(&self, token: &str) {
        let mut tokens = self.tokens.write().expect("challenge lock");
        tokens.remove(token);
    }

    /// Key authorization for a token, if the challenge is pending.
    pub fn key_auth(&self, token: &str) -> Option<String> {
        let tokens = self.tokens.read().expect("challenge lock");
        tokens.get(token).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::self_signed;

    fn make_pair() -> CertKeyPem {
        self_signed::generate(&["test.example.com".to_string()]).unwrap()
    }

    #[test]
    fn pem_pair_parses_into_certified_key() {
        let key = make_pair().to_certified_key().unwrap();
        assert!(!key.cert.is_empty());
    }

    #[test]
    fn garbage_pem_is_rejected() {
        let pair = CertKeyPem {
            cert_pem: "not a cert".to_string(),
            key_pem: "not a key".to_string(),
        };
        assert!(matches!(pair.to_certified_key(), Err(CertError::Pem(_))));
    }

    #[test]
    fn per_host_lookup() {
        let store = CertStore::new();
        store.insert("a.example.com", make_pair().to_certified_key().unwrap());

        assert!(store.get("a.example.com").is_some());
        assert!(store.get("b.example.com").is_none());
        assert_eq!(store.hosts(), vec!["a.example.com"]);
    }

    #[test]
    fn fallback_is_separate_from_per_host() {
        let store = CertStore::new();
        assert!(store.fallback().is_none());

        store.set_fallback(make_pair().to_certified_key().unwrap());
        assert!(store.fallback().is_some());
        assert!(store.get("anything.example.com").is_none());
    }

    #[test]
    fn challenge_tokens_round_trip() {
        let store = ChallengeStore::new();
        store.insert("tok", "tok.auth-digest");
        assert_eq!(store.key_auth("tok").as_deref(), Some("tok.auth-digest"));

        store.remove("tok");
        assert!(store.key_auth("tok").is_none());
    }
}
