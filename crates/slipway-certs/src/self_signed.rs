//! Self-signed certificate generation.
//!
//! One pair serves every configured host via subject alternative names.
//! Generated once with a far-future expiry and reused across restarts.

use std::path::Path;

use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use tracing::info;

use crate::error::CertResult;
use crate::store::CertKeyPem;

/// Generate a fresh self-signed pair with the given hosts as SANs.
pub fn generate(hosts: &[String]) -> CertResult<CertKeyPem> {
    let mut sans = hosts.to_vec();
    if sans.is_empty() {
        sans.push("localhost".to_string());
    }
    let mut params = CertificateParams::new(sans)?;

    let mut dn = DistinguishedName::new();
    dn.push(DnType::OrganizationName, "slipway");
    dn.push(DnType::CommonName, "slipway self-signed");
    params.distinguished_name = dn;
    params.not_after = rcgen::date_time_ymd(2045, 1, 1);

    let key_pair = KeyPair::generate()?;
    let cert = params.self_signed(&key_pair)?;

    info!(sans = hosts.len(), "generated self-signed certificate");

    Ok(CertKeyPem {
        cert_pem: cert.pem(),
        key_pem: key_pair.serialize_pem(),
    })
}

/// Load the pair at the configured paths, generating and persisting it
/// first if either file is absent.
pub fn load_or_generate(
    cert_path: &Path,
    key_path: &Path,
    hosts: &[String],
) -> CertResult<CertKeyPem> {
    if cert_path.exists() && key_path.exists() {
        let pair = CertKeyPem {
            cert_pem: std::fs::read_to_string(cert_path)?,
            key_pem: std::fs::read_to_string(key_path)?,
        };
        // Reject unreadable material early rather than at handshake time.
        pair.to_certified_key()?;
        info!(cert = %cert_path.display(), "loaded existing self-signed certificate");
        return Ok(pair);
    }

    let pair = generate(hosts)?;
    if let Some(parent) = cert_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if let Some(parent) = key_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(cert_path, &pair.cert_pem)?;
    std::fs::write(key_path, &pair.key_pem)?;
    Ok(pair)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_pair_is_pem() {
        let pair = generate(&["a.example.com".to_string()]).unwrap();
        assert!(pair.cert_pem.contains("BEGIN CERTIFICATE"));
        assert!(pair.key_pem.contains("BEGIN PRIVATE KEY"));
        assert!(pair.to_certified_key().is_ok());
    }

    #[test]
    fn empty_host_list_falls_back_to_localhost() {
        let pair = generate(&[]).unwrap();
        assert!(pair.to_certified_key().is_ok());
    }

    #[test]
    fn pair_is_persisted_and_reused_across_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let cert_path = dir.path().join("self-signed.crt");
        let key_path = dir.path().join("self-signed.key");
        let hosts = vec!["a.example.com".to_string()];

        let first = load_or_generate(&cert_path, &key_path, &hosts).unwrap();
        assert!(cert_path.exists());
        assert!(key_path.exists());

        let second = load_or_generate(&cert_path, &key_path, &hosts).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_parent_directories_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let cert_path = dir.path().join("nested/deeper/self-signed.crt");
        let key_path = dir.path().join("nested/deeper/self-signed.key");

        load_or_generate(&cert_path, &key_path, &[]).unwrap();
        assert!(cert_path.exists());
    }
}
