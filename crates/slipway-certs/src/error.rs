//! Error types for certificate management.

use thiserror::Error;

/// Result type alias for certificate operations.
pub type CertResult<T> = Result<T, CertError>;

/// Errors from certificate loading, generation, and ACME issuance.
#[derive(Debug, Error)]
pub enum CertError {
    #[error("certificate I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid PEM material: {0}")]
    Pem(String),

    #[error("TLS key handling failed: {0}")]
    Tls(String),

    #[error("certificate generation failed: {0}")]
    Generation(#[from] rcgen::Error),

    #[error("ACME protocol error: {0}")]
    Acme(String),

    #[error("ACME account credentials are unreadable: {0}")]
    Credentials(#[from] serde_json::Error),

    #[error("host '{0}' is not in the configured application set")]
    HostNotAllowed(String),

    #[error("certificate order for '{host}' failed: {detail}")]
    OrderFailed { host: String, detail: String },
}

impl From<instant_acme::Error> for CertError {
    fn from(err: instant_acme::Error) -> Self {
        CertError::Acme(err.to_string())
    }
}
