//! slipway-certs — TLS certificates for the reverse proxy.
//!
//! Two sources, one interface: the proxy terminates TLS with a rustls
//! server config whose certificate resolver reads from a shared
//! [`CertStore`]. In self-signed mode the store holds one long-lived pair
//! generated (once) by rcgen and serving every configured host. In ACME
//! mode certificates are issued per host over HTTP-01, cached on disk,
//! and renewed in the background; issuance is gated by a [`HostPolicy`]
//! allow-list so arbitrary `Host` headers can never mint certificates.
//!
//! Resolution fails closed: a host with no certificate gets no handshake,
//! never a plaintext fallback.

pub mod acme;
pub mod error;
pub mod policy;
pub mod resolver;
pub mod self_signed;
pub mod store;

pub use acme::AcmeManager;
pub use error::{CertError, CertResult};
pub use policy::HostPolicy;
pub use resolver::{server_config, CertResolver};
pub use self_signed::load_or_generate;
pub use store::{CertKeyPem, CertStore, ChallengeStore};
