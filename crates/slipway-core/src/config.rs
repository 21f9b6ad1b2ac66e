//! slipway.toml configuration parser.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::types::Application;

/// Top-level configuration loaded from `slipway.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub tls: TlsConfig,
    #[serde(default)]
    pub apps: Vec<Application>,
}

/// Container engine connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine socket path; the platform default is used when absent.
    pub socket: Option<String>,
}

/// Listener settings for the reverse proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Plaintext listener port (ACME challenges + HTTPS redirect).
    pub http_port: u16,
    /// TLS listener port (all proxied traffic).
    pub https_port: u16,
    /// Negotiate gzip/deflate response compression.
    #[serde(default = "default_true")]
    pub compress: bool,
    /// Generate ETags and answer conditional requests.
    #[serde(default = "default_true")]
    pub etag: bool,
}

fn default_true() -> bool {
    true
}

/// TLS certificate settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub mode: TlsMode,
    /// Contact address for the ACME account (required in `acme` mode).
    pub acme_email: Option<String>,
    /// ACME directory URL; Let's Encrypt production when absent.
    pub acme_directory: Option<String>,
    /// Directory holding the ACME account and issued certificates.
    pub acme_cache_dir: PathBuf,
    /// Self-signed certificate path.
    pub cert_path: PathBuf,
    /// Self-signed private key path.
    pub key_path: PathBuf,
}

/// Which certificate source the proxy terminates TLS with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsMode {
    SelfSigned,
    Acme,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { socket: None }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            http_port: 80,
            https_port: 443,
            compress: true,
            etag: true,
        }
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            mode: TlsMode::SelfSigned,
            acme_email: None,
            acme_directory: None,
            acme_cache_dir: PathBuf::from("/var/lib/slipway/acme"),
            cert_path: PathBuf::from("/var/lib/slipway/self-signed.crt"),
            key_path: PathBuf::from("/var/lib/slipway/self-signed.key"),
        }
    }
}

impl Config {
    /// Load and validate a configuration file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut hosts = HashSet::new();
        for app in &self.apps {
            app.validate()?;
            if !hosts.insert(app.host.as_str()) {
                return Err(ConfigError::DuplicateHost(app.host.clone()));
            }
        }
        if self.proxy.http_port == self.proxy.https_port {
            return Err(ConfigError::Invalid(
                "http_port and https_port must differ".into(),
            ));
        }
        if self.tls.mode == TlsMode::Acme && self.tls.acme_email.is_none() {
            return Err(ConfigError::Invalid(
                "tls.acme_email is required in acme mode".into(),
            ));
        }
        Ok(())
    }

    /// The set of hosts the proxy and certificate manager may serve.
    pub fn hosts(&self) -> Vec<String> {
        self.apps.iter().map(|a| a.host.clone()).collect()
    }

    /// Look up an application by host.
    pub fn app(&self, host: &str) -> Option<&Application> {
        self.apps.iter().find(|a| a.host == host)
    }

    /// Scaffold a commented starter configuration for `slipway init`.
    pub fn scaffold() -> String {
        r#"# slipway configuration

[engine]
# socket = "/var/run/docker.sock"

[proxy]
http_port = 80
https_port = 443

[tls]
mode = "self_signed"        # or "acme"
# acme_email = "ops@example.com"
# acme_cache_dir = "/var/lib/slipway/acme"
cert_path = "/var/lib/slipway/self-signed.crt"
key_path = "/var/lib/slipway/self-signed.key"

[[apps]]
host = "app.example.com"
image = "registry.example.com/app:latest"
network = "slipway"
container_port = 8080
warm = false
env = ["RUST_LOG=info"]
volumes = []
"#
        .to_string()
    }
}
