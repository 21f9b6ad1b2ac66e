//! Application domain types.
//!
//! These are the deserialized `[[apps]]` entries from `slipway.toml`.
//! Immutable once loaded; the orchestrator and proxy only ever read them.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Declarative identity of one deployable service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Application {
    /// Routing key — the public hostname this app serves. Unique.
    pub host: String,
    /// Container image reference (`registry/name:tag`).
    pub image: String,
    /// Environment entries: inline `KEY=VALUE`, or a bare path read as a
    /// file of `KEY=VALUE` lines at deploy time.
    #[serde(default)]
    pub env: Vec<String>,
    /// Bind mounts as `host-path:container-path` pairs.
    #[serde(default)]
    pub volumes: Vec<String>,
    /// Name of the engine network the container joins.
    pub network: String,
    /// Port the application listens on inside the container.
    pub container_port: u16,
    /// Issue warmup requests against the new backend after a swap.
    #[serde(default)]
    pub warm: bool,
    /// Credentials for pulling from a private registry.
    #[serde(default)]
    pub registry: Option<RegistryAuth>,
}

/// Registry credentials for private image pulls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistryAuth {
    pub server: String,
    pub username: String,
    pub password: String,
}

impl Application {
    /// Validate the fields that must hold before any deploy may start.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.host.is_empty() {
            return Err(ConfigError::Invalid("app host must not be empty".into()));
        }
        if self.host.contains('/') || self.host.contains(' ') {
            return Err(ConfigError::Invalid(format!(
                "app host '{}' is not a valid hostname",
                self.host
            )));
        }
        if self.image.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "app '{}' has an empty image reference",
                self.host
            )));
        }
        if self.network.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "app '{}' has an empty network name",
                self.host
            )));
        }
        if self.container_port == 0 {
            return Err(ConfigError::Invalid(format!(
                "app '{}' has container_port 0",
                self.host
            )));
        }
        for volume in &self.volumes {
            let mut parts = volume.splitn(2, ':');
            let host_path = parts.next().unwrap_or_default();
            let container_path = parts.next().unwrap_or_default();
            if host_path.is_empty() || container_path.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "app '{}' volume '{volume}' is not host-path:container-path",
                    self.host
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_app() -> Application {
        Application {
            host: "app.example.com".to_string(),
            image: "registry.example.com/app:1.2".to_string(),
            env: vec![],
            volumes: vec![],
            network: "slipway".to_string(),
            container_port: 8080,
            warm: false,
            registry: None,
        }
    }

    #[test]
    fn valid_app_passes() {
        assert!(make_app().validate().is_ok());
    }

    #[test]
    fn empty_image_rejected() {
        let mut app = make_app();
        app.image = String::new();
        assert!(app.validate().is_err());
    }

    #[test]
    fn zero_port_rejected() {
        let mut app = make_app();
        app.container_port = 0;
        assert!(app.validate().is_err());
    }

    #[test]
    fn malformed_volume_rejected() {
        let mut app = make_app();
        app.volumes = vec!["/only-host-path".to_string()];
        assert!(app.validate().is_err());
    }

    #[test]
    fn volume_pair_accepted() {
        let mut app = make_app();
        app.volumes = vec!["/data/app:/var/lib/app".to_string()];
        assert!(app.validate().is_ok());
    }
}
