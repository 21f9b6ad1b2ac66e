//! Production engine client over bollard.
//!
//! Communicates with the Docker daemon via a Unix socket or TCP
//! connection. Internally shares one `bollard::Docker` handle; bollard
//! serializes nothing itself, but the daemon makes concurrent operations
//! on distinct container names safe.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bollard::auth::DockerCredentials;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
    RenameContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{EndpointSettings, HealthStatusEnum, HostConfig};
use bollard::network::{ConnectNetworkOptions, DisconnectNetworkOptions, InspectNetworkOptions};
use futures::StreamExt;
use tracing::debug;

use slipway_core::RegistryAuth;

use crate::engine::ContainerEngine;
use crate::error::EngineError;
use crate::types::{
    ContainerInfo, ContainerSpec, ContainerSummary, HealthState, HealthcheckWindow,
};

/// Docker implementation of [`ContainerEngine`].
pub struct DockerEngine {
    docker: Arc<bollard::Docker>,
}

impl DockerEngine {
    /// Connect using the platform's default local socket.
    pub fn connect_local() -> Result<Self, EngineError> {
        let docker = bollard::Docker::connect_with_local_defaults()
            .map_err(|e| EngineError::Connection(format!("failed to connect to docker: {e}")))?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    /// Connect to a specific socket path.
    pub fn connect_with_socket(socket_path: &str) -> Result<Self, EngineError> {
        let docker =
            bollard::Docker::connect_with_socket(socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| {
                    EngineError::Connection(format!(
                        "failed to connect to docker at {socket_path}: {e}"
                    ))
                })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }
}

fn is_not_found(err: &bollard::errors::Error) -> bool {
    matches!(
        err,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

fn nanos(value: Option<i64>) -> Duration {
    Duration::from_nanos(value.unwrap_or(0).max(0) as u64)
}

impl ContainerEngine for DockerEngine {
    async fn pull_image(
        &self,
        image: &str,
        auth: Option<&RegistryAuth>,
    ) -> Result<(), EngineError> {
        let credentials = auth.map(|a| DockerCredentials {
            username: Some(a.username.clone()),
            password: Some(a.password.clone()),
            serveraddress: Some(a.server.clone()),
            ..Default::default()
        });

        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };

        let mut stream = self.docker.create_image(Some(options), None, credentials);
        while let Some(progress) = stream.next().await {
            let info = progress.map_err(|e| EngineError::Pull {
                image: image.to_string(),
                reason: e.to_string(),
            })?;
            if let Some(status) = info.status {
                debug!(%image, %status, "pull progress");
            }
        }
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, EngineError> {
        let options = CreateContainerOptions {
            name: spec.name.as_str(),
            platform: None,
        };
        let config = Config {
            image: Some(spec.image.clone()),
            env: Some(spec.env.clone()),
            host_config: Some(HostConfig {
                binds: Some(spec.binds.clone()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| EngineError::Api(format!("create '{}' failed: {e}", spec.name)))?;
        Ok(created.id)
    }

    async fn start_container(&self, name: &str) -> Result<(), EngineError> {
        self.docker
            .start_container(name, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    EngineError::NotFound(name.to_string())
                } else {
                    EngineError::Api(format!("start '{name}' failed: {e}"))
                }
            })
    }

    async fn stop_container(&self, name: &str) -> Result<(), EngineError> {
        self.docker
            .stop_container(name, Some(StopContainerOptions { t: 10 }))
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    EngineError::NotFound(name.to_string())
                } else {
                    EngineError::Api(format!("stop '{name}' failed: {e}"))
                }
            })
    }

    async fn remove_container(&self, name: &str) -> Result<(), EngineError> {
        self.docker
            .remove_container(
                name,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    EngineError::NotFound(name.to_string())
                } else {
                    EngineError::Api(format!("remove '{name}' failed: {e}"))
                }
            })
    }

    async fn rename_container(&self, name: &str, new_name: &str) -> Result<(), EngineError> {
        self.docker
            .rename_container(name, RenameContainerOptions { name: new_name })
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    EngineError::NotFound(name.to_string())
                } else {
                    EngineError::Api(format!("rename '{name}' → '{new_name}' failed: {e}"))
                }
            })
    }

    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerInfo>, EngineError> {
        let details = match self.docker.inspect_container(name, None).await {
            Ok(details) => details,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => return Err(EngineError::Api(format!("inspect '{name}' failed: {e}"))),
        };

        let id = details.id.unwrap_or_default();
        let container_name = details
            .name
            .map(|n| n.trim_start_matches('/').to_owned())
            .unwrap_or_default();

        let state = details.state;
        let running = state
            .as_ref()
            .and_then(|s| s.running)
            .unwrap_or(false);
        let health = match state.and_then(|s| s.health).and_then(|h| h.status) {
            Some(HealthStatusEnum::STARTING) => HealthState::Starting,
            Some(HealthStatusEnum::HEALTHY) => HealthState::Healthy,
            Some(HealthStatusEnum::UNHEALTHY) => HealthState::Unhealthy,
            _ => HealthState::Absent,
        };

        let config = details.config;
        let image = config
            .as_ref()
            .and_then(|c| c.image.clone())
            .unwrap_or_default();
        let healthcheck = config.and_then(|c| c.healthcheck).and_then(|h| {
            // An empty test list or the NONE sentinel declares no check.
            h.test
                .as_ref()
                .filter(|t| !t.is_empty() && t[0] != "NONE")?;
            Some(HealthcheckWindow {
                interval: nanos(h.interval),
                timeout: nanos(h.timeout),
                retries: h.retries.unwrap_or(0).max(0) as u32,
            })
        });

        let networks = details
            .network_settings
            .and_then(|s| s.networks)
            .map(|nets| {
                nets.into_iter()
                    .filter_map(|(net, endpoint)| {
                        endpoint.ip_address.filter(|ip| !ip.is_empty()).map(|ip| (net, ip))
                    })
                    .collect::<HashMap<_, _>>()
            })
            .unwrap_or_default();

        Ok(Some(ContainerInfo {
            id,
            name: container_name,
            image,
            running,
            health,
            healthcheck,
            networks,
        }))
    }

    async fn network_exists(&self, name: &str) -> Result<bool, EngineError> {
        match self
            .docker
            .inspect_network(name, None::<InspectNetworkOptions<String>>)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(EngineError::Api(format!(
                "inspect network '{name}' failed: {e}"
            ))),
        }
    }

    async fn connect_network(&self, container: &str, network: &str) -> Result<(), EngineError> {
        self.docker
            .connect_network(
                network,
                ConnectNetworkOptions {
                    container: container.to_string(),
                    endpoint_config: EndpointSettings::default(),
                },
            )
            .await
            .map_err(|e| {
                EngineError::Api(format!(
                    "connect '{container}' to network '{network}' failed: {e}"
                ))
            })
    }

    async fn disconnect_network(&self, container: &str, network: &str) -> Result<(), EngineError> {
        self.docker
            .disconnect_network(
                network,
                DisconnectNetworkOptions {
                    container: container.to_string(),
                    force: true,
                },
            )
            .await
            .map_err(|e| {
                EngineError::Api(format!(
                    "disconnect '{container}' from network '{network}' failed: {e}"
                ))
            })
    }

    async fn list_containers(&self, name_prefix: &str) -> Result<Vec<ContainerSummary>, EngineError> {
        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| EngineError::Api(format!("list containers failed: {e}")))?;

        let mut result = Vec::new();
        for container in containers {
            let names = container.names.unwrap_or_default();
            let Some(name) = names
                .first()
                .map(|n| n.trim_start_matches('/').to_owned())
            else {
                continue;
            };
            if !name.starts_with(name_prefix) {
                continue;
            }
            result.push(ContainerSummary {
                id: container.id.unwrap_or_default(),
                name,
                image: container.image.unwrap_or_default(),
                running: container.state.as_deref() == Some("running"),
            });
        }
        Ok(result)
    }
}
