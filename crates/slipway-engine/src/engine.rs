//! The `ContainerEngine` trait.
//!
//! All engine calls go through this trait so the orchestrator can be
//! driven against a scripted fake in tests. The production implementation
//! is [`crate::DockerEngine`].

use std::future::Future;

use slipway_core::RegistryAuth;

use crate::error::EngineError;
use crate::types::{ContainerInfo, ContainerSpec, ContainerSummary};

/// Narrow engine interface consumed by the orchestrator and route restore.
///
/// The engine is assumed to serialize concurrent operations on distinct
/// container names; callers never synchronize beyond their own attempt.
pub trait ContainerEngine: Send + Sync + 'static {
    /// Pull an image, optionally authenticating against a private registry.
    fn pull_image(
        &self,
        image: &str,
        auth: Option<&RegistryAuth>,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Create a container from a spec. Does not start it.
    ///
    /// Returns the engine-assigned container id.
    fn create_container(
        &self,
        spec: &ContainerSpec,
    ) -> impl Future<Output = Result<String, EngineError>> + Send;

    /// Start a created container.
    fn start_container(&self, name: &str) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Stop a container, granting it a grace period before SIGKILL.
    fn stop_container(&self, name: &str) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Force-remove a container.
    fn remove_container(&self, name: &str) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Rename a container.
    fn rename_container(
        &self,
        name: &str,
        new_name: &str,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Inspect a container by name; `None` when it does not exist.
    fn inspect_container(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<ContainerInfo>, EngineError>> + Send;

    /// Whether a named network exists.
    fn network_exists(&self, name: &str) -> impl Future<Output = Result<bool, EngineError>> + Send;

    /// Attach a container to a network.
    fn connect_network(
        &self,
        container: &str,
        network: &str,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Detach a container from a network (forced).
    fn disconnect_network(
        &self,
        container: &str,
        network: &str,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// List containers (running or not) whose name starts with the prefix.
    fn list_containers(
        &self,
        name_prefix: &str,
    ) -> impl Future<Output = Result<Vec<ContainerSummary>, EngineError>> + Send;
}
