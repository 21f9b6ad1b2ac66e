//! Scripted in-memory engine for orchestrator tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use slipway_core::RegistryAuth;
use slipway_engine::{
    ContainerEngine, ContainerInfo, ContainerSpec, ContainerSummary, EngineError, HealthState,
    HealthcheckWindow,
};

#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub id: String,
    pub image: String,
    pub env: Vec<String>,
    pub binds: Vec<String>,
    pub running: bool,
    pub networks: HashMap<String, String>,
}

#[derive(Default)]
struct FakeState {
    containers: HashMap<String, FakeContainer>,
    networks: HashSet<String>,
    /// Health statuses served per container, indexed by inspect count;
    /// the last entry repeats once the script is exhausted.
    health_scripts: HashMap<String, Vec<HealthState>>,
    healthcheck_windows: HashMap<String, HealthcheckWindow>,
    inspect_counts: HashMap<String, u32>,
    ops: Vec<String>,
    next_id: u32,
    fail_pull: bool,
    fail_create: bool,
    fail_rename_to: Option<String>,
    fail_remove_of: Option<String>,
}

/// Scripted [`ContainerEngine`] with an operation log and failure
/// injection.
#[derive(Default)]
pub struct FakeEngine {
    state: Mutex<FakeState>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_network(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .networks
            .insert(name.to_string());
    }

    /// Place a pre-existing container, attached to every known network.
    pub fn seed_container(&self, name: &str, image: &str, running: bool) {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("id-{}", state.next_id);
        let octet = state.next_id;
        let networks = state
            .networks
            .iter()
            .map(|n| (n.clone(), format!("172.18.0.{octet}")))
            .collect();
        state.containers.insert(
            name.to_string(),
            FakeContainer {
                id,
                image: image.to_string(),
                env: vec![],
                binds: vec![],
                running,
                networks,
            },
        );
    }

    /// Script the health statuses a container reports, in inspect order.
    pub fn script_health(&self, name: &str, states: &[HealthState]) {
        self.state
            .lock()
            .unwrap()
            .health_scripts
            .insert(name.to_string(), states.to_vec());
    }

    /// Give a container a declared healthcheck window.
    pub fn set_healthcheck_window(&self, name: &str, window: HealthcheckWindow) {
        self.state
            .lock()
            .unwrap()
            .healthcheck_windows
            .insert(name.to_string(), window);
    }

    pub fn fail_pull(&self) {
        self.state.lock().unwrap().fail_pull = true;
    }

    pub fn fail_create(&self) {
        self.state.lock().unwrap().fail_create = true;
    }

    /// Make any rename *to* the given name fail.
    pub fn fail_rename_to(&self, name: &str) {
        self.state.lock().unwrap().fail_rename_to = Some(name.to_string());
    }

    /// Make removal of the given name fail.
    pub fn fail_remove_of(&self, name: &str) {
        self.state.lock().unwrap().fail_remove_of = Some(name.to_string());
    }

    pub fn get(&self, name: &str) -> Option<FakeContainer> {
        self.state.lock().unwrap().containers.get(name).cloned()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.state.lock().unwrap().containers.contains_key(name)
    }

    pub fn container_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .state
            .lock()
            .unwrap()
            .containers
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn ops(&self) -> Vec<String> {
        self.state.lock().unwrap().ops.clone()
    }

    pub fn inspect_count(&self, name: &str) -> u32 {
        self.state
            .lock()
            .unwrap()
            .inspect_counts
            .get(name)
            .copied()
            .unwrap_or(0)
    }
}

impl ContainerEngine for FakeEngine {
    async fn pull_image(
        &self,
        image: &str,
        _auth: Option<&RegistryAuth>,
    ) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(format!("pull {image}"));
        if state.fail_pull {
            return Err(EngineError::Pull {
                image: image.to_string(),
                reason: "injected pull failure".to_string(),
            });
        }
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, EngineError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(format!("create {}", spec.name));
        if state.fail_create {
            return Err(EngineError::Api("injected create failure".to_string()));
        }
        if state.containers.contains_key(&spec.name) {
            return Err(EngineError::Api(format!(
                "container name '{}' already in use",
                spec.name
            )));
        }
        state.next_id += 1;
        let id = format!("id-{}", state.next_id);
        let octet = state.next_id;
        let mut networks = HashMap::new();
        networks.insert("bridge".to_string(), format!("172.17.0.{octet}"));
        state.containers.insert(
            spec.name.clone(),
            FakeContainer {
                id: id.clone(),
                image: spec.image.clone(),
                env: spec.env.clone(),
                binds: spec.binds.clone(),
                running: false,
                networks,
            },
        );
        Ok(id)
    }

    async fn start_container(&self, name: &str) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(format!("start {name}"));
        match state.containers.get_mut(name) {
            Some(container) => {
                container.running = true;
                Ok(())
            }
            None => Err(EngineError::NotFound(name.to_string())),
        }
    }

    async fn stop_container(&self, name: &str) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(format!("stop {name}"));
        match state.containers.get_mut(name) {
            Some(container) => {
                container.running = false;
                Ok(())
            }
            None => Err(EngineError::NotFound(name.to_string())),
        }
    }

    async fn remove_container(&self, name: &str) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(format!("remove {name}"));
        if state.fail_remove_of.as_deref() == Some(name) {
            return Err(EngineError::Api("injected remove failure".to_string()));
        }
        match state.containers.remove(name) {
            Some(_) => Ok(()),
            None => Err(EngineError::NotFound(name.to_string())),
        }
    }

    async fn rename_container(&self, name: &str, new_name: &str) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(format!("rename {name} -> {new_name}"));
        if state.fail_rename_to.as_deref() == Some(new_name) {
            return Err(EngineError::Api("injected rename failure".to_string()));
        }
        if state.containers.contains_key(new_name) {
            return Err(EngineError::Api(format!(
                "container name '{new_name}' already in use"
            )));
        }
        match state.containers.remove(name) {
            Some(container) => {
                // Carry scripted health along with the container.
                if let Some(script) = state.health_scripts.remove(name) {
                    state.health_scripts.insert(new_name.to_string(), script);
                }
                if let Some(window) = state.healthcheck_windows.remove(name) {
                    state
                        .healthcheck_windows
                        .insert(new_name.to_string(), window);
                }
                state.containers.insert(new_name.to_string(), container);
                Ok(())
            }
            None => Err(EngineError::NotFound(name.to_string())),
        }
    }

    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerInfo>, EngineError> {
        let mut state = self.state.lock().unwrap();
        let Some(container) = state.containers.get(name).cloned() else {
            return Ok(None);
        };

        let count = state.inspect_counts.entry(name.to_string()).or_insert(0);
        let index = *count as usize;
        *count += 1;

        let health = state
            .health_scripts
            .get(name)
            .map(|script| script[index.min(script.len() - 1)])
            .unwrap_or(HealthState::Absent);
        let healthcheck = state.healthcheck_windows.get(name).copied();

        Ok(Some(ContainerInfo {
            id: container.id,
            name: name.to_string(),
            image: container.image,
            running: container.running,
            health,
            healthcheck,
            networks: container.networks,
        }))
    }

    async fn network_exists(&self, name: &str) -> Result<bool, EngineError> {
        Ok(self.state.lock().unwrap().networks.contains(name))
    }

    async fn connect_network(&self, container: &str, network: &str) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(format!("connect {container} {network}"));
        if !state.networks.contains(network) {
            return Err(EngineError::NetworkNotFound(network.to_string()));
        }
        let octet = state.next_id;
        match state.containers.get_mut(container) {
            Some(c) => {
                c.networks
                    .insert(network.to_string(), format!("172.18.0.{octet}"));
                Ok(())
            }
            None => Err(EngineError::NotFound(container.to_string())),
        }
    }

    async fn disconnect_network(&self, container: &str, network: &str) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(format!("disconnect {container} {network}"));
        match state.containers.get_mut(container) {
            Some(c) => {
                c.networks.remove(network);
                Ok(())
            }
            None => Err(EngineError::NotFound(container.to_string())),
        }
    }

    async fn list_containers(
        &self,
        name_prefix: &str,
    ) -> Result<Vec<ContainerSummary>, EngineError> {
        let state = self.state.lock().unwrap();
        let mut result: Vec<ContainerSummary> = state
            .containers
            .iter()
            .filter(|(name, _)| name.starts_with(name_prefix))
            .map(|(name, c)| ContainerSummary {
                id: c.id.clone(),
                name: name.clone(),
                image: c.image.clone(),
                running: c.running,
            })
            .collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }
}
