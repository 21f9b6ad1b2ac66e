//! Blue-green deployment orchestrator.
//!
//! `Deployer` owns the per-attempt state machine. The old version keeps
//! serving until the swap phase; the swap promotes the health-checked
//! candidate before the outgoing container is destroyed, so there is
//! never a moment with no addressable backend.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use slipway_core::{names, Application};
use slipway_engine::{ContainerEngine, ContainerSpec, EngineError};
use slipway_routes::{RouteEntry, RouteTable};

use crate::error::{DeployError, DeployResult};
use crate::events::{DeployEvent, Progress};
use crate::phase::DeployPhase;
use crate::prober::{self, ProbeOutcome};
use crate::warm::{self, WarmReport, WARM_REQUESTS};

/// Ceiling for health polling when the container declares no check window.
pub const DEFAULT_HEALTH_DEADLINE: Duration = Duration::from_secs(60);

/// Network the engine auto-attaches at creation; membership is forced onto
/// the app network instead.
const DEFAULT_ENGINE_NETWORK: &str = "bridge";

/// Options for one deployment attempt.
#[derive(Debug, Clone, Copy)]
pub struct DeployOptions {
    /// Pull the image before creating the candidate.
    pub pull: bool,
    /// Gate the swap on the container's health check.
    pub run_healthchecks: bool,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            pull: true,
            run_healthchecks: true,
        }
    }
}

/// Role a container plays for its host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Running,
    Next,
}

/// A named, addressable container the orchestrator created.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerHandle {
    pub name: String,
    pub id: String,
    pub ip: String,
    pub role: Role,
}

/// Result of a completed (DONE) deployment attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployOutcome {
    pub host: String,
    pub handle: ContainerHandle,
    pub route: RouteEntry,
    pub warm: Option<WarmReport>,
}

/// Drives blue-green deployments against a container engine.
///
/// One attempt per host at a time; attempts for distinct hosts run
/// concurrently and share only the route table.
pub struct Deployer<E> {
    engine: Arc<E>,
    routes: RouteTable,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl<E: ContainerEngine> Deployer<E> {
    pub fn new(engine: Arc<E>, routes: RouteTable) -> Self {
        Self {
            engine,
            routes,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// The route table this deployer publishes into.
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Run one deployment attempt to a terminal state.
    pub async fn deploy(&self, app: &Application, opts: DeployOptions) -> DeployResult<DeployOutcome> {
        self.deploy_with_progress(app, opts, None).await
    }

    /// Like [`deploy`](Self::deploy), with progress events published to
    /// the given channel.
    pub async fn deploy_with_progress(
        &self,
        app: &Application,
        opts: DeployOptions,
        events: Option<mpsc::UnboundedSender<DeployEvent>>,
    ) -> DeployResult<DeployOutcome> {
        let _guard = self.claim(&app.host)?;
        let progress = Progress::new(events);
        self.run(app, opts, &progress).await
    }

    /// Reserve the host slot; dropped guard releases it.
    pub(crate) fn claim(&self, host: &str) -> DeployResult<InFlightGuard> {
        let mut in_flight = self.in_flight.lock().expect("in-flight lock");
        if !in_flight.insert(host.to_string()) {
            return Err(DeployError::AlreadyInFlight(host.to_string()));
        }
        Ok(InFlightGuard {
            set: Arc::clone(&self.in_flight),
            host: host.to_string(),
        })
    }

    async fn run(
        &self,
        app: &Application,
        opts: DeployOptions,
        progress: &Progress,
    ) -> DeployResult<DeployOutcome> {
        let host = app.host.as_str();
        let next_name = names::next(host);
        let running_name = names::running(host);

        // Bad env or network references are fatal before any container is
        // touched.
        let env = slipway_core::env::resolve(&app.env)?;
        if !self
            .engine
            .network_exists(&app.network)
            .await
            .map_err(|e| self.engine_err(host, DeployPhase::CreatingNext, e))?
        {
            return Err(DeployError::UnknownNetwork {
                host: host.to_string(),
                network: app.network.clone(),
            });
        }

        if opts.pull {
            progress.phase(host, DeployPhase::Pulling);
            info!(%host, image = %app.image, "pulling image");
            self.engine
                .pull_image(&app.image, app.registry.as_ref())
                .await
                .map_err(|e| self.engine_err(host, DeployPhase::Pulling, e))?;
        }

        progress.phase(host, DeployPhase::StoppingNext);
        self.reclaim_stale(&next_name)
            .await
            .map_err(|e| self.engine_err(host, DeployPhase::StoppingNext, e))?;

        progress.phase(host, DeployPhase::CreatingNext);
        let candidate = self
            .create_candidate(app, &next_name, env)
            .await
            .map_err(|e| self.engine_err(host, DeployPhase::CreatingNext, e))?;
        info!(%host, id = %candidate.id, ip = %candidate.ip, "candidate started");

        progress.phase(host, DeployPhase::Healthchecking);
        let outcome = if opts.run_healthchecks {
            let deadline = candidate
                .healthcheck_deadline
                .unwrap_or(DEFAULT_HEALTH_DEADLINE);
            prober::poll(self.engine.as_ref(), &next_name, deadline)
                .await
                .map_err(|e| self.engine_err(host, DeployPhase::Healthchecking, e))?
        } else {
            ProbeOutcome::Healthy
        };

        match outcome {
            ProbeOutcome::Healthy => {}
            ProbeOutcome::Unhealthy => {
                self.rollback(host, &next_name, "unhealthy", progress).await;
                return Err(DeployError::HealthCheckUnhealthy {
                    host: host.to_string(),
                });
            }
            ProbeOutcome::TimedOut => {
                self.rollback(host, &next_name, "health check timeout", progress)
                    .await;
                return Err(DeployError::HealthCheckTimeout {
                    host: host.to_string(),
                });
            }
        }

        progress.phase(host, DeployPhase::Swapping);
        let route = self
            .swap(app, &next_name, &running_name, &candidate)
            .await?;

        let warm_report = if app.warm {
            self.warm_backend(host, &route, progress).await
        } else {
            None
        };

        progress.phase(host, DeployPhase::Done);
        info!(%host, id = %candidate.id, backend = %route.authority(), "deploy complete");

        Ok(DeployOutcome {
            host: host.to_string(),
            handle: ContainerHandle {
                name: running_name,
                id: candidate.id,
                ip: candidate.ip,
                role: Role::Running,
            },
            route,
            warm: warm_report,
        })
    }

    /// Stop and remove a stale candidate from a previous failed attempt.
    /// Absence is not an error.
    async fn reclaim_stale(&self, next_name: &str) -> Result<(), EngineError> {
        if self.engine.inspect_container(next_name).await?.is_none() {
            return Ok(());
        }
        info!(container = next_name, "reclaiming stale candidate");
        match self.engine.stop_container(next_name).await {
            Ok(()) | Err(EngineError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
        match self.engine.remove_container(next_name).await {
            Ok(()) | Err(EngineError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Create, start, and network-attach the candidate container.
    async fn create_candidate(
        &self,
        app: &Application,
        next_name: &str,
        env: Vec<String>,
    ) -> Result<Candidate, EngineError> {
        let spec = ContainerSpec {
            name: next_name.to_string(),
            image: app.image.clone(),
            env,
            binds: app.volumes.clone(),
        };
        let id = self.engine.create_container(&spec).await?;
        self.engine.start_container(next_name).await?;

        // Force membership on the app network even when the engine
        // auto-attached its default network.
        if app.network != DEFAULT_ENGINE_NETWORK {
            if let Err(e) = self
                .engine
                .disconnect_network(next_name, DEFAULT_ENGINE_NETWORK)
                .await
            {
                tracing::debug!(container = next_name, error = %e, "default network detach skipped");
            }
            self.engine.connect_network(next_name, &app.network).await?;
        }

        let info = self
            .engine
            .inspect_container(next_name)
            .await?
            .ok_or_else(|| EngineError::NotFound(next_name.to_string()))?;
        let ip = info
            .ip_on(&app.network)
            .ok_or_else(|| {
                EngineError::Api(format!(
                    "container '{next_name}' has no address on network '{}'",
                    app.network
                ))
            })?
            .to_string();

        Ok(Candidate {
            id,
            ip,
            healthcheck_deadline: info.healthcheck.map(|w| w.deadline()),
        })
    }

    /// Promote the candidate, publish its route, then destroy the old
    /// container. Rename-before-destroy: a failure mid-swap leaves the old
    /// container live and addressable, never a serving gap.
    async fn swap(
        &self,
        app: &Application,
        next_name: &str,
        running_name: &str,
        candidate: &Candidate,
    ) -> DeployResult<RouteEntry> {
        let host = app.host.as_str();
        let retired_name = names::retired(host);

        let old = self
            .engine
            .inspect_container(running_name)
            .await
            .map_err(|e| self.engine_err(host, DeployPhase::Swapping, e))?;

        if old.is_some() {
            // Clear any leftover from an interrupted earlier swap so the
            // retiring rename cannot collide.
            if self
                .engine
                .inspect_container(&retired_name)
                .await
                .map_err(|e| self.engine_err(host, DeployPhase::Swapping, e))?
                .is_some()
            {
                warn!(container = %retired_name, "removing leftover retired container");
                let _ = self.engine.stop_container(&retired_name).await;
                self.engine
                    .remove_container(&retired_name)
                    .await
                    .map_err(|e| self.engine_err(host, DeployPhase::Swapping, e))?;
            }

            self.engine
                .rename_container(running_name, &retired_name)
                .await
                .map_err(|e| DeployError::SwapInconsistency {
                    host: host.to_string(),
                    detail: format!(
                        "could not retire '{running_name}': {e}; previous container still serving"
                    ),
                })?;
        }

        if let Err(e) = self.engine.rename_container(next_name, running_name).await {
            return Err(DeployError::SwapInconsistency {
                host: host.to_string(),
                detail: format!(
                    "promotion rename '{next_name}' → '{running_name}' failed: {e}; \
                     previous container still serving"
                ),
            });
        }

        let route = RouteEntry {
            address: candidate.ip.clone(),
            port: app.container_port,
        };
        self.routes.publish(host, route.clone());

        if old.is_some() {
            let stop = self.engine.stop_container(&retired_name).await;
            let remove = self.engine.remove_container(&retired_name).await;
            if let Err(e) = stop.and(remove) {
                return Err(DeployError::SwapInconsistency {
                    host: host.to_string(),
                    detail: format!(
                        "new container is live and routed, but retired container \
                         '{retired_name}' could not be destroyed: {e}"
                    ),
                });
            }
        }

        Ok(route)
    }

    /// Destroy the failed candidate. The live container and its route are
    /// untouched.
    async fn rollback(&self, host: &str, next_name: &str, reason: &str, progress: &Progress) {
        progress.phase(host, DeployPhase::Rollback);
        warn!(%host, %reason, "rolling back candidate");
        match self.engine.stop_container(next_name).await {
            Ok(()) | Err(EngineError::NotFound(_)) => {}
            Err(e) => warn!(%host, error = %e, "rollback stop failed"),
        }
        match self.engine.remove_container(next_name).await {
            Ok(()) | Err(EngineError::NotFound(_)) => {}
            Err(e) => warn!(%host, error = %e, "rollback remove failed"),
        }
        progress.emit(DeployEvent::RolledBack {
            host: host.to_string(),
            reason: reason.to_string(),
        });
    }

    async fn warm_backend(
        &self,
        host: &str,
        route: &RouteEntry,
        progress: &Progress,
    ) -> Option<WarmReport> {
        match warm::run(host, &route.authority(), WARM_REQUESTS).await {
            Ok(report) => {
                info!(
                    %host,
                    min = ?report.min,
                    max = ?report.max,
                    avg = ?report.avg,
                    "warmup complete"
                );
                progress.emit(DeployEvent::Warmed {
                    host: host.to_string(),
                    report,
                });
                Some(report)
            }
            Err(e) => {
                warn!(%host, error = %e, "warmup failed (non-fatal)");
                None
            }
        }
    }

    fn engine_err(&self, host: &str, phase: DeployPhase, source: EngineError) -> DeployError {
        DeployError::Engine {
            host: host.to_string(),
            phase,
            source,
        }
    }
}

struct Candidate {
    id: String,
    ip: String,
    healthcheck_deadline: Option<Duration>,
}

/// RAII release of the per-host in-flight slot.
#[derive(Debug)]
pub(crate) struct InFlightGuard {
    set: Arc<Mutex<HashSet<String>>>,
    host: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.lock().expect("in-flight lock").remove(&self.host);
    }
}
