//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every registered backend
//! - Drive each backend's state machine from the probe results
//! - Evict backends that reach the failure threshold

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::health::probe::{HttpProbe, Probe, ProbeError};
use crate::health::state::{BackendHealth, HealthState, Transition};
use crate::load_balancer::{BackendId, BackendRegistry, RegistryError};
use crate::observability::metrics;

/// Summary of one monitoring cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub probed: usize,
    pub healthy: Vec<BackendId>,
    pub suspect: Vec<BackendId>,
    pub evicted: Vec<BackendId>,
}

/// Health of one registration of a backend.
struct Tracked {
    generation: u64,
    health: BackendHealth,
}

pub struct HealthMonitor<P = HttpProbe> {
    registry: Arc<BackendRegistry>,
    probe: P,
    config: HealthCheckConfig,
    states: HashMap<BackendId, Tracked>,
}

impl HealthMonitor<HttpProbe> {
    /// Monitor using HTTP probes against `config.path`.
    pub fn new(registry: Arc<BackendRegistry>, config: HealthCheckConfig) -> Self {
        let probe = HttpProbe::new(config.path.clone());
        Self::with_probe(registry, config, probe)
    }
}

impl<P: Probe> HealthMonitor<P> {
    pub fn with_probe(registry: Arc<BackendRegistry>, config: HealthCheckConfig, probe: P) -> Self {
        Self {
            registry,
            probe,
            config,
            states: HashMap::new(),
        }
    }

    /// Current tracked state of a backend, if it is being tracked.
    pub fn state_of(&self, backend: &BackendId) -> Option<HealthState> {
        self.states.get(backend).map(|tracked| tracked.health.state())
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval_ms = self.config.interval_ms,
            timeout_ms = self.config.timeout_ms,
            failure_threshold = self.config.failure_threshold,
            path = %self.config.path,
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.check_all().await;
                    tracing::debug!(
                        probed = report.probed,
                        suspect = report.suspect.len(),
                        evicted = report.evicted.len(),
                        "Health check cycle complete"
                    );
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every registered backend once, concurrently, and apply the results.
    pub async fn check_all(&mut self) -> CycleReport {
        let snapshot = self.registry.snapshot();
        let members: Vec<(BackendId, u64)> = snapshot
            .backends()
            .iter()
            .map(|(backend, member)| (backend.clone(), member.generation))
            .collect();

        // State belongs to one registration; a re-registered backend starts fresh.
        self.states.retain(|backend, tracked| {
            snapshot
                .backends()
                .get(backend)
                .is_some_and(|member| member.generation == tracked.generation)
        });

        let timeout = self.config.timeout();
        let probe = &self.probe;
        let results = join_all(members.into_iter().map(|(backend, generation)| async move {
            let outcome = match time::timeout(timeout, probe.check(&backend)).await {
                Ok(result) => result,
                Err(_) => Err(ProbeError::Timeout),
            };
            (backend, generation, outcome)
        }))
        .await;

        let mut report = CycleReport {
            probed: results.len(),
            ..CycleReport::default()
        };
        let now = Instant::now();
        let threshold = self.config.failure_threshold;

        for (backend, generation, outcome) in results {
            let tracked = self.states.entry(backend.clone()).or_insert_with(|| Tracked {
                generation,
                health: BackendHealth::default(),
            });
            let health = &mut tracked.health;
            let transition = match &outcome {
                Ok(()) => health.record_success(now),
                Err(e) => {
                    tracing::warn!(
                        backend = %backend,
                        error = %e,
                        consecutive_failures = health.consecutive_failures() + 1,
                        "Health check failed"
                    );
                    health.record_failure(threshold, now)
                }
            };

            match transition {
                Transition::Recovered => {
                    tracing::info!(backend = %backend, "Backend recovered");
                }
                Transition::BecameSuspect => {
                    tracing::info!(backend = %backend, "Backend suspect");
                }
                Transition::Evicted | Transition::Unchanged => {}
            }

            match health.state() {
                HealthState::Healthy => {
                    metrics::record_backend_health(backend.as_str(), true);
                    report.healthy.push(backend);
                }
                HealthState::Suspect => {
                    metrics::record_backend_health(backend.as_str(), false);
                    report.suspect.push(backend);
                }
                HealthState::Evicted => {
                    metrics::record_backend_health(backend.as_str(), false);
                    self.states.remove(&backend);
                    match self.registry.evict(&backend, generation).await {
                        Ok(()) => report.evicted.push(backend),
                        // Deregistered or re-registered while the probe was in flight.
                        Err(RegistryError::NotRegistered(_)) => {}
                        Err(e) => {
                            tracing::error!(
                                backend = %backend,
                                error = %e,
                                "Failed to evict backend"
                            );
                        }
                    }
                }
            }
        }

        report
    }
}
