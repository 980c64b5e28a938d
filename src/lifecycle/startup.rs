//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Seed the registry from the declared backend list
//! - Start background tasks (health monitor, config reload, admin API)
//! - Bind the proxy listener last so traffic arrives only when ready
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Every task subscribes to one `Shutdown` coordinator

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::http::header::InvalidHeaderName;
use metrics_exporter_prometheus::BuildError;
use notify::RecommendedWatcher;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::admin::{handlers::AdminState, setup_admin_router};
use crate::config::watcher::ConfigWatcher;
use crate::config::ProxyConfig;
use crate::health::HealthMonitor;
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::shutdown_signal;
use crate::load_balancer::registry::DeclaredBackend;
use crate::load_balancer::{BackendId, BackendRegistry, RegistryError};
use crate::observability::metrics;
use crate::routing::Router;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid ring configuration: {0}")]
    Registry(#[from] RegistryError),

    #[error("invalid routing key header: {0}")]
    Routing(#[from] InvalidHeaderName),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start metrics exporter: {0}")]
    Metrics(#[from] BuildError),

    #[error("failed to watch config file: {0}")]
    Watcher(#[from] notify::Error),
}

/// A started proxy: listeners bound, background tasks running.
pub struct RunningProxy {
    pub proxy_addr: SocketAddr,
    pub admin_addr: Option<SocketAddr>,
    pub registry: Arc<BackendRegistry>,
    shutdown: Shutdown,
    tasks: Vec<JoinHandle<()>>,
    _watcher: Option<RecommendedWatcher>,
}

impl RunningProxy {
    /// Signal every task to stop and wait for them.
    pub async fn stop(self) {
        self.shutdown.trigger();
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Task failed during shutdown");
            }
        }
        tracing::info!("Shutdown complete");
    }
}

/// Backends declared in `config`, skipping ids that fail validation.
pub fn declared_backends(config: &ProxyConfig) -> Vec<DeclaredBackend> {
    config
        .backends
        .iter()
        .filter_map(|b| match BackendId::new(b.id.as_str()) {
            Ok(id) => Some(DeclaredBackend {
                id,
                virtual_nodes: b.virtual_nodes,
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping invalid declared backend");
                None
            }
        })
        .collect()
}

/// Start every subsystem and return once the proxy is accepting traffic.
pub async fn start(
    config: ProxyConfig,
    config_path: Option<PathBuf>,
) -> Result<RunningProxy, StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let registry = Arc::new(BackendRegistry::new(config.ring.keyspace, config.ring.virtual_nodes)?);
    let router = Arc::new(Router::new(registry.clone(), &config.routing)?);
    let shutdown = Shutdown::new();
    let mut tasks = Vec::new();

    let seeded = declared_backends(&config);
    let report = registry.reconcile(&BTreeSet::new(), &seeded).await;
    for (backend, e) in &report.failed {
        tracing::error!(backend = %backend, error = %e, "Failed to register declared backend");
    }
    tracing::info!(
        declared = seeded.len(),
        registered = report.added.len(),
        keyspace = config.ring.keyspace,
        virtual_nodes = config.ring.virtual_nodes,
        "Registry seeded"
    );
    let declared: BTreeSet<BackendId> = seeded.into_iter().map(|d| d.id).collect();

    let monitor = HealthMonitor::new(registry.clone(), config.health_check.clone());
    tasks.push(tokio::spawn(monitor.run(shutdown.subscribe())));

    let watcher = match config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(&path);
            let guard = watcher.run()?;
            tasks.push(tokio::spawn(reload_loop(
                registry.clone(),
                declared,
                updates,
                shutdown.subscribe(),
            )));
            Some(guard)
        }
        None => None,
    };

    let admin_addr = if config.admin.enabled {
        let listener = bind(&config.admin.bind_address).await?;
        let addr = listener.local_addr().map_err(|source| StartupError::Bind {
            address: config.admin.bind_address.clone(),
            source,
        })?;
        let app = setup_admin_router(AdminState { registry: registry.clone() });
        let mut stop = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            tracing::info!(address = %addr, "Admin API listening");
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop.recv().await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "Admin server failed");
            }
        }));
        Some(addr)
    } else {
        None
    };

    let listener = bind(&config.listener.bind_address).await?;
    let proxy_addr = listener.local_addr().map_err(|source| StartupError::Bind {
        address: config.listener.bind_address.clone(),
        source,
    })?;
    let server = HttpServer::new(router);
    let server_shutdown = shutdown.subscribe();
    tasks.push(tokio::spawn(async move {
        if let Err(e) = server.run(listener, server_shutdown).await {
            tracing::error!(error = %e, "HTTP server failed");
        }
    }));

    Ok(RunningProxy {
        proxy_addr,
        admin_addr,
        registry,
        shutdown,
        tasks,
        _watcher: watcher,
    })
}

/// Run until SIGINT/SIGTERM, then shut down gracefully.
pub async fn run(config: ProxyConfig, config_path: Option<PathBuf>) -> Result<(), StartupError> {
    let proxy = start(config, config_path).await?;
    tracing::info!(address = %proxy.proxy_addr, "Listening for connections");
    shutdown_signal().await;
    proxy.stop().await;
    Ok(())
}

async fn bind(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address).await.map_err(|source| StartupError::Bind {
        address: address.to_string(),
        source,
    })
}

/// Apply the declared backend list of every reloaded config.
async fn reload_loop(
    registry: Arc<BackendRegistry>,
    mut declared: BTreeSet<BackendId>,
    mut updates: mpsc::UnboundedReceiver<ProxyConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(config) = update else { break };
                let desired = declared_backends(&config);
                let report = registry.reconcile(&declared, &desired).await;
                for (backend, e) in &report.failed {
                    tracing::error!(
                        backend = %backend,
                        error = %e,
                        "Failed to apply declared backend"
                    );
                }
                tracing::info!(
                    added = report.added.len(),
                    removed = report.removed.len(),
                    "Declared backends reloaded"
                );
                declared = desired.into_iter().map(|d| d.id).collect();
            }
            _ = shutdown.recv() => break,
        }
    }
}
