//! ring-proxy: consistent-hash HTTP load balancer.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ http::server ──▶ routing::Router ──▶ upstream backend
//!                 (request id,        │ key_for(request)
//!                  tracing)           ▼
//!                           load_balancer::BackendRegistry
//!                             (ArcSwap<Membership>: HashRing + members)
//!                                 ▲            ▲            ▲
//!                          admin API    config reload   health monitor
//!                       (register/remove) (reconcile)     (evict)
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use ring_proxy::config::loader::load_config;
use ring_proxy::config::ProxyConfig;
use ring_proxy::lifecycle::startup;
use ring_proxy::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "ring-proxy")]
#[command(about = "Consistent-hash HTTP load balancer", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Watched for backend changes.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => ProxyConfig::default(),
    };

    init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ring-proxy starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        backends = config.backends.len(),
        key_policy = ?config.routing.key,
        "Configuration loaded"
    );

    match startup::run(config, cli.config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            ExitCode::FAILURE
        }
    }
}
