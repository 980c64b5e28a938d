//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Metrics exporter → Registry + seed → Router
//!         → Health monitor → Config watcher → Admin API → Proxy listener
//!
//! Shutdown (shutdown.rs):
//!     trigger() → every task's receiver fires → servers drain → tasks joined
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: the proxy listener binds last
//! - One broadcast channel fans shutdown out to every task

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{RunningProxy, StartupError};
