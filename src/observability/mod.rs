//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging with backend and request id fields
//! - Request ID flows from the HTTP layer to every backend
//! - Metric calls are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
