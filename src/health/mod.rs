//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Snapshot registry members
//!     → Probe every backend concurrently (probe.rs), each with its own timeout
//!     → Update state.rs
//!     → Evict from registry + ring at the failure threshold
//!
//! State machine (state.rs):
//!     Healthy → Suspect → Evicted
//!     With a consecutive-failure threshold to prevent flapping
//! ```
//!
//! # Design Decisions
//! - Only the monitor evicts; a failed forward never does
//! - A slow backend cannot delay detection of the others
//! - Health state is private to the monitor; its only effect is on membership

pub mod active;
pub mod probe;
pub mod state;

pub use active::{CycleReport, HealthMonitor};
pub use probe::{HttpProbe, Probe, ProbeError};
pub use state::{BackendHealth, HealthState};
