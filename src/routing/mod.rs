//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, headers, body)
//!     → key.rs (random draw or hash of affinity content)
//!     → router.rs (resolve key on the registry snapshot's ring)
//!     → router.rs (forward verbatim to http://{backend}, bounded by timeout)
//!     → Return: upstream response or RouteError
//! ```
//!
//! # Design Decisions
//! - Key policy chosen once from config, never mixed per request
//! - Deterministic: with affinity, same content resolves to same backend
//!   as long as membership is unchanged
//! - Failures surface to the caller; no transparent retry

pub mod body;
pub mod error;
pub mod key;
pub mod router;

pub use error::{RouteError, UpstreamFailure};
pub use key::KeyExtractor;
pub use router::Router;
