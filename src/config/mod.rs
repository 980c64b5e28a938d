//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → ring, routing and health settings handed to each subsystem
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → declared backend list reconciled into the registry
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Only the declared backend list is applied on reload; ring geometry
//!   and listeners need a restart

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::AdminConfig;
pub use schema::BackendConfig;
pub use schema::HealthCheckConfig;
pub use schema::KeyPolicy;
pub use schema::ListenerConfig;
pub use schema::ObservabilityConfig;
pub use schema::ProxyConfig;
pub use schema::RingConfig;
pub use schema::RoutingConfig;
