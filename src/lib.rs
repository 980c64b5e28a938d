//! Consistent-hash HTTP load balancer.
//!
//! Requests are mapped onto a ring of virtual nodes, resolved to the owning
//! backend, and forwarded verbatim. Membership changes through the admin API,
//! config reloads, and health-driven eviction.

pub mod admin;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod routing;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::{BackendId, BackendRegistry, HashRing};
