//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, catch-all route)
//!     → request.rs (assign / propagate request ID)
//!     → routing layer derives key, resolves backend, forwards
//!     → upstream response returned unmodified, or RouteError status
//! ```

pub mod request;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::HttpServer;
