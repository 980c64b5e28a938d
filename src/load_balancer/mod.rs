//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Admin register / deregister, health eviction
//!     → registry.rs (serialize writers, copy current membership)
//!     → ring.rs (insert / remove the backend's virtual nodes)
//!     → registry.rs (publish new snapshot atomically)
//!
//! Request key
//!     → registry snapshot (lock-free load)
//!     → ring.rs (successor lookup with wraparound)
//!     → BackendId or EmptyRing
//! ```
//!
//! # Design Decisions
//! - Registry and ring live in one snapshot so they can never disagree
//! - Positions come from hash.rs only; insertion and removal share it
//! - Readers never take a lock

pub mod backend;
pub mod hash;
pub mod registry;
pub mod ring;

pub use backend::BackendId;
pub use hash::RingPosition;
pub use registry::{BackendRegistry, Membership, RegistryError};
pub use ring::{HashRing, RingError};
