//! Ring position hashing.
//!
//! # Design Decisions
//! - SHA-256 so positions are identical across processes and platforms
//! - No per-run salt: removal must recompute the positions insertion produced
//! - The first 8 digest bytes (big-endian) are reduced modulo the keyspace

use sha2::{Digest, Sha256};

/// A point on the ring, always in `[0, keyspace)`.
pub type RingPosition = u64;

/// Hash an arbitrary string onto a ring with the given keyspace.
pub fn hash(input: &str, keyspace: u64) -> RingPosition {
    let digest = Sha256::digest(input.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix) % keyspace.max(1)
}

/// Label hashed for the `index`-th virtual node of a backend.
pub fn virtual_node_label(backend: &str, index: u32) -> String {
    format!("{}_{}", backend, index)
}
