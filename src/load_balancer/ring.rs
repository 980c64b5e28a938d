//! Consistent hash ring with virtual nodes.
//!
//! # Responsibilities
//! - Place `V` virtual nodes per backend on a bounded keyspace
//! - Resolve a ring key to the owner of its successor position
//! - Remove a backend's virtual nodes without touching other owners
//!
//! # Design Decisions
//! - `BTreeMap` keyed by position gives O(log n) successor lookup
//! - Collisions are last-write-wins; removal only deletes entries the
//!   backend still owns, so a displaced owner never takes a slot back
//! - Resolution is a pure function of ring contents and the key

use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};

use crate::load_balancer::backend::BackendId;
use crate::load_balancer::hash::{hash, virtual_node_label, RingPosition};

/// Default ring keyspace (2^32 positions).
pub const DEFAULT_KEYSPACE: u64 = 1 << 32;

/// Default number of virtual nodes per backend.
pub const DEFAULT_VIRTUAL_NODES: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RingError {
    #[error("ring has no entries")]
    EmptyRing,

    #[error("ring keyspace must be at least 1, got {0}")]
    InvalidKeyspace(u64),

    #[error("virtual node count must be at least 1, got {0}")]
    InvalidVirtualNodeCount(u32),
}

/// Compute the ring positions of a backend's virtual nodes.
///
/// The same `(backend, count, keyspace)` always yields the same sequence.
pub fn virtual_positions(backend: &BackendId, count: u32, keyspace: u64) -> Vec<RingPosition> {
    (0..count)
        .map(|i| hash(&virtual_node_label(backend.as_str(), i), keyspace))
        .collect()
}

/// Ordered map of virtual node positions to their owning backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashRing {
    entries: BTreeMap<RingPosition, BackendId>,
    keyspace: u64,
}

impl HashRing {
    /// Create an empty ring over `[0, keyspace)`.
    pub fn new(keyspace: u64) -> Result<Self, RingError> {
        if keyspace == 0 {
            return Err(RingError::InvalidKeyspace(keyspace));
        }
        Ok(Self {
            entries: BTreeMap::new(),
            keyspace,
        })
    }

    pub fn keyspace(&self) -> u64 {
        self.keyspace
    }

    /// Number of virtual nodes currently on the ring.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hash an arbitrary string into this ring's keyspace.
    pub fn position_of(&self, input: &str) -> RingPosition {
        hash(input, self.keyspace)
    }

    /// Positions of `backend`'s virtual nodes on this ring.
    pub fn virtual_positions(&self, backend: &BackendId, count: u32) -> Vec<RingPosition> {
        virtual_positions(backend, count, self.keyspace)
    }

    /// Insert `count` virtual nodes for `backend`.
    ///
    /// Returns how many existing entries of *other* backends were overwritten.
    pub fn insert(&mut self, backend: &BackendId, count: u32) -> Result<usize, RingError> {
        if count == 0 {
            return Err(RingError::InvalidVirtualNodeCount(count));
        }

        let mut displaced = 0;
        for position in self.virtual_positions(backend, count) {
            if let Some(previous) = self.entries.insert(position, backend.clone()) {
                if &previous != backend {
                    displaced += 1;
                    tracing::warn!(
                        position,
                        previous = %previous,
                        backend = %backend,
                        "Ring position collision, last write wins"
                    );
                }
            }
        }
        Ok(displaced)
    }

    /// Remove `backend`'s virtual nodes, skipping positions now owned by someone else.
    ///
    /// Returns the number of entries removed.
    pub fn remove(&mut self, backend: &BackendId, count: u32) -> usize {
        let mut removed = 0;
        for position in self.virtual_positions(backend, count) {
            if self.entries.get(&position) == Some(backend) {
                self.entries.remove(&position);
                removed += 1;
            }
        }
        removed
    }

    /// Find the owner of the first position strictly greater than `key`,
    /// wrapping to the lowest position when `key` is past the last one.
    pub fn resolve(&self, key: RingPosition) -> Result<&BackendId, RingError> {
        self.entries
            .range((Excluded(key), Unbounded))
            .next()
            .or_else(|| self.entries.iter().next())
            .map(|(_, backend)| backend)
            .ok_or(RingError::EmptyRing)
    }

    /// Ring positions currently owned by `backend`, ascending.
    pub fn positions_of(&self, backend: &BackendId) -> Vec<RingPosition> {
        self.entries
            .iter()
            .filter(|(_, owner)| *owner == backend)
            .map(|(position, _)| *position)
            .collect()
    }

    /// Iterate over `(position, owner)` pairs in ring order.
    pub fn entries(&self) -> impl Iterator<Item = (RingPosition, &BackendId)> {
        self.entries.iter().map(|(p, b)| (*p, b))
    }

    /// How many keys of the keyspace each backend resolves.
    ///
    /// A key `k` resolves to the first position `> k`, so the entry at `p`
    /// owns `[prev, p)` and the lowest entry also owns `[last, keyspace)`.
    /// The spans sum to the keyspace on a non-empty ring.
    pub fn ownership(&self) -> BTreeMap<BackendId, u64> {
        let mut spans: BTreeMap<BackendId, u64> = BTreeMap::new();
        let (Some((&first, first_owner)), Some((&last, _))) =
            (self.entries.iter().next(), self.entries.iter().next_back())
        else {
            return spans;
        };

        *spans.entry(first_owner.clone()).or_default() += (self.keyspace - last) + first;

        let mut previous = first;
        for (&position, owner) in self.entries.iter().skip(1) {
            *spans.entry(owner.clone()).or_default() += position - previous;
            previous = position;
        }
        spans
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            keyspace: DEFAULT_KEYSPACE,
        }
    }
}
