//! Backend registry.
//!
//! # Responsibilities
//! - Own the authoritative set of live backends
//! - Keep the hash ring in lock-step with that set
//! - Publish membership snapshots that readers can use without locking
//!
//! # Design Decisions
//! - Read-copy-update: writers build a new `Membership` from a copy and swap
//!   it in with `ArcSwap`, so readers see either the old or the new state
//! - A single async mutex serializes writers for the whole read-modify-publish
//! - A failed ring insertion never publishes, which is the rollback

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;

use crate::load_balancer::backend::{BackendId, InvalidBackendId, Member};
use crate::load_balancer::hash::RingPosition;
use crate::load_balancer::ring::{HashRing, RingError};
use crate::observability::metrics;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("backend {0} is already registered")]
    AlreadyRegistered(BackendId),

    #[error("backend {0} is not registered")]
    NotRegistered(BackendId),

    #[error(transparent)]
    InvalidBackendId(#[from] InvalidBackendId),

    #[error(transparent)]
    Ring(#[from] RingError),
}

/// An immutable view of registry membership and the matching ring.
#[derive(Debug, Clone)]
pub struct Membership {
    ring: HashRing,
    backends: BTreeMap<BackendId, Member>,
    next_generation: u64,
}

impl Membership {
    fn empty(keyspace: u64) -> Result<Self, RingError> {
        Ok(Self {
            ring: HashRing::new(keyspace)?,
            backends: BTreeMap::new(),
            next_generation: 0,
        })
    }

    pub fn ring(&self) -> &HashRing {
        &self.ring
    }

    pub fn backends(&self) -> &BTreeMap<BackendId, Member> {
        &self.backends
    }

    pub fn contains(&self, backend: &BackendId) -> bool {
        self.backends.contains_key(backend)
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

/// A backend declared outside the admin API (config file seed list).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredBackend {
    pub id: BackendId,
    pub virtual_nodes: Option<u32>,
}

/// Outcome of applying a declared backend list.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: Vec<BackendId>,
    pub removed: Vec<BackendId>,
    pub failed: Vec<(BackendId, RegistryError)>,
}

/// Authoritative backend set, mirrored by the hash ring.
#[derive(Debug)]
pub struct BackendRegistry {
    current: ArcSwap<Membership>,
    writer: Mutex<()>,
    default_virtual_nodes: u32,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new(keyspace: u64, default_virtual_nodes: u32) -> Result<Self, RegistryError> {
        if default_virtual_nodes == 0 {
            return Err(RingError::InvalidVirtualNodeCount(0).into());
        }
        Ok(Self {
            current: ArcSwap::from_pointee(Membership::empty(keyspace)?),
            writer: Mutex::new(()),
            default_virtual_nodes,
        })
    }

    pub fn default_virtual_nodes(&self) -> u32 {
        self.default_virtual_nodes
    }

    pub fn keyspace(&self) -> u64 {
        self.current.load().ring.keyspace()
    }

    /// Current membership. Never blocks, even while a writer is active.
    pub fn snapshot(&self) -> Arc<Membership> {
        self.current.load_full()
    }

    /// Sorted copy of the registered backend ids.
    pub fn members(&self) -> Vec<BackendId> {
        self.current.load().backends.keys().cloned().collect()
    }

    pub fn contains(&self, backend: &BackendId) -> bool {
        self.current.load().contains(backend)
    }

    /// Resolve a ring key against the current snapshot.
    pub fn resolve(&self, key: RingPosition) -> Result<BackendId, RingError> {
        self.current.load().ring.resolve(key).cloned()
    }

    /// Register a backend with the default virtual node count.
    pub async fn add(&self, backend: BackendId) -> Result<(), RegistryError> {
        self.add_with_virtual_nodes(backend, self.default_virtual_nodes).await
    }

    /// Register a backend and place `virtual_nodes` entries for it on the ring.
    pub async fn add_with_virtual_nodes(
        &self,
        backend: BackendId,
        virtual_nodes: u32,
    ) -> Result<(), RegistryError> {
        let _guard = self.writer.lock().await;
        let current = self.current.load_full();
        if current.contains(&backend) {
            return Err(RegistryError::AlreadyRegistered(backend));
        }

        let mut next = Membership::clone(&current);
        let displaced = next.ring.insert(&backend, virtual_nodes)?;
        let generation = next.next_generation;
        next.next_generation += 1;
        next.backends.insert(backend.clone(), Member::new(virtual_nodes, generation));
        self.publish(next);

        tracing::info!(
            backend = %backend,
            virtual_nodes,
            displaced,
            members = current.len() + 1,
            "Backend registered"
        );
        Ok(())
    }

    /// Deregister a backend and drop its virtual nodes.
    pub async fn remove(&self, backend: &BackendId) -> Result<(), RegistryError> {
        let removed = self.remove_inner(backend, None).await?;
        tracing::info!(backend = %backend, ring_entries_removed = removed, "Backend deregistered");
        Ok(())
    }

    /// Remove the registration `generation` of a backend that failed health
    /// checks.
    ///
    /// Fails with `NotRegistered` when that registration is gone, including
    /// when the backend has since been registered again.
    pub async fn evict(&self, backend: &BackendId, generation: u64) -> Result<(), RegistryError> {
        let removed = self.remove_inner(backend, Some(generation)).await?;
        metrics::record_eviction(backend.as_str());
        tracing::warn!(backend = %backend, ring_entries_removed = removed, "Backend evicted");
        Ok(())
    }

    async fn remove_inner(
        &self,
        backend: &BackendId,
        generation: Option<u64>,
    ) -> Result<usize, RegistryError> {
        let _guard = self.writer.lock().await;
        let current = self.current.load_full();
        let member = current
            .backends
            .get(backend)
            .filter(|m| generation.map_or(true, |g| g == m.generation))
            .ok_or_else(|| RegistryError::NotRegistered(backend.clone()))?;

        let mut next = Membership::clone(&current);
        let removed = next.ring.remove(backend, member.virtual_nodes);
        next.backends.remove(backend);
        self.publish(next);
        Ok(removed)
    }

    /// Apply a declared backend list.
    ///
    /// Declared backends that are not registered are added; backends that were
    /// in `previous` but are no longer declared are removed. Backends
    /// registered through other means are left alone.
    pub async fn reconcile(
        &self,
        previous: &BTreeSet<BackendId>,
        desired: &[DeclaredBackend],
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let desired_ids: BTreeSet<&BackendId> = desired.iter().map(|d| &d.id).collect();

        for declared in desired {
            if self.contains(&declared.id) {
                continue;
            }
            let vnodes = declared.virtual_nodes.unwrap_or(self.default_virtual_nodes);
            match self.add_with_virtual_nodes(declared.id.clone(), vnodes).await {
                Ok(()) => report.added.push(declared.id.clone()),
                // Registered concurrently; the goal state holds.
                Err(RegistryError::AlreadyRegistered(_)) => {}
                Err(e) => report.failed.push((declared.id.clone(), e)),
            }
        }

        for stale in previous.iter().filter(|id| !desired_ids.contains(id)) {
            match self.remove(stale).await {
                Ok(()) => report.removed.push(stale.clone()),
                Err(RegistryError::NotRegistered(_)) => {}
                Err(e) => report.failed.push((stale.clone(), e)),
            }
        }

        report
    }

    fn publish(&self, next: Membership) {
        metrics::record_membership(next.len(), next.ring.len());
        self.current.store(Arc::new(next));
    }
}
