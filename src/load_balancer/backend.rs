//! Backend abstraction.
//!
//! # Responsibilities
//! - Identify a single backend endpoint (`host:port`)
//! - Guarantee the identifier can be used as an upstream URI authority
//! - Record per-member registration details

use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use axum::http::uri::Authority;
use serde::{Deserialize, Serialize};

/// Error returned when a string is not usable as a backend identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid backend id {id:?}: {reason}")]
pub struct InvalidBackendId {
    pub id: String,
    pub reason: String,
}

/// Opaque identifier of a backend endpoint, e.g. `127.0.0.1:3000`.
///
/// Ordered and hashable so it can key ring entries and registry maps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BackendId(String);

impl BackendId {
    /// Validate and wrap a backend identifier.
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidBackendId> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(InvalidBackendId {
                id,
                reason: "empty".to_string(),
            });
        }
        if let Err(e) = Authority::from_str(trimmed) {
            return Err(InvalidBackendId {
                id,
                reason: e.to_string(),
            });
        }
        // Userinfo would leak into forwarded requests.
        if trimmed.contains('@') {
            return Err(InvalidBackendId {
                id,
                reason: "userinfo is not allowed".to_string(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identifier as an upstream URI authority.
    pub fn authority(&self) -> Authority {
        // Validated in `new`.
        Authority::from_str(&self.0).unwrap_or_else(|_| Authority::from_static("invalid"))
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BackendId {
    type Err = InvalidBackendId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for BackendId {
    type Error = InvalidBackendId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BackendId> for String {
    fn from(id: BackendId) -> Self {
        id.0
    }
}

impl AsRef<str> for BackendId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Registration details kept for every registry member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Virtual nodes the backend was inserted with; removal recomputes the same set.
    pub virtual_nodes: u32,
    /// Wall-clock registration time.
    pub registered_at: SystemTime,
    /// Registry-wide sequence number of this registration. A backend that is
    /// removed and added again gets a new one.
    pub generation: u64,
}

impl Member {
    pub fn new(virtual_nodes: u32, generation: u64) -> Self {
        Self {
            virtual_nodes,
            registered_at: SystemTime::now(),
            generation,
        }
    }
}
