//! Ring key derivation.
//!
//! # Responsibilities
//! - Turn a request into a ring key under exactly one policy
//! - Random: uniform draw over the keyspace
//! - Header / Path: hash of request content, for deterministic affinity
//!
//! # Design Decisions
//! - Policies are never mixed: a missing affinity header is an error,
//!   not a silent fallback to a random key
//! - Affinity keys use the same hash as ring positions

use axum::body::Body;
use axum::http::{HeaderName, Request};
use axum::http::header::InvalidHeaderName;
use rand::Rng;

use crate::config::KeyPolicy;
use crate::load_balancer::hash::{hash, RingPosition};
use crate::routing::error::RouteError;

/// Compiled form of a [`KeyPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyExtractor {
    Random,
    Header(HeaderName),
    Path,
}

impl KeyExtractor {
    pub fn from_policy(policy: &KeyPolicy) -> Result<Self, InvalidHeaderName> {
        Ok(match policy {
            KeyPolicy::Random => KeyExtractor::Random,
            KeyPolicy::Header { name } => {
                KeyExtractor::Header(HeaderName::from_bytes(name.as_bytes())?)
            }
            KeyPolicy::Path => KeyExtractor::Path,
        })
    }

    /// Derive the ring key for `request` in `[0, keyspace)`.
    pub fn key_for(
        &self,
        request: &Request<Body>,
        keyspace: u64,
    ) -> Result<RingPosition, RouteError> {
        match self {
            KeyExtractor::Random => Ok(rand::thread_rng().gen_range(0..keyspace.max(1))),
            KeyExtractor::Header(name) => {
                let value = request
                    .headers()
                    .get(name)
                    .ok_or_else(|| RouteError::MissingAffinityKey(name.to_string()))?;
                Ok(hash(&String::from_utf8_lossy(value.as_bytes()), keyspace))
            }
            KeyExtractor::Path => {
                let path = request
                    .uri()
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or("/");
                Ok(hash(path, keyspace))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str, session: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(s) = session {
            builder = builder.header("x-session-id", s);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_random_keys_stay_in_keyspace() {
        let extractor = KeyExtractor::from_policy(&KeyPolicy::Random).unwrap();
        for _ in 0..1_000 {
            assert!(extractor.key_for(&request("/", None), 10).unwrap() < 10);
        }
    }

    #[test]
    fn test_header_affinity_is_deterministic() {
        let extractor = KeyExtractor::from_policy(&KeyPolicy::Header {
            name: "X-Session-Id".to_string(),
        })
        .unwrap();

        let a1 = extractor.key_for(&request("/a", Some("user-1")), 1 << 32).unwrap();
        let a2 = extractor.key_for(&request("/b", Some("user-1")), 1 << 32).unwrap();
        let b = extractor.key_for(&request("/a", Some("user-2")), 1 << 32).unwrap();
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
        assert_eq!(a1, hash("user-1", 1 << 32));
    }

    #[test]
    fn test_missing_header_is_an_error() {
        let extractor = KeyExtractor::from_policy(&KeyPolicy::Header {
            name: "x-session-id".to_string(),
        })
        .unwrap();
        let err = extractor.key_for(&request("/", None), 1 << 32).unwrap_err();
        assert_eq!(err, RouteError::MissingAffinityKey("x-session-id".to_string()));
    }

    #[test]
    fn test_path_policy_includes_query() {
        let extractor = KeyExtractor::from_policy(&KeyPolicy::Path).unwrap();
        let plain = extractor.key_for(&request("/items/7", None), 1 << 32).unwrap();
        let query = extractor.key_for(&request("/items/7?page=2", None), 1 << 32).unwrap();
        assert_eq!(plain, hash("/items/7", 1 << 32));
        assert_ne!(plain, query);
    }

    #[test]
    fn test_invalid_header_name_rejected() {
        let policy = KeyPolicy::Header {
            name: "bad header".into(),
        };
        assert!(KeyExtractor::from_policy(&policy).is_err());
    }
}
