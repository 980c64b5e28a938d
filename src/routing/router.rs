//! Request routing and forwarding.
//!
//! # Responsibilities
//! - Derive a ring key for each request
//! - Resolve the key to a backend through the registry snapshot
//! - Forward the request verbatim and return the upstream response
//!
//! # Design Decisions
//! - Reads a membership snapshot; never mutates the registry
//! - Forwards are bounded by their own timeout, separate from health probes;
//!   the one deadline covers both the response head and the body stream
//! - No retry against another backend and no eviction on a failed forward;
//!   only the health monitor changes membership

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::header::InvalidHeaderName;
use axum::http::uri::{PathAndQuery, Scheme};
use axum::http::{Request, Response, Uri, Version};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::time::{self, Instant as Deadline};

use crate::config::RoutingConfig;
use crate::load_balancer::{BackendId, BackendRegistry, RingPosition};
use crate::observability::metrics;
use crate::routing::body::DeadlineBody;
use crate::routing::error::{RouteError, UpstreamFailure};
use crate::routing::key::KeyExtractor;

/// Maps requests onto registered backends via the hash ring.
pub struct Router {
    registry: Arc<BackendRegistry>,
    extractor: KeyExtractor,
    client: Client<HttpConnector, Body>,
    forward_timeout: Duration,
}

impl Router {
    pub fn new(
        registry: Arc<BackendRegistry>,
        config: &RoutingConfig,
    ) -> Result<Self, InvalidHeaderName> {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Ok(Self {
            registry,
            extractor: KeyExtractor::from_policy(&config.key)?,
            client,
            forward_timeout: config.forward_timeout(),
        })
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    /// Resolve a ring key to a backend.
    pub fn resolve(&self, key: RingPosition) -> Result<BackendId, RouteError> {
        self.registry
            .resolve(key)
            .map_err(|_| RouteError::NoBackendAvailable)
    }

    /// Derive the request's ring key and resolve it.
    pub fn select(&self, request: &Request<Body>) -> Result<(RingPosition, BackendId), RouteError> {
        let snapshot = self.registry.snapshot();
        let key = self.extractor.key_for(request, snapshot.ring().keyspace())?;
        let backend = snapshot
            .ring()
            .resolve(key)
            .map_err(|_| RouteError::NoBackendAvailable)?
            .clone();
        Ok((key, backend))
    }

    /// Route one request to its backend and return the backend's response.
    pub async fn route(&self, request: Request<Body>) -> Result<Response<Body>, RouteError> {
        let start_time = Instant::now();
        let method = request.method().to_string();

        let (key, backend) = match self.select(&request) {
            Ok(selected) => selected,
            Err(e) => {
                tracing::warn!(error = %e, "No backend resolved");
                metrics::record_request(&method, e.status().as_u16(), "none", start_time);
                return Err(e);
            }
        };

        tracing::debug!(
            key,
            backend = %backend,
            path = %request.uri().path(),
            "Forwarding request"
        );

        let result = self.forward(&backend, request).await;
        let status = match &result {
            Ok(response) => response.status().as_u16(),
            Err(e) => e.status().as_u16(),
        };
        metrics::record_request(&method, status, backend.as_str(), start_time);
        result
    }

    async fn forward(
        &self,
        backend: &BackendId,
        request: Request<Body>,
    ) -> Result<Response<Body>, RouteError> {
        let deadline = Deadline::now() + self.forward_timeout;
        let (mut parts, body) = request.into_parts();
        parts.uri = upstream_uri(backend, &parts.uri).map_err(|e| RouteError::UpstreamUnreachable {
            backend: backend.clone(),
            cause: UpstreamFailure::Transport(e.to_string()),
        })?;
        // The upstream client speaks HTTP/1.1 regardless of the inbound version.
        parts.version = Version::HTTP_11;

        let upstream = Request::from_parts(parts, body);
        match time::timeout_at(deadline, self.client.request(upstream)).await {
            Ok(Ok(response)) => Ok(into_body_response(response, deadline)),
            Ok(Err(e)) => {
                tracing::error!(backend = %backend, error = %e, "Upstream error");
                Err(RouteError::UpstreamUnreachable {
                    backend: backend.clone(),
                    cause: UpstreamFailure::Transport(e.to_string()),
                })
            }
            Err(_) => {
                tracing::error!(
                    backend = %backend,
                    timeout = ?self.forward_timeout,
                    "Upstream timed out"
                );
                Err(RouteError::UpstreamUnreachable {
                    backend: backend.clone(),
                    cause: UpstreamFailure::Timeout,
                })
            }
        }
    }
}

/// Point `original`'s path and query at `backend`.
fn upstream_uri(
    backend: &BackendId,
    original: &Uri,
) -> Result<Uri, axum::http::uri::InvalidUriParts> {
    let mut parts = original.clone().into_parts();
    parts.scheme = Some(Scheme::HTTP);
    parts.authority = Some(backend.authority());
    if parts.path_and_query.is_none() {
        parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    Uri::from_parts(parts)
}

fn into_body_response(
    response: Response<hyper::body::Incoming>,
    deadline: Deadline,
) -> Response<Body> {
    let (parts, body) = response.into_parts();
    Response::from_parts(parts, Body::new(DeadlineBody::new(body, deadline)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeyPolicy;

    fn id(s: &str) -> BackendId {
        BackendId::new(s).unwrap()
    }

    #[test]
    fn test_upstream_uri_keeps_path_and_query() {
        let uri: Uri = "/search?q=ring".parse().unwrap();
        let rewritten = upstream_uri(&id("127.0.0.1:5001"), &uri).unwrap();
        assert_eq!(rewritten.to_string(), "http://127.0.0.1:5001/search?q=ring");

        let absolute: Uri = "http://proxy.local:5000/x".parse().unwrap();
        let rewritten = upstream_uri(&id("10.0.0.9:80"), &absolute).unwrap();
        assert_eq!(rewritten.to_string(), "http://10.0.0.9:80/x");
    }

    #[tokio::test]
    async fn test_empty_registry_has_no_backend() {
        let registry = Arc::new(BackendRegistry::new(1 << 32, 50).unwrap());
        let router = Router::new(registry, &RoutingConfig::default()).unwrap();

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        assert_eq!(router.select(&request).unwrap_err(), RouteError::NoBackendAvailable);
        assert_eq!(
            router.route(request).await.unwrap_err(),
            RouteError::NoBackendAvailable
        );
    }

    #[tokio::test]
    async fn test_header_affinity_selects_same_backend() {
        let registry = Arc::new(BackendRegistry::new(1 << 32, 50).unwrap());
        for port in 5001..5004 {
            registry.add(id(&format!("127.0.0.1:{}", port))).await.unwrap();
        }
        let config = RoutingConfig {
            key: KeyPolicy::Header { name: "x-session-id".into() },
            ..RoutingConfig::default()
        };
        let router = Router::new(registry.clone(), &config).unwrap();

        let req = |session: &str| {
            Request::builder()
                .uri("/")
                .header("x-session-id", session)
                .body(Body::empty())
                .unwrap()
        };

        let (key, first) = router.select(&req("alice")).unwrap();
        for _ in 0..20 {
            assert_eq!(router.select(&req("alice")).unwrap(), (key, first.clone()));
        }
        assert!(registry.contains(&first));
        assert_eq!(router.resolve(key).unwrap(), first);
    }

    #[tokio::test]
    async fn test_random_policy_spreads_over_members() {
        let registry = Arc::new(BackendRegistry::new(1 << 32, 50).unwrap());
        for port in 5001..5004 {
            registry.add(id(&format!("127.0.0.1:{}", port))).await.unwrap();
        }
        let router = Router::new(registry.clone(), &RoutingConfig::default()).unwrap();

        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..500 {
            let request = Request::builder().uri("/").body(Body::empty()).unwrap();
            let (_, backend) = router.select(&request).unwrap();
            seen.insert(backend);
        }
        assert_eq!(seen.into_iter().collect::<Vec<_>>(), registry.members());
    }
}
