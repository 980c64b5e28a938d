//! Liveness probes.
//!
//! # Responsibilities
//! - Define the probe contract the monitor depends on
//! - Provide the HTTP probe used in production
//!
//! The monitor bounds every probe with its own timeout, so implementations
//! do not need to enforce one.

use std::future::Future;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::load_balancer::BackendId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("probe timed out")]
    Timeout,

    #[error("unhealthy status {0}")]
    Status(StatusCode),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("invalid probe request: {0}")]
    Request(String),
}

/// A liveness check against a single backend.
pub trait Probe: Send + Sync + 'static {
    fn check(&self, backend: &BackendId) -> impl Future<Output = Result<(), ProbeError>> + Send;
}

/// Probes `GET http://{backend}{path}`; any 2xx is healthy.
#[derive(Clone)]
pub struct HttpProbe {
    client: Client<HttpConnector, Body>,
    path: String,
}

impl HttpProbe {
    pub fn new(path: impl Into<String>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            path: path.into(),
        }
    }
}

impl Probe for HttpProbe {
    async fn check(&self, backend: &BackendId) -> Result<(), ProbeError> {
        let request = Request::builder()
            .method("GET")
            .uri(format!("http://{}{}", backend, self.path))
            .header("user-agent", "ring-proxy-health-check")
            .body(Body::empty())
            .map_err(|e| ProbeError::Request(e.to_string()))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| ProbeError::Connection(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProbeError::Status(response.status()))
        }
    }
}
