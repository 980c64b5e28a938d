//! Routing failures and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::load_balancer::BackendId;

/// Why a forward to a resolved backend failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamFailure {
    Timeout,
    Transport(String),
}

impl std::fmt::Display for UpstreamFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamFailure::Timeout => write!(f, "timed out"),
            UpstreamFailure::Transport(e) => write!(f, "{}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("no backend available")]
    NoBackendAvailable,

    #[error("request has no {0} header to derive a routing key from")]
    MissingAffinityKey(String),

    #[error("upstream {backend} unreachable: {cause}")]
    UpstreamUnreachable {
        backend: BackendId,
        cause: UpstreamFailure,
    },
}

impl RouteError {
    pub fn status(&self) -> StatusCode {
        match self {
            RouteError::NoBackendAvailable => StatusCode::SERVICE_UNAVAILABLE,
            RouteError::MissingAffinityKey(_) => StatusCode::BAD_REQUEST,
            RouteError::UpstreamUnreachable {
                cause: UpstreamFailure::Timeout,
                ..
            } => StatusCode::GATEWAY_TIMEOUT,
            RouteError::UpstreamUnreachable { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
