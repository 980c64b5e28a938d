use std::sync::Arc;
use std::time::UNIX_EPOCH;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::load_balancer::{BackendId, BackendRegistry, RegistryError};

#[derive(Clone)]
pub struct AdminState {
    pub registry: Arc<BackendRegistry>,
}

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub members: usize,
    pub ring_entries: usize,
    pub keyspace: u64,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct BackendStatus {
    pub id: String,
    pub virtual_nodes: u32,
    pub registered_at_unix: u64,
    /// Fraction of the keyspace that resolves to this backend.
    pub keyspace_share: f64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    pub id: String,
    #[serde(default)]
    pub virtual_nodes: Option<u32>,
}

#[derive(Serialize)]
pub struct RingSummary {
    pub keyspace: u64,
    pub entries: usize,
    pub owners: Vec<RingOwner>,
}

#[derive(Serialize)]
pub struct RingOwner {
    pub id: String,
    pub positions: usize,
    pub span: u64,
    pub share: f64,
}

/// Registry failures as admin API responses.
pub struct AdminError(RegistryError);

impl From<RegistryError> for AdminError {
    fn from(e: RegistryError) -> Self {
        Self(e)
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RegistryError::AlreadyRegistered(_) => StatusCode::CONFLICT,
            RegistryError::NotRegistered(_) => StatusCode::NOT_FOUND,
            RegistryError::InvalidBackendId(_) | RegistryError::Ring(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let snapshot = state.registry.snapshot();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        members: snapshot.len(),
        ring_entries: snapshot.ring().len(),
        keyspace: snapshot.ring().keyspace(),
    })
}

pub async fn get_backends(State(state): State<AdminState>) -> Json<Vec<BackendStatus>> {
    let snapshot = state.registry.snapshot();
    let keyspace = snapshot.ring().keyspace() as f64;
    let spans = snapshot.ring().ownership();

    let statuses = snapshot
        .backends()
        .iter()
        .map(|(id, member)| BackendStatus {
            id: id.to_string(),
            virtual_nodes: member.virtual_nodes,
            registered_at_unix: member
                .registered_at
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            keyspace_share: spans.get(id).copied().unwrap_or(0) as f64 / keyspace,
        })
        .collect();

    Json(statuses)
}

pub async fn register_backend(
    State(state): State<AdminState>,
    Json(body): Json<RegisterRequest>,
) -> Result<StatusCode, AdminError> {
    let id = BackendId::new(body.id).map_err(RegistryError::from)?;
    match body.virtual_nodes {
        Some(vnodes) => state.registry.add_with_virtual_nodes(id, vnodes).await?,
        None => state.registry.add(id).await?,
    }
    Ok(StatusCode::CREATED)
}

pub async fn deregister_backend(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AdminError> {
    let id = BackendId::new(id).map_err(RegistryError::from)?;
    state.registry.remove(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_ring(State(state): State<AdminState>) -> Json<RingSummary> {
    let snapshot = state.registry.snapshot();
    let ring = snapshot.ring();
    let owners = ring
        .ownership()
        .into_iter()
        .map(|(id, span)| RingOwner {
            positions: ring.positions_of(&id).len(),
            share: span as f64 / ring.keyspace() as f64,
            id: id.to_string(),
            span,
        })
        .collect();

    Json(RingSummary {
        keyspace: ring.keyspace(),
        entries: ring.len(),
        owners,
    })
}
