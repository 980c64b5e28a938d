//! Administrative API.
//!
//! # Endpoints
//! - `GET /admin/status`: version, member count, ring size
//! - `GET /admin/backends`: registered backends with keyspace share
//! - `POST /admin/backends`: register `{ "id", "virtual_nodes"? }`
//! - `DELETE /admin/backends/{id}`: deregister
//! - `GET /admin/ring`: per-backend ring ownership

pub mod handlers;

use axum::{
    routing::{delete, get},
    Router,
};

use self::handlers::*;

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/backends", get(get_backends).post(register_backend))
        .route("/admin/backends/{id}", delete(deregister_backend))
        .route("/admin/ring", get(get_ring))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::{BackendId, BackendRegistry};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> (Router, Arc<BackendRegistry>) {
        let registry = Arc::new(BackendRegistry::new(1 << 32, 50).unwrap());
        let router = setup_admin_router(AdminState { registry: registry.clone() });
        (router, registry)
    }

    fn register(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/admin/backends")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_register_and_list() {
        let (app, registry) = app();

        let res = app.clone().oneshot(register(r#"{"id":"127.0.0.1:5001"}"#)).await.unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let res = app
            .clone()
            .oneshot(register(r#"{"id":"127.0.0.1:5002","virtual_nodes":10}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(registry.members().len(), 2);

        let res = app
            .oneshot(Request::builder().uri("/admin/backends").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json(res).await;
        let list = body.as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["id"], "127.0.0.1:5001");
        assert_eq!(list[0]["virtual_nodes"], 50);
        assert_eq!(list[1]["virtual_nodes"], 10);
        let total: f64 = list.iter().map(|b| b["keyspace_share"].as_f64().unwrap()).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_register_errors() {
        let (app, _) = app();
        app.clone().oneshot(register(r#"{"id":"127.0.0.1:5001"}"#)).await.unwrap();

        let res = app.clone().oneshot(register(r#"{"id":"127.0.0.1:5001"}"#)).await.unwrap();
        assert_eq!(res.status(), StatusCode::CONFLICT);
        assert_eq!(json(res).await["error"], "backend 127.0.0.1:5001 is already registered");

        let res = app.clone().oneshot(register(r#"{"id":"not a host"}"#)).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = app
            .oneshot(register(r#"{"id":"127.0.0.1:5009","virtual_nodes":0}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_deregister() {
        let (app, registry) = app();
        registry.add(BackendId::new("127.0.0.1:5001").unwrap()).await.unwrap();

        let delete = |uri: &str| {
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .body(Body::empty())
                .unwrap()
        };

        let res = app.clone().oneshot(delete("/admin/backends/127.0.0.1:5001")).await.unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert!(registry.members().is_empty());

        let res = app.oneshot(delete("/admin/backends/127.0.0.1:5001")).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_status_and_ring() {
        let (app, registry) = app();
        registry.add(BackendId::new("127.0.0.1:5001").unwrap()).await.unwrap();

        let res = app
            .clone()
            .oneshot(Request::builder().uri("/admin/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = json(res).await;
        assert_eq!(status["members"], 1);
        assert_eq!(status["ring_entries"], 50);

        let res = app
            .oneshot(Request::builder().uri("/admin/ring").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let ring = json(res).await;
        assert_eq!(ring["entries"], 50);
        assert_eq!(ring["owners"][0]["positions"], 50);
        assert_eq!(ring["owners"][0]["share"], 1.0);
    }
}
