//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Wire up middleware (tracing, request ID)
//! - Bind server to listener
//! - Dispatch every request to the ring router
//! - Map routing failures to HTTP statuses

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::routing::Router as RingRouter;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<RingRouter>,
}

/// HTTP server for proxied traffic.
pub struct HttpServer {
    app: Router,
}

impl HttpServer {
    pub fn new(router: Arc<RingRouter>) -> Self {
        let app = Self::build_router(AppState { router });
        Self { app }
    }

    /// Build the Axum router with all middleware layers.
    pub fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http())
                    .layer(propagate_request_id_layer()),
            )
    }

    pub fn into_router(self) -> Router {
        self.app
    }

    /// Serve until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main proxy handler.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let request_id = request_id(&request).to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    match state.router.route(request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                method = %method,
                path = %path,
                error = %e,
                "Routing failed"
            );
            e.into_response()
        }
    }
}
