//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, body limit, panic catching)
//! - Build the upstream workflow client once, at construction
//! - Bind server to listener and shut down on signal

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    catch_panic::CatchPanicLayer,
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::RelayConfig;
use crate::http::request::MakeRequestUuidV4;
use crate::http::response::panic_response;
use crate::relay::handler::{create_note, method_not_allowed};
use crate::relay::WorkflowClient;

/// Relay endpoint path.
pub const CREATE_NOTE_PATH: &str = "/api/create-note";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// `None` when no API key is configured; every relay request then fails with 500.
    pub workflow: Option<Arc<WorkflowClient>>,
}

/// HTTP server for the note relay.
pub struct HttpServer {
    router: Router,
    config: RelayConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: RelayConfig) -> Self {
        let workflow = match WorkflowClient::from_config(&config.upstream) {
            Ok(client) => {
                tracing::info!(upstream = %client.url(), "Workflow client initialized");
                Some(Arc::new(client))
            }
            Err(e) => {
                tracing::error!(error = %e, "Workflow client unavailable; relay requests will fail");
                None
            }
        };

        let state = AppState { workflow };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The body limit is a route layer on `POST` only: other methods reach
    /// the 405 fallback whatever their body size.
    fn build_router(config: &RelayConfig, state: AppState) -> Router {
        let create_note_route = post(create_note)
            .route_layer(RequestBodyLimitLayer::new(config.listener.max_body_size))
            .fallback(method_not_allowed);

        Router::new()
            .route(CREATE_NOTE_PATH, create_note_route)
            .route("/healthz", get(healthz))
            .with_state(state)
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The router, for in-process requests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
}

async fn healthz() -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "ok",
    })
}
