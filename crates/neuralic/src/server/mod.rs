//! HTTP API
//!
//! - `GET /health` liveness probe, never authenticated
//! - `POST /chat` one memory-aware conversational turn
//! - `POST /memory` and `POST /memory/query` direct store access

mod auth;
mod error;
mod handlers;

use axum::{
    Router,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::chat::ChatOrchestrator;
use crate::config::ServerConfig;
use crate::error::{NeuralicError, Result};
use crate::keys::ApiKeyRegistry;

pub use auth::API_KEY_HEADER;
pub use error::ApiError;
pub use handlers::DEFAULT_USER;

/// Shared application state for all handlers
#[derive(Debug)]
pub struct AppState {
    pub orchestrator: ChatOrchestrator,
    pub keys: Arc<ApiKeyRegistry>,
    /// Require a registered developer key on every route but /health
    pub require_api_key: bool,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(
        config: &ServerConfig,
        orchestrator: ChatOrchestrator,
        keys: Arc<ApiKeyRegistry>,
    ) -> Self {
        Self {
            orchestrator,
            keys,
            require_api_key: config.require_api_key,
            request_timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// The HTTP server
pub struct NeuralicServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl NeuralicServer {
    pub fn new(
        config: ServerConfig,
        orchestrator: ChatOrchestrator,
        keys: Arc<ApiKeyRegistry>,
    ) -> Self {
        let state = Arc::new(AppState::new(&config, orchestrator, keys));
        Self { config, state }
    }

    /// Listen until Ctrl+C or SIGTERM
    pub async fn serve(&self) -> Result<()> {
        let app = create_router(self.state.clone());

        let addr: SocketAddr = self
            .config
            .listen_addr
            .parse()
            .map_err(|e| NeuralicError::Config(format!("Invalid listen address: {e}")))?;

        tracing::info!("Starting server on {addr}");
        if self.state.require_api_key {
            tracing::info!("API key required on all routes except /health");
        } else {
            tracing::info!("API key check disabled");
        }

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| NeuralicError::Server(format!("Failed to bind to {addr}: {e}")))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| NeuralicError::Server(format!("Server error: {e}")))?;

        tracing::info!("Server shut down gracefully");
        Ok(())
    }
}

/// Create the router with all routes configured
pub fn create_router(state: Arc<AppState>) -> Router {
    let timeout = state.request_timeout;

    let api = Router::new()
        .route("/chat", post(handlers::chat_handler))
        .route("/memory", post(handlers::store_handler))
        .route("/memory/query", post(handlers::query_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    Router::new()
        .route("/health", get(handlers::health_handler))
        .merge(api)
        .layer(TimeoutLayer::new(timeout))
        .layer(middleware::map_response(timeout_envelope))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `TimeoutLayer` answers with an empty 408; give it the usual error body.
/// No handler returns 408 itself.
async fn timeout_envelope(response: Response) -> Response {
    if response.status() == StatusCode::REQUEST_TIMEOUT {
        return ApiError::timeout("request timed out").into_response();
    }
    response
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}
