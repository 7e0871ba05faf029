//! HTTP surface.
//!
//! ```text
//! trace -> CORS -> rate limit -> /api/paper/* (doi validation -> cache -> handler)
//!                             -> /api/health
//! ```
//!
//! Errors are rendered by [`ApiError`]: 400 for bad input, 404 with
//! `{"error": ...}` when the pipeline finds nothing, 500 otherwise.

mod cache;
mod error;
mod extract;
mod rate_limit;
mod routes;
mod state;

pub use cache::{cache_responses, X_CACHE};
pub use error::{expose_error_stack, ApiError, ErrorStack};
pub use extract::{require_doi, DoiQuery};
pub use rate_limit::{
    client_ip, limit_requests, spawn_pruning, IpRateLimiter, RATE_LIMIT_MESSAGE,
};
pub use state::AppState;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let papers = Router::new()
        .route("/", get(routes::get_paper))
        .route("/text", get(routes::get_text))
        .route("/content", get(routes::get_content))
        .route("/metadata", get(routes::get_metadata))
        .route("/complete", get(routes::get_complete))
        .route_layer(from_fn_with_state(state.clone(), cache_responses))
        .route_layer(from_fn(require_doi))
        .route("/test", get(routes::usage));

    let mut router = Router::new()
        .nest("/api/paper", papers)
        .route("/api/health", get(routes::health));

    if !state.production {
        router = router.layer(from_fn(expose_error_stack));
    }

    router
        .layer(from_fn_with_state(state.limiter.clone(), limit_requests))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind, serve until Ctrl-C or SIGTERM, then drain
pub async fn serve(config: &Config) -> Result<(), ServeError> {
    let state = AppState::from_config(config).map_err(|e| ServeError::Setup(e.to_string()))?;
    let prune_every =
        Duration::from_millis(config.rate_limit.window_ms).max(Duration::from_secs(1));
    let pruning = spawn_pruning(state.limiter.clone(), prune_every);
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ServeError::Bind(addr.clone(), e))?;
    tracing::info!("Server running on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(ServeError::Io)?;

    pruning.abort();

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Errors that stop the server
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("Failed to initialise service: {0}")]
    Setup(String),

    #[error("Failed to bind {0}: {1}")]
    Bind(String, #[source] std::io::Error),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}
