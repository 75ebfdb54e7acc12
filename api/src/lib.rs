//! Tidelens API Server
//!
//! This crate provides the HTTP workbench server for Tidelens. It exposes the
//! query builder, statement splitter, SQL formatter and timezone normalizer
//! over JSON, proxies SQL execution to the configured database and browses
//! its tables.
//!
//! # Example
//!
//! ```no_run
//! use api::run_server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run_server().await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod config;
mod routes;
mod state;

pub use config::{BackendConfig, Config};
pub use routes::ApiError;
pub use state::AppState;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Loads [`Config`] from the environment and serves until SIGINT or SIGTERM.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the server cannot
/// start.
pub async fn run_server() -> Result<()> {
    let config = Config::from_env()?;
    run_server_with_config(config).await
}

/// Runs the Tidelens API server with the provided configuration.
///
/// # Errors
///
/// Returns an error if:
/// - The database client cannot be created
/// - The server fails to bind to the configured address
/// - A fatal error occurs during operation
pub async fn run_server_with_config(config: Config) -> Result<()> {
    let addr = config.socket_addr()?;

    tracing::info!(
        host = %config.host,
        port = %config.port,
        database_url = %config.backend.url,
        database = %config.backend.database,
        timezone = %config.backend.timezone,
        "Tidelens API server starting"
    );

    let state = AppState::from_backend_config(&config.backend)
        .context("Failed to create database client")?;
    let app = create_router(state);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!(%addr, "Listening for connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Builds the router: every route group plus body limit, CORS and request
/// tracing layers.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes(state.clone()))
        .merge(routes::builder_routes())
        .merge(routes::sql_routes(state.clone()))
        .merge(routes::table_routes(state.clone()))
        .merge(routes::timezone_routes(state))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_endpoint_returns_json() {
        let (state, _) = test_state();
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok());
        assert!(content_type.is_some_and(|ct| ct.contains("application/json")));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (state, _) = test_state();
        let response = create_router(state)
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
