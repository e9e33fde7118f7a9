//! HTTP server for Orrery
//!
//! One WebSocket route streams simulation frames; everything else is looked
//! up in the static asset map.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use orrery_core::OrreryConfig;
use tower_http::cors::CorsLayer;

use crate::handlers::{simulation_session, static_asset};
use crate::static_files::StaticAssets;

/// Errors raised while starting or running the server.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// Settings rejected before binding
    #[error("Invalid configuration: {reason}")]
    Configuration {
        /// First invalid setting
        reason: String,
    },

    /// Listen address unavailable
    #[error("Failed to bind {address}: {source}")]
    Bind {
        /// Address that was requested
        address: SocketAddr,
        /// Underlying socket error
        source: std::io::Error,
    },

    /// Accept loop failure
    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Shared, read-only state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Configuration every session is started from
    pub config: Arc<OrreryConfig>,
    /// Asset map built once at startup
    pub assets: Arc<StaticAssets>,
}

impl AppState {
    /// Builds state from `config`, mapping assets under its static directory.
    pub fn new(config: OrreryConfig) -> Self {
        let assets = StaticAssets::new(&config.server.static_dir);
        Self {
            config: Arc::new(config),
            assets: Arc::new(assets),
        }
    }
}

/// Builds the application router.
pub fn build_router(state: AppState) -> Router {
    let session_path = state.config.server.session_path;
    Router::new()
        .route(session_path, get(simulation_session))
        .fallback(static_asset)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Runs the server until Ctrl-C.
///
/// # Errors
/// - `WebError::Configuration` - Simulation or streaming settings are invalid
/// - `WebError::Bind` - The listen address is unavailable
/// - `WebError::Serve` - The accept loop failed
pub async fn run_server(config: OrreryConfig) -> Result<(), WebError> {
    config
        .validate()
        .map_err(|reason| WebError::Configuration { reason })?;

    let address = config.server.bind_address;
    let session_path = config.server.session_path;
    let state = AppState::new(config);
    let app = build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|source| WebError::Bind { address, source })?;

    tracing::info!(
        %address,
        session_path,
        static_dir = %state.config.server.static_dir.display(),
        bodies = state.config.simulation.bodies.len(),
        steps = ?state.config.simulation.step_count,
        "Orrery server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Orrery server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
