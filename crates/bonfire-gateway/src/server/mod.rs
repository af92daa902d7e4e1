//! Gateway server setup
//!
//! Provides the WebSocket route, the health endpoint, and server startup.

mod handler;
mod state;

pub use handler::{gateway_handler, GatewayQuery};
pub use state::GatewayState;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use bonfire_common::{AppConfig, AppError, JwtService};
use bonfire_core::SnowflakeGenerator;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::collaborators::{JwtAuthenticator, LocalChannels};
use crate::router::RouterStatsSnapshot;

/// Create the gateway router
pub fn create_router() -> Router<GatewayState> {
    Router::new()
        .route("/gateway", get(gateway_handler))
        .route("/health", get(health_check))
}

/// Health report
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub sessions: usize,
    pub identities: usize,
    pub scopes: usize,
    pub router: RouterStatsSnapshot,
}

/// Health check endpoint
async fn health_check(State(state): State<GatewayState>) -> Json<HealthReport> {
    let sessions = state.sessions();
    Json(HealthReport {
        status: "ok",
        sessions: sessions.session_count(),
        identities: sessions.identity_count(),
        scopes: sessions.scope_count(),
        router: state.router().stats(),
    })
}

/// Build the complete application
pub fn create_app(state: GatewayState) -> Router {
    create_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Initialize all dependencies and create `GatewayState`
///
/// Identify tokens are verified as JWTs and commands run against the
/// in-process channel handler.
pub fn create_gateway_state(config: &AppConfig) -> Result<GatewayState, AppError> {
    let ids = SnowflakeGenerator::new(config.snowflake.worker_id)
        .map_err(|e| AppError::Config(e.to_string()))?;
    let ids = Arc::new(ids);

    let jwt_service = Arc::new(JwtService::new(
        &config.jwt.secret,
        config.jwt.access_token_expiry,
    ));

    let state = GatewayState::new(
        config.gateway.clone(),
        Arc::clone(&ids),
        Arc::new(JwtAuthenticator::new(jwt_service)),
        Arc::new(LocalChannels::new(ids)),
    )?;

    tracing::info!(
        versions = ?state.versions().supported(),
        queue_capacity = config.gateway.queue_capacity,
        overflow_policy = ?config.gateway.overflow_policy,
        "Gateway state initialized"
    );

    Ok(state)
}

/// Serve `app` on an already bound listener until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<(), AppError>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .map_err(|e| AppError::Config(format!("Server error: {e}")))
}

/// Run the gateway server
pub async fn run_server(app: Router, addr: SocketAddr) -> Result<(), AppError> {
    tracing::info!("Starting Gateway server on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("Gateway listening on ws://{}/gateway", addr);

    serve(listener, app, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Run the complete gateway server with configuration
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let addr: SocketAddr = config
        .server
        .address()
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid listen address: {e}")))?;

    // Create gateway state
    let state = create_gateway_state(&config)?;

    // Build application
    let app = create_app(state);

    // Run server
    run_server(app, addr).await
}
