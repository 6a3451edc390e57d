//! HTTP server for the billing views and the rate API

pub mod auth;
pub mod error;
pub mod pagination;
pub mod session;
pub mod state;
pub mod views;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use voipbill_core::error::Result;

pub use error::AppError;
pub use state::AppState;

/// Build the application router with all routes and layers.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(views::routes())
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Serve until Ctrl+C.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    let addr = listener.local_addr()?;
    info!("voipbill listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, gracefully stopping"),
        Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
    }
}
