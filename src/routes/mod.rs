//! API Routes
//!
//! - `/api/health` - Health check
//! - `/api/pipelines` - Available research pipelines
//! - `/api/projects` - Projects and the reports stored on them

pub mod health;
pub mod reports;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::cors_layer;
use crate::models::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let cors = cors_layer(&state.config.server.cors_allowed_origins);

    Router::new()
        .merge(health::router(state.clone()))
        .merge(reports::router(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
