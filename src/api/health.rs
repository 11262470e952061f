//! Health check endpoints

use axum::{Json, Router, routing::get};
use serde::Serialize;

/// Service banner
#[derive(Serialize)]
pub struct RootResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        status: "running",
        service: "Phonix Gateway",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Liveness probe
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

/// Build health router (no state needed)
pub fn router() -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
}
