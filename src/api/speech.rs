//! Speech-haptic pipeline control endpoints

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::Serialize;

use super::{ApiError, ApiState};
use crate::pipeline::{PipelineStatus, SpeechHapticPipeline};

/// Build speech-haptic router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/start", post(start))
        .route("/stop", post(stop))
        .route("/status", get(status))
        .with_state(state)
}

/// Response to a start or stop request
#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub pipeline: PipelineStatus,
}

fn pipeline(state: &ApiState) -> Result<&Arc<SpeechHapticPipeline>, ApiError> {
    state
        .pipeline
        .as_ref()
        .ok_or(ApiError::NotConfigured("speech-haptic pipeline disabled (voice off)"))
}

async fn start(State(state): State<Arc<ApiState>>) -> Result<Json<ControlResponse>, ApiError> {
    let pipeline = pipeline(&state)?;
    let status = if pipeline.is_running() {
        "already_running"
    } else {
        pipeline.start().await?;
        "started"
    };

    Ok(Json(ControlResponse {
        status,
        pipeline: pipeline.status(),
    }))
}

async fn stop(State(state): State<Arc<ApiState>>) -> Result<Json<ControlResponse>, ApiError> {
    let pipeline = pipeline(&state)?;
    pipeline.stop().await;

    Ok(Json(ControlResponse {
        status: "stopped",
        pipeline: pipeline.status(),
    }))
}

async fn status(State(state): State<Arc<ApiState>>) -> Result<Json<PipelineStatus>, ApiError> {
    Ok(Json(pipeline(&state)?.status()))
}
