//! Phoneme timeline control, pronunciation analysis and explicit haptic triggers

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiState};
use crate::events::{Event, Target};
use crate::timeline::{AnalysisInput, PhonemeCategory, Progress, SpeechAnalysis, TriggerMode, assess};

/// Build timeline router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/load", post(load))
        .route("/start", post(start))
        .route("/pause", post(pause))
        .route("/resume", post(resume))
        .route("/stop", post(stop))
        .route("/progress", get(progress))
        .route("/analysis", post(analysis))
        .with_state(state)
}

/// Build haptic trigger router
pub fn haptic_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/trigger", post(trigger))
        .with_state(state)
}

/// Lesson load request
///
/// Either a lesson document (`{"phonemes": [...]}`) or `{"path": "..."}`
/// naming a lesson file on the gateway host.
#[derive(Debug, Default, Deserialize)]
struct LoadRequest {
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    trigger_mode: Option<TriggerMode>,
}

/// Response to a load request
#[derive(Debug, Serialize)]
pub struct LoadResponse {
    pub count: usize,
    pub trigger_mode: TriggerMode,
    #[serde(flatten)]
    pub progress: Progress,
}

#[derive(Debug, Default, Deserialize)]
struct StartRequest {
    #[serde(default)]
    offset: f64,
}

/// Explicit haptic trigger
#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    pub category: PhonemeCategory,
    #[serde(default = "full_confidence")]
    pub confidence: f32,
}

const fn full_confidence() -> f32 {
    1.0
}

fn parse_body<T: Default + for<'de> Deserialize<'de>>(body: &[u8]) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid body: {e}")))
}

async fn load(State(state): State<Arc<ApiState>>, body: Bytes) -> Result<Json<LoadResponse>, ApiError> {
    let request: LoadRequest = parse_body(&body)?;

    let mut timeline = state.timeline.lock().await;
    if let Some(path) = &request.path {
        timeline.load_file(path)?;
    } else {
        let text = std::str::from_utf8(&body)
            .map_err(|e| ApiError::BadRequest(format!("lesson is not UTF-8: {e}")))?;
        timeline.load_json(text)?;
    }
    if let Some(mode) = request.trigger_mode {
        timeline.set_trigger_mode(mode);
    }

    Ok(Json(LoadResponse {
        count: timeline.phonemes().len(),
        trigger_mode: timeline.trigger_mode(),
        progress: timeline.progress(),
    }))
}

async fn start(State(state): State<Arc<ApiState>>, body: Bytes) -> Result<Json<Progress>, ApiError> {
    let request: StartRequest = parse_body(&body)?;
    let mut timeline = state.timeline.lock().await;
    timeline.start(request.offset);
    tracing::info!(offset = timeline.offset(), "timeline started");
    Ok(Json(timeline.progress()))
}

async fn pause(State(state): State<Arc<ApiState>>) -> Json<Progress> {
    let mut timeline = state.timeline.lock().await;
    timeline.pause();
    Json(timeline.progress())
}

async fn resume(State(state): State<Arc<ApiState>>) -> Json<Progress> {
    let mut timeline = state.timeline.lock().await;
    timeline.resume();
    Json(timeline.progress())
}

async fn stop(State(state): State<Arc<ApiState>>) -> Json<Progress> {
    let mut timeline = state.timeline.lock().await;
    timeline.stop();
    Json(timeline.progress())
}

async fn progress(State(state): State<Arc<ApiState>>) -> Json<Progress> {
    Json(state.timeline.lock().await.progress())
}

/// Grade a recognition result and share it with the dashboards
async fn analysis(
    State(state): State<Arc<ApiState>>,
    Json(input): Json<AnalysisInput>,
) -> Result<Json<SpeechAnalysis>, ApiError> {
    let analysis = assess(input);
    state
        .bus
        .publish(Target::Viewers, Event::SpeechAnalysis(analysis.clone()))
        .await?;
    Ok(Json(analysis))
}

async fn trigger(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<TriggerRequest>,
) -> Result<Json<Event>, ApiError> {
    if !(0.0..=1.0).contains(&request.confidence) {
        return Err(ApiError::BadRequest("confidence must be within [0, 1]".to_string()));
    }
    let event = state
        .hub
        .trigger_haptic(request.category, request.confidence)
        .await;
    Ok(Json(event))
}
