//! Text-to-speech endpoint

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::post};
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiState};

/// Build voice router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/synthesize", post(synthesize))
        .with_state(state)
}

/// Synthesis request
#[derive(Debug, Deserialize)]
pub struct SynthesizeRequest {
    pub text: String,
}

/// Synthesized audio, base64 encoded MP3
#[derive(Debug, Serialize)]
pub struct SynthesizeResponse {
    pub audio_base64: String,
    pub format: &'static str,
}

/// Synthesize text to speech
async fn synthesize(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SynthesizeRequest>,
) -> Result<Json<SynthesizeResponse>, ApiError> {
    let tts = state
        .tts
        .as_ref()
        .ok_or(ApiError::NotConfigured("TTS not configured (no API key)"))?;

    let text = request.text.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest("Empty text".to_string()));
    }

    let audio = tts
        .synthesize(text)
        .await
        .ok_or_else(|| ApiError::Internal("speech synthesis failed".to_string()))?;

    Ok(Json(SynthesizeResponse {
        audio_base64: base64::engine::general_purpose::STANDARD.encode(audio),
        format: "mp3",
    }))
}
