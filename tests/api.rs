//! API endpoint integration tests

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use phonix_gateway::api::{ApiServer, ApiServerBuilder};
use phonix_gateway::events::{Dispatch, EventBus};
use phonix_gateway::pipeline::{PipelineConfig, SpeechHapticPipeline};
use phonix_gateway::timeline::PhonemeTimeline;
use phonix_gateway::voice::Synthesizer;
use phonix_gateway::{BroadcastHub, Event, Target};
use tokio::sync::{Mutex, mpsc};
use tower::ServiceExt;

mod common;
use common::{ScriptedSource, ScriptedTranscriber, TWO_PHONEME_LESSON, lesson_file};

struct FakeTts;

#[async_trait]
impl Synthesizer for FakeTts {
    async fn synthesize(&self, text: &str) -> Option<Vec<u8>> {
        Some(text.as_bytes().to_vec())
    }
}

fn builder() -> (ApiServerBuilder, EventBus, mpsc::Receiver<Dispatch>) {
    let (bus, rx) = EventBus::new(64);
    let timeline = Arc::new(Mutex::new(PhonemeTimeline::default()));
    let builder = ApiServerBuilder::new(Arc::new(BroadcastHub::new()), bus.clone(), timeline);
    (builder, bus, rx)
}

fn bare_server() -> (ApiServer, mpsc::Receiver<Dispatch>) {
    let (builder, _bus, rx) = builder();
    (builder.build(), rx)
}

async fn call(server: &ApiServer, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, serde_json::Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if body.is_some() {
        request = request.header("content-type", "application/json");
    }
    let request = request
        .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
        .unwrap();

    let response = server.router().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_root_and_health() {
    let (server, _rx) = bare_server();

    let (status, json) = call(&server, "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "running");

    let (status, json) = call(&server, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_timeline_lifecycle() {
    let (server, _rx) = bare_server();

    let (status, json) = call(&server, "POST", "/api/timeline/load", Some(TWO_PHONEME_LESSON)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);
    assert_eq!(json["state"], "stopped");
    assert_eq!(json["total_duration"], 2.0);

    let (status, json) = call(&server, "POST", "/api/timeline/start", Some(r#"{"offset": 1.5}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["is_playing"], true);
    assert_eq!(json["current_phoneme"]["id"], "t");
    assert_eq!(json["current_phoneme"]["type"], "consonant");

    let (_, json) = call(&server, "POST", "/api/timeline/pause", None).await;
    assert_eq!(json["state"], "paused");

    let (_, json) = call(&server, "POST", "/api/timeline/resume", None).await;
    assert_eq!(json["state"], "playing");

    let (_, json) = call(&server, "POST", "/api/timeline/stop", None).await;
    assert_eq!(json["state"], "stopped");
    assert_eq!(json["current_time"], 0.0);

    let (_, json) = call(&server, "GET", "/api/timeline/progress", None).await;
    assert_eq!(json["progress"], 0.0);
}

#[tokio::test]
async fn test_timeline_load_from_path_with_mode() {
    let (server, _rx) = bare_server();
    let file = lesson_file(TWO_PHONEME_LESSON);
    let body = serde_json::json!({"path": file.path(), "trigger_mode": "once"}).to_string();

    let (status, json) = call(&server, "POST", "/api/timeline/load", Some(&body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);
    assert_eq!(json["trigger_mode"], "once");
}

#[tokio::test]
async fn test_invalid_lesson_is_rejected() {
    let (server, _rx) = bare_server();
    let body = r#"{"phonemes": [{"id": "x", "type": "vowel", "start": 0.0, "duration": 0.0}]}"#;

    let (status, json) = call(&server, "POST", "/api/timeline/load", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "bad_request");

    let (status, _) = call(&server, "POST", "/api/timeline/load", Some("{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_analysis_is_graded_and_sent_to_viewers() {
    let (server, mut rx) = bare_server();
    let body = r#"{"transcript": "hello", "confidence": 0.6, "detected_phonemes": ["h", "e"]}"#;

    let (status, json) = call(&server, "POST", "/api/timeline/analysis", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["pronunciation_quality"], "needs_work");
    assert_eq!(json["suggestions"].as_array().unwrap().len(), 1);

    let dispatch = rx.recv().await.unwrap();
    assert_eq!(dispatch.target, Target::Viewers);
    assert!(matches!(dispatch.event, Event::SpeechAnalysis(_)));
}

#[tokio::test]
async fn test_haptic_trigger() {
    let (server, _rx) = bare_server();

    let (status, json) = call(
        &server,
        "POST",
        "/api/haptic/trigger",
        Some(r#"{"category": "buzz", "confidence": 0.9}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["type"], "haptic_feedback");
    assert_eq!(json["pattern"], serde_json::json!([100, 50, 100, 50, 100]));

    let (status, _) = call(
        &server,
        "POST",
        "/api/haptic/trigger",
        Some(r#"{"category": "buzz", "confidence": 1.5}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_speech_haptic_unavailable_without_voice() {
    let (server, _rx) = bare_server();

    let (status, json) = call(&server, "GET", "/api/speech-haptic/status", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"]["code"], "not_configured");
}

#[tokio::test(start_paused = true)]
async fn test_speech_haptic_start_stop() {
    let (builder, bus, _rx) = builder();
    let pipeline = Arc::new(SpeechHapticPipeline::new(
        Arc::new(ScriptedSource::default()),
        Arc::new(ScriptedTranscriber::new(&[])),
        bus,
        PipelineConfig::default(),
    ));
    let server = builder.pipeline(pipeline).build();

    let (status, json) = call(&server, "POST", "/api/speech-haptic/start", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "started");
    assert_eq!(json["running"], true);

    let (_, json) = call(&server, "POST", "/api/speech-haptic/start", None).await;
    assert_eq!(json["status"], "already_running");

    let (_, json) = call(&server, "POST", "/api/speech-haptic/stop", None).await;
    assert_eq!(json["status"], "stopped");
    assert_eq!(json["running"], false);
}

#[tokio::test]
async fn test_speech_haptic_start_failure() {
    let (builder, bus, _rx) = builder();
    let pipeline = Arc::new(SpeechHapticPipeline::new(
        Arc::new(ScriptedSource::broken()),
        Arc::new(ScriptedTranscriber::new(&[])),
        bus,
        PipelineConfig::default(),
    ));
    let server = builder.pipeline(pipeline).build();

    let (status, json) = call(&server, "POST", "/api/speech-haptic/start", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"]["message"].as_str().unwrap().contains("no input device"));
}

#[tokio::test]
async fn test_synthesize() {
    let (builder, _bus, _rx) = builder();
    let server = builder.tts(Arc::new(FakeTts)).build();

    let (status, json) = call(&server, "POST", "/api/voice/synthesize", Some(r#"{"text": "hi"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["audio_base64"], "aGk=");

    let (status, _) = call(&server, "POST", "/api/voice/synthesize", Some(r#"{"text": "  "}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (bare, _rx) = bare_server();
    let (status, _) = call(&bare, "POST", "/api/voice/synthesize", Some(r#"{"text": "hi"}"#)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_lip_reading_history_starts_empty() {
    let (server, _rx) = bare_server();

    let (status, json) = call(&server, "GET", "/api/lip-reading/history?count=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["enabled"], false);
    assert_eq!(json["results"], serde_json::json!([]));
}
