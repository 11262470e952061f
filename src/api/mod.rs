//! HTTP and WebSocket surface for the phonix gateway

pub mod health;
pub mod lip_reading;
pub mod speech;
pub mod timeline;
pub mod voice;
pub mod websocket;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::events::EventBus;
use crate::hub::BroadcastHub;
use crate::pipeline::SpeechHapticPipeline;
use crate::timeline::SharedTimeline;
use crate::vision::{LandmarkProvider, LipAnalyzer, LipHistory, LipReadingConfig, NoLandmarks};
use crate::voice::Synthesizer;
use crate::{Error, Result};

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub hub: Arc<BroadcastHub>,
    pub bus: EventBus,
    pub timeline: SharedTimeline,
    /// Present only when voice is enabled
    pub pipeline: Option<Arc<SpeechHapticPipeline>>,
    pub tts: Option<Arc<dyn Synthesizer>>,
    pub landmarks: Arc<dyn LandmarkProvider>,
    /// Present only when a Gemini key is configured
    pub lip_analyzer: Option<Arc<dyn LipAnalyzer>>,
    pub lip_history: Arc<LipHistory>,
    pub lip_config: LipReadingConfig,
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    hub: Arc<BroadcastHub>,
    bus: EventBus,
    timeline: SharedTimeline,
    pipeline: Option<Arc<SpeechHapticPipeline>>,
    tts: Option<Arc<dyn Synthesizer>>,
    landmarks: Arc<dyn LandmarkProvider>,
    lip_analyzer: Option<Arc<dyn LipAnalyzer>>,
    lip_history: Option<Arc<LipHistory>>,
    lip_config: LipReadingConfig,
    host: String,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(hub: Arc<BroadcastHub>, bus: EventBus, timeline: SharedTimeline) -> Self {
        Self {
            hub,
            bus,
            timeline,
            pipeline: None,
            tts: None,
            landmarks: Arc::new(NoLandmarks),
            lip_analyzer: None,
            lip_history: None,
            lip_config: LipReadingConfig::default(),
            host: "0.0.0.0".to_string(),
            port: crate::config::DEFAULT_PORT,
            static_dir: None,
        }
    }

    /// Set the speech-haptic pipeline
    #[must_use]
    pub fn pipeline(mut self, pipeline: Arc<SpeechHapticPipeline>) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Set the text-to-speech collaborator
    #[must_use]
    pub fn tts(mut self, tts: Arc<dyn Synthesizer>) -> Self {
        self.tts = Some(tts);
        self
    }

    /// Set the landmark detector
    #[must_use]
    pub fn landmarks(mut self, landmarks: Arc<dyn LandmarkProvider>) -> Self {
        self.landmarks = landmarks;
        self
    }

    /// Set the lip reading analyzer
    #[must_use]
    pub fn lip_analyzer(mut self, analyzer: Arc<dyn LipAnalyzer>) -> Self {
        self.lip_analyzer = Some(analyzer);
        self
    }

    /// Share a lip reading history with the caller
    #[must_use]
    pub fn lip_history(mut self, history: Arc<LipHistory>) -> Self {
        self.lip_history = Some(history);
        self
    }

    /// Set lip reading session gating
    #[must_use]
    pub const fn lip_config(mut self, config: LipReadingConfig) -> Self {
        self.lip_config = config;
        self
    }

    /// Set the bind address
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the static files directory served at `/static`
    #[must_use]
    pub fn static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        let state = Arc::new(ApiState {
            hub: self.hub,
            bus: self.bus,
            timeline: self.timeline,
            pipeline: self.pipeline,
            tts: self.tts,
            landmarks: self.landmarks,
            lip_analyzer: self.lip_analyzer,
            lip_history: self
                .lip_history
                .unwrap_or_else(|| Arc::new(LipHistory::default())),
            lip_config: self.lip_config,
        });

        ApiServer {
            state,
            host: self.host,
            port: self.port,
            static_dir: self.static_dir,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    host: String,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ApiServer {
    /// Shared handler state
    #[must_use]
    pub fn state(&self) -> Arc<ApiState> {
        Arc::clone(&self.state)
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .nest("/api/speech-haptic", speech::router(self.state.clone()))
            .nest("/api/timeline", timeline::router(self.state.clone()))
            .nest("/api/haptic", timeline::haptic_router(self.state.clone()))
            .nest("/api/voice", voice::router(self.state.clone()))
            .nest("/api/lip-reading", lip_reading::router(self.state.clone()))
            .nest("/ws", websocket::router(self.state.clone()))
            .merge(health::router());

        if let Some(static_dir) = &self.static_dir {
            router = router.nest_service("/static", ServeDir::new(static_dir));
            tracing::info!(path = %static_dir.display(), "serving static files");
        }

        // Phones and the dashboard connect from other origins on the LAN
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Config(format!("failed to bind API server on {addr}: {e}")))?;

        tracing::info!(host = %self.host, port = self.port, "API server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| Error::Transport(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}

/// Handler errors, rendered as `{"error": {"code", "message"}}`
#[derive(Debug)]
pub enum ApiError {
    NotConfigured(&'static str),
    BadRequest(String),
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Lesson(_) | Error::Serialization(_) => Self::BadRequest(err.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = match self {
            Self::NotConfigured(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "not_configured", msg.to_string())
            }
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        (status, Json(ErrorResponse { error: ErrorBody { code, message } })).into_response()
    }
}
