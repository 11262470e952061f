//! WebSocket endpoints for camera sources and dashboard viewers
//!
//! `/ws/video` accepts frames from a phone, derives mouth features and
//! relays a `processed_frame` to every viewer. `/ws/viewer` only listens.
//! Both register a [`WsSink`] with the hub so broadcasts reach them.

use std::sync::{Arc, Mutex};

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use super::ApiState;
use crate::events::{Event, Target};
use crate::hub::{Role, WsSink};
use crate::signal::{MouthReading, MouthTracker};
use crate::vision::{LipReadingSession, decode_frame, strip_data_url};

/// Outbound queue depth per socket
const OUTBOUND_BUFFER: usize = 64;

/// Sent to sources when lip reading recognizes something
pub const LIP_VIBRATE_PATTERN: [u32; 3] = [80, 40, 80];

/// JSON control message from a source
///
/// Anything that is not JSON is treated as a bare base64 frame.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceMessage {
    /// Camera frame, optionally with openness measured on the device
    Frame {
        data: String,
        #[serde(default)]
        openness: Option<f64>,
    },
    /// Openness sample without a frame
    Mouth { openness: f64 },
    Ping,
}

impl SourceMessage {
    /// Interpret one text message from a source
    ///
    /// Returns `None` for malformed JSON.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.starts_with('{') {
            match serde_json::from_str(trimmed) {
                Ok(message) => Some(message),
                Err(e) => {
                    tracing::trace!(error = %e, "ignoring malformed source message");
                    None
                }
            }
        } else {
            Some(Self::Frame {
                data: trimmed.to_string(),
                openness: None,
            })
        }
    }
}

/// Per-connection state for one video source
pub struct SourceSession {
    tracker: MouthTracker,
    lip: Arc<LipReadingSession>,
    /// Prediction waiting to ride on the next processed frame
    pending_prediction: Arc<Mutex<Option<String>>>,
}

impl SourceSession {
    #[must_use]
    pub fn new(state: &ApiState) -> Self {
        Self {
            tracker: MouthTracker::new(),
            lip: Arc::new(LipReadingSession::new(
                state.lip_config.clone(),
                Arc::clone(&state.lip_history),
            )),
            pending_prediction: Arc::new(Mutex::new(None)),
        }
    }

    fn take_prediction(&self) -> Option<String> {
        self.pending_prediction.lock().ok().and_then(|mut p| p.take())
    }
}

/// Build WebSocket router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/video", get(video_upgrade))
        .route("/viewer", get(viewer_upgrade))
        .with_state(state)
}

async fn video_upgrade(State(state): State<Arc<ApiState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, Role::Source))
}

async fn viewer_upgrade(State(state): State<Arc<ApiState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, Role::Viewer))
}

/// Register the socket with the hub and pump messages until either side closes
async fn handle_socket(socket: WebSocket, state: Arc<ApiState>, role: Role) {
    let (mut sender, mut receiver) = socket.split();

    let (sink, mut rx) = WsSink::channel(OUTBOUND_BUFFER);
    let connection_id = match state.hub.connect(role, Arc::new(sink), None).await {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(%role, error = %e, "failed to register connection");
            return;
        }
    };

    // Forward queued events to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_state = Arc::clone(&state);
    let mut recv_task = tokio::spawn(async move {
        let mut session = (role == Role::Source).then(|| SourceSession::new(&recv_state));
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if let Some(session) = session.as_mut() {
                        handle_source_message(&recv_state, session, text.as_str()).await;
                    } else {
                        tracing::trace!(len = text.len(), "viewer message ignored");
                    }
                }
                Message::Close(_) => {
                    tracing::debug!(%role, "WebSocket closed by client");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.hub.disconnect(connection_id).await;
}

/// Process one text message from a video source
pub async fn handle_source_message(state: &ApiState, session: &mut SourceSession, text: &str) {
    match SourceMessage::parse(text) {
        Some(SourceMessage::Frame { data, openness }) => {
            handle_frame(state, session, data, openness).await;
        }
        Some(SourceMessage::Mouth { openness }) => {
            let reading = session.tracker.update(openness);
            tracing::trace!(state = ?reading.mouth_state, openness, "mouth sample");
        }
        Some(SourceMessage::Ping) | None => {}
    }
}

async fn handle_frame(
    state: &ApiState,
    session: &mut SourceSession,
    data: String,
    openness: Option<f64>,
) {
    let image = match decode_frame(&data) {
        Ok(image) => image,
        Err(e) => {
            tracing::trace!(error = %e, "ignoring undecodable frame");
            return;
        }
    };

    let openness = match openness {
        Some(value) => Some(value),
        None => state
            .landmarks
            .detect(&image)
            .await
            .and_then(|landmarks| landmarks.openness()),
    };
    let mouth = openness.map(|value| session.tracker.update(value));

    if state.lip_analyzer.is_some() {
        session.lip.add_frame(strip_data_url(&data).to_string());
        if let Some(reading) = mouth {
            maybe_spawn_analysis(state, session, reading);
        }
    }

    let event = Event::ProcessedFrame {
        frame_base64: data,
        mouth,
        lip_prediction: session.take_prediction(),
    };
    // Frames are lossy; never stall the socket reader on a busy bus
    state.bus.try_publish(Target::Viewers, event);
}

fn maybe_spawn_analysis(state: &ApiState, session: &SourceSession, reading: MouthReading) {
    let Some(analyzer) = state.lip_analyzer.clone() else {
        return;
    };
    if !session.lip.should_analyze(reading.mouth_state) {
        return;
    }

    let lip = Arc::clone(&session.lip);
    let pending = Arc::clone(&session.pending_prediction);
    let bus = state.bus.clone();
    tokio::spawn(async move {
        let Some(result) = lip.analyze_if_ready(analyzer.as_ref(), reading.mouth_state).await else {
            return;
        };
        if !result.has_text() {
            return;
        }

        if let Ok(mut slot) = pending.lock() {
            *slot = Some(result.detected_text.clone());
        }
        let vibrate = Event::Vibrate {
            pattern: LIP_VIBRATE_PATTERN.to_vec(),
        };
        if let Err(e) = bus.publish(Target::Sources, vibrate).await {
            tracing::warn!(error = %e, "failed to publish vibrate");
        }
        if let Err(e) = bus.publish(Target::Viewers, Event::LipReading(result)).await {
            tracing::warn!(error = %e, "failed to publish lip reading");
        }
    });
}
