//! Outbound events and the bus that carries them to the broadcast hub
//!
//! Producers (the speech pipeline, the timeline ticker, the video socket)
//! publish a [`Dispatch`] on the [`EventBus`]. A single dispatcher task,
//! [`run_dispatcher`], drains the bus and performs the broadcasts, so no
//! producer ever touches connection state directly.
//!
//! Publishing is best-effort: a closed bus is logged and reported to the
//! caller, never retried.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::hub::{BroadcastHub, Role};
use crate::signal::{Intensity, MouthReading};
use crate::timeline::{PhonemeCategory, SpeechAnalysis};
use crate::vision::LipReadingResult;
use crate::{Error, Result};

/// Default bus depth before publishers wait on the dispatcher
pub const BUS_CAPACITY: usize = 256;

/// A phrase-level (or fast-path) speech haptic event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HapticEvent {
    /// Phrase text; empty for fast-path pulses
    pub transcript_chunk: String,
    /// Alternating vibrate / pause durations in ms
    pub pattern: Vec<u32>,
    pub intensity: Intensity,
    /// Originating energy, 4 decimals
    pub rms: f32,
    /// Unix seconds
    pub timestamp: f64,
    /// Strictly increasing per pipeline; `-1` for fast-path pulses
    pub chunk_index: i64,
    /// Accumulated transcript so far, trimmed; empty for fast-path pulses
    pub full_transcript: String,
}

/// Haptic feedback derived from a timeline phoneme or an explicit trigger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HapticFeedback {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phoneme_id: Option<String>,
    pub category: PhonemeCategory,
    pub pattern: Vec<u32>,
    pub confidence: f32,
    pub timestamp: f64,
}

/// Every event sent to a connected endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Raw energy of each captured chunk
    SpeechHapticEnergy { rms: f32, timestamp: f64 },
    /// Phrase or fast-path haptic pulse
    SpeechHaptic(HapticEvent),
    /// Timeline-driven haptic feedback
    HapticFeedback(HapticFeedback),
    /// Lip reading analysis result
    LipReading(LipReadingResult),
    /// Relayed video frame with derived mouth features
    ProcessedFrame {
        frame_base64: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        mouth: Option<MouthReading>,
        #[serde(skip_serializing_if = "Option::is_none")]
        lip_prediction: Option<String>,
    },
    /// Direct vibration request for a source device
    Vibrate { pattern: Vec<u32> },
    /// Pronunciation assessment
    SpeechAnalysis(SpeechAnalysis),
    /// Sent once when a connection is accepted
    Welcome { role: Role },
}

impl Event {
    /// Wire name of this event
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SpeechHapticEnergy { .. } => "speech_haptic_energy",
            Self::SpeechHaptic(_) => "speech_haptic",
            Self::HapticFeedback(_) => "haptic_feedback",
            Self::LipReading(_) => "lip_reading",
            Self::ProcessedFrame { .. } => "processed_frame",
            Self::Vibrate { .. } => "vibrate",
            Self::SpeechAnalysis(_) => "speech_analysis",
            Self::Welcome { .. } => "welcome",
        }
    }

    /// Energy event for a chunk captured at `captured_at`
    #[must_use]
    pub fn energy(rms: f32, captured_at: DateTime<Utc>) -> Self {
        Self::SpeechHapticEnergy {
            rms: round4(rms),
            timestamp: unix_timestamp_of(captured_at),
        }
    }
}

/// Which connections an event is meant for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Sources,
    Viewers,
    All,
}

impl Target {
    /// Roles covered by this target
    #[must_use]
    pub const fn roles(self) -> &'static [Role] {
        match self {
            Self::Sources => &[Role::Source],
            Self::Viewers => &[Role::Viewer],
            Self::All => &[Role::Source, Role::Viewer],
        }
    }
}

/// An event addressed to a set of roles
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub target: Target,
    pub event: Event,
}

/// Cloneable publishing handle
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: mpsc::Sender<Dispatch>,
}

impl EventBus {
    /// Create a bus and the receiver the dispatcher drains
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Dispatch>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Publish an event, waiting for room on the bus
    ///
    /// # Errors
    ///
    /// Returns error if the dispatcher has shut down
    pub async fn publish(&self, target: Target, event: Event) -> Result<()> {
        let kind = event.kind();
        self.tx
            .send(Dispatch { target, event })
            .await
            .map_err(|_| Error::Transport(format!("event bus closed, dropped {kind}")))
    }

    /// Publish without waiting; drops the event when the bus is full
    pub fn try_publish(&self, target: Target, event: Event) -> bool {
        match self.tx.try_send(Dispatch { target, event }) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(d)) => {
                tracing::debug!(kind = d.event.kind(), "event bus full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(d)) => {
                tracing::warn!(kind = d.event.kind(), "event bus closed, dropping event");
                false
            }
        }
    }

    /// Whether the dispatcher is gone
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Drain the bus into the hub until every publisher is dropped
pub async fn run_dispatcher(mut rx: mpsc::Receiver<Dispatch>, hub: Arc<BroadcastHub>) {
    tracing::debug!("event dispatcher started");
    while let Some(Dispatch { target, event }) = rx.recv().await {
        for &role in target.roles() {
            hub.broadcast(role, &event).await;
        }
    }
    tracing::debug!("event dispatcher stopped");
}

/// Current time as fractional Unix seconds
#[must_use]
pub fn unix_timestamp() -> f64 {
    unix_timestamp_of(Utc::now())
}

/// `at` as fractional Unix seconds
#[must_use]
pub fn unix_timestamp_of(at: DateTime<Utc>) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let micros = at.timestamp_micros() as f64;
    micros / 1_000_000.0
}

/// Round to 4 decimal places
#[must_use]
pub fn round4(value: f32) -> f32 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn energy_event_wire_shape() {
        let at = DateTime::from_timestamp(1_700_000_000, 250_000_000).unwrap();
        let json = serde_json::to_value(Event::energy(0.081_234_5, at)).unwrap();
        assert_eq!(json["type"], "speech_haptic_energy");
        let rms = json["rms"].as_f64().unwrap();
        assert!((rms - 0.0812).abs() < 1e-6);
        assert!((json["timestamp"].as_f64().unwrap() - 1_700_000_000.25).abs() < 1e-6);
    }

    #[test]
    fn speech_haptic_flattens_payload() {
        let event = Event::SpeechHaptic(HapticEvent {
            transcript_chunk: "hello there".into(),
            pattern: Intensity::Medium.pattern().to_vec(),
            intensity: Intensity::Medium,
            rms: 0.08,
            timestamp: 1.0,
            chunk_index: 3,
            full_transcript: "hello there".into(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "speech_haptic");
        assert_eq!(json["intensity"], "medium");
        assert_eq!(json["pattern"], serde_json::json!([60, 40, 60]));
        assert_eq!(json["chunk_index"], 3);
        assert_eq!(event.kind(), "speech_haptic");
    }

    #[test]
    fn processed_frame_omits_missing_fields() {
        let event = Event::ProcessedFrame {
            frame_base64: "abc".into(),
            mouth: None,
            lip_prediction: None,
        };
        let json = serde_json::to_value(event).unwrap();
        assert_eq!(json, serde_json::json!({"type": "processed_frame", "frame_base64": "abc"}));
    }

    #[test]
    fn vibrate_wire_shape() {
        let json = serde_json::to_value(Event::Vibrate { pattern: vec![80, 40, 80] }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "vibrate", "pattern": [80, 40, 80]}));
    }

    #[test]
    fn all_targets_both_roles() {
        assert_eq!(Target::All.roles(), &[Role::Source, Role::Viewer]);
        assert_eq!(Target::Viewers.roles(), &[Role::Viewer]);
    }

    #[tokio::test]
    async fn publish_fails_after_dispatcher_drops() {
        let (bus, rx) = EventBus::new(4);
        drop(rx);
        assert!(bus.is_closed());
        let err = bus.publish(Target::All, Event::energy(0.1, Utc::now())).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert!(!bus.try_publish(Target::All, Event::energy(0.1, Utc::now())));
    }

    #[tokio::test]
    async fn try_publish_drops_when_full() {
        let (bus, mut rx) = EventBus::new(1);
        assert!(bus.try_publish(Target::Viewers, Event::energy(0.1, Utc::now())));
        assert!(!bus.try_publish(Target::Viewers, Event::energy(0.2, Utc::now())));
        let first = rx.recv().await.unwrap();
        assert_eq!(first.target, Target::Viewers);
    }
}
