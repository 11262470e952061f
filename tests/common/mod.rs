//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use phonix_gateway::voice::{AudioChunk, ChunkSource, Transcriber};
use phonix_gateway::{Error, Event, EventSink, Result};
use tokio::time::Instant;

/// Sink that records every delivered event, or fails every send
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<Event>>,
    /// Global delivery order shared between sinks
    pub order: Option<Arc<DeliveryLog>>,
    pub label: &'static str,
    pub fail: bool,
}

impl RecordingSink {
    #[must_use]
    pub fn new(label: &'static str, order: Arc<DeliveryLog>) -> Self {
        Self {
            label,
            order: Some(order),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing(label: &'static str, order: Arc<DeliveryLog>) -> Self {
        Self {
            fail: true,
            ..Self::new(label, order)
        }
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(Event::kind).collect()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn send(&self, event: &Event) -> Result<()> {
        if let Some(order) = &self.order {
            order.record(self.label);
        }
        if self.fail {
            return Err(Error::Transport(format!("{} is gone", self.label)));
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Ordered record of send attempts across sinks
#[derive(Default)]
pub struct DeliveryLog {
    entries: Mutex<Vec<&'static str>>,
}

impl DeliveryLog {
    pub fn record(&self, label: &'static str) {
        self.entries.lock().unwrap().push(label);
    }

    pub fn entries(&self) -> Vec<&'static str> {
        self.entries.lock().unwrap().clone()
    }
}

/// Chunk source replaying a fixed list of energies
#[derive(Default)]
pub struct ScriptedSource {
    chunks: Mutex<VecDeque<AudioChunk>>,
    pub fail_start: bool,
    pub stops: AtomicUsize,
}

impl ScriptedSource {
    #[must_use]
    pub fn with_energies(energies: &[f32]) -> Self {
        Self {
            chunks: Mutex::new(
                energies
                    .iter()
                    .map(|&e| AudioChunk::with_energy(vec![0; 320], e))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn broken() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    pub fn remaining(&self) -> usize {
        self.chunks.lock().unwrap().len()
    }
}

impl ChunkSource for ScriptedSource {
    fn start(&self) -> Result<()> {
        if self.fail_start {
            return Err(Error::Audio("no input device available".to_string()));
        }
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn pop(&self) -> Option<AudioChunk> {
        self.chunks.lock().unwrap().pop_front()
    }
}

/// Transcriber answering from a script, optionally after a delay
pub struct ScriptedTranscriber {
    replies: Mutex<VecDeque<String>>,
    delay: Duration,
}

impl ScriptedTranscriber {
    #[must_use]
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| (*r).to_string()).collect()),
            delay: Duration::ZERO,
        }
    }

    #[must_use]
    pub const fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, _wav: &[u8]) -> String {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.replies.lock().unwrap().pop_front().unwrap_or_default()
    }
}

/// Sink that stamps each event with the (paused) clock
#[derive(Default)]
pub struct TimedSink {
    pub events: Mutex<Vec<(Instant, Event)>>,
}

#[async_trait]
impl EventSink for TimedSink {
    async fn send(&self, event: &Event) -> Result<()> {
        self.events.lock().unwrap().push((Instant::now(), event.clone()));
        Ok(())
    }
}

/// Write a lesson document to a temporary file
#[must_use]
pub fn lesson_file(json: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("failed to create lesson file");
    file.write_all(json.as_bytes()).expect("failed to write lesson");
    file
}

/// Two back-to-back one-second phonemes
pub const TWO_PHONEME_LESSON: &str = r#"{
    "phonemes": [
        {"id": "ah", "type": "vowel", "start": 0.0, "duration": 1.0, "haptic_pattern": [200]},
        {"id": "t", "type": "consonant", "start": 1.0, "duration": 1.0, "confidence": 0.5}
    ]
}"#;
