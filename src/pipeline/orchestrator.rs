//! Speech-to-haptic orchestration
//!
//! Pulls captured chunks, reports their energy, fires a fast pulse for loud
//! speech, transcribes, segments the transcript into phrases and publishes
//! one paced haptic event per phrase.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::phrases::split_phrases;
use crate::events::{Event, EventBus, HapticEvent, Target, round4, unix_timestamp};
use crate::signal::{SILENCE_THRESHOLD, classify};
use crate::voice::{AudioChunk, ChunkSource, Transcriber};
use crate::{Error, Result};

/// Bound on waiting for the loop to finish before it is aborted
const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Floor on the spacing between phrase events
pub const MIN_PHRASE_INTERVAL: Duration = Duration::from_millis(500);

/// Ceiling on a single transcription call
pub const MAX_TRANSCRIPTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Tunables for the orchestrator loop
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Below this energy a chunk is neither transcribed nor pulsed
    pub silence_threshold: f32,
    /// Above this energy a fast-path pulse fires before transcription
    pub speaking_threshold: f32,
    /// Minimum spacing between consecutive phrase events
    pub min_phrase_interval: Duration,
    /// Upper bound on a single transcription call
    pub transcription_timeout: Duration,
    /// Sleep when no chunk is queued
    pub poll_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            silence_threshold: SILENCE_THRESHOLD,
            speaking_threshold: 0.04,
            min_phrase_interval: MIN_PHRASE_INTERVAL,
            transcription_timeout: Duration::from_secs(4),
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Externally visible pipeline status
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineStatus {
    pub running: bool,
    /// Phrase events published since start (fast pulses excluded)
    pub total_chunks_sent: u64,
    pub latest_transcript: String,
    /// Energy of the latest chunk, 4 decimals
    pub latest_rms: f32,
    /// Seconds since start, 1 decimal; 0 when stopped
    pub uptime_seconds: f64,
}

#[derive(Debug, Default)]
struct StatusState {
    running: bool,
    total_chunks_sent: u64,
    latest_transcript: String,
    latest_rms: f32,
    started_at: Option<Instant>,
}

type SharedStatus = Arc<Mutex<StatusState>>;

struct Worker {
    shutdown: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Start/stop handle for the speech-haptic loop
pub struct SpeechHapticPipeline {
    source: Arc<dyn ChunkSource>,
    transcriber: Arc<dyn Transcriber>,
    bus: EventBus,
    config: PipelineConfig,
    status: SharedStatus,
    worker: tokio::sync::Mutex<Option<Worker>>,
}

impl SpeechHapticPipeline {
    #[must_use]
    pub fn new(
        source: Arc<dyn ChunkSource>,
        transcriber: Arc<dyn Transcriber>,
        bus: EventBus,
        config: PipelineConfig,
    ) -> Self {
        Self {
            source,
            transcriber,
            bus,
            config,
            status: SharedStatus::default(),
            worker: tokio::sync::Mutex::new(None),
        }
    }

    /// Start capture and the processing loop; no-op if already running
    ///
    /// # Errors
    ///
    /// Returns error if the audio source cannot be started
    pub async fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock().await;
        match worker.as_ref() {
            Some(w) if !w.handle.is_finished() => return Ok(()),
            Some(_) => {
                tracing::info!("pipeline loop had exited, restarting");
                worker.take();
                let source = Arc::clone(&self.source);
                if let Err(e) = tokio::task::spawn_blocking(move || source.stop()).await {
                    tracing::error!(error = %e, "capture stop task failed");
                }
            }
            None => {}
        }

        let source = Arc::clone(&self.source);
        tokio::task::spawn_blocking(move || source.start())
            .await
            .map_err(|e| Error::Pipeline(format!("capture start task failed: {e}")))??;

        if let Ok(mut status) = self.status.lock() {
            *status = StatusState {
                running: true,
                started_at: Some(Instant::now()),
                ..StatusState::default()
            };
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let processor = Processor::new(
            Arc::clone(&self.source),
            Arc::clone(&self.transcriber),
            self.bus.clone(),
            self.config.clone(),
            Arc::clone(&self.status),
        );
        let handle = tokio::spawn(processor.run(shutdown_rx));

        *worker = Some(Worker {
            shutdown: shutdown_tx,
            handle,
        });

        tracing::info!("speech-haptic pipeline started");
        Ok(())
    }

    /// Stop the loop and the capture; safe to call when not running
    pub async fn stop(&self) {
        let Some(mut worker) = self.worker.lock().await.take() else {
            return;
        };

        let _ = worker.shutdown.send(()).await;
        if tokio::time::timeout(STOP_TIMEOUT, &mut worker.handle)
            .await
            .is_err()
        {
            tracing::warn!("pipeline loop did not stop in time, aborting");
            worker.handle.abort();
        }

        let source = Arc::clone(&self.source);
        if let Err(e) = tokio::task::spawn_blocking(move || source.stop()).await {
            tracing::error!(error = %e, "capture stop task failed");
        }

        if let Ok(mut status) = self.status.lock() {
            status.running = false;
        }

        tracing::info!("speech-haptic pipeline stopped");
    }

    /// Current status snapshot
    #[must_use]
    pub fn status(&self) -> PipelineStatus {
        let Ok(status) = self.status.lock() else {
            return PipelineStatus {
                running: false,
                total_chunks_sent: 0,
                latest_transcript: String::new(),
                latest_rms: 0.0,
                uptime_seconds: 0.0,
            };
        };

        let uptime_seconds = match (status.running, status.started_at) {
            (true, Some(started)) => (started.elapsed().as_secs_f64() * 10.0).round() / 10.0,
            _ => 0.0,
        };

        PipelineStatus {
            running: status.running,
            total_chunks_sent: status.total_chunks_sent,
            latest_transcript: status.latest_transcript.clone(),
            latest_rms: round4(status.latest_rms),
            uptime_seconds,
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status.lock().map(|s| s.running).unwrap_or(false)
    }

    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

/// State owned by the running loop
pub(crate) struct Processor {
    source: Arc<dyn ChunkSource>,
    transcriber: Arc<dyn Transcriber>,
    bus: EventBus,
    config: PipelineConfig,
    status: SharedStatus,
    next_index: i64,
    full_transcript: String,
    last_push: Option<Instant>,
}

impl Processor {
    fn new(
        source: Arc<dyn ChunkSource>,
        transcriber: Arc<dyn Transcriber>,
        bus: EventBus,
        config: PipelineConfig,
        status: SharedStatus,
    ) -> Self {
        Self {
            source,
            transcriber,
            bus,
            config,
            status,
            next_index: 0,
            full_transcript: String::new(),
            last_push: None,
        }
    }

    async fn run(mut self, mut shutdown: mpsc::Receiver<()>) {
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                result = self.step() => {
                    if let Err(e) = result {
                        tracing::warn!(error = %e, "pipeline loop exiting");
                        break;
                    }
                }
            }
        }
        self.update_status(|s| s.running = false);
        tracing::debug!(published = self.next_index, "pipeline loop finished");
    }

    async fn step(&mut self) -> Result<()> {
        match self.source.pop() {
            Some(chunk) => self.process_chunk(&chunk).await,
            None => {
                tokio::time::sleep(self.config.poll_interval).await;
                Ok(())
            }
        }
    }

    fn update_status(&self, f: impl FnOnce(&mut StatusState)) {
        if let Ok(mut status) = self.status.lock() {
            f(&mut status);
        }
    }

    /// Handle one chunk end to end
    ///
    /// # Errors
    ///
    /// Returns error only if the event bus is gone
    pub(crate) async fn process_chunk(&mut self, chunk: &AudioChunk) -> Result<()> {
        let energy = chunk.energy();
        self.update_status(|s| s.latest_rms = energy);

        self.bus
            .publish(Target::All, Event::energy(energy, chunk.captured_at()))
            .await?;

        if energy < self.config.silence_threshold {
            return Ok(());
        }

        if energy > self.config.speaking_threshold {
            let intensity = classify(energy);
            tracing::debug!(%intensity, energy, "fast haptic pulse");
            self.bus
                .publish(
                    Target::All,
                    Event::SpeechHaptic(HapticEvent {
                        transcript_chunk: String::new(),
                        pattern: intensity.pattern().to_vec(),
                        intensity,
                        rms: round4(energy),
                        timestamp: unix_timestamp(),
                        chunk_index: -1,
                        full_transcript: String::new(),
                    }),
                )
                .await?;
        }

        let Some(transcript) = self.transcribe(chunk).await else {
            return Ok(());
        };

        self.full_transcript.push(' ');
        self.full_transcript.push_str(&transcript);
        self.update_status(|s| s.latest_transcript.clone_from(&transcript));

        for phrase in split_phrases(&transcript) {
            self.wait_for_cadence().await;

            let intensity = classify(energy);
            let index = self.next_index;
            self.next_index += 1;
            self.last_push = Some(Instant::now());
            self.update_status(|s| s.total_chunks_sent += 1);

            tracing::info!(index, %intensity, phrase = %phrase, "haptic phrase");

            self.bus
                .publish(
                    Target::All,
                    Event::SpeechHaptic(HapticEvent {
                        transcript_chunk: phrase,
                        pattern: intensity.pattern().to_vec(),
                        intensity,
                        rms: round4(energy),
                        timestamp: unix_timestamp(),
                        chunk_index: index,
                        full_transcript: self.full_transcript.trim().to_string(),
                    }),
                )
                .await?;
        }

        Ok(())
    }

    /// Transcribe a chunk, returning `None` for empty, failed or late results
    async fn transcribe(&self, chunk: &AudioChunk) -> Option<String> {
        let wav = match chunk.to_wav() {
            Ok(wav) => wav,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode chunk");
                return None;
            }
        };

        let transcript = match tokio::time::timeout(
            self.config.transcription_timeout,
            self.transcriber.transcribe(&wav),
        )
        .await
        {
            Ok(text) => text,
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.config.transcription_timeout.as_millis(),
                    "transcription timed out"
                );
                return None;
            }
        };

        let transcript = transcript.trim();
        (!transcript.is_empty()).then(|| transcript.to_string())
    }

    async fn wait_for_cadence(&self) {
        if let Some(last) = self.last_push {
            let elapsed = last.elapsed();
            if elapsed < self.config.min_phrase_interval {
                tokio::time::sleep(self.config.min_phrase_interval - elapsed).await;
            }
        }
    }
}
