//! Lip reading through a generative vision model
//!
//! A [`LipReadingSession`] buffers recent frames for one video source and
//! decides when enough mouth movement has been seen to ask the
//! [`LipAnalyzer`]. Results are kept in a bounded [`LipHistory`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::events::unix_timestamp;
use crate::signal::MouthState;
use crate::{Error, Result};

/// Results kept in memory
pub const HISTORY_CAPACITY: usize = 50;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

const PROMPT: &str = "You are a lip reading AI. Analyze these sequential frames of a person's \
lip/mouth region. The frames are taken ~100ms apart during speech.\n\n\
Based on the lip movements visible across these frames, determine:\n\
1. What word or phrase the person appears to be saying\n\
2. Your confidence level (0.0 to 1.0)\n\
3. The current mouth state (closed, open, or talking)\n\
4. Any phonemes you can detect from the lip shapes\n\
5. Brief analysis notes about the lip movement pattern\n\n\
Respond in this exact JSON format only:\n\
{\"detected_text\": \"...\", \"confidence\": 0.X, \"mouth_state\": \"talking\", \
\"phonemes_detected\": [\"...\"], \"analysis_notes\": \"...\"}\n\n\
If the lips are not clearly visible or not moving, return:\n\
{\"detected_text\": \"\", \"confidence\": 0.0, \"mouth_state\": \"closed\", \
\"phonemes_detected\": [], \"analysis_notes\": \"No clear lip movement detected\"}";

fn unknown_state() -> String {
    "unknown".to_string()
}

/// One lip reading analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LipReadingResult {
    #[serde(default)]
    pub detected_text: String,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default = "unknown_state")]
    pub mouth_state: String,
    #[serde(default)]
    pub phonemes_detected: Vec<String>,
    #[serde(default)]
    pub analysis_notes: String,
    #[serde(default)]
    pub timestamp: f64,
}

impl Default for LipReadingResult {
    fn default() -> Self {
        Self {
            detected_text: String::new(),
            confidence: 0.0,
            mouth_state: unknown_state(),
            phonemes_detected: Vec::new(),
            analysis_notes: String::new(),
            timestamp: 0.0,
        }
    }
}

impl LipReadingResult {
    /// Empty result carrying only a note
    #[must_use]
    pub fn note(notes: impl Into<String>) -> Self {
        Self {
            analysis_notes: notes.into(),
            timestamp: unix_timestamp(),
            ..Self::default()
        }
    }

    /// Whether the model claims to have read any text
    #[must_use]
    pub fn has_text(&self) -> bool {
        !self.detected_text.trim().is_empty()
    }
}

/// Reads lips from a short run of frames
#[async_trait]
pub trait LipAnalyzer: Send + Sync {
    /// Analyze base64 JPEG frames, oldest first; never fails
    async fn analyze(&self, frames: &[String]) -> LipReadingResult;
}

/// Parse a model reply into a result
///
/// Markdown fences are stripped. A reply that is not valid JSON is kept as
/// raw text (first 200 characters).
#[must_use]
pub fn parse_reply(raw: &str) -> LipReadingResult {
    let raw = raw.trim();
    let mut clean = raw;
    if clean.starts_with("```") {
        clean = clean.split_once('\n').map_or("", |(_, rest)| rest);
    }
    if let Some(stripped) = clean.trim_end().strip_suffix("```") {
        clean = stripped;
    }

    match serde_json::from_str::<LipReadingResult>(clean.trim()) {
        Ok(mut result) => {
            result.timestamp = unix_timestamp();
            result
        }
        Err(_) => LipReadingResult {
            detected_text: raw.chars().take(200).collect(),
            analysis_notes: "Raw response (JSON parse failed)".to_string(),
            timestamp: unix_timestamp(),
            ..LipReadingResult::default()
        },
    }
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'static str,
    data: &'a str,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Image { inline_data: InlineData<'a> },
    Text { text: &'a str },
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// Gemini-backed lip reader
pub struct GeminiLipReader {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_frames: usize,
}

impl GeminiLipReader {
    /// # Errors
    ///
    /// Returns error if the API key is missing
    pub fn new(api_key: String, model: String, max_frames: usize) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("Gemini API key required for lip reading".to_string()));
        }
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key,
            model,
            max_frames: max_frames.max(1),
        })
    }

    async fn request(&self, frames: &[String]) -> Result<LipReadingResult> {
        let mut parts: Vec<Part<'_>> = frames
            .iter()
            .take(self.max_frames)
            .map(|data| Part::Image {
                inline_data: InlineData {
                    mime_type: "image/jpeg",
                    data,
                },
            })
            .collect();
        parts.push(Part::Text { text: PROMPT });

        let request = GenerateRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                max_output_tokens: 512,
            },
        };

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Vision(format!("Gemini error {status}: {body}")));
        }

        let reply: GenerateResponse = response.json().await?;
        let text = reply
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text);

        Ok(text.map_or_else(
            || LipReadingResult {
                timestamp: unix_timestamp(),
                ..LipReadingResult::default()
            },
            |text| parse_reply(&text),
        ))
    }
}

#[async_trait]
impl LipAnalyzer for GeminiLipReader {
    async fn analyze(&self, frames: &[String]) -> LipReadingResult {
        match self.request(frames).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, "lip reading analysis failed");
                LipReadingResult::note(format!("Error: {e}"))
            }
        }
    }
}

/// Bounded, shared history of results
#[derive(Debug)]
pub struct LipHistory {
    inner: Mutex<VecDeque<LipReadingResult>>,
    capacity: usize,
}

impl Default for LipHistory {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}

impl LipHistory {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, result: LipReadingResult) {
        if let Ok(mut history) = self.inner.lock() {
            if history.len() >= self.capacity {
                history.pop_front();
            }
            history.push_back(result);
        }
    }

    /// Up to `count` most recent results, oldest first
    #[must_use]
    pub fn recent(&self, count: usize) -> Vec<LipReadingResult> {
        self.inner
            .lock()
            .map(|h| h.iter().skip(h.len().saturating_sub(count)).cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn latest(&self) -> Option<LipReadingResult> {
        self.inner.lock().ok().and_then(|h| h.back().cloned())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().map(|h| h.len()).unwrap_or_default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Gating parameters for a session
#[derive(Debug, Clone)]
pub struct LipReadingConfig {
    pub cooldown: Duration,
    pub min_frames: usize,
    pub max_frames: usize,
}

impl Default for LipReadingConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(3),
            min_frames: 3,
            max_frames: 6,
        }
    }
}

/// Per-source frame buffer and analysis gate
pub struct LipReadingSession {
    config: LipReadingConfig,
    frames: Mutex<VecDeque<String>>,
    analyzing: AtomicBool,
    last_analysis: Mutex<Option<Instant>>,
    history: Arc<LipHistory>,
}

impl LipReadingSession {
    #[must_use]
    pub fn new(config: LipReadingConfig, history: Arc<LipHistory>) -> Self {
        Self {
            frames: Mutex::new(VecDeque::with_capacity(config.max_frames)),
            config,
            analyzing: AtomicBool::new(false),
            last_analysis: Mutex::new(None),
            history,
        }
    }

    /// Buffer a frame, dropping the oldest past the maximum
    pub fn add_frame(&self, frame: String) {
        if let Ok(mut frames) = self.frames.lock() {
            if frames.len() >= self.config.max_frames.max(1) {
                frames.pop_front();
            }
            frames.push_back(frame);
        }
    }

    #[must_use]
    pub fn buffered(&self) -> usize {
        self.frames.lock().map(|f| f.len()).unwrap_or_default()
    }

    #[must_use]
    pub fn is_analyzing(&self) -> bool {
        self.analyzing.load(Ordering::SeqCst)
    }

    fn cooled_down(&self) -> bool {
        self.last_analysis
            .lock()
            .map(|last| last.is_none_or(|t| t.elapsed() >= self.config.cooldown))
            .unwrap_or(false)
    }

    /// Whether an analysis should start now
    #[must_use]
    pub fn should_analyze(&self, mouth: MouthState) -> bool {
        matches!(mouth, MouthState::Open | MouthState::Talking)
            && !self.is_analyzing()
            && self.buffered() >= self.config.min_frames
            && self.cooled_down()
    }

    /// Claim the in-flight slot and take the buffered frames
    fn begin(&self, mouth: MouthState) -> Option<Vec<String>> {
        if !self.should_analyze(mouth) {
            return None;
        }
        if self
            .analyzing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return None;
        }
        let frames = self
            .frames
            .lock()
            .map(|mut f| f.drain(..).collect())
            .unwrap_or_default();
        Some(frames)
    }

    fn finish(&self, result: &LipReadingResult) {
        self.history.push(result.clone());
        if let Ok(mut last) = self.last_analysis.lock() {
            *last = Some(Instant::now());
        }
        self.analyzing.store(false, Ordering::SeqCst);
    }

    /// Run an analysis if the gate allows it
    ///
    /// Returns `None` when gated. The cooldown restarts when the analysis
    /// completes.
    pub async fn analyze_if_ready(
        &self,
        analyzer: &dyn LipAnalyzer,
        mouth: MouthState,
    ) -> Option<LipReadingResult> {
        let frames = self.begin(mouth)?;
        tracing::debug!(frames = frames.len(), "starting lip reading analysis");
        let result = analyzer.analyze(&frames).await;
        self.finish(&result);
        if result.has_text() {
            tracing::info!(text = %result.detected_text, confidence = result.confidence, "lip reading result");
        }
        Some(result)
    }
}
