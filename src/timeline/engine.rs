//! Phoneme timeline playback

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::lesson::{self, Phoneme, PhonemeCategory};
use crate::Result;

/// Transport state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Stopped,
    Paused,
    Playing,
}

/// When an active phoneme is reported by [`PhonemeTimeline::tick`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// Every tick while the phoneme is active
    #[default]
    EveryTick,
    /// Once per activation; re-arms after it leaves the active set
    Once,
}

impl std::str::FromStr for TriggerMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "every_tick" | "always" => Ok(Self::EveryTick),
            "once" => Ok(Self::Once),
            other => Err(crate::Error::Config(format!("unknown trigger mode: {other}"))),
        }
    }
}

#[derive(Debug, Default)]
struct PlaybackClock {
    offset: f64,
    last_tick: Option<Instant>,
}

/// Id and category of the phoneme under the playhead
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentPhoneme {
    pub id: String,
    #[serde(rename = "type")]
    pub category: PhonemeCategory,
}

/// Snapshot returned by [`PhonemeTimeline::progress`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    /// `current_time / total_duration`, clamped to `[0, 1]`
    pub progress: f64,
    pub current_time: f64,
    pub total_duration: f64,
    pub is_playing: bool,
    pub state: PlaybackState,
    pub current_phoneme: Option<CurrentPhoneme>,
}

/// Ordered phoneme sequence plus a playback clock
#[derive(Debug, Default)]
pub struct PhonemeTimeline {
    phonemes: Vec<Phoneme>,
    clock: PlaybackClock,
    state: PlaybackState,
    mode: TriggerMode,
    /// Indices active on the previous tick, used by [`TriggerMode::Once`]
    fired: HashSet<usize>,
}

impl PhonemeTimeline {
    #[must_use]
    pub fn new(mode: TriggerMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Replace the sequence after validating every entry
    ///
    /// A successful load stops playback; a failed one leaves everything as
    /// it was.
    ///
    /// # Errors
    ///
    /// Returns error if any entry is invalid
    pub fn load(&mut self, phonemes: Vec<Phoneme>) -> Result<()> {
        lesson::validate(&phonemes)?;
        self.phonemes = phonemes;
        self.stop();
        tracing::info!(count = self.phonemes.len(), "timeline loaded");
        Ok(())
    }

    /// Load from a lesson JSON document
    ///
    /// # Errors
    ///
    /// Returns error if the document is not a valid lesson
    pub fn load_json(&mut self, json: &str) -> Result<()> {
        self.load(lesson::parse_lesson(json)?)
    }

    /// Load from a lesson file on disk
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is not a valid lesson
    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        self.load(lesson::read_lesson(path)?)
    }

    /// Begin playing from `offset` seconds (negative offsets start at 0)
    pub fn start(&mut self, offset: f64) {
        self.clock.offset = if offset.is_finite() { offset.max(0.0) } else { 0.0 };
        self.clock.last_tick = Some(Instant::now());
        self.state = PlaybackState::Playing;
        self.fired.clear();
        tracing::debug!(offset = self.clock.offset, "timeline started");
    }

    /// Freeze the clock; only meaningful while playing
    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
            tracing::debug!(offset = self.clock.offset, "timeline paused");
        }
    }

    /// Continue from a pause, resetting the tick reference so the paused
    /// interval is not counted
    pub fn resume(&mut self) {
        if self.state == PlaybackState::Paused {
            self.clock.last_tick = Some(Instant::now());
            self.state = PlaybackState::Playing;
            tracing::debug!(offset = self.clock.offset, "timeline resumed");
        }
    }

    /// Stop and rewind to 0; safe to call repeatedly
    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
        self.clock.offset = 0.0;
        self.clock.last_tick = None;
        self.fired.clear();
    }

    /// Advance the clock by `dt` seconds and return the phonemes triggered
    ///
    /// No-op unless playing. Non-finite or negative `dt` counts as zero.
    pub fn tick(&mut self, dt: f64) -> Vec<Phoneme> {
        if self.state != PlaybackState::Playing {
            return Vec::new();
        }
        if dt.is_finite() && dt > 0.0 {
            self.clock.offset += dt;
        }

        let t = self.clock.offset;
        let active: HashSet<usize> = self
            .phonemes
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_active_at(t))
            .map(|(i, _)| i)
            .collect();

        let mut triggered: Vec<usize> = match self.mode {
            TriggerMode::EveryTick => active.iter().copied().collect(),
            TriggerMode::Once => active.difference(&self.fired).copied().collect(),
        };
        triggered.sort_unstable();
        self.fired = active;

        triggered
            .into_iter()
            .map(|i| self.phonemes[i].clone())
            .collect()
    }

    /// Tick by the wall time elapsed since the last tick reference
    pub fn advance(&mut self) -> Vec<Phoneme> {
        if self.state != PlaybackState::Playing {
            return Vec::new();
        }
        let now = Instant::now();
        let dt = self
            .clock
            .last_tick
            .map_or(0.0, |last| now.duration_since(last).as_secs_f64());
        self.clock.last_tick = Some(now);
        self.tick(dt)
    }

    /// Phonemes active at the current offset, in sequence order
    #[must_use]
    pub fn active(&self) -> Vec<&Phoneme> {
        let t = self.clock.offset;
        self.phonemes.iter().filter(|p| p.is_active_at(t)).collect()
    }

    /// Highest-priority active phoneme (consonant, vowel, buzz, silence)
    #[must_use]
    pub fn current(&self) -> Option<&Phoneme> {
        // min_by_key keeps the first of equal priority
        self.active().into_iter().min_by_key(|p| p.category.priority())
    }

    /// Playback progress snapshot
    #[must_use]
    pub fn progress(&self) -> Progress {
        let total = lesson::total_duration(&self.phonemes);
        let progress = if total > 0.0 {
            (self.clock.offset / total).clamp(0.0, 1.0)
        } else {
            0.0
        };

        Progress {
            progress,
            current_time: self.clock.offset,
            total_duration: total,
            is_playing: self.state == PlaybackState::Playing,
            state: self.state,
            current_phoneme: self.current().map(|p| CurrentPhoneme {
                id: p.id.clone(),
                category: p.category,
            }),
        }
    }

    #[must_use]
    pub const fn state(&self) -> PlaybackState {
        self.state
    }

    /// Current clock offset in seconds
    #[must_use]
    pub const fn offset(&self) -> f64 {
        self.clock.offset
    }

    #[must_use]
    pub fn phonemes(&self) -> &[Phoneme] {
        &self.phonemes
    }

    #[must_use]
    pub const fn trigger_mode(&self) -> TriggerMode {
        self.mode
    }

    pub fn set_trigger_mode(&mut self, mode: TriggerMode) {
        self.mode = mode;
        self.fired.clear();
    }
}
