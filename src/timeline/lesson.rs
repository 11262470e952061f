//! Lesson files: ordered, timed phoneme sequences

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Phoneme category, also the current-phoneme priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhonemeCategory {
    Vowel,
    Consonant,
    Buzz,
    Silence,
}

impl PhonemeCategory {
    /// Base vibration pattern used by explicit haptic triggers
    #[must_use]
    pub const fn base_pattern(self) -> &'static [u32] {
        match self {
            Self::Vowel => &[200],
            Self::Consonant => &[50, 30, 50],
            Self::Buzz => &[100, 50, 100, 50, 100],
            Self::Silence => &[],
        }
    }

    /// Lower wins when several phonemes are active at once
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::Consonant => 0,
            Self::Vowel => 1,
            Self::Buzz => 2,
            Self::Silence => 3,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vowel => "vowel",
            Self::Consonant => "consonant",
            Self::Buzz => "buzz",
            Self::Silence => "silence",
        }
    }
}

fn default_pattern() -> Vec<u32> {
    vec![100]
}

const fn default_confidence() -> f32 {
    1.0
}

/// A timed unit of a lesson
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phoneme {
    pub id: String,
    #[serde(rename = "type")]
    pub category: PhonemeCategory,
    /// Seconds from the start of the lesson
    pub start: f64,
    /// Seconds
    pub duration: f64,
    #[serde(default = "default_pattern")]
    pub haptic_pattern: Vec<u32>,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

impl Phoneme {
    /// Build a phoneme with the default pattern and full confidence
    #[must_use]
    pub fn new(id: impl Into<String>, category: PhonemeCategory, start: f64, duration: f64) -> Self {
        Self {
            id: id.into(),
            category,
            start,
            duration,
            haptic_pattern: default_pattern(),
            confidence: default_confidence(),
        }
    }

    /// End of the active interval (exclusive)
    #[must_use]
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// Active on `[start, start + duration)`
    #[must_use]
    pub fn is_active_at(&self, t: f64) -> bool {
        self.start <= t && t < self.end()
    }

    fn validate(&self, index: usize) -> Result<()> {
        let fail = |what: &str| Err(Error::Lesson(format!("phoneme {index} ({}): {what}", self.id)));

        if !self.start.is_finite() || self.start < 0.0 {
            return fail("start must be a non-negative number");
        }
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return fail("duration must be positive");
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return fail("confidence must be within [0, 1]");
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct LessonFile {
    #[serde(default)]
    phonemes: Vec<Phoneme>,
}

/// Check every entry of a sequence, failing on the first bad one
///
/// # Errors
///
/// Returns [`Error::Lesson`] naming the offending entry
pub fn validate(phonemes: &[Phoneme]) -> Result<()> {
    phonemes
        .iter()
        .enumerate()
        .try_for_each(|(i, p)| p.validate(i))
}

/// Parse and validate a lesson document
///
/// # Errors
///
/// Returns [`Error::Lesson`] on malformed JSON, a missing or unknown field
/// value, or an out-of-range entry
pub fn parse_lesson(json: &str) -> Result<Vec<Phoneme>> {
    let lesson: LessonFile =
        serde_json::from_str(json).map_err(|e| Error::Lesson(format!("invalid lesson: {e}")))?;
    validate(&lesson.phonemes)?;
    Ok(lesson.phonemes)
}

/// Read, parse and validate a lesson file
///
/// # Errors
///
/// Returns error if the file cannot be read or is not a valid lesson
pub fn read_lesson(path: &Path) -> Result<Vec<Phoneme>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Lesson(format!("failed to read {}: {e}", path.display())))?;
    let phonemes = parse_lesson(&content)?;
    tracing::info!(path = %path.display(), count = phonemes.len(), "lesson loaded");
    Ok(phonemes)
}

/// Total length of a sequence in seconds
#[must_use]
pub fn total_duration(phonemes: &[Phoneme]) -> f64 {
    phonemes.iter().map(Phoneme::end).fold(0.0, f64::max)
}
