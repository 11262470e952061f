//! Pronunciation assessment from a speech analysis result

use serde::{Deserialize, Serialize};

use crate::events::unix_timestamp;

/// Coarse pronunciation grade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PronunciationQuality {
    Excellent,
    Good,
    NeedsWork,
    Unknown,
}

impl PronunciationQuality {
    /// Grade a recognition confidence
    #[must_use]
    pub fn from_confidence(confidence: f32) -> Self {
        if confidence >= 0.9 {
            Self::Excellent
        } else if confidence >= 0.7 {
            Self::Good
        } else if confidence >= 0.5 {
            Self::NeedsWork
        } else {
            Self::Unknown
        }
    }

    /// Coaching hint for this grade
    #[must_use]
    pub const fn suggestion(self) -> Option<&'static str> {
        match self {
            Self::NeedsWork => Some("Try to speak more clearly and at a steady pace"),
            Self::Unknown => Some("Please speak louder or position microphone closer"),
            Self::Excellent | Self::Good => None,
        }
    }
}

/// Raw analysis as posted by a client or produced by recognition
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisInput {
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub detected_phonemes: Vec<String>,
}

/// Graded analysis, broadcast to viewers as `speech_analysis`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeechAnalysis {
    pub transcript: String,
    pub confidence: f32,
    pub detected_phonemes: Vec<String>,
    pub pronunciation_quality: PronunciationQuality,
    pub suggestions: Vec<String>,
    pub timestamp: f64,
}

/// Grade an analysis input
#[must_use]
pub fn assess(input: AnalysisInput) -> SpeechAnalysis {
    let quality = PronunciationQuality::from_confidence(input.confidence);
    SpeechAnalysis {
        transcript: input.transcript,
        confidence: input.confidence,
        detected_phonemes: input.detected_phonemes,
        pronunciation_quality: quality,
        suggestions: quality.suggestion().map(str::to_string).into_iter().collect(),
        timestamp: unix_timestamp(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grades_by_confidence() {
        assert_eq!(PronunciationQuality::from_confidence(0.95), PronunciationQuality::Excellent);
        assert_eq!(PronunciationQuality::from_confidence(0.9), PronunciationQuality::Excellent);
        assert_eq!(PronunciationQuality::from_confidence(0.7), PronunciationQuality::Good);
        assert_eq!(PronunciationQuality::from_confidence(0.5), PronunciationQuality::NeedsWork);
        assert_eq!(PronunciationQuality::from_confidence(0.49), PronunciationQuality::Unknown);
    }

    #[test]
    fn suggestions_only_for_weak_results() {
        let good = assess(AnalysisInput { confidence: 0.8, ..AnalysisInput::default() });
        assert!(good.suggestions.is_empty());

        let weak = assess(AnalysisInput { confidence: 0.6, ..AnalysisInput::default() });
        assert_eq!(weak.suggestions, vec!["Try to speak more clearly and at a steady pace"]);

        let missing: AnalysisInput = serde_json::from_str("{}").unwrap();
        let unknown = assess(missing);
        assert_eq!(unknown.pronunciation_quality, PronunciationQuality::Unknown);
        assert_eq!(unknown.suggestions.len(), 1);
    }
}
