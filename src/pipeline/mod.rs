//! Speech-haptic pipeline
//!
//! Microphone chunks in, paced phrase-level haptic events out.

mod orchestrator;
mod phrases;

pub use orchestrator::{
    MAX_TRANSCRIPTION_TIMEOUT, MIN_PHRASE_INTERVAL, PipelineConfig, PipelineStatus,
    SpeechHapticPipeline,
};
pub use phrases::{MAX_PHRASE_WORDS, MIN_PHRASE_WORDS, split_phrases};
