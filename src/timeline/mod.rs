//! Phoneme timeline engine
//!
//! Plays back a pre-authored lesson (timed phonemes) with transport
//! controls. A ticker task advances the clock and publishes haptic
//! feedback for each triggered phoneme.

mod engine;
mod lesson;
mod pronunciation;
mod ticker;

use std::sync::Arc;

use tokio::sync::Mutex;

pub use engine::{CurrentPhoneme, PhonemeTimeline, PlaybackState, Progress, TriggerMode};
pub use lesson::{Phoneme, PhonemeCategory, parse_lesson, read_lesson, total_duration, validate};
pub use pronunciation::{AnalysisInput, PronunciationQuality, SpeechAnalysis, assess};
pub use ticker::{TICK_INTERVAL, feedback_for, spawn_ticker};

/// Timeline shared between the ticker and the control surface
pub type SharedTimeline = Arc<Mutex<PhonemeTimeline>>;
