//! Signal classification
//!
//! Pure mapping of audio energy to haptic intensity tiers, and the
//! stateful mouth-openness tracker fed by the video source.

mod intensity;
mod mouth;

pub use intensity::{Intensity, SILENCE_THRESHOLD, classify, clamp_energy};
pub use mouth::{HISTORY_LEN, MouthReading, MouthState, MouthTracker};
