//! Mouth-openness tracking
//!
//! Turns a stream of openness samples (normalized inner-lip gap) into a
//! closed / open / talking state using the sample-to-sample velocity.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Number of samples kept in the rolling window
pub const HISTORY_LEN: usize = 10;

const CLOSED_BELOW: f64 = 0.01;
const OPEN_ABOVE: f64 = 0.02;
const MOVEMENT_VELOCITY: f64 = 0.003;
const TALKING_AFTER_FRAMES: u32 = 2;

/// Derived mouth state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouthState {
    #[default]
    Closed,
    Open,
    Talking,
}

/// Result of a single tracker update
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MouthReading {
    pub mouth_state: MouthState,
    pub openness: f64,
    pub velocity: f64,
}

/// Stateful mouth tracker, updated once per incoming sample
#[derive(Debug, Default)]
pub struct MouthTracker {
    previous: f64,
    history: VecDeque<f64>,
    talking_frames: u32,
    state: MouthState,
}

impl MouthTracker {
    /// Create a tracker in the closed state
    #[must_use]
    pub fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(HISTORY_LEN),
            ..Self::default()
        }
    }

    /// Feed one openness sample
    pub fn update(&mut self, openness: f64) -> MouthReading {
        if self.history.len() == HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(openness);

        let velocity = openness - self.previous;
        self.previous = openness;

        let state = if openness < CLOSED_BELOW {
            self.talking_frames = 0;
            MouthState::Closed
        } else if velocity.abs() > MOVEMENT_VELOCITY {
            self.talking_frames += 1;
            if self.talking_frames > TALKING_AFTER_FRAMES {
                MouthState::Talking
            } else {
                MouthState::Open
            }
        } else if openness > OPEN_ABOVE {
            self.talking_frames = self.talking_frames.saturating_sub(1);
            MouthState::Open
        } else {
            self.talking_frames = 0;
            MouthState::Closed
        };
        self.state = state;

        MouthReading {
            mouth_state: state,
            openness: round_to(openness, 4),
            velocity: round_to(velocity, 5),
        }
    }

    /// Most recently derived state
    #[must_use]
    pub const fn state(&self) -> MouthState {
        self.state
    }

    /// Rolling window of recent samples, oldest first
    #[must_use]
    pub const fn history(&self) -> &VecDeque<f64> {
        &self.history
    }

    /// Consecutive frames with significant movement
    #[must_use]
    pub const fn talking_frames(&self) -> u32 {
        self.talking_frames
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
