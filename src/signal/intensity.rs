//! Energy to haptic intensity mapping

use serde::{Deserialize, Serialize};

/// Energy below this is treated as silence
pub const SILENCE_THRESHOLD: f32 = 0.01;

const LOW_CEILING: f32 = 0.04;
const MEDIUM_CEILING: f32 = 0.10;
const HIGH_CEILING: f32 = 0.20;

/// Discrete haptic intensity tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Silence,
    Low,
    Medium,
    High,
    Burst,
}

impl Intensity {
    /// Vibration pattern for this tier, alternating vibrate/pause in ms
    #[must_use]
    pub const fn pattern(self) -> &'static [u32] {
        match self {
            Self::Silence => &[],
            Self::Low => &[30, 50, 30],
            Self::Medium => &[60, 40, 60],
            Self::High => &[80, 20, 80, 20, 80],
            Self::Burst => &[100, 15, 100, 15, 100, 15, 100],
        }
    }

    /// Tier name as sent on the wire
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Silence => "silence",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Burst => "burst",
        }
    }
}

impl std::fmt::Display for Intensity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clamp an energy value into `[0, 1]`, mapping NaN to zero
#[must_use]
pub fn clamp_energy(energy: f32) -> f32 {
    if energy.is_nan() {
        return 0.0;
    }
    energy.clamp(0.0, 1.0)
}

/// Classify a normalized energy level into an intensity tier
#[must_use]
pub fn classify(energy: f32) -> Intensity {
    let energy = clamp_energy(energy);
    if energy < SILENCE_THRESHOLD {
        Intensity::Silence
    } else if energy < LOW_CEILING {
        Intensity::Low
    } else if energy < MEDIUM_CEILING {
        Intensity::Medium
    } else if energy < HIGH_CEILING {
        Intensity::High
    } else {
        Intensity::Burst
    }
}
