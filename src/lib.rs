//! Phonix Gateway - speech and lip signals to haptic events
//!
//! This library provides the core functionality for the Phonix gateway:
//! - Microphone capture and the speech-haptic pipeline (energy, STT, phrases)
//! - Phoneme timeline playback for pre-authored lessons
//! - Mouth tracking and lip reading for camera sources
//! - A broadcast hub fanning events out to phones and dashboards
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Microphone  │   │   Timeline   │   │ /ws/video    │
//! │  → Pipeline  │   │   → Ticker   │   │ → Lip reader │
//! └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!        └──────────────────┼──────────────────┘
//!                    ┌──────▼───────┐
//!                    │   EventBus   │
//!                    └──────┬───────┘
//!                    ┌──────▼───────┐
//!                    │ BroadcastHub │ → sources / viewers
//!                    └──────────────┘
//! ```

pub mod api;
pub mod config;
pub mod daemon;
pub mod error;
pub mod events;
pub mod hub;
pub mod pipeline;
pub mod signal;
pub mod timeline;
pub mod vision;
pub mod voice;

pub use config::{Config, LoadOptions};
pub use daemon::Daemon;
pub use error::{Error, Result};
pub use events::{Event, EventBus, Target};
pub use hub::{BroadcastHub, EventSink, Role};
