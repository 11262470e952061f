//! Error types for the Phonix gateway

use thiserror::Error;

/// Result type alias for Phonix operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Phonix gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device or capture error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Vision / lip reading error
    #[error("vision error: {0}")]
    Vision(String),

    /// Lesson (phoneme sequence) could not be loaded
    #[error("lesson error: {0}")]
    Lesson(String),

    /// Speech-haptic pipeline error
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// Outbound connection or event bus failure
    #[error("transport error: {0}")]
    Transport(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
