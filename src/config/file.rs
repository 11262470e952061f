//! TOML configuration file loading
//!
//! Supports `~/.config/phonix/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct PhonixConfigFile {
    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Speech-haptic pipeline tuning
    #[serde(default)]
    pub pipeline: PipelineFileConfig,

    /// Phoneme timeline playback
    #[serde(default)]
    pub timeline: TimelineFileConfig,

    /// Lip reading analysis
    #[serde(default)]
    pub lip_reading: LipReadingFileConfig,

    /// Face landmark detector
    #[serde(default)]
    pub landmarks: LandmarksFileConfig,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Bind address
    pub host: Option<String>,

    /// API server port
    pub port: Option<u16>,

    /// Directory served at `/static`
    pub static_dir: Option<String>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable microphone capture and speech services
    pub enabled: Option<bool>,

    /// STT provider ("elevenlabs", "whisper", "deepgram")
    pub stt_provider: Option<String>,

    /// STT model (e.g. "scribe_v2")
    pub stt_model: Option<String>,

    /// TTS provider ("elevenlabs", "openai")
    pub tts_provider: Option<String>,

    /// TTS model (e.g. "eleven_monolingual_v1")
    pub tts_model: Option<String>,

    /// TTS voice identifier
    pub tts_voice: Option<String>,

    /// TTS speed multiplier (OpenAI only)
    pub tts_speed: Option<f32>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub elevenlabs: Option<String>,
    pub openai: Option<String>,
    pub deepgram: Option<String>,
    pub gemini: Option<String>,
}

/// Pipeline thresholds and timings
#[derive(Debug, Default, Deserialize)]
pub struct PipelineFileConfig {
    pub silence_threshold: Option<f32>,
    pub speaking_threshold: Option<f32>,
    pub min_phrase_interval_ms: Option<u64>,
    pub transcription_timeout_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
}

/// Timeline configuration
#[derive(Debug, Default, Deserialize)]
pub struct TimelineFileConfig {
    pub tick_interval_ms: Option<u64>,

    /// "every_tick" or "once"
    pub trigger_mode: Option<String>,

    /// Lesson loaded at startup
    pub lesson: Option<String>,
}

/// Lip reading configuration
#[derive(Debug, Default, Deserialize)]
pub struct LipReadingFileConfig {
    pub enabled: Option<bool>,
    pub model: Option<String>,
    pub cooldown_ms: Option<u64>,
    pub min_frames: Option<usize>,
    pub max_frames: Option<usize>,
}

/// Landmark detector configuration
#[derive(Debug, Default, Deserialize)]
pub struct LandmarksFileConfig {
    /// Face-mesh sidecar endpoint
    pub url: Option<String>,
}

/// Parse a config document
///
/// # Errors
///
/// Returns error if the document is not valid TOML for this schema
pub fn parse_config_file(content: &str) -> Result<PhonixConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Load a config file from `path`
///
/// Returns `PhonixConfigFile::default()` if the file doesn't exist or can't be parsed.
#[must_use]
pub fn load_config_file_from(path: &Path) -> PhonixConfigFile {
    if !path.exists() {
        return PhonixConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match parse_config_file(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                PhonixConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            PhonixConfigFile::default()
        }
    }
}

/// Load the TOML config file from the standard path
#[must_use]
pub fn load_config_file() -> PhonixConfigFile {
    config_file_path().map_or_else(PhonixConfigFile::default, |p| load_config_file_from(&p))
}

/// Return the config file path: `$PHONIX_CONFIG` or `~/.config/phonix/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("PHONIX_CONFIG") {
        return Some(PathBuf::from(path));
    }
    directories::BaseDirs::new().map(|d| d.config_dir().join("phonix").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_parses() {
        let fc = parse_config_file(
            r#"
            [server]
            port = 9000

            [timeline]
            trigger_mode = "once"
            "#,
        )
        .unwrap();
        assert_eq!(fc.server.port, Some(9000));
        assert_eq!(fc.timeline.trigger_mode.as_deref(), Some("once"));
        assert!(fc.voice.enabled.is_none());
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();
        let fc = load_config_file_from(&path);
        assert!(fc.server.port.is_none());
    }

    #[test]
    fn missing_file_is_default() {
        let fc = load_config_file_from(Path::new("/nonexistent/phonix/config.toml"));
        assert!(fc.api_keys.gemini.is_none());
    }
}
