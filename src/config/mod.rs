//! Configuration management for the Phonix gateway
//!
//! Precedence for every setting: CLI flag > environment > config file >
//! default.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use file::PhonixConfigFile;

use crate::pipeline::{MAX_TRANSCRIPTION_TIMEOUT, MIN_PHRASE_INTERVAL, PipelineConfig};
use crate::timeline::{TICK_INTERVAL, TriggerMode};
use crate::vision::LipReadingConfig;
use crate::voice::{DEFAULT_ELEVENLABS_VOICE, SttProvider, TtsProvider};
use crate::{Error, Result};

/// Default API server port
pub const DEFAULT_PORT: u16 = 8000;

/// Default lip reading model
pub const DEFAULT_LIP_MODEL: &str = "gemini-2.0-flash";

/// Phonix gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP API server configuration
    pub server: ServerConfig,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// API keys
    pub api_keys: ApiKeys,

    /// Speech-haptic pipeline tuning
    pub pipeline: PipelineConfig,

    /// Timeline playback configuration
    pub timeline: TimelineConfig,

    /// Lip reading configuration
    pub lip_reading: LipReadingSettings,

    /// Face-mesh sidecar URL, if any
    pub landmarks_url: Option<String>,
}

/// HTTP API server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Path to static files directory (dashboard)
    pub static_dir: Option<PathBuf>,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable microphone capture and the speech-haptic pipeline
    pub enabled: bool,

    pub stt_provider: SttProvider,

    /// STT model; provider default when unset
    pub stt_model: Option<String>,

    pub tts_provider: TtsProvider,

    /// TTS model identifier
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f32,
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `ElevenLabs` API key (Scribe STT and TTS)
    pub elevenlabs: Option<String>,

    /// `OpenAI` API key (Whisper and TTS)
    pub openai: Option<String>,

    /// `Deepgram` API key (optional STT)
    pub deepgram: Option<String>,

    /// Google Gemini API key (lip reading)
    pub gemini: Option<String>,
}

/// Timeline configuration
#[derive(Debug, Clone)]
pub struct TimelineConfig {
    /// Ticker period
    pub tick_interval: Duration,

    /// Retrigger policy
    pub trigger_mode: TriggerMode,

    /// Lesson loaded at startup
    pub lesson_path: Option<PathBuf>,
}

/// Lip reading configuration
#[derive(Debug, Clone)]
pub struct LipReadingSettings {
    /// Analyze frames when a Gemini key is present
    pub enabled: bool,

    /// Gemini model name
    pub model: String,

    /// Session gating
    pub session: LipReadingConfig,
}

/// Command-line overrides
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub port: Option<u16>,
    pub disable_voice: bool,
    pub lesson: Option<PathBuf>,
}

fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("yes")
}

fn parse_env<T: std::str::FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    env(key).and_then(|v| v.trim().parse().ok())
}

fn millis(value: Option<u64>, default: Duration) -> Duration {
    value.map_or(default, Duration::from_millis)
}

impl Config {
    /// Load configuration from the config file and the process environment
    ///
    /// # Errors
    ///
    /// Returns error if a setting has an invalid value
    pub fn load(options: &LoadOptions) -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok(), options)
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a provider name or trigger mode is unknown
    #[allow(clippy::too_many_lines)]
    pub fn from_sources(
        fc: PhonixConfigFile,
        env: impl Fn(&str) -> Option<String>,
        options: &LoadOptions,
    ) -> Result<Self> {
        // Server config (cli > env > toml > default)
        let server = ServerConfig {
            host: env("PHONIX_HOST")
                .or(fc.server.host)
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            port: options
                .port
                .or_else(|| parse_env(&env, "PHONIX_PORT"))
                .or_else(|| parse_env(&env, "PORT"))
                .or(fc.server.port)
                .unwrap_or(DEFAULT_PORT),
            static_dir: env("PHONIX_STATIC_DIR")
                .or(fc.server.static_dir)
                .map(PathBuf::from),
        };

        let api_keys = ApiKeys {
            elevenlabs: env("ELEVENLABS_API_KEY").or(fc.api_keys.elevenlabs),
            openai: env("OPENAI_API_KEY").or(fc.api_keys.openai),
            deepgram: env("DEEPGRAM_API_KEY").or(fc.api_keys.deepgram),
            gemini: env("GEMINI_API_KEY").or(fc.api_keys.gemini),
        }
        .non_empty();

        // Voice config (cli > env > toml > default)
        let voice_enabled = if options.disable_voice {
            false
        } else {
            env("PHONIX_VOICE_ENABLED")
                .map(|v| parse_bool(&v))
                .or(fc.voice.enabled)
                .unwrap_or(true)
        };
        let stt_provider = env("PHONIX_STT_PROVIDER")
            .or(fc.voice.stt_provider)
            .map(|s| s.parse::<SttProvider>())
            .transpose()?
            .unwrap_or_default();
        let tts_provider = env("PHONIX_TTS_PROVIDER")
            .or(fc.voice.tts_provider)
            .map(|s| s.parse::<TtsProvider>())
            .transpose()?
            .unwrap_or_default();
        let (default_tts_model, default_tts_voice) = match tts_provider {
            TtsProvider::ElevenLabs => ("eleven_monolingual_v1", DEFAULT_ELEVENLABS_VOICE),
            TtsProvider::OpenAI => ("tts-1", "alloy"),
        };
        let voice = VoiceConfig {
            enabled: voice_enabled,
            stt_provider,
            stt_model: env("PHONIX_STT_MODEL").or(fc.voice.stt_model),
            tts_provider,
            tts_model: env("PHONIX_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| default_tts_model.to_string()),
            tts_voice: env("PHONIX_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or_else(|| default_tts_voice.to_string()),
            tts_speed: fc.voice.tts_speed.unwrap_or(1.0).clamp(0.25, 4.0),
        };

        if options.disable_voice {
            tracing::info!("voice explicitly disabled via --disable-voice");
        }

        // Pipeline tuning (env > toml > default)
        let defaults = PipelineConfig::default();
        let pipeline = PipelineConfig {
            silence_threshold: parse_env(&env, "PHONIX_SILENCE_THRESHOLD")
                .or(fc.pipeline.silence_threshold)
                .unwrap_or(defaults.silence_threshold),
            speaking_threshold: parse_env(&env, "PHONIX_SPEAKING_THRESHOLD")
                .or(fc.pipeline.speaking_threshold)
                .unwrap_or(defaults.speaking_threshold),
            min_phrase_interval: millis(
                parse_env(&env, "PHONIX_MIN_PHRASE_INTERVAL_MS").or(fc.pipeline.min_phrase_interval_ms),
                defaults.min_phrase_interval,
            ),
            transcription_timeout: millis(
                parse_env(&env, "PHONIX_TRANSCRIPTION_TIMEOUT_MS")
                    .or(fc.pipeline.transcription_timeout_ms),
                defaults.transcription_timeout,
            ),
            poll_interval: millis(fc.pipeline.poll_interval_ms, defaults.poll_interval),
        };
        if pipeline.speaking_threshold < pipeline.silence_threshold {
            return Err(Error::Config(
                "speaking threshold must not be below the silence threshold".to_string(),
            ));
        }
        if pipeline.min_phrase_interval < MIN_PHRASE_INTERVAL {
            return Err(Error::Config(format!(
                "min phrase interval must be at least {}ms",
                MIN_PHRASE_INTERVAL.as_millis()
            )));
        }
        if pipeline.transcription_timeout.is_zero()
            || pipeline.transcription_timeout > MAX_TRANSCRIPTION_TIMEOUT
        {
            return Err(Error::Config(format!(
                "transcription timeout must be between 1ms and {}s",
                MAX_TRANSCRIPTION_TIMEOUT.as_secs()
            )));
        }

        // Timeline (cli > env > toml > default)
        let timeline = TimelineConfig {
            tick_interval: millis(
                parse_env(&env, "PHONIX_TICK_INTERVAL_MS").or(fc.timeline.tick_interval_ms),
                TICK_INTERVAL,
            ),
            trigger_mode: env("PHONIX_TRIGGER_MODE")
                .or(fc.timeline.trigger_mode)
                .map(|s| s.parse::<TriggerMode>())
                .transpose()?
                .unwrap_or_default(),
            lesson_path: options
                .lesson
                .clone()
                .or_else(|| env("PHONIX_LESSON").map(PathBuf::from))
                .or_else(|| fc.timeline.lesson.map(PathBuf::from)),
        };
        if timeline.tick_interval.is_zero() {
            return Err(Error::Config("tick interval must be positive".to_string()));
        }

        // Lip reading (env > toml > default)
        let session_defaults = LipReadingConfig::default();
        let lip_reading = LipReadingSettings {
            enabled: env("PHONIX_LIP_READING")
                .map(|v| parse_bool(&v))
                .or(fc.lip_reading.enabled)
                .unwrap_or(true),
            model: env("PHONIX_LIP_MODEL")
                .or(fc.lip_reading.model)
                .unwrap_or_else(|| DEFAULT_LIP_MODEL.to_string()),
            session: LipReadingConfig {
                cooldown: millis(
                    parse_env(&env, "PHONIX_LIP_COOLDOWN_MS").or(fc.lip_reading.cooldown_ms),
                    session_defaults.cooldown,
                ),
                min_frames: fc.lip_reading.min_frames.unwrap_or(session_defaults.min_frames),
                max_frames: fc.lip_reading.max_frames.unwrap_or(session_defaults.max_frames),
            },
        };
        if lip_reading.session.min_frames > lip_reading.session.max_frames {
            return Err(Error::Config(
                "lip reading min_frames must not exceed max_frames".to_string(),
            ));
        }

        let landmarks_url = env("PHONIX_LANDMARKS_URL").or(fc.landmarks.url);

        Ok(Self {
            server,
            voice,
            api_keys,
            pipeline,
            timeline,
            lip_reading,
            landmarks_url,
        })
    }

    /// Key for the configured STT provider
    #[must_use]
    pub fn stt_key(&self) -> Option<&str> {
        match self.voice.stt_provider {
            SttProvider::ElevenLabs => self.api_keys.elevenlabs.as_deref(),
            SttProvider::Whisper => self.api_keys.openai.as_deref(),
            SttProvider::Deepgram => self.api_keys.deepgram.as_deref(),
        }
    }

    /// Key for the configured TTS provider
    #[must_use]
    pub fn tts_key(&self) -> Option<&str> {
        match self.voice.tts_provider {
            TtsProvider::ElevenLabs => self.api_keys.elevenlabs.as_deref(),
            TtsProvider::OpenAI => self.api_keys.openai.as_deref(),
        }
    }
}

impl ApiKeys {
    /// Treat empty strings as unset
    fn non_empty(self) -> Self {
        let keep = |k: Option<String>| k.filter(|v| !v.trim().is_empty());
        Self {
            elevenlabs: keep(self.elevenlabs),
            openai: keep(self.openai),
            deepgram: keep(self.deepgram),
            gemini: keep(self.gemini),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: DEFAULT_PORT,
                static_dir: None,
            },
            voice: VoiceConfig {
                enabled: true,
                stt_provider: SttProvider::default(),
                stt_model: None,
                tts_provider: TtsProvider::default(),
                tts_model: "eleven_monolingual_v1".to_string(),
                tts_voice: DEFAULT_ELEVENLABS_VOICE.to_string(),
                tts_speed: 1.0,
            },
            api_keys: ApiKeys::default(),
            pipeline: PipelineConfig::default(),
            timeline: TimelineConfig {
                tick_interval: TICK_INTERVAL,
                trigger_mode: TriggerMode::default(),
                lesson_path: None,
            },
            lip_reading: LipReadingSettings {
                enabled: true,
                model: DEFAULT_LIP_MODEL.to_string(),
                session: LipReadingConfig::default(),
            },
            landmarks_url: None,
        }
    }
}
