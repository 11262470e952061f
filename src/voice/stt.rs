//! Speech-to-text (STT) processing

use std::time::Duration;

use async_trait::async_trait;

use crate::{Error, Result};

/// Per-request HTTP timeout for transcription uploads
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Converts WAV audio into text
///
/// Implementations never fail: any backend problem is logged and yields an
/// empty transcript so the caller can move on to the next chunk.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe WAV bytes, returning an empty string when nothing was heard
    async fn transcribe(&self, wav: &[u8]) -> String;
}

/// Transcriber used when no STT key is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTranscriber;

#[async_trait]
impl Transcriber for NullTranscriber {
    async fn transcribe(&self, _wav: &[u8]) -> String {
        String::new()
    }
}

/// Response from ElevenLabs Scribe
#[derive(serde::Deserialize)]
struct ScribeResponse {
    #[serde(default)]
    text: Option<String>,
}

/// Response from OpenAI Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Response from Deepgram transcription API
#[derive(serde::Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

/// STT provider backend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SttProvider {
    #[default]
    ElevenLabs,
    Whisper,
    Deepgram,
}

impl SttProvider {
    /// Model used when none is configured
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::ElevenLabs => "scribe_v2",
            Self::Whisper => "whisper-1",
            Self::Deepgram => "nova-2",
        }
    }
}

impl std::str::FromStr for SttProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "elevenlabs" | "scribe" => Ok(Self::ElevenLabs),
            "whisper" | "openai" => Ok(Self::Whisper),
            "deepgram" => Ok(Self::Deepgram),
            other => Err(Error::Config(format!("unknown STT provider: {other}"))),
        }
    }
}

/// Transcribes speech to text through a hosted API
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: String,
    model: String,
    provider: SttProvider,
}

impl SpeechToText {
    /// Create a new STT instance for the given provider
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing or the HTTP client cannot be built
    pub fn new(provider: SttProvider, api_key: String, model: Option<String>) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(format!("{provider:?} API key required for STT")));
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: model.unwrap_or_else(|| provider.default_model().to_string()),
            provider,
        })
    }

    /// Create a new STT instance using ElevenLabs Scribe
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_elevenlabs(api_key: String) -> Result<Self> {
        Self::new(SttProvider::ElevenLabs, api_key, None)
    }

    /// Create a new STT instance using `OpenAI` Whisper
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_whisper(api_key: String, model: String) -> Result<Self> {
        Self::new(SttProvider::Whisper, api_key, Some(model))
    }

    /// Create a new STT instance using Deepgram
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_deepgram(api_key: String, model: String) -> Result<Self> {
        Self::new(SttProvider::Deepgram, api_key, Some(model))
    }

    /// Active provider
    #[must_use]
    pub const fn provider(&self) -> SttProvider {
        self.provider
    }

    /// Transcribe audio to text
    ///
    /// # Arguments
    ///
    /// * `audio` - WAV audio bytes
    ///
    /// # Errors
    ///
    /// Returns error if transcription fails
    pub async fn try_transcribe(&self, audio: &[u8]) -> Result<String> {
        let text = match self.provider {
            SttProvider::ElevenLabs => self.transcribe_elevenlabs(audio).await?,
            SttProvider::Whisper => self.transcribe_whisper(audio).await?,
            SttProvider::Deepgram => self.transcribe_deepgram(audio).await?,
        };
        Ok(text.trim().to_string())
    }

    fn wav_part(audio: &[u8]) -> Result<reqwest::multipart::Part> {
        reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| Error::Stt(e.to_string()))
    }

    /// Transcribe using ElevenLabs Scribe
    async fn transcribe_elevenlabs(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Scribe transcription");

        let form = reqwest::multipart::Form::new()
            .part("file", Self::wav_part(audio)?)
            .text("model_id", self.model.clone());

        let response = self
            .client
            .post("https://api.elevenlabs.io/v1/speech-to-text")
            .header("xi-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Stt(format!("ElevenLabs STT error {status}: {body}")));
        }

        let result: ScribeResponse = response.json().await?;
        Ok(result.text.unwrap_or_default())
    }

    /// Transcribe using OpenAI Whisper
    async fn transcribe_whisper(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part("file", Self::wav_part(audio)?)
            .text("model", self.model.clone());

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/transcriptions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await?;
        Ok(result.text)
    }

    /// Transcribe using Deepgram
    async fn transcribe_deepgram(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Deepgram transcription");

        let url = format!(
            "https://api.deepgram.com/v1/listen?model={}&punctuate=true",
            self.model
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "audio/wav")
            .body(audio.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Stt(format!("Deepgram API error {status}: {body}")));
        }

        let result: DeepgramResponse = response.json().await?;

        Ok(result
            .results
            .channels
            .first()
            .and_then(|c| c.alternatives.first())
            .map(|a| a.transcript.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl Transcriber for SpeechToText {
    async fn transcribe(&self, wav: &[u8]) -> String {
        match self.try_transcribe(wav).await {
            Ok(text) => {
                if !text.is_empty() {
                    tracing::info!(transcript = %text, "transcription complete");
                }
                text
            }
            Err(e) => {
                tracing::warn!(provider = ?self.provider, error = %e, "transcription failed");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_rejected() {
        let result = SpeechToText::new_elevenlabs(String::new());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn provider_defaults_to_scribe_model() {
        let stt = SpeechToText::new(SttProvider::ElevenLabs, "key".into(), None).unwrap();
        assert_eq!(stt.model, "scribe_v2");
        assert_eq!(stt.provider(), SttProvider::ElevenLabs);
    }

    #[test]
    fn provider_parses_aliases() {
        assert_eq!("OpenAI".parse::<SttProvider>().unwrap(), SttProvider::Whisper);
        assert_eq!("deepgram".parse::<SttProvider>().unwrap(), SttProvider::Deepgram);
        assert!("vosk".parse::<SttProvider>().is_err());
    }

    #[tokio::test]
    async fn null_transcriber_hears_nothing() {
        assert!(NullTranscriber.transcribe(b"RIFF").await.is_empty());
    }
}
