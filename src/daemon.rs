//! Daemon - the main gateway service
//!
//! Wires the hub, the event bus, the timeline ticker, the speech-haptic
//! pipeline and the vision collaborators into one API server.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::api::ApiServerBuilder;
use crate::config::Config;
use crate::events::{BUS_CAPACITY, EventBus, run_dispatcher};
use crate::hub::BroadcastHub;
use crate::pipeline::SpeechHapticPipeline;
use crate::timeline::{PhonemeTimeline, SharedTimeline, spawn_ticker};
use crate::vision::{
    GeminiLipReader, HttpLandmarkProvider, LandmarkProvider, LipAnalyzer, LipHistory, NoLandmarks,
};
use crate::voice::{
    AudioCapture, NullTranscriber, SpeechToText, Synthesizer, TextToSpeech, Transcriber,
    TtsProvider,
};
use crate::Result;

/// The Phonix daemon
pub struct Daemon {
    config: Config,
}

impl Daemon {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Build the timeline, loading the startup lesson if one is configured
    ///
    /// # Errors
    ///
    /// Returns error if the configured lesson cannot be loaded
    pub fn build_timeline(&self) -> Result<SharedTimeline> {
        let mut timeline = PhonemeTimeline::new(self.config.timeline.trigger_mode);
        if let Some(path) = &self.config.timeline.lesson_path {
            timeline.load_file(path)?;
        }
        Ok(Arc::new(Mutex::new(timeline)))
    }

    /// Pick the transcriber for the configured provider
    fn build_transcriber(&self) -> Arc<dyn Transcriber> {
        let provider = self.config.voice.stt_provider;
        let Some(key) = self.config.stt_key() else {
            tracing::warn!(?provider, "no STT key configured, transcription disabled");
            return Arc::new(NullTranscriber);
        };

        match SpeechToText::new(provider, key.to_string(), self.config.voice.stt_model.clone()) {
            Ok(stt) => {
                tracing::info!(?provider, "speech-to-text initialized");
                Arc::new(stt)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to initialize speech-to-text");
                Arc::new(NullTranscriber)
            }
        }
    }

    fn build_synthesizer(&self) -> Option<Arc<dyn Synthesizer>> {
        let key = self.config.tts_key()?.to_string();
        let voice = &self.config.voice;
        let tts = match voice.tts_provider {
            TtsProvider::ElevenLabs => {
                TextToSpeech::new_elevenlabs(key, voice.tts_voice.clone(), voice.tts_model.clone())
            }
            TtsProvider::OpenAI => TextToSpeech::new_openai(
                key,
                voice.tts_voice.clone(),
                voice.tts_speed,
                voice.tts_model.clone(),
            ),
        };

        match tts {
            Ok(tts) => {
                tracing::info!(provider = ?voice.tts_provider, "text-to-speech initialized");
                Some(Arc::new(tts))
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to initialize text-to-speech");
                None
            }
        }
    }

    fn build_landmarks(&self) -> Arc<dyn LandmarkProvider> {
        let Some(url) = &self.config.landmarks_url else {
            tracing::info!("no landmark detector configured, relying on device openness");
            return Arc::new(NoLandmarks);
        };

        match HttpLandmarkProvider::new(url.clone()) {
            Ok(provider) => {
                tracing::info!(url = %url, "landmark detector configured");
                Arc::new(provider)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to initialize landmark detector");
                Arc::new(NoLandmarks)
            }
        }
    }

    fn build_lip_analyzer(&self) -> Option<Arc<dyn LipAnalyzer>> {
        let lip = &self.config.lip_reading;
        if !lip.enabled {
            tracing::info!("lip reading disabled");
            return None;
        }
        let Some(key) = self.config.api_keys.gemini.clone() else {
            tracing::info!("lip reading disabled - no GEMINI_API_KEY");
            return None;
        };

        match GeminiLipReader::new(key, lip.model.clone(), lip.session.max_frames) {
            Ok(reader) => {
                tracing::info!(model = %lip.model, "lip reading enabled");
                Some(Arc::new(reader))
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to initialize lip reader");
                None
            }
        }
    }

    /// Run the daemon until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if the startup lesson is invalid or the API server
    /// fails to bind
    pub async fn run(self) -> Result<()> {
        let hub = Arc::new(BroadcastHub::new());
        let (bus, bus_rx) = EventBus::new(BUS_CAPACITY);
        let dispatcher = tokio::spawn(run_dispatcher(bus_rx, Arc::clone(&hub)));

        let timeline = self.build_timeline()?;
        let ticker = spawn_ticker(
            Arc::clone(&timeline),
            bus.clone(),
            self.config.timeline.tick_interval,
        );

        let pipeline = if self.config.voice.enabled {
            let pipeline = Arc::new(SpeechHapticPipeline::new(
                Arc::new(AudioCapture::new()),
                self.build_transcriber(),
                bus.clone(),
                self.config.pipeline.clone(),
            ));
            // A missing microphone should not take the dashboard down with it
            if let Err(e) = pipeline.start().await {
                tracing::error!(error = %e, "speech-haptic pipeline failed to start");
            }
            Some(pipeline)
        } else {
            tracing::info!("voice disabled - speech-haptic pipeline not available");
            None
        };

        let mut api_builder = ApiServerBuilder::new(Arc::clone(&hub), bus.clone(), timeline)
            .host(self.config.server.host.clone())
            .port(self.config.server.port)
            .static_dir(self.config.server.static_dir.clone())
            .landmarks(self.build_landmarks())
            .lip_history(Arc::new(LipHistory::default()))
            .lip_config(self.config.lip_reading.session.clone());

        if let Some(pipeline) = &pipeline {
            api_builder = api_builder.pipeline(Arc::clone(pipeline));
        }
        if let Some(tts) = self.build_synthesizer() {
            api_builder = api_builder.tts(tts);
        }
        if let Some(analyzer) = self.build_lip_analyzer() {
            api_builder = api_builder.lip_analyzer(analyzer);
        }

        let mut server = api_builder.build().spawn();
        tracing::info!(port = self.config.server.port, "phonix gateway running");

        let result = tokio::select! {
            joined = &mut server => match joined {
                Ok(result) => result,
                Err(e) => Err(crate::Error::Transport(format!("API server task failed: {e}"))),
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown requested");
                server.abort();
                Ok(())
            }
        };

        if let Some(pipeline) = pipeline {
            pipeline.stop().await;
        }
        ticker.abort();
        dispatcher.abort();

        tracing::info!("daemon stopped");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    use crate::timeline::TriggerMode;

    #[tokio::test]
    async fn startup_lesson_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"phonemes": [{{"id": "a", "type": "vowel", "start": 0.0, "duration": 0.5}}]}}"#
        )
        .unwrap();

        let mut config = Config::default();
        config.timeline.lesson_path = Some(file.path().to_path_buf());
        config.timeline.trigger_mode = TriggerMode::Once;

        let timeline = Daemon::new(config).build_timeline().unwrap();
        let timeline = timeline.lock().await;
        assert_eq!(timeline.phonemes().len(), 1);
        assert_eq!(timeline.trigger_mode(), TriggerMode::Once);
    }

    #[test]
    fn bad_startup_lesson_is_fatal() {
        let mut config = Config::default();
        config.timeline.lesson_path = Some("/nonexistent/lesson.json".into());
        assert!(Daemon::new(config).build_timeline().is_err());
    }

    #[test]
    fn missing_keys_disable_collaborators() {
        let daemon = Daemon::new(Config::default());
        assert!(daemon.build_synthesizer().is_none());
        assert!(daemon.build_lip_analyzer().is_none());
    }
}
