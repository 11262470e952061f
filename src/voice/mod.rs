//! Voice processing module
//!
//! Handles microphone capture, chunking, and the hosted STT / TTS
//! collaborators.

mod capture;
mod chunk;
mod queue;
mod stt;
mod tts;

pub use capture::{AudioCapture, ChunkSource, CpalSource, FrameSource, SourceOpener};
pub use chunk::{
    AudioChunk, CHUNK_SAMPLES, CHUNK_SECONDS, SAMPLE_RATE, f32_to_i16, pcm_to_wav, rms_energy,
};
pub use queue::{ChunkQueue, QUEUE_CAPACITY};
pub use stt::{NullTranscriber, SpeechToText, SttProvider, Transcriber};
pub use tts::{DEFAULT_ELEVENLABS_VOICE, Synthesizer, TextToSpeech, TtsProvider};
