//! Captured audio chunks

use chrono::{DateTime, Utc};

use crate::signal::clamp_energy;
use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Duration of one chunk handed to the orchestrator, in seconds
pub const CHUNK_SECONDS: f64 = 1.2;

/// Samples per chunk at [`SAMPLE_RATE`] (1.2 s)
pub const CHUNK_SAMPLES: usize = SAMPLE_RATE as usize * 6 / 5;

/// A fixed-duration segment of mono 16-bit PCM with its energy
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pcm: Vec<u8>,
    energy: f32,
    captured_at: DateTime<Utc>,
}

impl AudioChunk {
    /// Build a chunk from samples, computing its normalized energy
    #[must_use]
    pub fn from_samples(samples: &[i16]) -> Self {
        let pcm = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self {
            pcm,
            energy: rms_energy(samples),
            captured_at: Utc::now(),
        }
    }

    /// Build a chunk with an explicit energy value (clamped to `[0, 1]`)
    #[must_use]
    pub fn with_energy(pcm: Vec<u8>, energy: f32) -> Self {
        Self {
            pcm,
            energy: clamp_energy(energy),
            captured_at: Utc::now(),
        }
    }

    /// Raw little-endian PCM bytes
    #[must_use]
    pub fn pcm(&self) -> &[u8] {
        &self.pcm
    }

    /// Normalized RMS energy in `[0, 1]`
    #[must_use]
    pub const fn energy(&self) -> f32 {
        self.energy
    }

    /// Capture time
    #[must_use]
    pub const fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Wrap the PCM payload in a WAV container for STT uploads
    ///
    /// # Errors
    ///
    /// Returns error if WAV encoding fails
    pub fn to_wav(&self) -> Result<Vec<u8>> {
        let samples: Vec<i16> = self
            .pcm
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        pcm_to_wav(&samples, SAMPLE_RATE)
    }
}

/// Root-mean-square energy of 16-bit samples, normalized to `[0, 1]`
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn rms_energy(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    let rms = (sum_squares / samples.len() as f64).sqrt();
    clamp_energy((rms / f64::from(i16::MAX)) as f32)
}

/// Convert f32 samples in `[-1.0, 1.0]` to 16-bit PCM
#[must_use]
pub fn f32_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&sample| {
            #[allow(clippy::cast_possible_truncation)]
            let value = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            value
        })
        .collect()
}

/// Encode 16-bit mono samples as WAV bytes
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn pcm_to_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
