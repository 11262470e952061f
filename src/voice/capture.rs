//! Audio capture from microphone
//!
//! The device is owned by a dedicated OS thread so blocking reads never
//! stall the async runtime. Finished chunks are handed over through a
//! [`ChunkQueue`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};

use super::chunk::{AudioChunk, CHUNK_SAMPLES, SAMPLE_RATE, f32_to_i16};
use super::queue::ChunkQueue;
use crate::{Error, Result};

/// Backoff after a failed frame read
const READ_BACKOFF: Duration = Duration::from_millis(100);

/// Upper bound on waiting for the capture thread to exit
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// How long a single read waits for the device before reporting a stall
const FRAME_TIMEOUT: Duration = Duration::from_millis(500);

/// Buffered device callbacks before frames are dropped
const FRAME_BACKLOG: usize = 64;

/// A blocking source of 16-bit mono frames at [`SAMPLE_RATE`]
///
/// Opened and used entirely on the capture thread, so implementations do
/// not need to be `Send`.
pub trait FrameSource {
    /// Read the next frame of samples
    ///
    /// # Errors
    ///
    /// Returns error on a transient read failure; the capture loop backs
    /// off and retries
    fn read_frame(&mut self) -> Result<Vec<i16>>;
}

/// Opens a [`FrameSource`] on the capture thread
pub type SourceOpener = Arc<dyn Fn() -> Result<Box<dyn FrameSource>> + Send + Sync>;

/// Something the orchestrator can pull chunks from
pub trait ChunkSource: Send + Sync {
    /// Begin producing chunks
    ///
    /// # Errors
    ///
    /// Returns error if the underlying device cannot be opened
    fn start(&self) -> Result<()>;

    /// Stop producing chunks; safe to call repeatedly
    fn stop(&self);

    /// Take the oldest pending chunk without blocking
    fn pop(&self) -> Option<AudioChunk>;
}

struct CaptureWorker {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
    done: Receiver<()>,
}

/// Captures audio from an input device on a dedicated thread
pub struct AudioCapture {
    opener: SourceOpener,
    queue: Arc<ChunkQueue>,
    worker: Mutex<Option<CaptureWorker>>,
}

impl AudioCapture {
    /// Capture from the default input device
    #[must_use]
    pub fn new() -> Self {
        Self::with_opener(Arc::new(|| {
            CpalSource::open().map(|s| Box::new(s) as Box<dyn FrameSource>)
        }))
    }

    /// Capture from a custom frame source
    #[must_use]
    pub fn with_opener(opener: SourceOpener) -> Self {
        Self {
            opener,
            queue: Arc::new(ChunkQueue::default()),
            worker: Mutex::new(None),
        }
    }

    /// Shared handle to the chunk queue
    #[must_use]
    pub fn queue(&self) -> Arc<ChunkQueue> {
        Arc::clone(&self.queue)
    }

    /// Check if currently capturing
    #[must_use]
    pub fn is_capturing(&self) -> bool {
        self.worker.lock().map(|w| w.is_some()).unwrap_or(false)
    }

    /// Start capturing audio
    ///
    /// Blocks until the device has been opened on the capture thread.
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be opened
    pub fn start(&self) -> Result<()> {
        let mut worker = self
            .worker
            .lock()
            .map_err(|_| Error::Audio("capture state poisoned".to_string()))?;
        if worker.is_some() {
            return Ok(());
        }

        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);
        let (done_tx, done_rx) = mpsc::sync_channel::<()>(1);

        let opener = Arc::clone(&self.opener);
        let queue = Arc::clone(&self.queue);
        let flag = Arc::clone(&running);

        let handle = std::thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                capture_thread(&opener, &queue, &flag, &ready_tx);
                let _ = done_tx.send(());
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(Error::Audio("capture thread exited during startup".to_string()));
            }
        }

        *worker = Some(CaptureWorker {
            running,
            handle,
            done: done_rx,
        });

        tracing::info!(sample_rate = SAMPLE_RATE, "audio capture started");
        Ok(())
    }

    /// Stop capturing audio
    pub fn stop(&self) {
        let worker = self.worker.lock().ok().and_then(|mut w| w.take());
        let Some(worker) = worker else {
            return;
        };

        worker.running.store(false, Ordering::SeqCst);
        match worker.done.recv_timeout(JOIN_TIMEOUT) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.handle.join().is_err() {
                    tracing::error!("audio capture thread panicked");
                }
                tracing::info!("audio capture stopped");
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    timeout_ms = JOIN_TIMEOUT.as_millis(),
                    "audio capture thread did not exit in time, detaching"
                );
            }
        }
    }

    /// Take the oldest captured chunk, if any
    #[must_use]
    pub fn pop(&self) -> Option<AudioChunk> {
        self.queue.pop()
    }
}

impl Default for AudioCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

impl ChunkSource for AudioCapture {
    fn start(&self) -> Result<()> {
        Self::start(self)
    }

    fn stop(&self) {
        Self::stop(self);
    }

    fn pop(&self) -> Option<AudioChunk> {
        Self::pop(self)
    }
}

/// Body of the capture thread: open, report readiness, then loop
fn capture_thread(
    opener: &SourceOpener,
    queue: &ChunkQueue,
    running: &AtomicBool,
    ready: &SyncSender<Result<()>>,
) {
    let mut source = match opener() {
        Ok(source) => {
            let _ = ready.send(Ok(()));
            source
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to open audio device");
            let _ = ready.send(Err(e));
            return;
        }
    };

    let mut pending: Vec<i16> = Vec::with_capacity(CHUNK_SAMPLES * 2);
    while running.load(Ordering::SeqCst) {
        match source.read_frame() {
            Ok(frame) => {
                pending.extend_from_slice(&frame);
                while pending.len() >= CHUNK_SAMPLES {
                    let chunk = AudioChunk::from_samples(&pending[..CHUNK_SAMPLES]);
                    pending.drain(..CHUNK_SAMPLES);
                    tracing::trace!(energy = chunk.energy(), "chunk captured");
                    queue.push(chunk);
                }
            }
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    tracing::warn!(error = %e, "mic read error, retrying");
                    std::thread::sleep(READ_BACKOFF);
                }
            }
        }
    }

    // Dropping the source releases the device
    drop(source);
}

/// Default input device via cpal
pub struct CpalSource {
    _stream: Stream,
    frames: Receiver<Vec<f32>>,
}

impl CpalSource {
    /// Open the default input device at 16kHz mono
    ///
    /// # Errors
    ///
    /// Returns error if no suitable device or config is available
    pub fn open() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no suitable audio config found".to_string()))?;

        let config: StreamConfig = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            channels = config.channels,
            "audio device opened"
        );

        let (tx, rx) = mpsc::sync_channel::<Vec<f32>>(FRAME_BACKLOG);
        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // A full backlog means the reader is behind; drop the frame
                    let _ = tx.try_send(data.to_vec());
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            frames: rx,
        })
    }
}

impl FrameSource for CpalSource {
    fn read_frame(&mut self) -> Result<Vec<i16>> {
        match self.frames.recv_timeout(FRAME_TIMEOUT) {
            Ok(samples) => Ok(f32_to_i16(&samples)),
            Err(RecvTimeoutError::Timeout) => {
                Err(Error::Audio("no audio frames received".to_string()))
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(Error::Audio("audio stream closed".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Emits 100ms frames of a constant amplitude, failing every `fail_every` reads
    struct ScriptedSource {
        amplitude: i16,
        reads: Arc<AtomicUsize>,
        fail_every: usize,
    }

    impl FrameSource for ScriptedSource {
        fn read_frame(&mut self) -> Result<Vec<i16>> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
            std::thread::sleep(Duration::from_millis(1));
            if self.fail_every > 0 && n % self.fail_every == 0 {
                return Err(Error::Audio("scripted failure".to_string()));
            }
            Ok(vec![self.amplitude; 1600])
        }
    }

    fn scripted(amplitude: i16, fail_every: usize) -> (AudioCapture, Arc<AtomicUsize>) {
        let reads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reads);
        let capture = AudioCapture::with_opener(Arc::new(move || {
            Ok(Box::new(ScriptedSource {
                amplitude,
                reads: Arc::clone(&counter),
                fail_every,
            }) as Box<dyn FrameSource>)
        }));
        (capture, reads)
    }

    fn wait_for_chunk(capture: &AudioCapture) -> AudioChunk {
        for _ in 0..500 {
            if let Some(chunk) = capture.pop() {
                return chunk;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("no chunk produced");
    }

    #[test]
    fn produces_chunks_with_energy() {
        let (capture, _) = scripted(3277, 0);
        capture.start().unwrap();
        let chunk = wait_for_chunk(&capture);
        capture.stop();

        assert_eq!(chunk.pcm().len(), CHUNK_SAMPLES * 2);
        assert!((chunk.energy() - 0.1).abs() < 0.001);
    }

    #[test]
    fn open_failure_is_surfaced() {
        let capture = AudioCapture::with_opener(Arc::new(|| {
            Err(Error::Audio("no input device available".to_string()))
        }));
        let err = capture.start().unwrap_err();
        assert!(matches!(err, Error::Audio(_)));
        assert!(!capture.is_capturing());
    }

    #[test]
    fn transient_read_errors_do_not_stop_capture() {
        let (capture, reads) = scripted(1000, 3);
        capture.start().unwrap();
        let _ = wait_for_chunk(&capture);
        assert!(reads.load(Ordering::SeqCst) >= 3);
        assert!(capture.is_capturing());
        capture.stop();
    }

    #[test]
    fn stop_is_idempotent() {
        let (capture, _) = scripted(0, 0);
        capture.stop();
        capture.start().unwrap();
        capture.start().unwrap();
        capture.stop();
        capture.stop();
        assert!(!capture.is_capturing());
    }
}
