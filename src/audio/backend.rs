use anyhow::Result;
use tokio::sync::mpsc;

/// One opaque fragment of captured audio (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Chunk sequence number within the session (0-indexed)
    pub sequence: u32,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// A transient window of time-domain amplitudes from the live stream
///
/// Refreshed continuously while capturing; consumers read it and drop it.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    /// Normalized amplitudes in [-1.0, 1.0]
    pub amplitudes: Vec<f32>,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl SampleWindow {
    /// Maximum absolute amplitude over the window
    pub fn peak(&self) -> f32 {
        self.amplitudes.iter().fold(0.0f32, |max, s| max.max(s.abs()))
    }
}

/// Configuration for a capture backend
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Target sample rate (the device rate wins if they disagree)
    pub sample_rate: u32,
    /// Target channel count (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Amplitude window size in samples (analyser granularity)
    pub window_size: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // 16kHz, what transcription services expect
            channels: 1,        // Mono
            window_size: 512,
        }
    }
}

/// Live streams handed out by a running backend
///
/// Both channels close when the backend stops. The final chunk (if any
/// audio remains buffered) is delivered before `chunks` closes.
pub struct CaptureStreams {
    /// Captured-audio fragments, in arrival order
    pub chunks: mpsc::Receiver<AudioChunk>,
    /// Continuous amplitude windows for visualization and silence detection
    pub windows: mpsc::Receiver<SampleWindow>,
}

/// Audio capture backend trait
///
/// Implementations:
/// - Microphone: cpal default input device
/// - Synthetic: scripted amplitude source (for tests and demos)
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns the chunk and amplitude-window streams. Permission or
    /// device errors surface here as a recoverable `Err`; nothing is
    /// started in that case.
    async fn start(&mut self) -> Result<CaptureStreams>;

    /// Package everything accumulated since the last chunk into one
    /// `AudioChunk` and deliver it on the chunk stream
    ///
    /// A request with nothing accumulated delivers nothing.
    async fn request_chunk(&mut self) -> Result<()>;

    /// Stop capturing, flush the final chunk, and release the device
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Capture source type
#[derive(Debug, Clone)]
pub enum CaptureSource {
    /// Default microphone input
    Microphone,
    /// Scripted amplitude playback (for tests and demos)
    Synthetic(super::synthetic::SyntheticScript),
}

/// Capture backend factory
pub struct CaptureBackendFactory;

impl CaptureBackendFactory {
    /// Create a capture backend for the given source
    pub fn create(source: CaptureSource, config: CaptureConfig) -> Result<Box<dyn CaptureBackend>> {
        match source {
            CaptureSource::Microphone => {
                let backend = super::mic::MicrophoneBackend::new(config);
                Ok(Box::new(backend))
            }
            CaptureSource::Synthetic(script) => {
                let backend = super::synthetic::SyntheticBackend::new(config, script);
                Ok(Box::new(backend))
            }
        }
    }
}
