pub mod audio;
pub mod config;
pub mod flush;
pub mod session;
pub mod transcribe;
pub mod transcript;
pub mod waveform;

pub use audio::{
    AudioChunk, CaptureBackend, CaptureBackendFactory, CaptureConfig, CaptureSource,
    CaptureStreams, SampleWindow, SyntheticScript, SyntheticSegment,
};
pub use config::Config;
pub use flush::{FlushPolicy, FlushPolicyKind, FlushReason, SilenceConfig, SilenceDetector};
pub use session::{format_clock, CaptureSession, SessionConfig, SessionState, SessionStats};
pub use transcribe::{HttpTranscriber, Transcriber};
pub use transcript::{
    ConsoleSink, MemorySink, RendererConfig, TranscriptRenderer, TranscriptSink,
};
pub use waveform::{meter_line, Bar, Waveform, WaveformConfig};
