pub mod backend;
pub mod mic;
pub mod synthetic;
pub mod wav;

pub use backend::{
    AudioChunk, CaptureBackend, CaptureBackendFactory, CaptureConfig, CaptureSource,
    CaptureStreams, SampleWindow,
};
pub use mic::MicrophoneBackend;
pub use synthetic::{SyntheticBackend, SyntheticScript, SyntheticSegment};
pub use wav::chunks_to_wav;
