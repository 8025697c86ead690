//! Capture: combined audio+video sinks and the session orchestrator.

pub mod ffmpeg;
pub mod orchestrator;
pub mod sink;

pub use ffmpeg::FfmpegCaptureSink;
pub use orchestrator::{CaptureOrchestrator, CaptureState};
pub use sink::{
    CaptureArtifact, CaptureConfig, CaptureSink, ENCODING_PREFERENCES, Encoding, MemoryCaptureSink,
};
