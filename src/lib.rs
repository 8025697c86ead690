//! Spectrum Studio renders a real-time, audio-reactive visual composition
//! (spectrum graphic, background image, logo overlay, particle field) and can
//! capture the composition plus its audio into a single video file spanning an
//! ordered playlist of tracks.
//!
//! The public API is session-oriented:
//!
//! - Configure a [`VisualSettings`] document
//! - Create a [`Studio`] around an [`AudioEngine`]
//! - Drive [`Studio::tick`] once per display refresh
//! - Start a capture into a [`CaptureSink`] to export the playlist
#![forbid(unsafe_code)]

mod foundation;

pub mod analysis;
pub mod capture;
pub mod playback;
pub mod render;
pub mod settings;
pub mod studio;

pub use crate::foundation::core::{Canvas, Fps, FrameIndex, Rgba8};
pub use crate::foundation::error::{StudioError, StudioResult};

pub use crate::capture::orchestrator::{CaptureOrchestrator, CaptureState};
pub use crate::capture::sink::{
    CaptureArtifact, CaptureConfig, CaptureSink, ENCODING_PREFERENCES, Encoding, MemoryCaptureSink,
};
pub use crate::playback::engine::{AudioEngine, WavEngine};
pub use crate::playback::events::PlaybackEvent;
pub use crate::playback::sequencer::{PlaybackSequencer, PlaybackState, PlaylistItem};
pub use crate::render::frame::FrameRGBA;
pub use crate::render::renderer::FrameRenderer;
pub use crate::settings::{BgFilter, SpectrumStyle, VisualSettings};
pub use crate::studio::Studio;
