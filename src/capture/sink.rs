//! Combined audio+video capture sink contract.

use crate::foundation::core::{FrameIndex, Fps};
use crate::foundation::error::{StudioError, StudioResult};
use crate::render::frame::FrameRGBA;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Output encoding choice: container plus codec pair.
///
/// Closed set matching the capture preference probe; the first mutually
/// supported entry of [`ENCODING_PREFERENCES`] wins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// MP4 container, H.264 video, AAC audio.
    Mp4H264Aac,
    /// MP4 container, H.264 video, default audio.
    Mp4H264,
    /// WebM container, VP9 video, Opus audio.
    WebmVp9Opus,
    /// WebM container, VP8 video, Opus audio.
    WebmVp8Opus,
    /// WebM container, default codecs.
    Webm,
}

/// Ordered capture encoding preference list, most preferred first.
pub const ENCODING_PREFERENCES: [Encoding; 5] = [
    Encoding::Mp4H264Aac,
    Encoding::Mp4H264,
    Encoding::WebmVp9Opus,
    Encoding::WebmVp8Opus,
    Encoding::Webm,
];

impl Encoding {
    /// File extension of the container.
    pub fn container_extension(self) -> &'static str {
        match self {
            Encoding::Mp4H264Aac | Encoding::Mp4H264 => "mp4",
            Encoding::WebmVp9Opus | Encoding::WebmVp8Opus | Encoding::Webm => "webm",
        }
    }

    pub(crate) fn video_encoder(self) -> &'static str {
        match self {
            Encoding::Mp4H264Aac | Encoding::Mp4H264 => "libx264",
            Encoding::WebmVp9Opus => "libvpx-vp9",
            Encoding::WebmVp8Opus | Encoding::Webm => "libvpx",
        }
    }

    pub(crate) fn audio_encoder(self) -> &'static str {
        match self {
            Encoding::Mp4H264Aac | Encoding::Mp4H264 => "aac",
            Encoding::WebmVp9Opus | Encoding::WebmVp8Opus | Encoding::Webm => "libopus",
        }
    }
}

/// Configuration handed to a [`CaptureSink`] when a session begins.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Video sampling rate.
    pub fps: Fps,
    /// Selected output encoding.
    pub encoding: Encoding,
    /// Target video bitrate, bits per second.
    pub video_bitrate: u32,
    /// Audio tap sample rate in Hz.
    pub audio_sample_rate: u32,
    /// Audio tap channel count.
    pub audio_channels: u16,
}

/// Summary of a finalized capture.
#[derive(Debug, Clone)]
pub struct CaptureArtifact {
    /// Output file, when the sink writes one.
    pub path: Option<PathBuf>,
    /// Video frames captured.
    pub frames: u64,
    /// Interleaved audio samples captured.
    pub audio_samples: u64,
}

/// Sink contract for one continuous audio+video capture session.
///
/// Ordering contract: `push_frame` is called in strictly increasing
/// [`FrameIndex`] order for the lifetime of the session, and `begin`/`end`
/// bracket the session exactly once. A multi-track capture never stops and
/// restarts the sink at track boundaries.
pub trait CaptureSink {
    /// Whether this sink can produce the given encoding.
    fn supports(&self, encoding: Encoding) -> bool;

    /// Open the session. Called once, before any media is pushed.
    fn begin(&mut self, cfg: CaptureConfig) -> StudioResult<()>;

    /// Push one video frame in strictly increasing timeline order.
    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> StudioResult<()>;

    /// Push the interleaved audio samples accompanying the last frame.
    fn push_audio(&mut self, samples: &[f32]) -> StudioResult<()>;

    /// Flush and finalize the output artifact. Called once.
    fn end(&mut self) -> StudioResult<CaptureArtifact>;
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct MemoryCaptureSink {
    supported: Option<Vec<Encoding>>,
    cfg: Option<CaptureConfig>,
    /// Times `begin` was called; a seamless session sees exactly one.
    pub begin_calls: u32,
    /// Frame indices in arrival order.
    pub frames: Vec<FrameIndex>,
    /// Interleaved audio samples in arrival order.
    pub audio: Vec<f32>,
    /// Whether `end` has been called.
    pub ended: bool,
}

impl MemoryCaptureSink {
    /// Sink that supports every encoding.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink restricted to the given encodings (empty = supports none).
    pub fn with_supported(supported: Vec<Encoding>) -> Self {
        Self {
            supported: Some(supported),
            ..Default::default()
        }
    }

    /// The configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<CaptureConfig> {
        self.cfg.clone()
    }
}

impl CaptureSink for MemoryCaptureSink {
    fn supports(&self, encoding: Encoding) -> bool {
        match &self.supported {
            None => true,
            Some(list) => list.contains(&encoding),
        }
    }

    fn begin(&mut self, cfg: CaptureConfig) -> StudioResult<()> {
        self.begin_calls += 1;
        self.cfg = Some(cfg);
        self.frames.clear();
        self.audio.clear();
        self.ended = false;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> StudioResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| StudioError::capture("memory sink not started"))?;
        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(StudioError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }
        if let Some(last) = self.frames.last()
            && idx.0 <= last.0
        {
            return Err(StudioError::capture(
                "memory sink received out-of-order frame index",
            ));
        }
        self.frames.push(idx);
        Ok(())
    }

    fn push_audio(&mut self, samples: &[f32]) -> StudioResult<()> {
        if self.cfg.is_none() {
            return Err(StudioError::capture("memory sink not started"));
        }
        self.audio.extend_from_slice(samples);
        Ok(())
    }

    fn end(&mut self) -> StudioResult<CaptureArtifact> {
        if self.cfg.is_none() {
            return Err(StudioError::capture("memory sink not started"));
        }
        self.ended = true;
        Ok(CaptureArtifact {
            path: None,
            frames: self.frames.len() as u64,
            audio_samples: self.audio.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> CaptureConfig {
        CaptureConfig {
            width: 16,
            height: 16,
            fps: Fps::display(),
            encoding: Encoding::Mp4H264Aac,
            video_bitrate: 8_000_000,
            audio_sample_rate: 44_100,
            audio_channels: 2,
        }
    }

    fn frame() -> FrameRGBA {
        FrameRGBA {
            width: 16,
            height: 16,
            data: vec![0; 16 * 16 * 4],
            premultiplied: true,
        }
    }

    #[test]
    fn preference_order_matches_capability_probe() {
        assert_eq!(ENCODING_PREFERENCES[0], Encoding::Mp4H264Aac);
        assert_eq!(ENCODING_PREFERENCES[4], Encoding::Webm);
        assert_eq!(Encoding::Mp4H264Aac.container_extension(), "mp4");
        assert_eq!(Encoding::WebmVp8Opus.container_extension(), "webm");
    }

    #[test]
    fn memory_sink_enforces_frame_order() {
        let mut sink = MemoryCaptureSink::new();
        sink.begin(cfg()).unwrap();
        sink.push_frame(FrameIndex(0), &frame()).unwrap();
        sink.push_frame(FrameIndex(1), &frame()).unwrap();
        assert!(sink.push_frame(FrameIndex(1), &frame()).is_err());
    }

    #[test]
    fn memory_sink_rejects_media_before_begin() {
        let mut sink = MemoryCaptureSink::new();
        assert!(sink.push_frame(FrameIndex(0), &frame()).is_err());
        assert!(sink.push_audio(&[0.0]).is_err());
        assert!(sink.end().is_err());
    }

    #[test]
    fn restricted_sink_reports_support() {
        let sink = MemoryCaptureSink::with_supported(vec![Encoding::Webm]);
        assert!(!sink.supports(Encoding::Mp4H264Aac));
        assert!(sink.supports(Encoding::Webm));

        let none = MemoryCaptureSink::with_supported(Vec::new());
        assert!(ENCODING_PREFERENCES.iter().all(|e| !none.supports(*e)));
    }

    #[test]
    fn artifact_counts_media() {
        let mut sink = MemoryCaptureSink::new();
        sink.begin(cfg()).unwrap();
        sink.push_frame(FrameIndex(0), &frame()).unwrap();
        sink.push_audio(&[0.1, 0.2, 0.3, 0.4]).unwrap();
        let art = sink.end().unwrap();
        assert_eq!(art.frames, 1);
        assert_eq!(art.audio_samples, 4);
        assert!(art.path.is_none());
    }
}
