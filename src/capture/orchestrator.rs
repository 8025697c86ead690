//! Capture session lifecycle.
//!
//! The orchestrator owns the one-at-a-time [`CaptureSink`] session and, while
//! a session is active, overrides the sequencer's default track-ended policy:
//! the *same* sink continues across track boundaries, which is what makes the
//! artifact a single seamless file spanning the whole playlist.

use crate::capture::sink::{
    CaptureArtifact, CaptureConfig, CaptureSink, ENCODING_PREFERENCES, Encoding,
};
use crate::foundation::core::{Canvas, Fps, FrameIndex};
use crate::foundation::error::{StudioError, StudioResult};
use crate::playback::engine::AudioEngine;
use crate::playback::sequencer::{PlaybackSequencer, PlaybackState};
use crate::render::frame::FrameRGBA;
use tracing::{info, warn};

/// Capture lifecycle state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CaptureState {
    #[default]
    Inactive,
    Starting,
    Active,
    Finalizing,
}

struct CaptureSession {
    sink: Box<dyn CaptureSink>,
    encoding: Encoding,
    next_frame: u64,
    /// 1-based position of the track currently being captured.
    track_pos: usize,
}

/// Owns the capture-session lifecycle. Exactly one session at a time.
#[derive(Default)]
pub struct CaptureOrchestrator {
    state: CaptureState,
    session: Option<CaptureSession>,
    status: String,
    last_artifact: Option<CaptureArtifact>,
}

impl CaptureOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == CaptureState::Active
    }

    /// Status text for display ("Recording track 2/3", "Finalizing...", "").
    pub fn status(&self) -> &str {
        &self.status
    }

    /// The artifact produced by the most recently finalized session.
    pub fn last_artifact(&self) -> Option<&CaptureArtifact> {
        self.last_artifact.as_ref()
    }

    /// The encoding selected for the active session.
    pub fn encoding(&self) -> Option<Encoding> {
        self.session.as_ref().map(|s| s.encoding)
    }

    /// Open a capture session and begin playback at playlist index 0.
    ///
    /// Fails without side effects when the playlist is empty or no encoding
    /// in the preference list is supported; in both cases the sequencer is
    /// untouched and the state remains INACTIVE.
    pub fn start_capture(
        &mut self,
        mut sink: Box<dyn CaptureSink>,
        canvas: Canvas,
        fps: Fps,
        video_bitrate: u32,
        sequencer: &mut PlaybackSequencer,
        engine: &mut dyn AudioEngine,
    ) -> StudioResult<()> {
        if self.state != CaptureState::Inactive {
            return Err(StudioError::capture("a capture session is already active"));
        }
        if sequencer.items().is_empty() {
            return Err(StudioError::validation(
                "cannot start capture with an empty playlist",
            ));
        }

        let Some(encoding) = ENCODING_PREFERENCES
            .iter()
            .copied()
            .find(|e| sink.supports(*e))
        else {
            return Err(StudioError::unsupported(
                "no supported capture encoding among the preference list",
            ));
        };

        self.state = CaptureState::Starting;
        let cfg = CaptureConfig {
            width: canvas.width,
            height: canvas.height,
            fps,
            encoding,
            video_bitrate,
            audio_sample_rate: engine.sample_rate(),
            audio_channels: engine.channels(),
        };
        if let Err(e) = sink.begin(cfg) {
            self.state = CaptureState::Inactive;
            self.status = format!("Capture failed: {e}");
            return Err(e);
        }

        // Capture always starts from the top of the playlist, regardless of
        // whatever track was previously current.
        let track_count = sequencer.items().len();
        if let Err(e) = sequencer.play_track(0, engine) {
            let _ = sink.end();
            self.state = CaptureState::Inactive;
            self.status = format!("Capture failed: {e}");
            return Err(e);
        }
        if sequencer.state() != PlaybackState::Playing {
            let _ = sink.end();
            self.state = CaptureState::Inactive;
            self.status = "Capture failed: playback did not start".to_owned();
            return Err(StudioError::playback(
                "playback did not start; capture aborted",
            ));
        }

        info!(?encoding, tracks = track_count, "capture session started");
        self.session = Some(CaptureSession {
            sink,
            encoding,
            next_frame: 0,
            track_pos: 1,
        });
        self.status = format!("Recording track 1/{track_count}");
        self.state = CaptureState::Active;
        Ok(())
    }

    /// Push one tick of media into the active session. No-op when inactive.
    pub fn push_media(&mut self, frame: &FrameRGBA, samples: &[f32]) -> StudioResult<()> {
        if self.state != CaptureState::Active {
            return Ok(());
        }
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        session
            .sink
            .push_frame(FrameIndex(session.next_frame), frame)?;
        session.next_frame += 1;
        session.sink.push_audio(samples)?;
        Ok(())
    }

    /// Track-ended policy while capturing: continue the same session into the
    /// next track, or finalize after the last one.
    pub fn handle_track_ended(
        &mut self,
        sequencer: &mut PlaybackSequencer,
        engine: &mut dyn AudioEngine,
    ) -> StudioResult<()> {
        if self.state != CaptureState::Active {
            return Ok(());
        }
        let track_count = sequencer.items().len();
        let cur = sequencer.current_index().unwrap_or(0);

        if cur + 1 < track_count {
            // Same sink, next track: no stop/restart at the boundary.
            sequencer.play_track(cur + 1, engine)?;
            if let Some(session) = self.session.as_mut() {
                session.track_pos += 1;
                self.status = format!("Recording track {}/{track_count}", session.track_pos);
            }
            Ok(())
        } else {
            self.finalize(engine).map(|_| ())
        }
    }

    /// Stop the session explicitly. Valid mid-track; the artifact finalizes
    /// with whatever was captured. Returns `None` when nothing was active.
    pub fn stop_capture(
        &mut self,
        engine: &mut dyn AudioEngine,
    ) -> StudioResult<Option<CaptureArtifact>> {
        match self.state {
            CaptureState::Inactive | CaptureState::Finalizing => Ok(None),
            CaptureState::Starting | CaptureState::Active => self.finalize(engine),
        }
    }

    /// Mid-capture resource loss: finalize whatever was captured rather than
    /// losing it silently. Errors are logged, not propagated.
    pub fn implicit_stop(&mut self, engine: &mut dyn AudioEngine) {
        if let Err(e) = self.finalize(engine) {
            warn!(error = %e, "capture finalization after sink failure");
        }
    }

    fn finalize(
        &mut self,
        engine: &mut dyn AudioEngine,
    ) -> StudioResult<Option<CaptureArtifact>> {
        self.state = CaptureState::Finalizing;
        self.status = "Finalizing...".to_owned();
        engine.pause();

        let result = match self.session.take() {
            Some(mut session) => session.sink.end().map(Some),
            None => Ok(None),
        };

        // Whatever happened, the session is gone: never a half-open state.
        self.state = CaptureState::Inactive;
        match result {
            Ok(artifact) => {
                self.status = String::new();
                if let Some(a) = &artifact {
                    info!(frames = a.frames, audio_samples = a.audio_samples, "capture finalized");
                    self.last_artifact = Some(a.clone());
                }
                Ok(artifact)
            }
            Err(e) => {
                self.status = format!("Capture failed: {e}");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::sink::MemoryCaptureSink;
    use crate::playback::events::PlaybackEvent;
    use crate::playback::sequencer::PlaylistItem;
    use std::path::{Path, PathBuf};

    #[derive(Default)]
    struct StubEngine {
        playing: bool,
        loaded: Vec<PathBuf>,
    }

    impl AudioEngine for StubEngine {
        fn load(&mut self, source: &Path) -> StudioResult<()> {
            self.loaded.push(source.to_path_buf());
            Ok(())
        }
        fn play(&mut self) -> StudioResult<()> {
            self.playing = true;
            Ok(())
        }
        fn pause(&mut self) {
            self.playing = false;
        }
        fn seek(&mut self, _secs: f64) {}
        fn position_secs(&self) -> f64 {
            0.0
        }
        fn duration_secs(&self) -> Option<f64> {
            None
        }
        fn is_playing(&self) -> bool {
            self.playing
        }
        fn sample_rate(&self) -> u32 {
            44_100
        }
        fn channels(&self) -> u16 {
            2
        }
        fn advance(&mut self, _dt_secs: f64) {}
        fn tap_samples(&self) -> &[f32] {
            &[]
        }
        fn frequency_snapshot(&mut self) -> &[u8] {
            &[]
        }
        fn poll_events(&mut self) -> Vec<PlaybackEvent> {
            Vec::new()
        }
    }

    fn seq_with(n: usize) -> PlaybackSequencer {
        let mut s = PlaybackSequencer::new();
        for i in 0..n {
            s.add_item(PlaylistItem::new(format!("/t/{i}.wav"), format!("t{i}")));
        }
        s
    }

    fn canvas() -> Canvas {
        Canvas {
            width: 16,
            height: 16,
        }
    }

    #[test]
    fn empty_playlist_is_rejected_before_any_session() {
        let mut orch = CaptureOrchestrator::new();
        let mut seq = PlaybackSequencer::new();
        let mut eng = StubEngine::default();
        let err = orch
            .start_capture(
                Box::new(MemoryCaptureSink::new()),
                canvas(),
                Fps::display(),
                8_000_000,
                &mut seq,
                &mut eng,
            )
            .unwrap_err();
        assert!(matches!(err, StudioError::Validation(_)));
        assert_eq!(orch.state(), CaptureState::Inactive);
    }

    #[test]
    fn unsupported_encodings_leave_everything_untouched() {
        let mut orch = CaptureOrchestrator::new();
        let mut seq = seq_with(2);
        let mut eng = StubEngine::default();
        seq.play_track(1, &mut eng).unwrap();

        let err = orch
            .start_capture(
                Box::new(MemoryCaptureSink::with_supported(Vec::new())),
                canvas(),
                Fps::display(),
                8_000_000,
                &mut seq,
                &mut eng,
            )
            .unwrap_err();
        assert!(matches!(err, StudioError::Unsupported(_)));
        assert_eq!(orch.state(), CaptureState::Inactive);
        // Sequencer state is untouched by a failed start.
        assert_eq!(seq.current_index(), Some(1));
        assert_eq!(seq.state(), PlaybackState::Playing);
    }

    #[test]
    fn capture_starts_from_track_zero_and_selects_preferred_encoding() {
        let mut orch = CaptureOrchestrator::new();
        let mut seq = seq_with(3);
        let mut eng = StubEngine::default();
        seq.play_track(2, &mut eng).unwrap();

        orch.start_capture(
            Box::new(MemoryCaptureSink::with_supported(vec![
                Encoding::WebmVp8Opus,
                Encoding::Webm,
            ])),
            canvas(),
            Fps::display(),
            8_000_000,
            &mut seq,
            &mut eng,
        )
        .unwrap();

        assert_eq!(orch.state(), CaptureState::Active);
        assert_eq!(seq.current_index(), Some(0), "capture restarts at track 0");
        assert_eq!(eng.loaded.last().map(|p| p.as_path()), Some(Path::new("/t/0.wav")));
        assert_eq!(orch.encoding(), Some(Encoding::WebmVp8Opus));
        assert_eq!(orch.status(), "Recording track 1/3");
    }

    #[test]
    fn second_session_is_rejected_while_active() {
        let mut orch = CaptureOrchestrator::new();
        let mut seq = seq_with(1);
        let mut eng = StubEngine::default();
        orch.start_capture(
            Box::new(MemoryCaptureSink::new()),
            canvas(),
            Fps::display(),
            8_000_000,
            &mut seq,
            &mut eng,
        )
        .unwrap();

        let err = orch
            .start_capture(
                Box::new(MemoryCaptureSink::new()),
                canvas(),
                Fps::display(),
                8_000_000,
                &mut seq,
                &mut eng,
            )
            .unwrap_err();
        assert!(matches!(err, StudioError::Capture(_)));
    }

    #[test]
    fn stop_mid_track_finalizes_and_pauses() {
        let mut orch = CaptureOrchestrator::new();
        let mut seq = seq_with(2);
        let mut eng = StubEngine::default();
        orch.start_capture(
            Box::new(MemoryCaptureSink::new()),
            canvas(),
            Fps::display(),
            8_000_000,
            &mut seq,
            &mut eng,
        )
        .unwrap();

        let frame = FrameRGBA {
            width: 16,
            height: 16,
            data: vec![0; 16 * 16 * 4],
            premultiplied: true,
        };
        orch.push_media(&frame, &[0.0; 4]).unwrap();
        orch.push_media(&frame, &[0.0; 4]).unwrap();

        let artifact = orch.stop_capture(&mut eng).unwrap().unwrap();
        assert_eq!(artifact.frames, 2);
        assert_eq!(artifact.audio_samples, 8);
        assert_eq!(orch.state(), CaptureState::Inactive);
        assert!(!eng.playing, "stop pauses playback");
        assert_eq!(orch.status(), "");

        // Stopping again is a quiet no-op.
        assert!(orch.stop_capture(&mut eng).unwrap().is_none());
    }

    #[test]
    fn push_media_outside_active_session_is_a_noop() {
        let mut orch = CaptureOrchestrator::new();
        let frame = FrameRGBA {
            width: 16,
            height: 16,
            data: vec![0; 16 * 16 * 4],
            premultiplied: true,
        };
        orch.push_media(&frame, &[0.0; 4]).unwrap();
        assert_eq!(orch.state(), CaptureState::Inactive);
    }
}
