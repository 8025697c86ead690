//! Single-threaded cooperative driver.
//!
//! One [`Studio::tick`] per display refresh: queued playback events are fully
//! processed first (so the track-ended decision for track `k` lands before
//! any frame of track `k + 1`), then the engine advances by one frame
//! duration, the frame renders, and the capture session receives the frame
//! plus the audio tap. Nothing in the loop blocks, and a failed render only
//! skips that frame's visual update.

use crate::capture::orchestrator::{CaptureOrchestrator, CaptureState};
use crate::capture::sink::{CaptureArtifact, CaptureSink};
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::StudioResult;
use crate::playback::engine::AudioEngine;
use crate::playback::events::PlaybackEvent;
use crate::playback::sequencer::{PlaybackSequencer, PlaybackState, PlaylistItem};
use crate::render::frame::FrameRGBA;
use crate::render::renderer::{AudioSnapshot, FrameRenderer};
use crate::settings::VisualSettings;
use std::collections::VecDeque;
use std::path::Path;
use tracing::warn;

/// Top-level owner of the renderer, sequencer, capture orchestrator, and the
/// audio engine, plus the single inbound event queue.
pub struct Studio {
    settings: VisualSettings,
    renderer: FrameRenderer,
    sequencer: PlaybackSequencer,
    capture: CaptureOrchestrator,
    engine: Box<dyn AudioEngine>,
    events: VecDeque<PlaybackEvent>,
    fps: Fps,
    last_frame: Option<FrameRGBA>,
}

impl Studio {
    /// Create a studio over the given engine and surface size.
    pub fn new(
        engine: Box<dyn AudioEngine>,
        canvas: Canvas,
        settings: VisualSettings,
    ) -> StudioResult<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            renderer: FrameRenderer::new(canvas)?,
            sequencer: PlaybackSequencer::new(),
            capture: CaptureOrchestrator::new(),
            engine,
            events: VecDeque::new(),
            fps: Fps::display(),
            last_frame: None,
        })
    }

    // --- playlist -----------------------------------------------------------

    pub fn add_track(&mut self, source: impl Into<std::path::PathBuf>, name: impl Into<String>) {
        self.sequencer.add_item(PlaylistItem::new(source, name));
    }

    pub fn remove_track(&mut self, index: usize) {
        self.sequencer.remove_item(index, self.engine.as_mut());
    }

    pub fn reorder_tracks(&mut self, from: usize, to: usize) {
        self.sequencer.reorder(from, to);
    }

    pub fn tracks(&self) -> &[PlaylistItem] {
        self.sequencer.items()
    }

    pub fn current_track_index(&self) -> Option<usize> {
        self.sequencer.current_index()
    }

    // --- transport ----------------------------------------------------------

    pub fn play_track(&mut self, index: usize) -> StudioResult<()> {
        self.sequencer.play_track(index, self.engine.as_mut())
    }

    pub fn toggle_play(&mut self) -> StudioResult<()> {
        self.sequencer.toggle_play(self.engine.as_mut())
    }

    pub fn seek(&mut self, secs: f64) {
        self.sequencer.seek(secs, self.engine.as_mut());
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.sequencer.state()
    }

    pub fn is_playing(&self) -> bool {
        self.engine.is_playing()
    }

    pub fn position_secs(&self) -> f64 {
        self.engine.position_secs()
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.engine.duration_secs()
    }

    // --- configuration ------------------------------------------------------

    pub fn settings(&self) -> &VisualSettings {
        &self.settings
    }

    /// Replace the settings snapshot; visible at the next frame boundary.
    pub fn set_settings(&mut self, settings: VisualSettings) -> StudioResult<()> {
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    /// Load (or clear) the background image. A load failure leaves the
    /// current background untouched; rendering is never blocked on it.
    pub fn set_background_image(&mut self, path: Option<&Path>) {
        set_image(path, "background", |bytes| {
            self.renderer.set_background_image(bytes)
        });
    }

    /// Load (or clear) the logo image, with the same failure policy.
    pub fn set_logo_image(&mut self, path: Option<&Path>) {
        set_image(path, "logo", |bytes| self.renderer.set_logo_image(bytes));
    }

    // --- capture ------------------------------------------------------------

    /// Open a capture session on the given sink and restart playback from
    /// playlist index 0.
    pub fn start_capture(&mut self, sink: Box<dyn CaptureSink>) -> StudioResult<()> {
        self.capture.start_capture(
            sink,
            self.renderer.canvas(),
            self.fps,
            self.settings.video_bitrate,
            &mut self.sequencer,
            self.engine.as_mut(),
        )
    }

    /// Stop the active capture session, finalizing the artifact.
    pub fn stop_capture(&mut self) -> StudioResult<Option<CaptureArtifact>> {
        self.capture.stop_capture(self.engine.as_mut())
    }

    pub fn capture_state(&self) -> CaptureState {
        self.capture.state()
    }

    pub fn capture_status(&self) -> &str {
        self.capture.status()
    }

    pub fn last_artifact(&self) -> Option<&CaptureArtifact> {
        self.capture.last_artifact()
    }

    // --- render loop --------------------------------------------------------

    /// Run one iteration of the render loop.
    pub fn tick(&mut self) -> StudioResult<()> {
        for ev in self.engine.poll_events() {
            self.events.push_back(ev);
        }
        while let Some(ev) = self.events.pop_front() {
            self.handle_event(ev);
        }

        self.engine.advance(self.fps.frame_duration_secs());

        // Live bands whenever samples flowed this tick; otherwise the idle
        // animation keeps the preview moving.
        let live = self.engine.is_playing() || !self.engine.tap_samples().is_empty();
        let rendered = if live {
            let sample_rate = self.engine.sample_rate();
            let magnitudes = self.engine.frequency_snapshot();
            self.renderer.render(
                &self.settings,
                Some(AudioSnapshot {
                    magnitudes,
                    sample_rate,
                }),
            )
        } else {
            self.renderer.render(&self.settings, None)
        };

        match rendered {
            Ok(frame) => {
                if self.capture.is_active() {
                    let samples = self.engine.tap_samples();
                    if let Err(e) = self.capture.push_media(&frame, samples) {
                        warn!(error = %e, "capture sink failed; finalizing what was captured");
                        self.capture.implicit_stop(self.engine.as_mut());
                    }
                }
                self.last_frame = Some(frame);
            }
            Err(e) => {
                // Equivalent to skipping this frame's visual update.
                warn!(error = %e, "frame render failed; skipping visual update");
            }
        }
        Ok(())
    }

    /// The most recently rendered frame, for display.
    pub fn last_frame(&self) -> Option<&FrameRGBA> {
        self.last_frame.as_ref()
    }

    fn handle_event(&mut self, ev: PlaybackEvent) {
        match ev {
            PlaybackEvent::DurationKnown(secs) => self.sequencer.set_current_duration(secs),
            PlaybackEvent::TrackEnded => {
                if self.capture.is_active() {
                    if let Err(e) = self
                        .capture
                        .handle_track_ended(&mut self.sequencer, self.engine.as_mut())
                    {
                        warn!(error = %e, "capture continuation failed; finalizing");
                        self.capture.implicit_stop(self.engine.as_mut());
                    }
                } else if let Err(e) = self.sequencer.handle_track_ended(self.engine.as_mut()) {
                    warn!(error = %e, "auto-advance failed");
                }
            }
        }
    }
}

fn set_image(
    path: Option<&Path>,
    what: &str,
    mut apply: impl FnMut(Option<&[u8]>) -> StudioResult<()>,
) {
    match path {
        None => {
            let _ = apply(None);
        }
        Some(p) => match std::fs::read(p) {
            Ok(bytes) => {
                if let Err(e) = apply(Some(&bytes)) {
                    warn!(path = %p.display(), error = %e, "{what} image rejected; keeping previous");
                }
            }
            Err(e) => {
                warn!(path = %p.display(), error = %e, "{what} image unreadable; keeping previous");
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::error::StudioError;
    use std::path::PathBuf;

    const STUB_RATE: u32 = 48_000;

    /// Engine stub that synthesizes a fixed-length track per load, on an
    /// integer sample clock like the real engine.
    struct ScriptedEngine {
        playing: bool,
        pos: usize,
        total_frames: usize,
        pending: Vec<PlaybackEvent>,
        tap: Vec<f32>,
        snapshot: Vec<u8>,
    }

    impl ScriptedEngine {
        fn new(duration_secs: f64) -> Self {
            Self {
                playing: false,
                pos: 0,
                total_frames: (duration_secs * f64::from(STUB_RATE)).round() as usize,
                pending: Vec::new(),
                tap: Vec::new(),
                snapshot: vec![128; 1024],
            }
        }

        fn duration(&self) -> f64 {
            self.total_frames as f64 / f64::from(STUB_RATE)
        }
    }

    impl AudioEngine for ScriptedEngine {
        fn load(&mut self, _source: &Path) -> StudioResult<()> {
            self.pos = 0;
            self.playing = false;
            self.pending
                .push(PlaybackEvent::DurationKnown(self.duration()));
            Ok(())
        }
        fn play(&mut self) -> StudioResult<()> {
            self.playing = true;
            Ok(())
        }
        fn pause(&mut self) {
            self.playing = false;
        }
        fn seek(&mut self, secs: f64) {
            self.pos = ((secs.max(0.0) * f64::from(STUB_RATE)) as usize).min(self.total_frames);
        }
        fn position_secs(&self) -> f64 {
            self.pos as f64 / f64::from(STUB_RATE)
        }
        fn duration_secs(&self) -> Option<f64> {
            Some(self.duration())
        }
        fn is_playing(&self) -> bool {
            self.playing
        }
        fn sample_rate(&self) -> u32 {
            STUB_RATE
        }
        fn channels(&self) -> u16 {
            2
        }
        fn advance(&mut self, dt_secs: f64) {
            self.tap.clear();
            if !self.playing {
                return;
            }
            let want = (dt_secs * f64::from(STUB_RATE)).round() as usize;
            let take = want.min(self.total_frames - self.pos);
            self.tap = vec![0.1; take * 2];
            self.pos += take;
            if self.pos >= self.total_frames {
                self.playing = false;
                self.pending.push(PlaybackEvent::TrackEnded);
            }
        }
        fn tap_samples(&self) -> &[f32] {
            &self.tap
        }
        fn frequency_snapshot(&mut self) -> &[u8] {
            &self.snapshot
        }
        fn poll_events(&mut self) -> Vec<PlaybackEvent> {
            std::mem::take(&mut self.pending)
        }
    }

    fn studio_with_tracks(n: usize, track_secs: f64) -> Studio {
        let mut studio = Studio::new(
            Box::new(ScriptedEngine::new(track_secs)),
            Canvas {
                width: 64,
                height: 36,
            },
            VisualSettings {
                band_count: 8,
                particles_enabled: false,
                ..Default::default()
            },
        )
        .unwrap();
        for i in 0..n {
            studio.add_track(PathBuf::from(format!("/t/{i}.wav")), format!("t{i}"));
        }
        studio
    }

    #[test]
    fn rejects_invalid_settings_up_front() {
        let err = Studio::new(
            Box::new(ScriptedEngine::new(1.0)),
            Canvas {
                width: 64,
                height: 36,
            },
            VisualSettings {
                band_count: 0,
                ..Default::default()
            },
        )
        .err()
        .unwrap();
        assert!(matches!(err, StudioError::Validation(_)));
    }

    #[test]
    fn idle_ticks_produce_frames_without_any_tracks() {
        let mut studio = studio_with_tracks(0, 1.0);
        studio.tick().unwrap();
        studio.tick().unwrap();
        let frame = studio.last_frame().unwrap();
        assert_eq!(frame.width, 64);
        assert!(!studio.is_playing());
    }

    #[test]
    fn duration_event_lands_on_playlist_item() {
        let mut studio = studio_with_tracks(2, 42.0);
        studio.play_track(0).unwrap();
        studio.tick().unwrap();
        assert_eq!(studio.tracks()[0].duration_secs, Some(42.0));
    }

    #[test]
    fn auto_advance_without_capture() {
        let mut studio = studio_with_tracks(2, 0.05);
        studio.toggle_play().unwrap();
        for _ in 0..12 {
            studio.tick().unwrap();
        }
        assert_eq!(studio.current_track_index(), Some(1));
        for _ in 0..12 {
            studio.tick().unwrap();
        }
        assert_eq!(studio.playback_state(), PlaybackState::Ended);
        assert!(!studio.is_playing());
    }

    #[test]
    fn missing_image_files_never_block_rendering() {
        let mut studio = studio_with_tracks(0, 1.0);
        studio.set_background_image(Some(Path::new("/definitely/not/here.png")));
        studio.set_logo_image(Some(Path::new("/definitely/not/here.png")));
        studio.tick().unwrap();
        assert!(studio.last_frame().is_some());
    }

    #[test]
    fn settings_changes_apply_at_next_frame_boundary() {
        let mut studio = studio_with_tracks(0, 1.0);
        studio.tick().unwrap();
        let before = studio.last_frame().unwrap().data.clone();

        let mut s = studio.settings().clone();
        s.style = crate::settings::SpectrumStyle::Circle;
        s.color_start = crate::foundation::core::Rgba8::rgb(255, 0, 0);
        studio.set_settings(s).unwrap();

        // Re-render at the same idle phase would differ only via settings;
        // ticking twice is enough to observe the change.
        studio.tick().unwrap();
        let after = studio.last_frame().unwrap().data.clone();
        assert_ne!(before, after);
    }
}
