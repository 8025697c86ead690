//! Playlist sequencing.
//!
//! The sequencer owns "what is currently playing": the playlist, the current
//! index (single source of truth for what is audible), and the per-track
//! state machine. Track-ended handling here is the *default* policy
//! (auto-advance, stop at the end); an active capture session overrides it
//! through the orchestrator.

use crate::foundation::error::StudioResult;
use crate::playback::engine::AudioEngine;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Per-track playback state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaybackState {
    /// No track selected.
    #[default]
    Idle,
    /// One track advancing.
    Playing,
    /// Paused in place.
    Paused,
    /// The last track finished and nothing follows.
    Ended,
}

/// One playlist entry.
#[derive(Clone, Debug)]
pub struct PlaylistItem {
    /// Audio source handle.
    pub source: PathBuf,
    /// Display name.
    pub name: String,
    /// Duration in seconds, once known.
    pub duration_secs: Option<f64>,
}

impl PlaylistItem {
    pub fn new(source: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            name: name.into(),
            duration_secs: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct PlaybackSequencer {
    items: Vec<PlaylistItem>,
    current: Option<usize>,
    state: PlaybackState,
}

impl PlaybackSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[PlaylistItem] {
        &self.items
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_item(&self) -> Option<&PlaylistItem> {
        self.current.and_then(|i| self.items.get(i))
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn add_item(&mut self, item: PlaylistItem) {
        self.items.push(item);
    }

    /// Remove an item; removing the current one stops playback.
    pub fn remove_item(&mut self, index: usize, engine: &mut dyn AudioEngine) {
        if index >= self.items.len() {
            return;
        }
        self.items.remove(index);
        match self.current {
            Some(c) if c == index => {
                engine.pause();
                self.current = None;
                self.state = PlaybackState::Idle;
            }
            Some(c) if c > index => self.current = Some(c - 1),
            _ => {}
        }
    }

    /// Move an item to a new position, keeping the current *item* current.
    pub fn reorder(&mut self, from: usize, to: usize) {
        if from == to || from >= self.items.len() || to >= self.items.len() {
            return;
        }
        let item = self.items.remove(from);
        self.items.insert(to, item);

        if let Some(c) = self.current {
            if c == from {
                self.current = Some(to);
            } else if from < c && to >= c {
                self.current = Some(c - 1);
            } else if from > c && to <= c {
                self.current = Some(c + 1);
            }
        }
    }

    /// Load and start the indexed track. Out of range is a no-op.
    pub fn play_track(&mut self, index: usize, engine: &mut dyn AudioEngine) -> StudioResult<()> {
        if index >= self.items.len() {
            return Ok(());
        }
        let item = &self.items[index];
        debug!(index, name = %item.name, "playing track");
        engine.load(&item.source)?;
        self.current = Some(index);
        match engine.play() {
            Ok(()) => self.state = PlaybackState::Playing,
            Err(e) => {
                // Playback start failure is non-fatal: stay stopped, allow retry.
                warn!(error = %e, "playback failed to start");
                self.state = PlaybackState::Paused;
            }
        }
        Ok(())
    }

    /// PLAYING pauses in place; PAUSED/IDLE resumes, or starts at track 0.
    pub fn toggle_play(&mut self, engine: &mut dyn AudioEngine) -> StudioResult<()> {
        if self.state == PlaybackState::Playing {
            engine.pause();
            self.state = PlaybackState::Paused;
            return Ok(());
        }
        if self.current.is_none() {
            return self.play_track(0, engine);
        }
        match engine.play() {
            Ok(()) => self.state = PlaybackState::Playing,
            Err(e) => warn!(error = %e, "playback failed to start"),
        }
        Ok(())
    }

    /// Set the playhead without changing the PLAYING/PAUSED state.
    pub fn seek(&mut self, secs: f64, engine: &mut dyn AudioEngine) {
        engine.seek(secs);
    }

    /// Default end-of-track policy: advance within bounds, else stop.
    pub fn handle_track_ended(&mut self, engine: &mut dyn AudioEngine) -> StudioResult<()> {
        self.state = PlaybackState::Ended;
        if let Some(c) = self.current
            && c + 1 < self.items.len()
        {
            return self.play_track(c + 1, engine);
        }
        Ok(())
    }

    /// Record the duration reported for the current track.
    pub fn set_current_duration(&mut self, secs: f64) {
        if let Some(c) = self.current
            && let Some(item) = self.items.get_mut(c)
        {
            item.duration_secs = Some(secs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::error::StudioError;
    use crate::playback::events::PlaybackEvent;
    use std::path::Path;

    /// Engine stub that records transport calls and never touches disk.
    #[derive(Default)]
    struct StubEngine {
        loaded: Vec<PathBuf>,
        playing: bool,
        fail_play: bool,
        position: f64,
    }

    impl AudioEngine for StubEngine {
        fn load(&mut self, source: &Path) -> StudioResult<()> {
            self.loaded.push(source.to_path_buf());
            self.position = 0.0;
            Ok(())
        }
        fn play(&mut self) -> StudioResult<()> {
            if self.fail_play {
                return Err(StudioError::playback("autoplay rejected"));
            }
            self.playing = true;
            Ok(())
        }
        fn pause(&mut self) {
            self.playing = false;
        }
        fn seek(&mut self, secs: f64) {
            self.position = secs;
        }
        fn position_secs(&self) -> f64 {
            self.position
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

    #[test]
    fn play_track_out_of_range_is_a_noop() {
        let mut s = seq_with(2);
        let mut e = StubEngine::default();
        s.play_track(5, &mut e).unwrap();
        assert_eq!(s.state(), PlaybackState::Idle);
        assert!(e.loaded.is_empty());
    }

    #[test]
    fn toggle_from_idle_starts_track_zero() {
        let mut s = seq_with(3);
        let mut e = StubEngine::default();
        s.toggle_play(&mut e).unwrap();
        assert_eq!(s.current_index(), Some(0));
        assert_eq!(s.state(), PlaybackState::Playing);

        s.toggle_play(&mut e).unwrap();
        assert_eq!(s.state(), PlaybackState::Paused);
        assert!(!e.playing);
    }

    #[test]
    fn toggle_on_empty_playlist_stays_idle() {
        let mut s = PlaybackSequencer::new();
        let mut e = StubEngine::default();
        s.toggle_play(&mut e).unwrap();
        assert_eq!(s.state(), PlaybackState::Idle);
    }

    #[test]
    fn play_failure_leaves_paused_not_playing() {
        let mut s = seq_with(1);
        let mut e = StubEngine {
            fail_play: true,
            ..Default::default()
        };
        s.play_track(0, &mut e).unwrap();
        assert_eq!(s.state(), PlaybackState::Paused);
        assert_eq!(s.current_index(), Some(0));
    }

    #[test]
    fn seek_preserves_state() {
        let mut s = seq_with(1);
        let mut e = StubEngine::default();
        s.play_track(0, &mut e).unwrap();
        s.seek(12.5, &mut e);
        assert_eq!(s.state(), PlaybackState::Playing);
        assert!((e.position - 12.5).abs() < 1e-9);
    }

    #[test]
    fn track_ended_auto_advances_then_stops() {
        let mut s = seq_with(2);
        let mut e = StubEngine::default();
        s.play_track(0, &mut e).unwrap();

        s.handle_track_ended(&mut e).unwrap();
        assert_eq!(s.current_index(), Some(1));
        assert_eq!(s.state(), PlaybackState::Playing);

        s.handle_track_ended(&mut e).unwrap();
        assert_eq!(s.state(), PlaybackState::Ended);
        assert_eq!(s.current_index(), Some(1));
    }

    #[test]
    fn reorder_keeps_current_item_identity() {
        // Moving the current track itself.
        let mut s = seq_with(4);
        let mut e = StubEngine::default();
        s.play_track(1, &mut e).unwrap();
        let name = s.current_item().unwrap().name.clone();
        s.reorder(1, 3);
        assert_eq!(s.current_index(), Some(3));
        assert_eq!(s.current_item().unwrap().name, name);

        // Moving a later item before the current position shifts current up.
        let mut s = seq_with(4);
        s.play_track(2, &mut e).unwrap();
        let name = s.current_item().unwrap().name.clone();
        s.reorder(3, 0);
        assert_eq!(s.current_index(), Some(3));
        assert_eq!(s.current_item().unwrap().name, name);

        // Moving an earlier item to at/after the current position shifts down.
        let mut s = seq_with(4);
        s.play_track(2, &mut e).unwrap();
        let name = s.current_item().unwrap().name.clone();
        s.reorder(0, 2);
        assert_eq!(s.current_index(), Some(1));
        assert_eq!(s.current_item().unwrap().name, name);
    }

    #[test]
    fn reorder_exhaustive_identity_property() {
        let mut e = StubEngine::default();
        for from in 0..5 {
            for to in 0..5 {
                let mut s = seq_with(5);
                s.play_track(2, &mut e).unwrap();
                let name = s.current_item().unwrap().name.clone();
                s.reorder(from, to);
                assert_eq!(
                    s.current_item().unwrap().name,
                    name,
                    "identity lost moving {from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn removing_current_track_stops_playback() {
        let mut s = seq_with(3);
        let mut e = StubEngine::default();
        s.play_track(1, &mut e).unwrap();
        s.remove_item(1, &mut e);
        assert_eq!(s.current_index(), None);
        assert_eq!(s.state(), PlaybackState::Idle);
        assert!(!e.playing);

        // Removing before the current track shifts the index.
        let mut s = seq_with(3);
        s.play_track(2, &mut e).unwrap();
        s.remove_item(0, &mut e);
        assert_eq!(s.current_index(), Some(1));
    }

    #[test]
    fn duration_lands_on_current_item() {
        let mut s = seq_with(2);
        let mut e = StubEngine::default();
        s.play_track(1, &mut e).unwrap();
        s.set_current_duration(33.0);
        assert_eq!(s.items()[1].duration_secs, Some(33.0));
        assert_eq!(s.items()[0].duration_secs, None);
    }
}
