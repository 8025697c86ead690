//! The platform-audio seam.
//!
//! [`AudioEngine`] is what the rest of the system sees: transport commands, a
//! continuously refreshed frequency-magnitude snapshot, the PCM consumed each
//! tick (the capture tap), and single-fire events. [`WavEngine`] is the
//! built-in clock-driven implementation over decoded WAV data; it advances in
//! lockstep with the render loop rather than against a sound card, which
//! makes exports deterministic.

use crate::analysis::SpectrumAnalyzer;
use crate::analysis::analyzer::DEFAULT_FFT_SIZE;
use crate::foundation::error::{StudioError, StudioResult};
use crate::playback::events::PlaybackEvent;
use std::path::Path;
use tracing::debug;

/// Audio subsystem contract consumed by the sequencer, studio, and capture.
pub trait AudioEngine {
    /// Load a new audio source, replacing the current one.
    ///
    /// Queues [`PlaybackEvent::DurationKnown`] once the duration is resolved.
    fn load(&mut self, source: &Path) -> StudioResult<()>;

    /// Begin or resume playback. May fail (surfaced, non-fatal).
    fn play(&mut self) -> StudioResult<()>;

    /// Pause in place.
    fn pause(&mut self);

    /// Set the playhead without changing the playing/paused state.
    fn seek(&mut self, secs: f64);

    fn position_secs(&self) -> f64;
    fn duration_secs(&self) -> Option<f64>;
    fn is_playing(&self) -> bool;
    fn sample_rate(&self) -> u32;
    fn channels(&self) -> u16;

    /// Advance the engine clock by `dt` seconds of wall time.
    ///
    /// Queues [`PlaybackEvent::TrackEnded`] when the source is exhausted.
    fn advance(&mut self, dt_secs: f64);

    /// Interleaved samples consumed by the most recent [`advance`](Self::advance).
    ///
    /// This is the capture tap: the same signal feeding live output, not a
    /// separate re-decode.
    fn tap_samples(&self) -> &[f32];

    /// Current frequency-magnitude snapshot (one byte per bin).
    fn frequency_snapshot(&mut self) -> &[u8];

    /// Drain queued single-fire events in emission order.
    fn poll_events(&mut self) -> Vec<PlaybackEvent>;
}

/// Clock-driven engine over fully decoded WAV data.
pub struct WavEngine {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    /// Playhead in per-channel frames.
    pos: usize,
    playing: bool,

    tap: Vec<f32>,
    recent: Vec<f32>,
    analyzer: SpectrumAnalyzer,
    pending: Vec<PlaybackEvent>,
}

impl WavEngine {
    pub fn new() -> Self {
        Self {
            samples: Vec::new(),
            sample_rate: 44_100,
            channels: 2,
            pos: 0,
            playing: false,
            tap: Vec::new(),
            recent: Vec::new(),
            analyzer: SpectrumAnalyzer::new(),
            pending: Vec::new(),
        }
    }

    fn total_frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / usize::from(self.channels)
        }
    }
}

impl Default for WavEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEngine for WavEngine {
    fn load(&mut self, source: &Path) -> StudioResult<()> {
        let mut reader = hound::WavReader::open(source).map_err(|e| {
            StudioError::playback(format!("failed to open '{}': {e}", source.display()))
        })?;
        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(|e| StudioError::playback(format!("failed to decode samples: {e}")))?,
            hound::SampleFormat::Int => {
                let norm = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * norm))
                    .collect::<Result<_, _>>()
                    .map_err(|e| StudioError::playback(format!("failed to decode samples: {e}")))?
            }
        };

        self.sample_rate = spec.sample_rate;
        self.channels = spec.channels;
        self.samples = samples;
        self.pos = 0;
        self.playing = false;
        self.tap.clear();

        let duration = self.total_frames() as f64 / f64::from(self.sample_rate.max(1));
        debug!(
            source = %source.display(),
            sample_rate = self.sample_rate,
            channels = self.channels,
            duration_secs = duration,
            "loaded wav source"
        );
        self.pending.push(PlaybackEvent::DurationKnown(duration));
        Ok(())
    }

    fn play(&mut self) -> StudioResult<()> {
        if self.samples.is_empty() {
            return Err(StudioError::playback("no audio source loaded"));
        }
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn seek(&mut self, secs: f64) {
        let frame = (secs.max(0.0) * f64::from(self.sample_rate)) as usize;
        self.pos = frame.min(self.total_frames());
    }

    fn position_secs(&self) -> f64 {
        self.pos as f64 / f64::from(self.sample_rate.max(1))
    }

    fn duration_secs(&self) -> Option<f64> {
        if self.samples.is_empty() {
            None
        } else {
            Some(self.total_frames() as f64 / f64::from(self.sample_rate.max(1)))
        }
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn advance(&mut self, dt_secs: f64) {
        self.tap.clear();
        if !self.playing {
            return;
        }

        let want = (dt_secs * f64::from(self.sample_rate)).round() as usize;
        let take = want.min(self.total_frames() - self.pos);
        let ch = usize::from(self.channels.max(1));

        let start = self.pos * ch;
        let end = start + take * ch;
        self.tap.extend_from_slice(&self.samples[start..end]);

        // Mono mix feeds the analysis window.
        self.recent.extend(
            self.samples[start..end]
                .chunks_exact(ch)
                .map(|frame| frame.iter().sum::<f32>() / ch as f32),
        );
        let overflow = self.recent.len().saturating_sub(DEFAULT_FFT_SIZE);
        if overflow > 0 {
            self.recent.drain(..overflow);
        }

        self.pos += take;
        if self.pos >= self.total_frames() {
            self.playing = false;
            self.pending.push(PlaybackEvent::TrackEnded);
        }
    }

    fn tap_samples(&self) -> &[f32] {
        &self.tap
    }

    fn frequency_snapshot(&mut self) -> &[u8] {
        self.analyzer.process(&self.recent)
    }

    fn poll_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.pending)
    }
}
