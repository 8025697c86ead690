//! Windowed FFT capture of the live signal into byte-resolution magnitudes.
//!
//! This is the analysis stage feeding [`sample_bands`](super::sample_bands):
//! a Hann-windowed forward FFT over the most recent samples, per-bin temporal
//! smoothing, and decibel mapping onto the 0-255 scale the band sampler
//! consumes.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// FFT window length used by the live analysis chain.
pub const DEFAULT_FFT_SIZE: usize = 2048;

const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

/// Converts recent PCM into a fixed-size byte magnitude spectrum.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    bytes: Vec<u8>,
    smoothing: f32,
}

impl SpectrumAnalyzer {
    /// Analyzer over [`DEFAULT_FFT_SIZE`] samples with light smoothing.
    ///
    /// The smoothing time constant is 0.1: the display chain has its own
    /// attack/decay filter, so the raw capture stays responsive.
    pub fn new() -> Self {
        Self::with_params(DEFAULT_FFT_SIZE, 0.1)
    }

    /// Analyzer with an explicit window length and smoothing time constant.
    pub fn with_params(fft_size: usize, smoothing: f32) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        let window: Vec<f32> = (0..fft_size)
            .map(|i| {
                let t = i as f32 / (fft_size - 1) as f32;
                0.5 * (1.0 - (2.0 * PI * t).cos())
            })
            .collect();

        Self {
            fft,
            fft_size,
            window,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            smoothed: vec![0.0; fft_size / 2],
            bytes: vec![0; fft_size / 2],
            smoothing: smoothing.clamp(0.0, 1.0),
        }
    }

    /// Number of magnitude bins produced (half the FFT size).
    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Analyze the most recent mono samples and return the byte spectrum.
    ///
    /// `samples` shorter than the FFT window are treated as preceded by
    /// silence; longer input uses only the trailing window.
    pub fn process(&mut self, samples: &[f32]) -> &[u8] {
        let tail = if samples.len() > self.fft_size {
            &samples[samples.len() - self.fft_size..]
        } else {
            samples
        };
        let pad = self.fft_size - tail.len();

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let s = if i < pad { 0.0 } else { tail[i - pad] };
            *slot = Complex::new(s * self.window[i], 0.0);
        }
        self.fft.process(&mut self.buffer);

        let norm = 1.0 / self.fft_size as f32;
        let tau = self.smoothing;
        for (k, byte) in self.bytes.iter_mut().enumerate() {
            let mag = self.buffer[k].norm() * norm;
            let s = tau * self.smoothed[k] + (1.0 - tau) * mag;
            self.smoothed[k] = s;

            *byte = if s > 0.0 {
                let db = 20.0 * s.log10();
                let scaled = 255.0 * (db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS);
                scaled.clamp(0.0, 255.0) as u8
            } else {
                0
            };
        }
        &self.bytes
    }

    /// The last computed byte spectrum (all zeros before the first call).
    pub fn snapshot(&self) -> &[u8] {
        &self.bytes
    }
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
