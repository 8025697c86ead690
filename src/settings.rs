//! Visual configuration for the composition.
//!
//! A [`VisualSettings`] value is an immutable-per-frame snapshot: the renderer
//! only reads it, and edits made between ticks become visible at the next
//! frame boundary.

use crate::foundation::core::Rgba8;
use crate::foundation::error::{StudioError, StudioResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Spectrum graphic style. Closed set; drawing dispatch matches exhaustively.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpectrumStyle {
    Bar,
    RoundBar,
    Wave,
    Circle,
}

/// Background image post-filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BgFilter {
    None,
    Darken,
    Vintage,
    Blur,
}

/// Visual configuration snapshot.
///
/// Serde defaults reproduce the stock look: violet-to-cyan bars anchored at
/// 80% height, darkened background, particles at half intensity, 8 Mbps
/// target bitrate.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualSettings {
    /// Spectrum drawing style.
    pub style: SpectrumStyle,
    /// Gradient color at the bottom of the surface.
    pub color_start: Rgba8,
    /// Gradient color at the top of the surface.
    pub color_end: Rgba8,
    /// Magnitude multiplier applied to all styles.
    pub sensitivity: f32,
    /// Number of spectrum bands. Must be > 1 (WAVE divides by `band_count - 1`).
    pub band_count: usize,

    /// Horizontal anchor of the spectrum graphic, percent of surface width.
    pub spectrum_x: f32,
    /// Vertical anchor of the spectrum graphic, percent of surface height.
    pub spectrum_y: f32,
    /// Uniform scale of the spectrum graphic.
    pub spectrum_scale: f32,

    /// Optional background image source.
    pub background: Option<PathBuf>,
    /// Filter pass applied over the background image.
    pub bg_filter: BgFilter,

    /// Optional logo image source.
    pub logo: Option<PathBuf>,
    /// Logo center, percent of surface width.
    pub logo_x: f32,
    /// Logo center, percent of surface height.
    pub logo_y: f32,
    /// Logo scale multiplier.
    pub logo_scale: f32,
    /// Composite the logo with a screen blend to suppress a solid background.
    pub logo_remove_bg: bool,

    /// Enable the ambient particle layer.
    pub particles_enabled: bool,
    /// Particle density in `0..=1`; the field holds `intensity * 100` particles.
    pub particle_intensity: f32,

    /// Target video bitrate for capture, bits per second.
    pub video_bitrate: u32,
}

impl Default for VisualSettings {
    fn default() -> Self {
        Self {
            style: SpectrumStyle::Bar,
            color_start: Rgba8::rgb(0x8b, 0x5c, 0xf6),
            color_end: Rgba8::rgb(0x06, 0xb6, 0xd4),
            sensitivity: 1.5,
            band_count: 128,
            spectrum_x: 50.0,
            spectrum_y: 80.0,
            spectrum_scale: 1.0,
            background: None,
            bg_filter: BgFilter::Darken,
            logo: None,
            logo_x: 50.0,
            logo_y: 40.0,
            logo_scale: 1.0,
            logo_remove_bg: false,
            particles_enabled: true,
            particle_intensity: 0.5,
            video_bitrate: 8_000_000,
        }
    }
}

impl VisualSettings {
    /// Validate invariants the renderer relies on.
    pub fn validate(&self) -> StudioResult<()> {
        if self.band_count < 2 {
            return Err(StudioError::validation(
                "band_count must be > 1 (wave geometry divides by band_count - 1)",
            ));
        }
        if !self.sensitivity.is_finite() || self.sensitivity <= 0.0 {
            return Err(StudioError::validation("sensitivity must be finite and > 0"));
        }
        if !self.spectrum_scale.is_finite() || self.spectrum_scale <= 0.0 {
            return Err(StudioError::validation(
                "spectrum_scale must be finite and > 0",
            ));
        }
        for (name, v) in [
            ("spectrum_x", self.spectrum_x),
            ("spectrum_y", self.spectrum_y),
            ("logo_x", self.logo_x),
            ("logo_y", self.logo_y),
        ] {
            if !(0.0..=100.0).contains(&v) {
                return Err(StudioError::validation(format!(
                    "{name} must be a percentage in 0..=100"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.particle_intensity) {
            return Err(StudioError::validation(
                "particle_intensity must be in 0..=1",
            ));
        }
        if self.video_bitrate == 0 {
            return Err(StudioError::validation("video_bitrate must be > 0"));
        }
        Ok(())
    }
}
