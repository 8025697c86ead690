//! Audio analysis: raw-spectrum capture, perceptual band resampling, and
//! temporal smoothing.

pub mod analyzer;
pub mod sampler;
pub mod smoother;

pub use analyzer::SpectrumAnalyzer;
pub use sampler::{idle_bands, sample_bands};
pub use smoother::TemporalSmoother;
