//! CPU frame composition: particle simulation and the per-tick renderer.

pub mod frame;
pub mod particles;
pub mod renderer;

pub use frame::FrameRGBA;
pub use particles::{Particle, ParticleField};
pub use renderer::{AudioSnapshot, FrameRenderer};
