//! Playback: the audio-engine seam, playlist sequencing, and the event types
//! delivered into the state machines between render ticks.

pub mod engine;
pub mod events;
pub mod sequencer;

pub use engine::{AudioEngine, WavEngine};
pub use events::PlaybackEvent;
pub use sequencer::{PlaybackSequencer, PlaybackState, PlaylistItem};
