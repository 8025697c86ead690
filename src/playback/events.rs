/// Single-fire playback events observed from the audio engine.
///
/// Events are queued and processed between render ticks: the event for track
/// `k` is fully handled before any frame belonging to track `k + 1` renders.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlaybackEvent {
    /// The current track reached its natural end.
    TrackEnded,
    /// The current track's duration became known, in seconds.
    DurationKnown(f64),
}
