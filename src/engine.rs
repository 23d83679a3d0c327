//! Playback engine: owns the play queue, the cursor and the transport state
//! machine, and keeps them in step with a `MediaOutputDevice`.
//!
//! Every operation runs synchronously on the caller's thread. The only
//! asynchronous edge is the device's `play()` outcome and its event stream,
//! both of which come back through `PlaybackEngine::handle_device_event`.

mod player;
mod time;
mod transport;

pub use player::{EngineEvent, EngineSettings, PlaybackEngine, PlaybackSnapshot};
pub use time::format_time;
pub use transport::Transport;

#[cfg(test)]
mod tests;
