//! Commands understood by the rodio audio thread.

use super::device::{Generation, PlayTicket};

#[derive(Debug)]
pub enum DeviceCmd {
    /// Decode `url` paused, tagging everything that follows with `generation`.
    Load { url: String, generation: Generation },
    /// Start or resume the loaded source and resolve `ticket`.
    Play(PlayTicket),
    Pause,
    /// Seek to the given offset in seconds.
    SetPosition(f64),
    SetVolume(f32),
    /// Quit the audio thread, optionally fading out over `fade_out_ms` milliseconds.
    Quit { fade_out_ms: u64 },
}
