//! The output-device seam between the playback engine and real audio.
//!
//! Every load carries a `Generation`; every event the device emits is tagged
//! with the generation of the load it belongs to, so the engine can discard
//! events that arrive after it has moved on to another track.

use crate::error::DeviceError;

/// Monotonic tag for one load-and-start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

/// Identifies one `play()` request. `request` increases on every request,
/// including resumes within the same generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayTicket {
    pub generation: Generation,
    pub request: u64,
}

/// Signals from the device, delivered on its event channel in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// Playback position, in seconds.
    PositionAdvanced { generation: Generation, time: f64 },
    /// Duration of the loaded source became known, in seconds.
    MetadataReady { generation: Generation, duration: f64 },
    /// The loaded source played to its end.
    Ended { generation: Generation },
    /// The device lost the loaded source mid-track and is now paused.
    Failed {
        generation: Generation,
        error: DeviceError,
    },
    /// Outcome of a `play()` request.
    PlayResolved {
        ticket: PlayTicket,
        outcome: Result<(), DeviceError>,
    },
}

impl DeviceEvent {
    pub fn generation(&self) -> Generation {
        match self {
            Self::PositionAdvanced { generation, .. }
            | Self::MetadataReady { generation, .. }
            | Self::Ended { generation }
            | Self::Failed { generation, .. } => *generation,
            Self::PlayResolved { ticket, .. } => ticket.generation,
        }
    }
}

/// A single audio output, exclusively driven by the playback engine.
///
/// All calls return immediately. `play` is asynchronous: its outcome arrives
/// later as `DeviceEvent::PlayResolved` carrying the same ticket, and a
/// rejected play leaves the device paused, and the next `play` tries again.
pub trait MediaOutputDevice {
    /// Prepare `url` for playback, superseding any previous load. Loading the
    /// locator that is already loaded keeps the source and adopts `generation`.
    fn load(&mut self, url: &str, generation: Generation);

    fn play(&mut self, ticket: PlayTicket);

    /// Idempotent.
    fn pause(&mut self);

    /// Seek to `time` seconds. The device may clamp to its own known duration.
    fn set_position(&mut self, time: f64);

    /// `volume` is already clamped to `[0, 1]`.
    fn set_volume(&mut self, volume: f64);
}
