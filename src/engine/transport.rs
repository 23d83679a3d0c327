/// Where the engine is in the load/play lifecycle. The payload is the queue
/// index of the current track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    /// Nothing has been played yet.
    #[default]
    Idle,
    /// A `play()` request is in flight.
    Loading(usize),
    Playing(usize),
    Paused(usize),
    /// `next()` ran off the end of the queue; the last track stays current.
    Ended(usize),
}

impl Transport {
    pub fn cursor(self) -> Option<usize> {
        match self {
            Self::Idle => None,
            Self::Loading(i) | Self::Playing(i) | Self::Paused(i) | Self::Ended(i) => Some(i),
        }
    }

    pub fn is_playing(self) -> bool {
        matches!(self, Self::Playing(_))
    }
}
