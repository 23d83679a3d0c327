//! Error types shared across the player.
//!
//! None of these ever escape a transport operation: playback failures are
//! folded into engine state and published as events, library errors are
//! shown in the status banner.

use thiserror::Error;

/// Failures reported by a media output device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// No audio output could be opened.
    #[error("no audio output available: {0}")]
    NoOutput(String),

    /// The locator could not be opened or decoded.
    #[error("cannot read {locator}: {reason}")]
    Unreadable { locator: String, reason: String },

    /// `play` was requested before anything was loaded.
    #[error("nothing is loaded")]
    NothingLoaded,

    /// The device's worker is gone.
    #[error("audio thread is not running")]
    Disconnected,
}

/// Failures surfaced by the playback engine to its subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("could not start \"{title}\": {source}")]
    StartFailed {
        track_id: String,
        title: String,
        #[source]
        source: DeviceError,
    },

    /// The device dropped a track that was already playing.
    #[error("playback of \"{title}\" stopped: {source}")]
    Interrupted {
        track_id: String,
        title: String,
        #[source]
        source: DeviceError,
    },
}

/// Failures of library and playlist operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LibraryError {
    #[error("playlist name must not be empty")]
    EmptyName,

    #[error("no playlist with id {0}")]
    UnknownPlaylist(String),

    #[error("no track with id {0}")]
    UnknownTrack(String),
}
