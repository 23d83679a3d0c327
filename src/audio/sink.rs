//! Utilities for creating `rodio` sinks from track locators.
//!
//! The helper here encapsulates opening/decoding a file and preparing a
//! paused `Sink` at the requested start position.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use lofty::file::AudioFile;
use rodio::{Decoder, OutputStream, Sink, Source};

use crate::error::DeviceError;

use super::locator::{resolve_locator, unreadable};

/// A decoded source attached to a paused sink.
pub(super) struct OpenedSink {
    pub sink: Sink,
    /// Length of the whole source, when the decoder or the tags know it.
    pub total: Option<Duration>,
}

/// Create a paused `Sink` for `url` that starts playback at `start_at`.
pub(super) fn create_sink_at(
    stream: &OutputStream,
    url: &str,
    start_at: Duration,
    volume: f32,
) -> Result<OpenedSink, DeviceError> {
    let path = resolve_locator(url)?;
    let file = File::open(&path).map_err(|e| unreadable(url, &e.to_string()))?;
    let decoder = Decoder::new(BufReader::new(file)).map_err(|e| unreadable(url, &e.to_string()))?;

    let total = decoder.total_duration().or_else(|| probe_duration(&path));

    // `skip_duration` is our seeking primitive; even Duration::ZERO is fine.
    let source = decoder.skip_duration(start_at);

    let sink = Sink::connect_new(stream.mixer());
    sink.set_volume(volume);
    sink.append(source);
    sink.pause();
    Ok(OpenedSink { sink, total })
}

/// Read the length from tags when the decoder cannot tell (e.g. VBR mp3).
fn probe_duration(path: &Path) -> Option<Duration> {
    lofty::read_from_path(path)
        .ok()
        .map(|tagged| tagged.properties().duration())
        .filter(|d| !d.is_zero())
}
