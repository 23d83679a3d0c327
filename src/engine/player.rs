use std::sync::mpsc::{self, Receiver, Sender};

use tracing::{debug, info, warn};

use crate::audio::{DeviceEvent, Generation, MediaOutputDevice, PlayTicket};
use crate::config::PlaybackSettings;
use crate::error::{DeviceError, PlaybackError};
use crate::library::Track;

use super::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub initial_volume: f64,
    /// Seconds of elapsed time after which `prev()` restarts instead of going back.
    pub restart_threshold: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            initial_volume: 0.8,
            restart_threshold: 3.0,
        }
    }
}

impl From<&PlaybackSettings> for EngineSettings {
    fn from(s: &PlaybackSettings) -> Self {
        Self {
            initial_volume: s.initial_volume,
            restart_threshold: s.restart_threshold_secs,
        }
    }
}

/// Notifications published to every subscriber, in the order they happen.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    TrackChanged { index: usize, track: Track },
    TransportChanged(Transport),
    PlaybackFailed(PlaybackError),
}

/// Point-in-time copy of everything a front end renders.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub track: Option<Track>,
    pub transport: Transport,
    pub is_playing: bool,
    pub current_time: f64,
    pub duration: f64,
    pub volume: f64,
    pub cursor: Option<usize>,
    pub queue_len: usize,
}

pub struct PlaybackEngine<D: MediaOutputDevice> {
    device: D,
    settings: EngineSettings,
    queue: Vec<Track>,
    transport: Transport,
    current_time: f64,
    duration: f64,
    volume: f64,
    generation: Generation,
    requests: u64,
    /// The only `play()` whose resolution is still wanted.
    pending_play: Option<PlayTicket>,
    subscribers: Vec<Sender<EngineEvent>>,
}

impl<D: MediaOutputDevice> PlaybackEngine<D> {
    pub fn new(mut device: D, settings: EngineSettings) -> Self {
        let volume = clamp_volume(settings.initial_volume).unwrap_or(1.0);
        device.set_volume(volume);

        Self {
            device,
            settings,
            queue: Vec::new(),
            transport: Transport::Idle,
            current_time: 0.0,
            duration: 0.0,
            volume,
            generation: Generation::default(),
            requests: 0,
            pending_play: None,
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self) -> Receiver<EngineEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    #[cfg(test)]
    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn queue(&self) -> &[Track] {
        &self.queue
    }

    pub fn cursor(&self) -> Option<usize> {
        self.transport.cursor()
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.cursor().and_then(|i| self.queue.get(i))
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Seconds; 0 until the device reports metadata for the current track.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            track: self.current_track().cloned(),
            transport: self.transport,
            is_playing: self.is_playing(),
            current_time: self.current_time,
            duration: self.duration,
            volume: self.volume,
            cursor: self.cursor(),
            queue_len: self.queue().len(),
        }
    }

    /// Start `track`.
    ///
    /// With a `context`, the queue is replaced by it and the cursor lands on
    /// `track` inside it. A context that does not contain `track` is a caller
    /// bug; playback then starts at the first entry. Without a context the
    /// track is found in the current queue, or appended to it.
    pub fn play_track(&mut self, track: Track, context: Option<Vec<Track>>) {
        let index = match context {
            Some(context) if context.is_empty() => {
                warn!(track = %track.id, "empty queue context; playing the track alone");
                self.queue = vec![track];
                0
            }
            Some(context) => {
                let index = match context.iter().position(|t| t.id == track.id) {
                    Some(i) => i,
                    None => {
                        warn!(
                            track = %track.id,
                            "track is not part of the supplied queue; starting at the first entry"
                        );
                        0
                    }
                };
                self.queue = context;
                index
            }
            None => match self.queue.iter().position(|t| t.id == track.id) {
                Some(i) => i,
                None => {
                    self.queue.push(track);
                    self.queue.len() - 1
                }
            },
        };

        self.load_and_start(index);
    }

    /// Resume the current track. No-op without one, or when already playing
    /// or waiting for a start.
    pub fn play(&mut self) {
        match self.transport {
            Transport::Idle | Transport::Loading(_) | Transport::Playing(_) => {}
            Transport::Paused(i) | Transport::Ended(i) => self.request_play(i),
        }
    }

    pub fn pause(&mut self) {
        self.pending_play = None;
        if let Transport::Loading(i) | Transport::Playing(i) = self.transport {
            self.device.pause();
            self.set_transport(Transport::Paused(i));
        }
    }

    pub fn toggle_play(&mut self) {
        if self.cursor().is_none() {
            return;
        }
        if self.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn next(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        let Some(cursor) = self.cursor() else {
            return;
        };

        if cursor + 1 < self.queue.len() {
            self.load_and_start(cursor + 1);
        } else {
            self.stop_at_end(cursor);
        }
    }

    pub fn prev(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        let Some(cursor) = self.cursor() else {
            return;
        };

        if self.current_time > self.settings.restart_threshold || cursor == 0 {
            self.restart();
        } else {
            self.load_and_start(cursor - 1);
        }
    }

    /// Seek within the current track. The target is clamped to
    /// `[0, duration]` and shown immediately.
    pub fn seek_to(&mut self, time: f64) {
        let time = clamp_time(time, self.duration);
        self.device.set_position(time);
        self.current_time = time;
    }

    pub fn set_volume(&mut self, volume: f64) {
        let Some(volume) = clamp_volume(volume) else {
            return;
        };
        self.device.set_volume(volume);
        self.volume = volume;
    }

    pub fn handle_device_event(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::PlayResolved { ticket, outcome } => self.resolve_play(ticket, outcome),
            stale if stale.generation() != self.generation => {
                debug!(
                    event = ?stale,
                    current = self.generation.value(),
                    "dropping device event from a superseded load"
                );
            }
            DeviceEvent::PositionAdvanced { time, .. } => {
                self.current_time = clamp_time(time, self.duration);
            }
            DeviceEvent::MetadataReady { duration, .. } => {
                self.duration = known_secs(duration);
                self.current_time = clamp_time(self.current_time, self.duration);
            }
            DeviceEvent::Ended { .. } => self.next(),
            DeviceEvent::Failed { error, .. } => self.interrupt(error),
        }
    }

    /// The device gave up on the current source. Stop claiming to play it;
    /// a later `play()` asks the device to try again.
    fn interrupt(&mut self, source: DeviceError) {
        let Some(index) = self.cursor() else {
            return;
        };
        if let Transport::Loading(_) | Transport::Playing(_) = self.transport {
            self.pending_play = None;
            self.set_transport(Transport::Paused(index));
        }

        let (track_id, title) = self.track_label(index);
        warn!(track = %track_id, error = %source, "playback interrupted");
        self.publish(EngineEvent::PlaybackFailed(PlaybackError::Interrupted {
            track_id,
            title,
            source,
        }));
    }

    fn track_label(&self, index: usize) -> (String, String) {
        self.queue
            .get(index)
            .map(|t| (t.id.clone(), t.title.clone()))
            .unwrap_or_default()
    }

    fn resolve_play(&mut self, ticket: PlayTicket, outcome: Result<(), DeviceError>) {
        if self.pending_play != Some(ticket) {
            debug!(?ticket, "dropping superseded play resolution");
            return;
        }
        self.pending_play = None;

        let Transport::Loading(index) = self.transport else {
            return;
        };

        match outcome {
            Ok(()) => self.set_transport(Transport::Playing(index)),
            Err(source) => {
                self.set_transport(Transport::Paused(index));

                let (track_id, title) = self.track_label(index);
                warn!(track = %track_id, error = %source, "playback failed to start");
                self.publish(EngineEvent::PlaybackFailed(PlaybackError::StartFailed {
                    track_id,
                    title,
                    source,
                }));
            }
        }
    }

    /// Load the track at `index` and ask the device to start it. `index` is
    /// always the target the calling operation just computed.
    fn load_and_start(&mut self, index: usize) {
        let Some(track) = self.queue.get(index).cloned() else {
            return;
        };

        self.generation = self.generation.next();
        self.duration = 0.0;
        self.current_time = 0.0;
        info!(
            track = %track.id,
            index,
            generation = self.generation.value(),
            "loading track"
        );

        self.device.load(&track.url, self.generation);
        self.publish(EngineEvent::TrackChanged { index, track });
        self.request_play(index);
    }

    fn request_play(&mut self, index: usize) {
        self.requests += 1;
        let ticket = PlayTicket {
            generation: self.generation,
            request: self.requests,
        };
        self.pending_play = Some(ticket);
        self.set_transport(Transport::Loading(index));
        self.device.play(ticket);
    }

    fn stop_at_end(&mut self, index: usize) {
        self.pending_play = None;
        self.device.pause();
        self.device.set_position(0.0);
        self.current_time = 0.0;
        self.set_transport(Transport::Ended(index));
    }

    fn restart(&mut self) {
        self.device.set_position(0.0);
        self.current_time = 0.0;
    }

    fn set_transport(&mut self, transport: Transport) {
        if self.transport != transport {
            self.transport = transport;
            self.publish(EngineEvent::TransportChanged(transport));
        }
    }

    fn publish(&mut self, event: EngineEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Device-reported durations that are not positive finite numbers mean "unknown".
fn known_secs(secs: f64) -> f64 {
    if secs.is_finite() && secs > 0.0 { secs } else { 0.0 }
}

fn clamp_time(time: f64, duration: f64) -> f64 {
    if time.is_nan() {
        return 0.0;
    }
    time.clamp(0.0, duration.max(0.0))
}

fn clamp_volume(volume: f64) -> Option<f64> {
    (!volume.is_nan()).then(|| volume.clamp(0.0, 1.0))
}
