use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::warn;

use crate::config::AudioSettings;
use crate::error::DeviceError;

use super::device::{DeviceEvent, Generation, MediaOutputDevice, PlayTicket};
use super::thread::spawn_device_thread;
use super::types::DeviceCmd;

/// `MediaOutputDevice` backed by a rodio sink on a dedicated audio thread.
pub struct RodioDevice {
    pub(super) tx: Sender<DeviceCmd>,
    /// Lets the device resolve plays itself when the audio thread is gone.
    pub(super) events: Sender<DeviceEvent>,
    pub(super) join: Option<JoinHandle<()>>,
}

impl RodioDevice {
    /// Start the audio thread. Device events arrive on the returned receiver.
    pub fn spawn(settings: AudioSettings) -> std::io::Result<(Self, Receiver<DeviceEvent>)> {
        let (tx, rx) = mpsc::channel::<DeviceCmd>();
        let (events_tx, events_rx) = mpsc::channel::<DeviceEvent>();

        let join = spawn_device_thread(rx, events_tx.clone(), settings)?;

        Ok((
            Self {
                tx,
                events: events_tx,
                join: Some(join),
            },
            events_rx,
        ))
    }

    fn send(&self, cmd: DeviceCmd) -> bool {
        match self.tx.send(cmd) {
            Ok(()) => true,
            Err(e) => {
                warn!(cmd = ?e.0, "audio thread is gone; command dropped");
                false
            }
        }
    }

    /// Fade out, stop the audio thread and wait for it.
    pub fn shutdown(&mut self, fade_out: Duration) {
        let _ = self.tx.send(DeviceCmd::Quit {
            fade_out_ms: fade_out.as_millis() as u64,
        });

        if let Some(h) = self.join.take() {
            let _ = h.join();
        }
    }
}

impl MediaOutputDevice for RodioDevice {
    fn load(&mut self, url: &str, generation: Generation) {
        self.send(DeviceCmd::Load {
            url: url.to_string(),
            generation,
        });
    }

    fn play(&mut self, ticket: PlayTicket) {
        if !self.send(DeviceCmd::Play(ticket)) {
            let _ = self.events.send(DeviceEvent::PlayResolved {
                ticket,
                outcome: Err(DeviceError::Disconnected),
            });
        }
    }

    fn pause(&mut self) {
        self.send(DeviceCmd::Pause);
    }

    fn set_position(&mut self, time: f64) {
        self.send(DeviceCmd::SetPosition(time));
    }

    fn set_volume(&mut self, volume: f64) {
        self.send(DeviceCmd::SetVolume(volume as f32));
    }
}

impl Drop for RodioDevice {
    fn drop(&mut self) {
        if self.join.is_some() {
            self.shutdown(Duration::ZERO);
        }
    }
}
