use std::io;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use rodio::{OutputStream, OutputStreamBuilder, Sink};
use tracing::{debug, error, info, warn};

use crate::config::AudioSettings;
use crate::error::DeviceError;

use super::device::{DeviceEvent, Generation, PlayTicket};
use super::sink::{OpenedSink, create_sink_at};
use super::types::DeviceCmd;

/// The source currently held by the device.
struct Loaded {
    url: String,
    sink: Sink,
    total: Option<Duration>,
    /// Offset the sink was built at; `Sink::get_pos` counts from here.
    offset: Duration,
}

impl Loaded {
    fn position(&self) -> Duration {
        self.offset + self.sink.get_pos()
    }
}

/// Opens the output stream. Called again whenever a play or seek finds the
/// device without one.
type OutputOpener = Box<dyn FnMut() -> Result<OutputStream, String>>;

fn open_default_output() -> Result<OutputStream, String> {
    let mut stream = OutputStreamBuilder::open_default_stream().map_err(|e| e.to_string())?;
    // rodio logs to stderr when OutputStream is dropped. That's useful in debugging,
    // but noisy for a TUI app.
    stream.log_on_drop(false);
    Ok(stream)
}

/// Everything the audio thread owns. Only ever touched from that thread.
struct DeviceState {
    stream: Option<OutputStream>,
    open_output: OutputOpener,
    generation: Generation,
    loaded: Option<Loaded>,
    /// Locator the engine asked for that is not loaded yet; the next `play`
    /// tries it again.
    unloaded: Option<String>,
    playing: bool,
    volume: f32,
    events: Sender<DeviceEvent>,
}

impl DeviceState {
    fn new(events: Sender<DeviceEvent>, open_output: OutputOpener) -> Self {
        Self {
            stream: None,
            open_output,
            generation: Generation::default(),
            loaded: None,
            unloaded: None,
            playing: false,
            volume: 1.0,
            events,
        }
    }

    fn ensure_output(&mut self) -> Result<&OutputStream, DeviceError> {
        if self.stream.is_none() {
            let stream = (self.open_output)().map_err(DeviceError::NoOutput)?;
            info!("audio output opened");
            self.stream = Some(stream);
        }
        self.stream
            .as_ref()
            .ok_or_else(|| DeviceError::NoOutput("output stream missing".to_string()))
    }

    fn open_sink(&mut self, url: &str, start_at: Duration) -> Result<OpenedSink, DeviceError> {
        let volume = self.volume;
        let stream = self.ensure_output()?;
        create_sink_at(stream, url, start_at, volume)
    }

    /// Decode `url` paused and announce its duration.
    fn attach(&mut self, url: &str) -> Result<(), DeviceError> {
        let opened = self.open_sink(url, Duration::ZERO)?;
        debug!(%url, generation = self.generation.value(), total = ?opened.total, "source loaded");
        self.emit_metadata(opened.total);
        self.loaded = Some(Loaded {
            url: url.to_string(),
            sink: opened.sink,
            total: opened.total,
            offset: Duration::ZERO,
        });
        self.unloaded = None;
        Ok(())
    }

    /// Make sure something is loaded, retrying a locator whose load failed.
    fn ensure_loaded(&mut self) -> Result<&Loaded, DeviceError> {
        if self.loaded.is_none() {
            let url = self.unloaded.clone().ok_or(DeviceError::NothingLoaded)?;
            self.attach(&url)?;
        }
        self.loaded.as_ref().ok_or(DeviceError::NothingLoaded)
    }

    fn emit(&self, event: DeviceEvent) {
        // The engine going away is the only way this fails; nothing left to tell.
        let _ = self.events.send(event);
    }

    fn emit_position(&self, position: Duration) {
        self.emit(DeviceEvent::PositionAdvanced {
            generation: self.generation,
            time: position.as_secs_f64(),
        });
    }

    fn emit_metadata(&self, total: Option<Duration>) {
        if let Some(total) = total {
            self.emit(DeviceEvent::MetadataReady {
                generation: self.generation,
                duration: total.as_secs_f64(),
            });
        }
    }

    fn handle(&mut self, cmd: DeviceCmd) {
        match cmd {
            DeviceCmd::Load { url, generation } => self.load(url, generation),
            DeviceCmd::Play(ticket) => self.play(ticket),
            DeviceCmd::Pause => self.pause(),
            DeviceCmd::SetPosition(secs) => self.set_position(secs),
            DeviceCmd::SetVolume(v) => self.set_volume(v),
            DeviceCmd::Quit { fade_out_ms } => self.quit(fade_out_ms),
        }
    }

    fn load(&mut self, url: String, generation: Generation) {
        self.generation = generation;

        // Same locator: keep the source, re-announce what we know under the new tag.
        if let Some(loaded) = self.loaded.as_ref().filter(|l| l.url == url && !l.sink.empty()) {
            debug!(%url, generation = generation.value(), "source already loaded");
            self.emit_metadata(loaded.total);
            self.emit_position(loaded.position());
            return;
        }

        if let Some(old) = self.loaded.take() {
            old.sink.stop();
        }
        self.playing = false;
        self.unloaded = Some(url.clone());

        if let Err(e) = self.attach(&url) {
            warn!(%url, error = %e, "load failed; will retry on play");
        }
    }

    fn play(&mut self, ticket: PlayTicket) {
        let outcome = match self.ensure_loaded() {
            Ok(loaded) => {
                loaded.sink.play();
                Ok(())
            }
            Err(e) => Err(e),
        };
        self.playing = outcome.is_ok();
        self.emit(DeviceEvent::PlayResolved { ticket, outcome });
    }

    fn pause(&mut self) {
        if let Some(loaded) = self.loaded.as_ref() {
            loaded.sink.pause();
        }
        self.playing = false;
    }

    /// Rebuild the sink and skip into the file; `Sink` seeking is not
    /// reliable across formats.
    fn set_position(&mut self, secs: f64) {
        let Some(old) = self.loaded.take() else {
            return;
        };
        let target = seek_target(secs, old.total);
        old.sink.stop();

        match self.open_sink(&old.url, target) {
            Ok(opened) => {
                if self.playing {
                    opened.sink.play();
                }
                self.loaded = Some(Loaded {
                    url: old.url,
                    sink: opened.sink,
                    total: old.total.or(opened.total),
                    offset: target,
                });
                self.emit_position(target);
            }
            Err(e) => {
                warn!(url = %old.url, error = %e, "seek failed; source dropped");
                self.playing = false;
                self.unloaded = Some(old.url);
                self.emit(DeviceEvent::Failed {
                    generation: self.generation,
                    error: e,
                });
            }
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        if let Some(loaded) = self.loaded.as_ref() {
            loaded.sink.set_volume(volume);
        }
    }

    /// Periodic position report; detects the end of the source.
    fn tick(&mut self) {
        if !self.playing {
            return;
        }
        let Some(loaded) = self.loaded.as_ref() else {
            return;
        };

        if loaded.sink.empty() {
            self.playing = false;
            debug!(generation = self.generation.value(), "source ended");
            self.emit(DeviceEvent::Ended {
                generation: self.generation,
            });
        } else {
            self.emit_position(loaded.position());
        }
    }

    fn quit(&mut self, fade_out_ms: u64) {
        if let Some(loaded) = self.loaded.take() {
            if self.playing {
                fade_out_sink(&loaded.sink, self.volume, fade_out_ms);
            }
            loaded.sink.stop();
        }
        self.playing = false;
    }
}

/// Seek target in the source, clamped to `[0, total]`.
fn seek_target(secs: f64, total: Option<Duration>) -> Duration {
    let target = Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO);
    match total {
        Some(total) => target.min(total),
        None => target,
    }
}

fn fade_out_sink(sink: &Sink, from: f32, fade_out_ms: u64) {
    if fade_out_ms == 0 {
        sink.set_volume(0.0);
        return;
    }
    let steps: u64 = 20;
    let step_ms = (fade_out_ms / steps).max(1);
    for step in 1..=steps {
        let t = step as f32 / steps as f32;
        sink.set_volume(from * (1.0 - t));
        thread::sleep(Duration::from_millis(step_ms));
    }
    sink.set_volume(0.0);
}

pub(super) fn spawn_device_thread(
    rx: Receiver<DeviceCmd>,
    events: Sender<DeviceEvent>,
    settings: AudioSettings,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("cadence-audio".to_string())
        .spawn(move || {
            let mut state = DeviceState::new(events, Box::new(open_default_output));
            if let Err(e) = state.ensure_output() {
                error!(error = %e, "no audio output device; playback will be rejected until one appears");
            }
            let tick = Duration::from_millis(settings.tick_ms.max(1));
            let mut last_tick = Instant::now();

            loop {
                match rx.recv_timeout(tick) {
                    Ok(DeviceCmd::Quit { fade_out_ms }) => {
                        state.quit(fade_out_ms);
                        break;
                    }
                    Ok(cmd) => state.handle(cmd),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }

                // Commands arriving faster than the tick must not starve position reports.
                if last_tick.elapsed() >= tick {
                    state.tick();
                    last_tick = Instant::now();
                }
            }
            info!("audio thread stopped");
        })
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::mpsc::{self, Receiver};

    use rodio::source::SineWave;

    use super::*;

    const NO_DEVICE: &str = "no device";

    /// Device state whose output never opens, with a counter of open attempts.
    fn state() -> (DeviceState, Receiver<DeviceEvent>, Rc<Cell<usize>>) {
        let (tx, rx) = mpsc::channel();
        let attempts = Rc::new(Cell::new(0));
        let counter = attempts.clone();
        let opener: OutputOpener = Box::new(move || {
            counter.set(counter.get() + 1);
            Err(NO_DEVICE.to_string())
        });
        (DeviceState::new(tx, opener), rx, attempts)
    }

    /// A source that is loaded but attached to no output.
    fn loaded(url: &str, total: Option<Duration>, offset: Duration) -> Loaded {
        let (sink, _queue) = Sink::new();
        sink.append(SineWave::new(440.0));
        Loaded {
            url: url.to_string(),
            sink,
            total,
            offset,
        }
    }

    fn drained(url: &str) -> Loaded {
        let (sink, _queue) = Sink::new();
        Loaded {
            url: url.to_string(),
            sink,
            total: None,
            offset: Duration::ZERO,
        }
    }

    fn gen1() -> Generation {
        Generation::default().next()
    }

    fn ticket(generation: Generation, request: u64) -> PlayTicket {
        PlayTicket {
            generation,
            request,
        }
    }

    fn events(rx: &Receiver<DeviceEvent>) -> Vec<DeviceEvent> {
        rx.try_iter().collect()
    }

    #[test]
    fn play_with_nothing_loaded_rejects() {
        let (mut s, rx, attempts) = state();
        let t = ticket(gen1(), 1);
        s.play(t);

        assert!(!s.playing);
        assert_eq!(attempts.get(), 0);
        assert_eq!(
            events(&rx),
            vec![DeviceEvent::PlayResolved {
                ticket: t,
                outcome: Err(DeviceError::NothingLoaded)
            }]
        );
    }

    #[test]
    fn play_without_output_rejects_and_retries_on_every_play() {
        let (mut s, rx, attempts) = state();
        let g = gen1();
        s.load("file:///music/a.mp3".to_string(), g);
        assert_eq!(attempts.get(), 1);
        assert!(events(&rx).is_empty());

        for request in 1..=2 {
            let t = ticket(g, request);
            s.play(t);
            assert!(!s.playing);
            assert_eq!(
                events(&rx),
                vec![DeviceEvent::PlayResolved {
                    ticket: t,
                    outcome: Err(DeviceError::NoOutput(NO_DEVICE.to_string()))
                }]
            );
        }
        assert_eq!(attempts.get(), 3);
        assert_eq!(s.unloaded.as_deref(), Some("file:///music/a.mp3"));
    }

    #[test]
    fn reloading_the_same_locator_adopts_the_generation_and_reannounces() {
        let (mut s, rx, attempts) = state();
        s.loaded = Some(loaded(
            "file:///music/a.mp3",
            Some(Duration::from_secs(200)),
            Duration::from_secs(5),
        ));
        let g2 = gen1().next();

        s.load("file:///music/a.mp3".to_string(), g2);

        assert_eq!(s.generation, g2);
        assert!(s.loaded.is_some());
        assert_eq!(attempts.get(), 0);
        assert_eq!(
            events(&rx),
            vec![
                DeviceEvent::MetadataReady {
                    generation: g2,
                    duration: 200.0
                },
                DeviceEvent::PositionAdvanced {
                    generation: g2,
                    time: 5.0
                },
            ]
        );
    }

    #[test]
    fn loading_another_locator_drops_the_old_source() {
        let (mut s, rx, _) = state();
        s.loaded = Some(loaded("file:///music/a.mp3", None, Duration::ZERO));
        s.playing = true;

        s.load("file:///music/b.mp3".to_string(), gen1());

        assert!(s.loaded.is_none());
        assert!(!s.playing);
        assert_eq!(s.unloaded.as_deref(), Some("file:///music/b.mp3"));
        assert!(events(&rx).is_empty());
    }

    #[test]
    fn drained_source_reports_ended_once() {
        let (mut s, rx, _) = state();
        s.generation = gen1();
        s.loaded = Some(drained("file:///music/a.mp3"));
        s.playing = true;

        s.tick();
        s.tick();

        assert_eq!(events(&rx), vec![DeviceEvent::Ended { generation: gen1() }]);
        assert!(!s.playing);
    }

    #[test]
    fn ticks_report_position_only_while_playing() {
        let (mut s, rx, _) = state();
        s.generation = gen1();
        s.loaded = Some(loaded("file:///music/a.mp3", None, Duration::from_secs(3)));

        s.tick();
        assert!(events(&rx).is_empty());

        s.playing = true;
        s.tick();
        assert_eq!(
            events(&rx),
            vec![DeviceEvent::PositionAdvanced {
                generation: gen1(),
                time: 3.0
            }]
        );

        s.pause();
        s.tick();
        assert!(events(&rx).is_empty());
    }

    #[test]
    fn seek_target_is_clamped_to_the_source() {
        let total = Some(Duration::from_secs(200));
        assert_eq!(seek_target(500.0, total), Duration::from_secs(200));
        assert_eq!(seek_target(-3.0, total), Duration::ZERO);
        assert_eq!(seek_target(f64::NAN, None), Duration::ZERO);
        assert_eq!(seek_target(12.5, None), Duration::from_millis(12_500));
    }

    #[test]
    fn failed_seek_reports_and_next_play_retries() {
        let (mut s, rx, attempts) = state();
        let g = gen1();
        s.generation = g;
        s.loaded = Some(loaded(
            "file:///music/a.mp3",
            Some(Duration::from_secs(200)),
            Duration::ZERO,
        ));
        s.playing = true;

        s.set_position(10.0);

        assert!(s.loaded.is_none());
        assert!(!s.playing);
        assert_eq!(s.unloaded.as_deref(), Some("file:///music/a.mp3"));
        assert_eq!(
            events(&rx),
            vec![DeviceEvent::Failed {
                generation: g,
                error: DeviceError::NoOutput(NO_DEVICE.to_string())
            }]
        );

        let t = ticket(g, 2);
        s.play(t);
        assert_eq!(attempts.get(), 2);
        assert_eq!(
            events(&rx),
            vec![DeviceEvent::PlayResolved {
                ticket: t,
                outcome: Err(DeviceError::NoOutput(NO_DEVICE.to_string()))
            }]
        );
    }

    #[test]
    fn seek_with_nothing_loaded_is_ignored() {
        let (mut s, rx, attempts) = state();
        s.set_position(42.0);
        assert!(events(&rx).is_empty());
        assert_eq!(attempts.get(), 0);
    }
}
