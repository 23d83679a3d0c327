use std::sync::mpsc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{debug, info};

use crate::app::{App, InputMode, PlayRequest};
use crate::audio::{DeviceEvent, MediaOutputDevice};
use crate::config;
use crate::engine::{EngineEvent, PlaybackEngine};
use crate::mpris::{ControlCmd, MprisHandle, micros_to_secs};
use crate::runtime::mpris_sync::update_mpris;
use crate::ui;

/// State tracked by the runtime event loop across iterations.
#[derive(Debug, Default)]
pub struct EventLoopState {
    /// Internal two-key prefix state used for `gg` handling.
    pub pending_gg: bool,
}

/// Channels the loop drains on every iteration.
pub struct Inputs<'a> {
    pub device_events: &'a mpsc::Receiver<DeviceEvent>,
    pub engine_events: &'a mpsc::Receiver<EngineEvent>,
    pub control_tx: &'a mpsc::Sender<ControlCmd>,
    pub control_rx: &'a mpsc::Receiver<ControlCmd>,
}

/// Main terminal event loop. Device events, engine notifications and MPRIS
/// commands are applied one at a time on this thread, then the UI is drawn
/// and keys are polled. Returns `Ok(())` when shutdown is requested.
pub fn run<D: MediaOutputDevice>(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    settings: &config::Settings,
    app: &mut App,
    engine: &mut PlaybackEngine<D>,
    mpris: &MprisHandle,
    inputs: &Inputs<'_>,
    state: &mut EventLoopState,
) -> anyhow::Result<()> {
    loop {
        while let Ok(ev) = inputs.device_events.try_recv() {
            engine.handle_device_event(ev);
        }

        while let Ok(ev) = inputs.engine_events.try_recv() {
            apply_engine_event(app, ev);
        }

        while let Ok(cmd) = inputs.control_rx.try_recv() {
            if handle_control_cmd(cmd, app, engine) {
                return Ok(());
            }
        }

        update_mpris(mpris, engine);

        let snapshot = engine.snapshot();
        terminal.draw(|f| ui::draw(f, app, &snapshot, &settings.ui, &settings.controls))?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if handle_key_event(key, settings, app, engine, inputs.control_tx, state) {
                    info!("quit requested");
                    break;
                }
            }
        }
    }

    Ok(())
}

fn apply_engine_event(app: &mut App, ev: EngineEvent) {
    match ev {
        EngineEvent::PlaybackFailed(err) => app.set_status(err.to_string()),
        EngineEvent::TrackChanged { index, track } => {
            debug!(index, track = %track.id, "now playing");
        }
        EngineEvent::TransportChanged(_) => {}
    }
}

fn start<D: MediaOutputDevice>(engine: &mut PlaybackEngine<D>, req: PlayRequest) {
    engine.play_track(req.track, Some(req.context));
}

/// Play from MPRIS (or space) with nothing loaded starts the selected song.
fn play_or_start<D: MediaOutputDevice>(app: &mut App, engine: &mut PlaybackEngine<D>) {
    if engine.current_track().is_some() {
        engine.play();
    } else if let Some(req) = app.activate_selected() {
        start(engine, req);
    }
}

fn handle_control_cmd<D: MediaOutputDevice>(
    cmd: ControlCmd,
    app: &mut App,
    engine: &mut PlaybackEngine<D>,
) -> bool {
    debug!(?cmd, "control command");
    match cmd {
        ControlCmd::Quit => return true,
        ControlCmd::Play => play_or_start(app, engine),
        ControlCmd::Pause => engine.pause(),
        ControlCmd::PlayPause => {
            if engine.current_track().is_some() {
                engine.toggle_play();
            } else {
                play_or_start(app, engine);
            }
        }
        ControlCmd::Stop => {
            engine.pause();
            engine.seek_to(0.0);
        }
        ControlCmd::Next => engine.next(),
        ControlCmd::Prev => engine.prev(),
        ControlCmd::Seek(offset) => {
            let target = engine.current_time() + micros_to_secs(offset);
            engine.seek_to(target);
        }
        ControlCmd::SetPosition(position) => engine.seek_to(micros_to_secs(position)),
    }

    false
}

fn handle_text_input(key: KeyEvent, app: &mut App) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match app.mode {
        InputMode::Search => match key.code {
            KeyCode::Esc => app.clear_search(),
            KeyCode::Enter => app.exit_search(),
            KeyCode::Backspace => app.pop_query_char(),
            KeyCode::Down => app.next(),
            KeyCode::Up => app.prev(),
            KeyCode::Char('j') | KeyCode::Char('n') if ctrl => app.next(),
            KeyCode::Char('k') | KeyCode::Char('p') if ctrl => app.prev(),
            KeyCode::Char(c) if !c.is_control() => app.push_query_char(c),
            _ => {}
        },
        InputMode::NewPlaylist => match key.code {
            KeyCode::Esc => app.cancel_new_playlist(),
            KeyCode::Enter => app.commit_new_playlist(),
            KeyCode::Backspace => app.pop_name_char(),
            KeyCode::Char(c) if !c.is_control() => app.push_name_char(c),
            _ => {}
        },
        InputMode::Normal => {}
    }
}

/// Returns `true` when the user asked to quit.
fn handle_key_event<D: MediaOutputDevice>(
    key: KeyEvent,
    settings: &config::Settings,
    app: &mut App,
    engine: &mut PlaybackEngine<D>,
    control_tx: &mpsc::Sender<ControlCmd>,
    state: &mut EventLoopState,
) -> bool {
    if app.mode != InputMode::Normal {
        state.pending_gg = false;
        handle_text_input(key, app);
        return false;
    }

    if key.code == KeyCode::Char('D') {
        state.pending_gg = false;
        app.request_delete();
        return false;
    }
    app.cancel_pending_delete();
    app.clear_status();

    if key.code != KeyCode::Char('g') {
        state.pending_gg = false;
    }

    let scrub = settings.controls.scrub_seconds as f64;
    let step = settings.controls.volume_step;

    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('/') => app.enter_search(),
        KeyCode::Esc => {
            if app.metadata_window {
                app.toggle_metadata_window();
            } else {
                app.clear_search();
            }
        }
        KeyCode::Char('g') => {
            if state.pending_gg {
                state.pending_gg = false;
                app.select_first();
            } else {
                state.pending_gg = true;
            }
        }
        KeyCode::Char('G') => app.select_last(),
        KeyCode::Char('j') | KeyCode::Down => app.next(),
        KeyCode::Char('k') | KeyCode::Up => app.prev(),
        KeyCode::Enter => {
            if let Some(req) = app.activate_selected() {
                start(engine, req);
            }
        }
        KeyCode::Char('A') => {
            if let Some(req) = app.play_all() {
                start(engine, req);
            }
        }
        KeyCode::Char('p') | KeyCode::Char(' ') => {
            let _ = control_tx.send(ControlCmd::PlayPause);
        }
        KeyCode::Char('l') => {
            let _ = control_tx.send(ControlCmd::Next);
        }
        KeyCode::Char('h') => {
            let _ = control_tx.send(ControlCmd::Prev);
        }
        KeyCode::Char('L') => engine.seek_to(engine.current_time() + scrub),
        KeyCode::Char('H') => engine.seek_to(engine.current_time() - scrub),
        KeyCode::Char('+') | KeyCode::Char('=') => engine.set_volume(engine.volume() + step),
        KeyCode::Char('-') => engine.set_volume(engine.volume() - step),
        KeyCode::Tab => app.cycle_view(),
        KeyCode::Char('c') => app.begin_new_playlist(),
        KeyCode::Char('a') => app.add_selected_to_target(),
        KeyCode::Char('x') => app.remove_selected_from_playlist(),
        KeyCode::Char('K') => app.toggle_metadata_window(),
        _ => {}
    }

    false
}
