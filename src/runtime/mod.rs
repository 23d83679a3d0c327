use std::sync::mpsc;
use std::time::Duration;

use anyhow::Context;
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{info, warn};

use crate::app::App;
use crate::audio::RodioDevice;
use crate::engine::{EngineSettings, PlaybackEngine};
use crate::logging;
use crate::mpris::ControlCmd;

mod event_loop;
mod mpris_sync;
mod settings;
mod startup;

pub fn run() -> anyhow::Result<()> {
    let (settings, config_problem) = settings::load_settings();

    // Held until the end of `run` so buffered log lines are flushed.
    let _log_guard = match logging::init(&settings.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("cadence: logging disabled: {e:#}");
            None
        }
    };
    if let Some(problem) = &config_problem {
        warn!("{problem}");
    }

    let dir = startup::music_dir();
    let library = startup::load_library(&dir, &settings.library);

    let (device, device_events) =
        RodioDevice::spawn(settings.audio.clone()).context("starting the audio thread")?;
    let mut engine = PlaybackEngine::new(device, EngineSettings::from(&settings.playback));
    let engine_events = engine.subscribe();
    let mut app = App::new(library);
    if let Some(problem) = config_problem {
        app.set_status(problem);
    }

    let (control_tx, control_rx) = mpsc::channel::<ControlCmd>();
    let mpris = crate::mpris::spawn_mpris(control_tx.clone());
    mpris_sync::update_mpris(&mpris, &engine);

    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let inputs = event_loop::Inputs {
        device_events: &device_events,
        engine_events: &engine_events,
        control_tx: &control_tx,
        control_rx: &control_rx,
    };
    let mut state = event_loop::EventLoopState::default();
    let run_result = event_loop::run(
        &mut terminal,
        &settings,
        &mut app,
        &mut engine,
        &mpris,
        &inputs,
        &mut state,
    );

    engine
        .device_mut()
        .shutdown(Duration::from_millis(settings.audio.quit_fade_out_ms));

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    info!("shutdown complete");
    run_result
}
