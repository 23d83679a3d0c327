mod app;
mod audio;
mod config;
mod engine;
mod error;
mod library;
mod logging;
mod mpris;
mod runtime;
mod ui;

fn main() -> anyhow::Result<()> {
    runtime::run()
}
