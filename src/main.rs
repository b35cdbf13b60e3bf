mod app;
mod client;
mod config;
mod constants;
mod controller;
mod error;
mod ui;
mod util;

use std::{error::Error, fs::File, sync::Mutex};

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::app::App;
use crate::client::HttpBackend;
use crate::config::{Cli, Config};
use crate::constants::UNIT;
use crate::controller::LiveReadingController;
use crate::util::format_reading;

fn main() -> Result<(), Box<dyn Error>> {
    let config = Config::try_from(Cli::parse())?;
    setup_logging(&config)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let backend = HttpBackend::new(&config);
    let endpoint = backend.data_url().to_string();
    let token = CancellationToken::new();
    let controller =
        LiveReadingController::new(backend, config.interval, config.analysis_tick, token.clone());

    info!(
        endpoint = %endpoint,
        analysis_tick = config.analysis_tick,
        headless = config.headless,
        "Starting monitor"
    );

    let app = if config.headless {
        let stop = token.clone();
        ctrlc::set_handler(move || stop.cancel())?;
        runtime.block_on(controller.run(headless_printer()))?
    } else {
        runtime.block_on(ui::run(controller, &endpoint, token))?
    };

    info!(ticks = app.elapsed_ticks, failed = app.failed_polls, "Monitor stopped");
    Ok(())
}

// Logs go to a file while the dashboard owns the terminal, stderr otherwise
fn setup_logging(config: &Config) -> Result<(), Box<dyn Error>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(&config.log_level)
            .add_directive("hyper=warn".parse()?)
            .add_directive("reqwest=warn".parse()?),
    };

    if config.headless {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    } else {
        let file = File::create(&config.log_file)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init();
    }
    Ok(())
}

/// Prints each new reading and the insight once it settles.
fn headless_printer() -> impl FnMut(&App) -> error::Result<()> {
    let mut printed_ticks = 0;
    let mut printed_insight = false;
    move |app| {
        if app.elapsed_ticks > printed_ticks {
            printed_ticks = app.elapsed_ticks;
            let time = app.window.last().map(|s| s.timestamp.as_str()).unwrap_or("-");
            let reading = format_reading(app.current_value);
            println!("[{time}] {reading} {UNIT} (tick {printed_ticks})");
        }
        if !printed_insight {
            if let Some(text) = &app.analysis {
                printed_insight = true;
                println!("\n=== Gemini AI Analytics ===\n{text}\n");
            }
        }
        Ok(())
    }
}
