use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use reqwest::Url;

use crate::constants::{ANALYSIS_TRIGGER_TICK, DEFAULT_BASE_URL, MAX_SAMPLES, TICK_RATE_MS};
use crate::error::{Error, Result};

#[derive(Parser, Debug)]
#[command(name = "turbidity_monitor")]
#[command(about = "Live turbidity readings with a one-shot AI summary")]
pub struct Cli {
    /// Base URL of the server exposing /data and /gemini
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Polling interval in milliseconds
    #[arg(long, default_value_t = TICK_RATE_MS)]
    pub interval_ms: u64,

    /// Successful tick count at which the analysis request is sent
    #[arg(long, default_value_t = ANALYSIS_TRIGGER_TICK)]
    pub analysis_tick: u64,

    /// Log file used while the terminal UI owns the screen
    #[arg(long, default_value = "turbidity_monitor.log")]
    pub log_file: PathBuf,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Print readings to stdout instead of drawing the dashboard
    #[arg(long)]
    pub headless: bool,
}

/// Validated runtime settings.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: Url,
    pub interval: Duration,
    pub analysis_tick: u64,
    pub log_file: PathBuf,
    pub log_level: String,
    pub headless: bool,
}

impl TryFrom<Cli> for Config {
    type Error = Error;

    fn try_from(cli: Cli) -> Result<Self> {
        let base_url = parse_base_url(&cli.base_url)?;

        if cli.interval_ms == 0 {
            return Err(Error::Config("interval must be greater than 0 ms".to_string()));
        }
        if cli.analysis_tick == 0 || cli.analysis_tick > MAX_SAMPLES as u64 {
            return Err(Error::Config(format!(
                "analysis tick must be within 1..={MAX_SAMPLES}, got {}",
                cli.analysis_tick
            )));
        }

        Ok(Self {
            base_url,
            interval: Duration::from_millis(cli.interval_ms),
            analysis_tick: cli.analysis_tick,
            log_file: cli.log_file,
            log_level: cli.log_level,
            headless: cli.headless,
        })
    }
}

impl Config {
    /// Joins an endpoint path onto the base URL, keeping any base path prefix.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.as_str().trim_end_matches('/'))
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::Config(format!("base URL '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::Config(format!(
            "base URL must use http or https, not '{other}'"
        ))),
    }
}
