use std::collections::VecDeque;

use chrono::Local;
use tracing::{debug, info, warn};

use ratatui::style::Style;

use crate::constants::{COUNTDOWN_SECS, GENERATING_MSG, MAX_SAMPLES};
use crate::util::{markdown_lines, wrapped_height};

// Terminal width assumed until the first resize arrives
const DEFAULT_WIDTH: u16 = 80;

// One sensor reading and the wall-clock label it was captured at
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub value: f64,
    pub timestamp: String,
}

impl Sample {
    pub fn new(value: f64, timestamp: impl Into<String>) -> Self {
        Self {
            value,
            timestamp: timestamp.into(),
        }
    }

    /// Stamps the reading with the local time of day.
    pub fn now(value: f64) -> Self {
        Self::new(value, Local::now().format("%H:%M:%S").to_string())
    }
}

// Rolling buffer of the most recent readings, oldest first
#[derive(Debug, Clone)]
pub struct SampleWindow {
    samples: VecDeque<Sample>,
}

impl SampleWindow {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(MAX_SAMPLES),
        }
    }

    pub fn push(&mut self, sample: Sample) {
        self.samples.push_back(sample);
        while self.samples.len() > MAX_SAMPLES {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    pub fn first(&self) -> Option<&Sample> {
        self.samples.front()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Values only, in arrival order. This is the analysis payload.
    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.value).collect()
    }
}

impl Default for SampleWindow {
    fn default() -> Self {
        Self::new()
    }
}

/// Events delivered to the single state owner.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A poll succeeded.
    Reading(Sample),
    /// A poll failed; the tick is skipped.
    ReadingFailed(String),
    /// The analysis request settled with displayable text.
    Analysis(String),
    /// Terminal width changed; re-clamps the insight scroll and repaints.
    Resize(u16),
    /// Scroll the insight text back by this many rows.
    ScrollUp(u16),
    /// Scroll the insight text forward by this many rows.
    ScrollDown(u16),
}

/// Side effects requested by a state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    RequestAnalysis(Vec<f64>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsightTone {
    Pending,
    Success,
    Error,
}

// Main application state
#[derive(Debug, Clone)]
pub struct App {
    pub window: SampleWindow,
    pub current_value: Option<f64>,
    pub elapsed_ticks: u64,
    pub failed_polls: u64,
    pub analysis: Option<String>,
    /// First visible row of the insight panel.
    pub scroll: u16,
    analysis_tick: u64,
    width: u16,
}

impl App {
    pub fn new(analysis_tick: u64) -> App {
        App {
            window: SampleWindow::new(),
            current_value: None,
            elapsed_ticks: 0,
            failed_polls: 0,
            analysis: None,
            scroll: 0,
            analysis_tick,
            width: DEFAULT_WIDTH,
        }
    }

    pub fn update(&mut self, message: Message) -> Option<Command> {
        match message {
            Message::Reading(sample) => self.on_tick(sample),
            Message::ReadingFailed(reason) => {
                self.failed_polls += 1;
                warn!(
                    failed_polls = self.failed_polls,
                    reason = %reason,
                    "Skipping tick, reading unavailable"
                );
                None
            }
            Message::Analysis(text) => {
                info!(chars = text.len(), "Analysis settled");
                self.analysis = Some(text);
                self.scroll = 0;
                None
            }
            Message::Resize(width) => {
                self.width = width;
                self.scroll = self.scroll.min(self.max_scroll());
                None
            }
            Message::ScrollUp(rows) => {
                self.scroll = self.scroll.saturating_sub(rows);
                None
            }
            Message::ScrollDown(rows) => {
                self.scroll = self.scroll.saturating_add(rows).min(self.max_scroll());
                None
            }
        }
    }

    // Last scroll offset that still shows a line: the final wrapped row at the top.
    fn max_scroll(&self) -> u16 {
        let (text, _) = self.insight();
        // Panel borders take one column on each side.
        let inner = self.width.saturating_sub(2);
        let rows = wrapped_height(&markdown_lines(&text, Style::default()), inner);
        u16::try_from(rows.saturating_sub(1)).unwrap_or(u16::MAX)
    }

    /// Records one successful poll.
    pub fn on_tick(&mut self, sample: Sample) -> Option<Command> {
        debug!(value = sample.value, time = %sample.timestamp, "Reading received");
        self.current_value = Some(sample.value);
        self.window.push(sample);
        self.elapsed_ticks += 1;
        self.maybe_trigger_analysis()
    }

    // Exact equality: a counter that never lands on the trigger never fires.
    fn maybe_trigger_analysis(&self) -> Option<Command> {
        if self.elapsed_ticks != self.analysis_tick {
            return None;
        }
        let values = self.window.values();
        info!(samples = values.len(), tick = self.elapsed_ticks, "Triggering analysis");
        Some(Command::RequestAnalysis(values))
    }

    /// Text and styling for the insight panel.
    pub fn insight(&self) -> (String, InsightTone) {
        match &self.analysis {
            Some(text) => {
                let tone = if text.starts_with("Error") || text.starts_with("Gemini") {
                    InsightTone::Error
                } else {
                    InsightTone::Success
                };
                (text.clone(), tone)
            }
            None if self.elapsed_ticks < COUNTDOWN_SECS => (
                format!(
                    "Collecting data... {}s left for Gemini analysis.",
                    COUNTDOWN_SECS.saturating_sub(self.elapsed_ticks)
                ),
                InsightTone::Pending,
            ),
            None => (GENERATING_MSG.to_string(), InsightTone::Pending),
        }
    }
}
