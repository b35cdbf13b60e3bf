pub const TICK_RATE_MS: u64 = 1000; // one poll per second
pub const MAX_SAMPLES: usize = 120;

// Analysis fires when the successful-tick counter equals this value exactly.
pub const ANALYSIS_TRIGGER_TICK: u64 = 10;
// Seconds shown in the pending countdown.
pub const COUNTDOWN_SECS: u64 = 120;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
pub const DATA_PATH: &str = "/data";
pub const ANALYSIS_PATH: &str = "/gemini";

pub const CHART_Y_MAX: f64 = 1000.0;
pub const UNIT: &str = "NTU";

pub const NO_INSIGHTS_MSG: &str = "No insights found.";
pub const MALFORMED_RESPONSE_MSG: &str = "Gemini returned malformed response.";
pub const FETCH_ERROR_MSG: &str = "Error fetching Gemini insights.";
pub const GENERATING_MSG: &str = "Generating insights...";
