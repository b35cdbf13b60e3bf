use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level failure (connection refused, reset, bad body stream).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Reading endpoint answered with a non-success status.
    #[error("Unexpected status code: {0}")]
    Status(u16),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
