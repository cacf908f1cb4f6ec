//! Common error types for calcert

use thiserror::Error;

/// Common result type for calcert operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across calcert crates
///
/// The statistics calculator never produces these; malformed measurements
/// degrade to empty statistics instead.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session or configuration file could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// JSON export failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Referenced point, channel or syringe does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Edit refused because it would leave the instrument without points
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Invalid user input for the current instrument
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Parse(err.to_string())
    }
}
