//! Common error types for the NAI client

use thiserror::Error;

/// Common result type for NAI client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the NAI client crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Inbound frame could not be decoded as JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML configuration file could not be parsed
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A `done` payload did not have the shape its operation expects
    #[error("Malformed response for {op}: {reason}")]
    MalformedResponse { op: String, reason: String },

    /// Sending a request to the worker failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
