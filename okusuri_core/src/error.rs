//! Error types for the okusuri_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for okusuri_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Log, user or settings store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Subscription blob is empty or malformed
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// Push credentials (VAPID key pair) are not configured
    #[error("Push credentials are not configured")]
    MissingCredentials,

    /// Push delivery failed
    #[error("Transport error: {0}")]
    Transport(String),
}

impl Error {
    /// Whether this error only concerns a single notification recipient.
    ///
    /// Recipient errors are logged and skipped by the dispatcher; everything
    /// else aborts the run.
    pub fn is_per_recipient(&self) -> bool {
        matches!(
            self,
            Error::Subscription(_) | Error::MissingCredentials | Error::Transport(_)
        )
    }
}
