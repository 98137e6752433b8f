//! Logger setup errors
use thiserror::Error;

/// Result type for logger setup
pub type LogResult<T> = Result<T, LogError>;

/// Errors raised while building the subscriber
#[derive(Error, Debug)]
pub enum LogError {
    /// The filter directive string did not parse
    #[error("Invalid filter '{directive}': {reason}")]
    Filter {
        /// The rejected directive string
        directive: String,
        /// Parser message
        reason: String,
    },

    /// A global subscriber is already installed
    #[error("Global subscriber already installed: {0}")]
    AlreadyInitialized(String),
}
