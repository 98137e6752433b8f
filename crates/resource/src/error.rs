//! Error types for resource lifecycle operations
use std::fmt;

use thiserror::Error;

use crate::aggregate::AggregateError;
use crate::lifecycle::Lifecycle;

/// Result type for resource operations
pub type Result<T> = std::result::Result<T, Error>;

/// The lifecycle operation a member was asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Operation {
    /// Transition towards the opened phase.
    Open,
    /// Transition towards the closed phase.
    Close,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Close => write!(f, "close"),
        }
    }
}

/// Error type for open, close and destroy operations
#[derive(Error, Debug)]
pub enum Error {
    /// A resource reported a failure from its own open or close step
    #[error("{message}")]
    Failed {
        /// The error message
        message: String,
        /// The underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration is invalid
    #[error("Configuration error: {message}")]
    Configuration {
        /// The error message
        message: String,
    },

    /// Two or more errors reported together
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// The resource has been closed and cannot be opened again
    #[error("Resource is closed")]
    Closed,

    /// A continuation-style operation dropped its completion without signalling it
    #[error("{operation} completion was dropped without being signalled")]
    Abandoned {
        /// The operation whose completion was dropped
        operation: Operation,
    },

    /// Lifecycle state machine rejected a transition
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition {
        /// The current state
        from: Lifecycle,
        /// The attempted target state
        to: Lifecycle,
    },
}

impl Error {
    /// Create a failure carrying only a message.
    pub fn failed<S: Into<String>>(message: S) -> Self {
        Self::Failed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error.
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Wrap an arbitrary error, keeping its message as this error's message.
    pub fn from_source<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Failed {
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether this error combines several constituent errors.
    #[must_use]
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Self::Aggregate(_))
    }

    /// Whether this error reports an open attempted after close.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// The constituent errors: every member of an aggregate, or just `self`.
    #[must_use]
    pub fn constituents(&self) -> Vec<&Self> {
        match self {
            Self::Aggregate(aggregate) => aggregate.errors().iter().collect(),
            other => vec![other],
        }
    }
}
