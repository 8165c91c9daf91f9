//! Error types for the planning crate

use thiserror::Error;

/// Main error type for the planning crate
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("discount factor {value} is out of range (must be within [0, 1])")]
    InvalidDiscount { value: f64 },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("Q-value not found for action {action}")]
    QValueNotFound { action: String },

    #[error("unsupported exact transitions for composite action {action}: {context}")]
    CompositeTransitionsUnsupported { action: String, context: String },

    #[error("world model cannot enumerate transitions for action {action}")]
    TransitionsUnavailable { action: String },

    #[error("policy undefined for state {state}")]
    PolicyUndefined { state: String },

    #[error("no states have been discovered; run reachability from a seed state first")]
    NoStatesDiscovered,

    #[error("world model failure: {source}")]
    Model {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("progress bar template error: {message}")]
    ProgressBarTemplate { message: String },
}

impl Error {
    /// Wrap a failure raised by a world model so it propagates unchanged.
    pub fn model<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error::Model {
            source: source.into(),
        }
    }

    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Error::InvalidConfiguration {
            message: message.into(),
        }
    }
}

/// Convenience type alias for Results using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;
