//! Error types for nira-session

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::SessionState;

/// Result type alias using nira-session Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during session operations
#[derive(Error, Debug)]
pub enum Error {
    /// A state machine transition outside the allowed set
    #[error("Invalid transition: cannot {action} while {from}")]
    InvalidTransition {
        from: SessionState,
        action: &'static str,
    },

    /// Chat attempted before the model is ready
    #[error("Model is not ready (state: {state}); start the model first")]
    NotReady { state: SessionState },

    /// Model id absent from the catalog
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// Blank user input
    #[error("Message is empty")]
    EmptyInput,

    /// The engine failed to download or prepare the model
    #[error("Model load failed: {0}")]
    ModelLoadFailed(String),

    /// The engine failed mid-generation; `partial` is what arrived first
    #[error("Generation failed: {reason}")]
    StreamFailed { reason: String, partial: String },

    /// A superseded turn's result was dropped
    #[error("Turn was superseded by a newer request")]
    Discarded,
}

/// Copyable error tag for presentation events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidTransition,
    NotReady,
    UnknownModel,
    EmptyInput,
    ModelLoadFailed,
    StreamFailed,
    Discarded,
}

impl Error {
    /// The taxonomy tag for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Error::NotReady { .. } => ErrorKind::NotReady,
            Error::UnknownModel(_) => ErrorKind::UnknownModel,
            Error::EmptyInput => ErrorKind::EmptyInput,
            Error::ModelLoadFailed(_) => ErrorKind::ModelLoadFailed,
            Error::StreamFailed { .. } => ErrorKind::StreamFailed,
            Error::Discarded => ErrorKind::Discarded,
        }
    }

    /// Whether this error is meant to be shown to the user.
    ///
    /// Invalid transitions are logged instead; empty input and discarded
    /// turns are silent no-ops.
    pub fn is_user_facing(&self) -> bool {
        self.kind().is_user_facing()
    }
}

impl ErrorKind {
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            ErrorKind::NotReady
                | ErrorKind::UnknownModel
                | ErrorKind::ModelLoadFailed
                | ErrorKind::StreamFailed
        )
    }
}
