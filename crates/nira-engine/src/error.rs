//! Error types for nira-engine

use thiserror::Error;

/// Result type alias using nira-engine Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to an inference engine
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Engine returned an error response
    #[error("Engine error: {message} (type: {error_type})")]
    Api { error_type: String, message: String },

    /// Engine is not reachable or not installed
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    /// Server-sent events error
    #[error("SSE error: {0}")]
    Sse(String),

    /// Unexpected response format
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Model not found in the catalog
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create an API error from type and message
    pub fn api(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            error_type: error_type.into(),
            message: message.into(),
        }
    }

    /// Human-readable diagnostic, without the variant prefix.
    ///
    /// The session layer passes this through as engine-supplied text.
    pub fn diagnostic(&self) -> String {
        match self {
            Error::Api { message, .. } => message.clone(),
            Error::Unavailable(msg) | Error::Sse(msg) | Error::UnexpectedResponse(msg) => {
                msg.clone()
            }
            other => other.to_string(),
        }
    }

}
