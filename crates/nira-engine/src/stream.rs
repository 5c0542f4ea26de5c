//! Streaming chunk types and utilities

use crate::error::Result;
use crate::types::Usage;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;

/// One item of a streamed chat completion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Text fragment; may be empty for usage-only chunks
    pub delta: String,
    /// Usage summary, usually only on the final chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl StreamChunk {
    /// A text delta with no usage
    pub fn delta(delta: impl Into<String>) -> Self {
        Self {
            delta: delta.into(),
            usage: None,
        }
    }

    /// A usage-only chunk
    pub fn usage(usage: Usage) -> Self {
        Self {
            delta: String::new(),
            usage: Some(usage),
        }
    }

    /// Whether the chunk carries any text
    pub fn has_text(&self) -> bool {
        !self.delta.is_empty()
    }
}

/// A stream of chat chunks.
///
/// Finite and not restartable. Dropping it early is a valid way to abandon
/// a response; engines do not require explicit cancellation.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// Build a [`ChunkStream`] from a fixed list of items.
pub fn from_chunks(chunks: Vec<Result<StreamChunk>>) -> ChunkStream {
    Box::pin(tokio_stream::iter(chunks))
}
