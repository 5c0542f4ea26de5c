//! The engine capability consumed by the session layer

use std::sync::Arc;

use async_trait::async_trait;

use crate::{ChatMessage, ChunkStream, RawProgress, Result, SamplingOptions};

/// Callback receiving raw load progress.
///
/// Engines may call it from any task and at any time during `load`.
pub type ProgressSink = Arc<dyn Fn(RawProgress) + Send + Sync>;

/// A local inference engine: download-then-run.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Download (if needed) and prepare `model_id` for inference.
    ///
    /// Returns once the model can serve `stream_chat`. Failures carry an
    /// engine-supplied diagnostic.
    async fn load(&self, model_id: &str, progress: ProgressSink) -> Result<()>;

    /// Start a streamed chat completion over the full message list.
    async fn stream_chat(
        &self,
        messages: Vec<ChatMessage>,
        options: &SamplingOptions,
    ) -> Result<ChunkStream>;
}
