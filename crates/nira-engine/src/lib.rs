//! nira-engine: Local inference engine abstraction
//!
//! This crate defines the contract the session layer expects from an
//! on-device inference engine (load a model with progress, stream a chat
//! completion), the static model catalog, and an adapter for a local
//! Ollama daemon.

pub mod catalog;
pub mod engine;
pub mod error;
pub mod providers;
pub mod stream;
pub mod types;

pub use catalog::{ModelCatalog, ModelDescriptor};
pub use engine::{Engine, ProgressSink};
pub use error::{Error, Result};
pub use stream::{ChunkStream, StreamChunk};
pub use types::*;
