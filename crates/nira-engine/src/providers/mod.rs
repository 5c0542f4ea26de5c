//! Engine implementations

pub mod ollama;

pub use ollama::OllamaEngine;
