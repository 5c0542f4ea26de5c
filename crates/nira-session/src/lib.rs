//! nira-session: Session lifecycle and streaming response orchestration
//!
//! This crate owns the model-acquisition state machine, the chat transcript,
//! the generation-tagged assembly of streamed responses, and the
//! orchestrator that ties them to an [`nira_engine::Engine`].

pub mod assembler;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod progress;
pub mod state;
pub mod transcript;
pub mod usage;

pub use assembler::{FinalTurn, Generation, StreamAssembler};
pub use error::{Error, ErrorKind, Result};
pub use events::SessionEvent;
pub use orchestrator::{
    DEFAULT_FAILURE_NOTICE, DEFAULT_SYSTEM_PROMPT, SessionConfig, SessionOrchestrator, TurnOutcome,
};
pub use progress::{Progress, ProgressReporter};
pub use state::SessionState;
pub use transcript::ChatTranscript;
pub use usage::UsageTally;
