//! Session event types

use nira_engine::ChatMessage;
use serde::{Deserialize, Serialize};

use crate::{assembler::Generation, error::ErrorKind, state::SessionState, usage::UsageTally};

/// Events emitted to the presentation layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Load progress for the bar
    Progress { percent: u8, message: String },

    /// The lifecycle state changed
    StateChanged { state: SessionState },

    /// The conversation was replaced by a single system message
    TranscriptReset { system_prompt: String },

    /// A message was appended to the transcript
    TranscriptAppended { message: ChatMessage },

    /// Running text of the current assistant turn
    StreamingUpdate { generation: Generation, text: String },

    /// A turn ended with an engine failure
    TurnFailed {
        generation: Generation,
        partial_text: String,
        notice: String,
    },

    /// The session token tally changed
    UsageUpdated { tally: UsageTally },

    /// A user-facing error
    Error { kind: ErrorKind, message: String },
}
