//! Session-lifetime token accounting

use nira_engine::Usage;
use serde::{Deserialize, Serialize};

/// Running total of tokens consumed since the conversation was last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageTally {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    /// Turns that reported usage
    pub turns: u32,
}

impl UsageTally {
    /// Add one turn's reported usage
    pub fn add(&mut self, usage: &Usage) {
        self.prompt_tokens += u64::from(usage.prompt_tokens);
        self.completion_tokens += u64::from(usage.completion_tokens);
        self.turns += 1;
    }

    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
