//! The conversation transcript sent to the engine on every turn.

use nira_engine::ChatMessage;

use crate::error::{Error, Result};

/// Ordered, append-only log of role-tagged messages.
///
/// The first entry is always the single system message set by the last
/// [`reset`](Self::reset).
#[derive(Debug, Clone)]
pub struct ChatTranscript {
    messages: Vec<ChatMessage>,
}

impl ChatTranscript {
    /// Create a transcript holding only `system_prompt`
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt)],
        }
    }

    /// Replace the whole conversation with a single system message
    pub fn reset(&mut self, system_prompt: impl Into<String>) {
        self.messages.clear();
        self.messages.push(ChatMessage::system(system_prompt));
    }

    /// Append a user message. Blank text is rejected.
    pub fn append_user(&mut self, text: &str) -> Result<&ChatMessage> {
        if text.trim().is_empty() {
            return Err(Error::EmptyInput);
        }
        Ok(self.push(ChatMessage::user(text)))
    }

    /// Append an assistant message
    pub fn append_assistant(&mut self, text: impl Into<String>) -> &ChatMessage {
        self.push(ChatMessage::assistant(text))
    }

    /// The exact payload for the engine
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.messages.clone()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Never true; the system message is always present.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> &ChatMessage {
        // reset/new always leave one message and nothing removes entries
        &self.messages[self.messages.len() - 1]
    }

    /// The system prompt the conversation was started with
    pub fn system_prompt(&self) -> &str {
        &self.messages[0].content
    }

    fn push(&mut self, message: ChatMessage) -> &ChatMessage {
        self.messages.push(message);
        self.last()
    }
}
