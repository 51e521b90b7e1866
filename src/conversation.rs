use crate::core::error::AskError;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Upper bound on the number of messages a conversation may hold.
pub const MAX_MESSAGES: usize = 100;

/// Headroom kept free for the reply when trimming to a token limit.
const TRIM_HEADROOM: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Ordered message history with a hard size cap and token-budget trimming.
///
/// A system message at index 0 is never evicted by [`trim_to_limit`].
///
/// [`trim_to_limit`]: ConversationBuffer::trim_to_limit
#[derive(Debug, Clone)]
pub struct ConversationBuffer {
    messages: Vec<Message>,
    capacity: usize,
}

impl Default for ConversationBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationBuffer {
    pub fn new() -> Self {
        Self::with_capacity(MAX_MESSAGES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            messages: Vec::new(),
            capacity,
        }
    }

    /// Starts a conversation seeded with a system prompt.
    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        let mut buffer = Self::new();
        buffer.messages.push(Message::new(Role::System, prompt));
        buffer
    }

    pub fn append(&mut self, role: Role, content: impl Into<String>) -> Result<(), AskError> {
        if self.messages.len() >= self.capacity {
            return Err(AskError::CapacityExceeded(self.capacity));
        }
        self.messages.push(Message::new(role, content));
        Ok(())
    }

    /// Rough token estimate: 3 per conversation, 3 per message, one per
    /// four bytes of content and one for a non-empty role.
    pub fn estimate_tokens(&self) -> usize {
        estimate_tokens(&self.messages)
    }

    /// Evicts the oldest non-system message until the estimate plus reply
    /// headroom fits `limit`, or only one message is left.
    pub fn trim_to_limit(&mut self, limit: usize) {
        let mut evicted = 0;
        while self.messages.len() > 1 && self.estimate_tokens() + TRIM_HEADROOM > limit {
            self.messages.remove(1);
            evicted += 1;
        }
        if evicted > 0 {
            debug!(
                evicted,
                remaining = self.messages.len(),
                tokens = self.estimate_tokens(),
                "Trimmed conversation to token limit {}",
                limit
            );
        }
    }

    /// Drops everything except a leading system message.
    pub fn reset(&mut self) {
        let keep = matches!(self.messages.first(), Some(m) if m.role == Role::System);
        self.messages.truncate(usize::from(keep));
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

pub fn estimate_tokens(messages: &[Message]) -> usize {
    3 + messages
        .iter()
        .map(|m| 3 + m.content.len() / 4 + usize::from(!m.role.as_str().is_empty()))
        .sum::<usize>()
}
