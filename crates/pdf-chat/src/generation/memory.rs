//! Conversation buffer memory

use serde::{Deserialize, Serialize};

use crate::types::ChatMessage;

/// Ordered human/assistant messages of one conversation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationMemory {
    messages: Vec<ChatMessage>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one question and its answer
    pub fn save_context(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.messages.push(ChatMessage::user(question));
        self.messages.push(ChatMessage::assistant(answer));
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// History flattened to `Human: ...` / `Assistant: ...` lines
    pub fn buffer_string(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}: {}", m.role.prefix(), m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
