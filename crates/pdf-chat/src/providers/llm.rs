//! Chat model trait for answer generation

use async_trait::async_trait;
use crate::error::Result;
use crate::types::ChatMessage;

/// Trait for chat-completion models
///
/// Implementations:
/// - `OpenAiClient`: hosted OpenAI chat completions (gpt-3.5-turbo)
/// - `OllamaClient`: local Ollama server
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Complete a conversation, returning the assistant reply
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
