//! Provider abstractions for embeddings and chat completion
//!
//! Both the hosted OpenAI API and a local Ollama server implement the traits,
//! selected by [`ProviderKind`].

pub mod embedding;
pub mod llm;
pub mod ollama;
pub mod openai;
mod retry;

use std::sync::Arc;

use crate::config::{ChatConfig, ProviderKind};
use crate::error::Result;

pub use embedding::EmbeddingProvider;
pub use llm::ChatModel;
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

/// Build the embedding and chat providers selected by the configuration
pub fn build_providers(
    config: &ChatConfig,
) -> Result<(Arc<dyn EmbeddingProvider>, Arc<dyn ChatModel>)> {
    match config.provider {
        ProviderKind::OpenAi => {
            let client = Arc::new(OpenAiClient::new(&config.openai, &config.embeddings)?);
            Ok((client.clone(), client))
        }
        ProviderKind::Ollama => {
            let client = Arc::new(OllamaClient::new(&config.ollama, &config.embeddings)?);
            Ok((client.clone(), client))
        }
    }
}
