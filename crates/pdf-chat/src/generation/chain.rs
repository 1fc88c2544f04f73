//! Conversational retrieval: condense, retrieve, answer, remember

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::{ChatModel, EmbeddingProvider};
use crate::retrieval::{ScoredChunk, VectorStore};
use crate::types::ChatMessage;

use super::memory::ConversationMemory;
use super::prompt::PromptBuilder;

/// Result of one chain call
#[derive(Debug, Clone)]
pub struct ChainOutput {
    /// Question as asked
    pub question: String,
    /// Question after condensing against the history
    pub standalone_question: String,
    /// Model answer
    pub answer: String,
    /// Chunks the answer was grounded on
    pub sources: Vec<ScoredChunk>,
    /// Full history including this turn
    pub chat_history: Vec<ChatMessage>,
}

/// Retrieval chain over a vector store with a chat model
#[derive(Clone)]
pub struct ConversationalRetrievalChain {
    store: Arc<VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn ChatModel>,
    top_k: usize,
}

impl ConversationalRetrievalChain {
    pub fn new(
        store: Arc<VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn ChatModel>,
        top_k: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            llm,
            top_k: top_k.max(1),
        }
    }

    /// Answer a question in the context of `memory`, then record the turn
    pub async fn ask(&self, memory: &mut ConversationMemory, question: &str) -> Result<ChainOutput> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::EmptyQuestion);
        }

        let standalone_question = if memory.is_empty() {
            question.to_string()
        } else {
            let condensed = self
                .llm
                .complete(&PromptBuilder::condense_question(memory, question))
                .await?;
            let condensed = condensed.trim();
            if condensed.is_empty() {
                question.to_string()
            } else {
                tracing::debug!("Condensed '{}' to '{}'", question, condensed);
                condensed.to_string()
            }
        };

        let query_embedding = self.embedder.embed_query(&standalone_question).await?;
        let sources = self.store.similarity_search(&query_embedding, self.top_k)?;
        tracing::debug!("Retrieved {} chunks for '{}'", sources.len(), standalone_question);

        let answer = self
            .llm
            .complete(&PromptBuilder::answer_messages(&sources, &standalone_question))
            .await?;

        memory.save_context(question, answer.clone());

        Ok(ChainOutput {
            question: question.to_string(),
            standalone_question,
            answer,
            sources,
            chat_history: memory.messages().to_vec(),
        })
    }
}

/// Build a conversational retrieval chain
pub fn get_conversation_chain(
    store: Arc<VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn ChatModel>,
    top_k: usize,
) -> ConversationalRetrievalChain {
    ConversationalRetrievalChain::new(store, embedder, llm, top_k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VectorStoreConfig;
    use crate::types::{Chunk, ChunkSource, Role};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Embeds by keyword so retrieval is predictable
    struct KeywordEmbedder;

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    vec![
                        if t.contains("cat") { 1.0 } else { 0.0 },
                        if t.contains("dog") { 1.0 } else { 0.0 },
                        0.1,
                    ]
                })
                .collect())
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "keyword"
        }

        fn model(&self) -> &str {
            "keyword"
        }
    }

    /// Records every prompt; condense requests get a fixed rewrite
    #[derive(Default)]
    struct ScriptedModel {
        calls: Mutex<Vec<Vec<ChatMessage>>>,
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
            self.calls.lock().push(messages.to_vec());
            if messages[0].content.starts_with("Given the following conversation") {
                Ok("What do dogs eat?".to_string())
            } else {
                Ok(format!("answer to: {}", messages[1].content))
            }
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    async fn chain(llm: Arc<ScriptedModel>) -> ConversationalRetrievalChain {
        let texts = ["Cats eat fish.", "Dogs eat bones.", "Birds eat seeds."];
        let chunks: Vec<Chunk> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                Chunk::new(
                    t.to_string(),
                    ChunkSource {
                        filename: "pets.pdf".to_string(),
                        page_number: Some(i as u32 + 1),
                    },
                    i as u32,
                )
            })
            .collect();
        let owned: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        let embeddings = KeywordEmbedder.embed_documents(&owned).await.unwrap();
        let store = VectorStore::from_texts(chunks, embeddings, "keyword", &VectorStoreConfig::default()).unwrap();

        get_conversation_chain(Arc::new(store), Arc::new(KeywordEmbedder), llm, 1)
    }

    #[tokio::test]
    async fn test_first_question_skips_condensing() {
        let llm = Arc::new(ScriptedModel::default());
        let chain = chain(llm.clone()).await;
        let mut memory = ConversationMemory::new();

        let output = chain.ask(&mut memory, "  What do cats eat? ").await.unwrap();

        assert_eq!(output.question, "What do cats eat?");
        assert_eq!(output.standalone_question, "What do cats eat?");
        assert_eq!(output.answer, "answer to: What do cats eat?");
        assert_eq!(output.sources.len(), 1);
        assert_eq!(output.sources[0].chunk.content, "Cats eat fish.");

        let calls = llm.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0].role, Role::System);
        assert!(calls[0][0].content.ends_with("Cats eat fish."));
    }

    #[tokio::test]
    async fn test_follow_up_is_condensed() {
        let llm = Arc::new(ScriptedModel::default());
        let chain = chain(llm.clone()).await;
        let mut memory = ConversationMemory::new();

        chain.ask(&mut memory, "What do cats eat?").await.unwrap();
        let output = chain.ask(&mut memory, "And dogs?").await.unwrap();

        assert_eq!(output.standalone_question, "What do dogs eat?");
        assert_eq!(output.sources[0].chunk.content, "Dogs eat bones.");
        assert_eq!(output.chat_history.len(), 4);
        assert_eq!(output.chat_history[2], ChatMessage::user("And dogs?"));
        assert_eq!(output.chat_history[3], ChatMessage::assistant("answer to: What do dogs eat?"));

        let calls = llm.calls.lock();
        assert_eq!(calls.len(), 3);
        assert!(calls[1][0].content.contains("Human: What do cats eat?"));
        assert!(calls[1][0].content.contains("Follow Up Input: And dogs?"));
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let llm = Arc::new(ScriptedModel::default());
        let chain = chain(llm.clone()).await;
        let mut memory = ConversationMemory::new();

        let err = chain.ask(&mut memory, "   ").await.unwrap_err();
        assert!(matches!(err, Error::EmptyQuestion));
        assert!(memory.is_empty());
        assert!(llm.calls.lock().is_empty());
    }
}
