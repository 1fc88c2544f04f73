//! Prompt templates for conversational retrieval

use crate::retrieval::ScoredChunk;
use crate::types::ChatMessage;

use super::memory::ConversationMemory;

const CONDENSE_QUESTION_INSTRUCTION: &str = "Given the following conversation and a follow up question, \
rephrase the follow up question to be a standalone question, in its original language.";

const ANSWER_SYSTEM_INSTRUCTION: &str = "Use the following pieces of context to answer the user's question. \n\
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// Prompt builder for the retrieval chain
pub struct PromptBuilder;

impl PromptBuilder {
    /// Prompt asking the model to rewrite a follow-up into a standalone question
    pub fn condense_question(history: &ConversationMemory, question: &str) -> Vec<ChatMessage> {
        let prompt = format!(
            "{}\n\nChat History:\n{}\nFollow Up Input: {}\nStandalone question:",
            CONDENSE_QUESTION_INSTRUCTION,
            history.buffer_string(),
            question
        );

        vec![ChatMessage::user(prompt)]
    }

    /// Retrieved chunk texts separated by blank lines
    pub fn build_context(chunks: &[ScoredChunk]) -> String {
        chunks
            .iter()
            .map(|c| c.chunk.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// System message carrying the context, then the question
    pub fn answer_messages(chunks: &[ScoredChunk], question: &str) -> Vec<ChatMessage> {
        let system = format!(
            "{}\n----------------\n{}",
            ANSWER_SYSTEM_INSTRUCTION,
            Self::build_context(chunks)
        );
        vec![ChatMessage::system(system), ChatMessage::user(question)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, ChunkSource, Role};

    fn scored(text: &str) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk::new(
                text.to_string(),
                ChunkSource {
                    filename: "a.pdf".to_string(),
                    page_number: None,
                },
                0,
            ),
            similarity: 0.9,
        }
    }

    #[test]
    fn test_condense_question() {
        let mut memory = ConversationMemory::new();
        memory.save_context("What is Rust?", "A programming language.");

        let messages = PromptBuilder::condense_question(&memory, "Who made it?");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);

        let prompt = &messages[0].content;
        assert!(prompt.starts_with("Given the following conversation and a follow up question, rephrase"));
        assert!(prompt.contains("Chat History:\nHuman: What is Rust?\nAssistant: A programming language.\n"));
        assert!(prompt.ends_with("Follow Up Input: Who made it?\nStandalone question:"));
    }

    #[test]
    fn test_condense_question_keeps_braces_in_history() {
        let mut memory = ConversationMemory::new();
        memory.save_context("What does {question} mean here?", "A {context} placeholder.");

        let messages = PromptBuilder::condense_question(&memory, "And in Rust?");
        let prompt = &messages[0].content;

        assert!(prompt.contains("Human: What does {question} mean here?\nAssistant: A {context} placeholder.\n"));
        assert_eq!(prompt.matches("And in Rust?").count(), 1);
    }

    #[test]
    fn test_answer_messages() {
        let messages = PromptBuilder::answer_messages(&[scored("first"), scored("second")], "q?");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0]
            .content
            .starts_with("Use the following pieces of context to answer the user's question."));
        assert!(messages[0].content.contains("don't try to make up an answer."));
        assert!(messages[0].content.ends_with("----------------\nfirst\n\nsecond"));
        assert_eq!(messages[1], ChatMessage::user("q?"));
    }
}
