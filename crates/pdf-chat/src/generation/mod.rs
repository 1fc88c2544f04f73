//! Conversational answer generation over retrieved chunks

pub mod chain;
pub mod memory;
pub mod prompt;

pub use chain::{get_conversation_chain, ChainOutput, ConversationalRetrievalChain};
pub use memory::ConversationMemory;
pub use prompt::PromptBuilder;
