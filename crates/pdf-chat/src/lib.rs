//! pdf-chat: ask questions about your PDFs
//!
//! Uploaded PDFs are turned into text, split into overlapping chunks, embedded
//! and indexed in an HNSW vector store saved under the data directory. Questions
//! go through a conversational retrieval chain: follow-ups are condensed into
//! standalone questions, the closest chunks are retrieved, and a hosted chat
//! model (OpenAI or Ollama) answers from them. A small web UI keeps one
//! conversation per browser session.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod types;

pub use config::ChatConfig;
pub use error::{Error, Result};
pub use generation::{get_conversation_chain, ConversationMemory, ConversationalRetrievalChain};
pub use ingestion::{get_pdf_text, get_text_chunks};
pub use retrieval::{get_vectors_from_db, store_vectorize_data, VectorStore};
pub use types::{
    document::{Chunk, ChunkSource, Document},
    message::ChatMessage,
    query::ChatRequest,
    response::{ChatResponse, ProcessResponse},
};
