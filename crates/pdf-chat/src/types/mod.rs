//! Core types for the PDF chat service

pub mod document;
pub mod message;
pub mod query;
pub mod response;

pub use document::{Chunk, ChunkSource, Document};
pub use message::{ChatMessage, Role};
pub use query::ChatRequest;
pub use response::{ChatResponse, ProcessResponse, SourceSnippet};
