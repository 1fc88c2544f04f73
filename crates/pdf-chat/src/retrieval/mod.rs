//! Vector index over chunk embeddings

pub mod store;

pub use store::{get_vectors_from_db, store_vectorize_data, ScoredChunk, VectorStore, INDEX_FILE};
