//! Document and chunk types with source tracking

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A PDF that has been processed into the index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document ID
    pub id: Uuid,
    /// Original filename as uploaded by user
    pub filename: String,
    /// SHA-256 of the uploaded bytes
    pub content_hash: String,
    /// Number of pages in the PDF
    pub total_pages: u32,
    /// Number of characters of extracted text
    pub total_chars: usize,
    /// File size in bytes
    pub file_size: u64,
    /// Processing timestamp
    pub processed_at: chrono::DateTime<chrono::Utc>,
}

impl Document {
    /// Create a new document record
    pub fn new(filename: String, content_hash: String, total_pages: u32, total_chars: usize, file_size: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename,
            content_hash,
            total_pages,
            total_chars,
            file_size,
            processed_at: chrono::Utc::now(),
        }
    }
}

/// Where a chunk came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSource {
    /// Original filename as uploaded
    pub filename: String,
    /// Page the chunk starts on (1-indexed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
}

/// A chunk of text that gets embedded and indexed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk ID
    pub id: Uuid,
    /// Chunk text
    pub content: String,
    /// Source information
    pub source: ChunkSource,
    /// Position of the chunk in the processed batch
    pub chunk_index: u32,
}

impl Chunk {
    /// Create a new chunk
    pub fn new(content: String, source: ChunkSource, chunk_index: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            content,
            source,
            chunk_index,
        }
    }
}
