//! Response types for chat and processing requests

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::{Chunk, Document};
use super::message::ChatMessage;

/// Maximum length of a source snippet shown to the user
const SNIPPET_LEN: usize = 300;

/// A retrieved chunk as shown alongside an answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSnippet {
    /// Source filename
    pub filename: String,
    /// Page number (if known)
    pub page_number: Option<u32>,
    /// Shortened chunk text
    pub snippet: String,
    /// Similarity score (0.0-1.0)
    pub similarity_score: f32,
}

impl SourceSnippet {
    /// Create a snippet from a chunk and similarity score
    pub fn from_chunk(chunk: &Chunk, similarity_score: f32) -> Self {
        Self {
            filename: chunk.source.filename.clone(),
            page_number: chunk.source.page_number,
            snippet: truncate_snippet(&chunk.content, SNIPPET_LEN),
            similarity_score,
        }
    }

    /// Format the source for display, e.g. `report.pdf, Page 3`
    pub fn format_inline(&self) -> String {
        match self.page_number {
            Some(page) => format!("{}, Page {}", self.filename, page),
            None => self.filename.clone(),
        }
    }
}

/// Truncate snippet to a maximum length while preserving word boundaries
pub fn truncate_snippet(snippet: &str, max_len: usize) -> String {
    if snippet.len() <= max_len {
        return snippet.to_string();
    }

    let mut end = max_len;
    while end > 0 && !snippet.is_char_boundary(end) {
        end -= 1;
    }

    if let Some(pos) = snippet[..end].rfind(' ') {
        return format!("{}...", &snippet[..pos]);
    }

    format!("{}...", &snippet[..end])
}

/// Answer to a chat question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Session the question belongs to
    pub session_id: Uuid,
    /// Question as asked
    pub question: String,
    /// Question after condensing it with the chat history
    pub standalone_question: String,
    /// Generated answer
    pub answer: String,
    /// Whole conversation so far, including this exchange
    pub chat_history: Vec<ChatMessage>,
    /// Chunks the answer was grounded on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceSnippet>,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

/// Conversation of one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionHistory {
    pub session_id: Uuid,
    pub messages: Vec<ChatMessage>,
}

/// Document summary for processing responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: Uuid,
    pub filename: String,
    pub total_pages: u32,
    pub total_chars: usize,
    pub file_size: u64,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id,
            filename: doc.filename.clone(),
            total_pages: doc.total_pages,
            total_chars: doc.total_chars,
            file_size: doc.file_size,
        }
    }
}

/// A file that could not be processed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestError {
    pub filename: String,
    pub error: String,
}

/// Result of processing a batch of uploaded PDFs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResponse {
    /// Documents that made it into the index
    pub documents: Vec<DocumentSummary>,
    /// Files that were skipped
    pub errors: Vec<IngestError>,
    /// Number of chunks in the new index
    pub total_chunks: usize,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

impl ProcessResponse {
    /// One-line summary shown in the page notice
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Processed {} document{} into {} chunks in {:.1}s.",
            self.documents.len(),
            if self.documents.len() == 1 { "" } else { "s" },
            self.total_chunks,
            self.processing_time_ms as f64 / 1000.0
        );
        for err in &self.errors {
            summary.push_str(&format!(" Skipped {}: {}.", err.filename, err.error));
        }
        summary
    }
}
