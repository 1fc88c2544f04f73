//! Ingestion pipeline orchestration: parse, chunk, embed, index

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{ChunkingConfig, VectorStoreConfig};
use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;
use crate::retrieval::{store_vectorize_data, VectorStore};
use crate::types::response::{DocumentSummary, IngestError};
use crate::types::{Chunk, Document, ProcessResponse};

use super::chunker::TextChunker;
use super::parser::{ParsedPdf, PdfParser, UploadedFile};

/// Default wall-clock limit for extracting a single PDF
const DEFAULT_PARSE_TIMEOUT: Duration = Duration::from_secs(120);

/// Result of processing a batch of uploads
pub struct ProcessedBatch {
    /// The freshly built (and saved) index
    pub store: Arc<VectorStore>,
    /// Summary for the caller
    pub response: ProcessResponse,
}

/// An upload that was not indexed, with the error that stopped it
#[derive(Debug)]
pub struct FileFailure {
    pub filename: String,
    pub error: Error,
}

impl From<FileFailure> for IngestError {
    fn from(failure: FileFailure) -> Self {
        IngestError {
            filename: failure.filename,
            error: failure.error.to_string(),
        }
    }
}

/// Main ingestion pipeline
pub struct IngestPipeline {
    /// Text chunker
    chunker: TextChunker,
    /// Per-file extraction timeout
    parse_timeout: Duration,
}

impl IngestPipeline {
    /// Create a new ingestion pipeline
    pub fn new(config: &ChunkingConfig) -> Self {
        Self {
            chunker: TextChunker::from_config(config),
            parse_timeout: DEFAULT_PARSE_TIMEOUT,
        }
    }

    /// Parse a single upload on a blocking thread
    pub async fn parse_one(&self, file: UploadedFile) -> Result<ParsedPdf> {
        PdfParser::extract_with_timeout(file, self.parse_timeout).await
    }

    /// Parse uploads in order; failures and duplicate files are reported, not fatal
    pub async fn parse_files(&self, files: Vec<UploadedFile>) -> (Vec<ParsedPdf>, Vec<FileFailure>) {
        let mut parsed = Vec::with_capacity(files.len());
        let mut failures = Vec::new();
        let mut seen = HashSet::new();

        for file in files {
            let filename = file.filename.clone();
            match self.parse_one(file).await {
                Ok(doc) => {
                    if !seen.insert(doc.content_hash.clone()) {
                        tracing::info!("Skipping duplicate upload: {}", filename);
                        failures.push(FileFailure {
                            error: Error::DuplicateFile(filename.clone()),
                            filename,
                        });
                        continue;
                    }
                    tracing::info!("Parsed {}: {} pages", filename, doc.total_pages);
                    parsed.push(doc);
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}", filename, e);
                    failures.push(FileFailure { filename, error: e });
                }
            }
        }

        (parsed, failures)
    }

    /// Chunk parsed documents, returning document records alongside the chunks
    pub fn chunk(&self, parsed: &[ParsedPdf]) -> (Vec<Document>, Vec<Chunk>) {
        let documents = parsed
            .iter()
            .map(|doc| {
                Document::new(
                    doc.filename.clone(),
                    doc.content_hash.clone(),
                    doc.total_pages,
                    doc.text().chars().count(),
                    doc.file_size,
                )
            })
            .collect();

        (documents, self.chunker.split_documents(parsed))
    }

    /// Chunk, embed and index parsed documents, replacing the saved index
    pub async fn build_index(
        &self,
        parsed: Vec<ParsedPdf>,
        failures: Vec<FileFailure>,
        started: Instant,
        embedder: &dyn EmbeddingProvider,
        config: &VectorStoreConfig,
    ) -> Result<ProcessedBatch> {
        let (documents, chunks) = self.chunk(&parsed);

        if chunks.is_empty() {
            return Err(match failures.into_iter().next() {
                Some(first) => first.error,
                None => Error::file_parse(
                    parsed
                        .iter()
                        .map(|p| p.filename.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                    "No extractable text found",
                ),
            });
        }

        let total_chunks = chunks.len();
        tracing::info!(
            "Embedding {} chunks from {} document(s) with {}",
            total_chunks,
            documents.len(),
            embedder.model()
        );

        let summaries = documents.iter().map(DocumentSummary::from).collect();
        let store = store_vectorize_data(chunks, documents, embedder, config).await?;

        let response = ProcessResponse {
            documents: summaries,
            errors: failures.into_iter().map(IngestError::from).collect(),
            total_chunks,
            processing_time_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!("{}", response.summary());

        Ok(ProcessedBatch { store, response })
    }

    /// Full processing: parse + chunk + embed + index + save
    pub async fn process(
        &self,
        files: Vec<UploadedFile>,
        embedder: &dyn EmbeddingProvider,
        config: &VectorStoreConfig,
    ) -> Result<ProcessedBatch> {
        if files.is_empty() {
            return Err(Error::NoFilesUploaded);
        }

        let started = Instant::now();
        let (parsed, failures) = self.parse_files(files).await;
        self.build_index(parsed, failures, started, embedder, config).await
    }
}

impl Default for IngestPipeline {
    fn default() -> Self {
        Self::new(&ChunkingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::parser::PageText;
    use async_trait::async_trait;

    struct LengthEmbedder;

    #[async_trait]
    impl EmbeddingProvider for LengthEmbedder {
        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "test"
        }

        fn model(&self) -> &str {
            "length"
        }
    }

    fn parsed(filename: &str, hash: &str, text: &str) -> ParsedPdf {
        ParsedPdf {
            filename: filename.to_string(),
            pages: vec![PageText {
                page_number: Some(1),
                text: text.to_string(),
            }],
            total_pages: 1,
            content_hash: hash.to_string(),
            file_size: text.len() as u64,
        }
    }

    #[test]
    fn test_chunk_builds_document_records() {
        let pipeline = IngestPipeline::default();
        let docs = vec![parsed("a.pdf", "h1", "alpha\nbeta"), parsed("b.pdf", "h2", "gamma")];
        let (documents, chunks) = pipeline.chunk(&docs);

        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].total_chars, 10);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].source.filename, "b.pdf");
    }

    #[tokio::test]
    async fn test_build_index_saves_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = VectorStoreConfig {
            data_dir: dir.path().to_path_buf(),
            ..VectorStoreConfig::default()
        };
        let pipeline = IngestPipeline::default();

        let batch = pipeline
            .build_index(
                vec![parsed("a.pdf", "h1", "some text")],
                vec![],
                Instant::now(),
                &LengthEmbedder,
                &config,
            )
            .await
            .unwrap();

        assert_eq!(batch.store.len(), 1);
        assert_eq!(batch.response.total_chunks, 1);
        assert_eq!(batch.response.documents[0].filename, "a.pdf");
        assert!(dir.path().join("index.json").exists());
    }

    #[tokio::test]
    async fn test_build_index_without_text_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = VectorStoreConfig {
            data_dir: dir.path().to_path_buf(),
            ..VectorStoreConfig::default()
        };
        let failures = vec![FileFailure {
            filename: "scan.pdf".to_string(),
            error: Error::file_parse("scan.pdf", "image-based"),
        }];

        let err = IngestPipeline::default()
            .build_index(vec![], failures, Instant::now(), &LengthEmbedder, &config)
            .await
            .err()
            .unwrap();

        assert!(matches!(err, Error::FileParse { ref filename, .. } if filename == "scan.pdf"));
        assert!(!dir.path().join("index.json").exists());
    }

    #[tokio::test]
    async fn test_parse_files_reports_failures() {
        let pipeline = IngestPipeline::default();
        let files = vec![
            UploadedFile::new("notes.txt", b"hello".to_vec()),
            UploadedFile::new("broken.pdf", b"%PDF-1.4 nope".to_vec()),
        ];

        let (parsed, failures) = pipeline.parse_files(files).await;
        assert!(parsed.is_empty());
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].filename, "notes.txt");
        assert!(matches!(failures[0].error, Error::UnsupportedFileType(_)));
        assert!(matches!(failures[1].error, Error::FileParse { .. }));
    }

    #[tokio::test]
    async fn test_process_keeps_first_error_kind() {
        let dir = tempfile::tempdir().unwrap();
        let config = VectorStoreConfig {
            data_dir: dir.path().to_path_buf(),
            ..VectorStoreConfig::default()
        };
        let files = vec![UploadedFile::new("notes.txt", b"hello".to_vec())];

        let err = IngestPipeline::default()
            .process(files, &LengthEmbedder, &config)
            .await
            .err()
            .unwrap();

        assert!(matches!(err, Error::UnsupportedFileType(_)));
    }

    #[tokio::test]
    async fn test_failures_are_reported_alongside_indexed_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = VectorStoreConfig {
            data_dir: dir.path().to_path_buf(),
            ..VectorStoreConfig::default()
        };
        let failures = vec![FileFailure {
            filename: "copy.pdf".to_string(),
            error: Error::DuplicateFile("copy.pdf".to_string()),
        }];

        let batch = IngestPipeline::default()
            .build_index(
                vec![parsed("a.pdf", "h1", "some text")],
                failures,
                Instant::now(),
                &LengthEmbedder,
                &config,
            )
            .await
            .unwrap();

        assert_eq!(batch.response.errors.len(), 1);
        assert_eq!(batch.response.errors[0].filename, "copy.pdf");
        assert!(batch.response.errors[0].error.starts_with("Duplicate of another uploaded file"));
    }

    #[tokio::test]
    async fn test_process_requires_files() {
        let err = IngestPipeline::default()
            .process(vec![], &LengthEmbedder, &VectorStoreConfig::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::NoFilesUploaded));
    }
}
