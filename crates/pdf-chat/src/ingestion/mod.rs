//! PDF ingestion: text extraction, chunking and index building

mod chunker;
mod parser;
mod processor;

pub use chunker::{get_text_chunks, TextChunker, TextSpan};
pub use parser::{cleanup_pdf_text, get_pdf_text, PageText, ParsedPdf, PdfParser, UploadedFile};
pub use processor::{FileFailure, IngestPipeline, ProcessedBatch};
