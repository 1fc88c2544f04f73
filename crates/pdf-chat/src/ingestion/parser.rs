//! PDF text extraction

use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::error::{Error, Result};

/// Typographic characters that PDF fonts commonly emit, mapped to plain text
const CHAR_REPLACEMENTS: &[(char, &str)] = &[
    ('\u{0000}', ""),
    ('\u{00A0}', " "),  // Non-breaking space
    ('\u{2002}', " "),  // En space
    ('\u{2003}', " "),  // Em space
    ('\u{2009}', " "),  // Thin space
    ('\u{2010}', "-"),  // Hyphen
    ('\u{2011}', "-"),  // Non-breaking hyphen
    ('\u{2013}', "-"),  // En dash
    ('\u{2014}', "--"), // Em dash
    ('\u{2018}', "'"),
    ('\u{2019}', "'"),
    ('\u{201C}', "\""),
    ('\u{201D}', "\""),
    ('\u{2022}', "* "), // Bullet
    ('\u{2026}', "..."),
    ('\u{2212}', "-"),  // Minus sign
    ('\u{FB00}', "ff"),
    ('\u{FB01}', "fi"),
    ('\u{FB02}', "fl"),
    ('\u{FB03}', "ffi"),
    ('\u{FB04}', "ffl"),
];

/// Clean up extracted PDF text: normalise typographic glyphs and trim trailing whitespace
pub fn cleanup_pdf_text(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for c in text.chars() {
        match CHAR_REPLACEMENTS.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => result.push_str(to),
            None => result.push(c),
        }
    }

    let had_trailing_newline = result.ends_with('\n');
    let mut cleaned = result
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    if had_trailing_newline && !cleaned.is_empty() {
        cleaned.push('\n');
    }
    cleaned
}

/// Text of a single page
#[derive(Debug, Clone)]
pub struct PageText {
    /// Page number (1-indexed), `None` when the page split is unknown
    pub page_number: Option<u32>,
    /// Extracted text
    pub text: String,
}

/// A PDF with its extracted text
#[derive(Debug, Clone)]
pub struct ParsedPdf {
    /// Original filename
    pub filename: String,
    /// Per-page text in page order
    pub pages: Vec<PageText>,
    /// Number of pages in the file
    pub total_pages: u32,
    /// SHA-256 of the uploaded bytes
    pub content_hash: String,
    /// Size of the uploaded file
    pub file_size: u64,
}

impl ParsedPdf {
    /// Whole-document text: page texts appended in order
    pub fn text(&self) -> String {
        self.pages.iter().map(|p| p.text.as_str()).collect()
    }

    /// Page a byte offset into [`ParsedPdf::text`] falls on
    pub fn page_at(&self, offset: usize) -> Option<u32> {
        let mut end = 0usize;
        for page in &self.pages {
            end += page.text.len();
            if offset < end {
                return page.page_number;
            }
        }
        self.pages.last().and_then(|p| p.page_number)
    }
}

/// An uploaded file
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
        }
    }
}

/// PDF parser
pub struct PdfParser;

impl PdfParser {
    /// Whether the upload looks like a PDF (by extension or magic bytes)
    pub fn is_pdf(filename: &str, data: &[u8]) -> bool {
        filename.to_lowercase().ends_with(".pdf") || data.starts_with(b"%PDF-")
    }

    /// Extract text from a PDF, page by page
    pub fn extract(filename: &str, data: &[u8]) -> Result<ParsedPdf> {
        if !Self::is_pdf(filename, data) {
            let extension = filename.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
            return Err(Error::UnsupportedFileType(format!(
                "{} - only PDF files can be processed",
                if extension.is_empty() { filename } else { extension }
            )));
        }

        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::file_parse(filename, format!("Failed to load PDF: {}", e)))?;

        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        let total_pages = page_numbers.len() as u32;

        let mut pages = Vec::with_capacity(page_numbers.len());
        for page_number in page_numbers {
            match doc.extract_text(&[page_number]) {
                Ok(text) => pages.push(PageText {
                    page_number: Some(page_number),
                    text: cleanup_pdf_text(&text),
                }),
                Err(e) => {
                    tracing::debug!("{}: no text on page {}: {}", filename, page_number, e);
                    pages.push(PageText {
                        page_number: Some(page_number),
                        text: String::new(),
                    });
                }
            }
        }

        if pages.iter().all(|p| p.text.trim().is_empty()) {
            tracing::warn!("{}: lopdf extracted no text, trying pdf-extract", filename);
            pages = Self::extract_fallback(filename, data)?;
        }

        Ok(ParsedPdf {
            filename: filename.to_string(),
            pages,
            total_pages,
            content_hash: hash_bytes(data),
            file_size: data.len() as u64,
        })
    }

    /// Extract on a blocking thread, giving up after `limit`
    pub async fn extract_with_timeout(file: UploadedFile, limit: Duration) -> Result<ParsedPdf> {
        let filename = file.filename.clone();
        let task = tokio::task::spawn_blocking(move || Self::extract(&file.filename, &file.data));

        match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined?,
            Err(_) => {
                tracing::error!("PDF extraction of {} timed out after {:?}", filename, limit);
                Err(Error::file_parse(
                    filename,
                    format!("Text extraction timed out after {}s", limit.as_secs()),
                ))
            }
        }
    }

    /// Whole-document extraction with pdf-extract
    fn extract_fallback(filename: &str, data: &[u8]) -> Result<Vec<PageText>> {
        let text = pdf_extract::extract_text_from_mem(data)
            .map_err(|e| Error::file_parse(filename, format!("Failed to extract text: {}", e)))?;
        let text = cleanup_pdf_text(&text);

        if text.trim().is_empty() {
            return Err(Error::file_parse(
                filename,
                "PDF appears to be image-based or has no extractable text",
            ));
        }

        Ok(vec![PageText {
            page_number: None,
            text,
        }])
    }
}

/// Extract and concatenate the text of every uploaded PDF, in upload order
pub fn get_pdf_text(pdf_docs: &[UploadedFile]) -> Result<(String, Vec<ParsedPdf>)> {
    let mut text = String::new();
    let mut parsed = Vec::with_capacity(pdf_docs.len());

    for pdf in pdf_docs {
        let doc = PdfParser::extract(&pdf.filename, &pdf.data)?;
        text.push_str(&doc.text());
        parsed.push(doc);
    }

    Ok((text, parsed))
}

fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
