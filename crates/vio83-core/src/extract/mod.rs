//! Format-Specific Extractors
//!
//! Byte-to-text conversion, one extractor per format. Detection is by file
//! extension first, MIME guess second, plain text as the last resort. Every
//! extractor returns UTF-8 text or a typed failure; callers record failures
//! and move on to the next file.

mod docx;
mod epub;
mod html;
mod pdf;
mod structured;
mod text;

pub use docx::extract_docx;
pub use epub::extract_epub;
pub use html::{extract_html, html_to_text};
pub use pdf::extract_pdf;
pub use structured::{extract_csv, extract_json};
pub use text::extract_text;

use std::path::Path;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Extraction error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The extractor could not produce text
    #[error("extraction failed for {format}: {reason}")]
    Failure {
        /// Format being extracted
        format: String,
        /// What went wrong
        reason: String,
    },
    /// Every PDF strategy failed or produced only whitespace
    #[error("no usable PDF backend produced text")]
    NoPdfBackend,
    /// I/O failure reading the source
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extraction result type
pub type Result<T> = std::result::Result<T, ExtractError>;

// ============================================================================
// FORMATS
// ============================================================================

/// Supported document formats.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    /// Plain text, Markdown, reStructuredText
    Txt,
    /// HTML pages
    Html,
    /// PDF documents
    Pdf,
    /// Word documents
    Docx,
    /// EPUB books
    Epub,
    /// JSON and JSONL records
    Json,
    /// CSV tables
    Csv,
}

impl DocumentFormat {
    /// Resolve from a file extension.
    pub fn from_extension(ext: &str) -> Option<DocumentFormat> {
        match ext.to_lowercase().as_str() {
            "txt" | "md" | "rst" | "text" | "markdown" => Some(DocumentFormat::Txt),
            "html" | "htm" | "xhtml" => Some(DocumentFormat::Html),
            "pdf" => Some(DocumentFormat::Pdf),
            "docx" => Some(DocumentFormat::Docx),
            "epub" => Some(DocumentFormat::Epub),
            "json" | "jsonl" | "ndjson" => Some(DocumentFormat::Json),
            "csv" | "tsv" => Some(DocumentFormat::Csv),
            _ => None,
        }
    }

    /// Short lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Txt => "txt",
            DocumentFormat::Html => "html",
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Epub => "epub",
            DocumentFormat::Json => "json",
            DocumentFormat::Csv => "csv",
        }
    }
}

/// Detect a file's format: extension first, MIME type second, txt fallback.
pub fn detect_format(path: &Path) -> DocumentFormat {
    if let Some(format) = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(DocumentFormat::from_extension)
    {
        return format;
    }

    let mime = mime_guess::from_path(path).first_or_text_plain();
    match (mime.type_().as_str(), mime.subtype().as_str()) {
        ("text", "html") => DocumentFormat::Html,
        ("application", "pdf") => DocumentFormat::Pdf,
        ("application", "json") => DocumentFormat::Json,
        ("text", "csv") => DocumentFormat::Csv,
        ("application", "epub+zip") => DocumentFormat::Epub,
        _ => DocumentFormat::Txt,
    }
}

/// Extract text from bytes in the given format.
pub fn extract(bytes: &[u8], format: DocumentFormat) -> Result<String> {
    match format {
        DocumentFormat::Txt => extract_text(bytes),
        DocumentFormat::Html => extract_html(bytes),
        DocumentFormat::Pdf => extract_pdf(bytes),
        DocumentFormat::Docx => extract_docx(bytes),
        DocumentFormat::Epub => extract_epub(bytes),
        DocumentFormat::Json => extract_json(bytes),
        DocumentFormat::Csv => extract_csv(bytes),
    }
}

/// Read a file from disk and extract its text.
pub fn extract_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    extract(&bytes, detect_format(path))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_extension() {
        assert_eq!(detect_format(Path::new("a.PDF")), DocumentFormat::Pdf);
        assert_eq!(detect_format(Path::new("notes.md")), DocumentFormat::Txt);
        assert_eq!(detect_format(Path::new("data.jsonl")), DocumentFormat::Json);
        assert_eq!(detect_format(Path::new("page.htm")), DocumentFormat::Html);
    }

    #[test]
    fn test_detect_fallback() {
        assert_eq!(detect_format(Path::new("README")), DocumentFormat::Txt);
    }

    #[test]
    fn test_dispatch() {
        let text = extract(b"plain content", DocumentFormat::Txt).unwrap();
        assert_eq!(text, "plain content");

        let html = extract(b"<p>hi</p>", DocumentFormat::Html).unwrap();
        assert_eq!(html, "hi");
    }
}
