//! PDF Extraction
//!
//! Three strategies tried in order, first non-empty result wins:
//!
//! 1. `pdf-extract` - high-fidelity layout-aware rendering
//! 2. `lopdf` page reader - per-page text extraction
//! 3. `lopdf` content-stream scan - raw Tj/TJ show-text operands, a last
//!    resort for files whose page tree is damaged
//!
//! When all three fail (or produce only whitespace) the extractor reports
//! `NoPdfBackend`.

use lopdf::content::Content;
use lopdf::{Document, Object};

use super::{ExtractError, Result};

/// Extract text from PDF bytes.
pub fn extract_pdf(bytes: &[u8]) -> Result<String> {
    if let Some(text) = try_high_fidelity(bytes) {
        return Ok(text);
    }
    if let Some(text) = try_page_reader(bytes) {
        return Ok(text);
    }
    if let Some(text) = try_content_scan(bytes) {
        return Ok(text);
    }
    Err(ExtractError::NoPdfBackend)
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn try_high_fidelity(bytes: &[u8]) -> Option<String> {
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => non_empty(text),
        Ok(Err(e)) => {
            tracing::debug!("pdf-extract failed: {e}");
            None
        }
        Err(_) => {
            tracing::debug!("pdf-extract panicked on malformed input");
            None
        }
    }
}

fn try_page_reader(bytes: &[u8]) -> Option<String> {
    let doc = Document::load_mem(bytes).ok()?;
    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    if pages.is_empty() {
        return None;
    }

    let mut out = String::new();
    for page in pages {
        if let Ok(text) = doc.extract_text(&[page]) {
            out.push_str(&text);
            out.push('\n');
        }
    }
    non_empty(out)
}

/// Walk every page's content stream collecting show-text operands.
fn try_content_scan(bytes: &[u8]) -> Option<String> {
    let doc = Document::load_mem(bytes).ok()?;
    let mut out = String::new();

    for (_, page_id) in doc.get_pages() {
        let Ok(content_bytes) = doc.get_page_content(page_id) else {
            continue;
        };
        let Ok(content) = Content::decode(&content_bytes) else {
            continue;
        };
        for op in content.operations {
            match op.operator.as_str() {
                "Tj" | "'" | "\"" => {
                    for operand in &op.operands {
                        push_string_operand(operand, &mut out);
                    }
                    out.push(' ');
                }
                "TJ" => {
                    for operand in &op.operands {
                        if let Object::Array(items) = operand {
                            for item in items {
                                push_string_operand(item, &mut out);
                            }
                        }
                    }
                    out.push(' ');
                }
                "T*" | "Td" | "TD" => out.push('\n'),
                _ => {}
            }
        }
        out.push('\n');
    }

    non_empty(out)
}

fn push_string_operand(object: &Object, out: &mut String) {
    if let Object::String(bytes, _) = object {
        out.push_str(&String::from_utf8_lossy(bytes));
    }
}
