//! EPUB Extraction
//!
//! An .epub is a zip archive whose reading content lives in (x)html
//! documents. Entries are iterated in name order (spine order in practice,
//! since packagers number their chapters), each converted to text with the
//! HTML extractor, and concatenated.

use std::io::{Cursor, Read};

use super::html::html_to_text;
use super::{ExtractError, Result};

/// Extract text from EPUB bytes.
pub fn extract_epub(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractError::Failure {
        format: "epub".to_string(),
        reason: format!("not a zip archive: {e}"),
    })?;

    let mut document_names: Vec<String> = (0..archive.len())
        .filter_map(|i| archive.by_index(i).ok().map(|f| f.name().to_string()))
        .filter(|name| {
            let lower = name.to_lowercase();
            lower.ends_with(".xhtml") || lower.ends_with(".html") || lower.ends_with(".htm")
        })
        .collect();
    document_names.sort();

    if document_names.is_empty() {
        return Err(ExtractError::Failure {
            format: "epub".to_string(),
            reason: "no document items in archive".to_string(),
        });
    }

    let mut out = String::new();
    for name in document_names {
        let Ok(mut file) = archive.by_name(&name) else {
            continue;
        };
        let mut html = String::new();
        if file.read_to_string(&mut html).is_err() {
            continue;
        }
        let text = html_to_text(&html);
        if !text.is_empty() {
            out.push_str(&text);
            out.push_str("\n\n");
        }
    }

    let trimmed = out.trim();
    if trimmed.is_empty() {
        Err(ExtractError::Failure {
            format: "epub".to_string(),
            reason: "document items contained no text".to_string(),
        })
    } else {
        Ok(trimmed.to_string())
    }
}
