//! DOCX Extraction
//!
//! A .docx file is a zip archive with the body in `word/document.xml`. The
//! primary strategy streams the XML collecting `<w:t>` runs and paragraph
//! breaks; when the XML is malformed, a generic tag-strip over the raw
//! document is the fallback.

use std::io::{Cursor, Read};

use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;

use super::{ExtractError, Result};

static XML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Extract text from DOCX bytes.
pub fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractError::Failure {
        format: "docx".to_string(),
        reason: format!("not a zip archive: {e}"),
    })?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractError::Failure {
            format: "docx".to_string(),
            reason: format!("missing word/document.xml: {e}"),
        })?
        .read_to_string(&mut xml)
        .map_err(|e| ExtractError::Failure {
            format: "docx".to_string(),
            reason: format!("unreadable document.xml: {e}"),
        })?;

    match paragraph_stream(&xml) {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => {
            // Generic document-to-text fallback
            let stripped = XML_TAG.replace_all(&xml, " ");
            let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
            if collapsed.is_empty() {
                Err(ExtractError::Failure {
                    format: "docx".to_string(),
                    reason: "no text content".to_string(),
                })
            } else {
                Ok(collapsed)
            }
        }
    }
}

/// Stream `document.xml`, emitting one line per `<w:p>` paragraph.
fn paragraph_stream(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);

    let mut out = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                if name.as_ref() == b"w:t" {
                    in_text_run = true;
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text_run = false,
                b"w:p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text_run {
                    if let Ok(text) = e.unescape() {
                        out.push_str(&text);
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                if e.name().as_ref() == b"w:br" {
                    out.push('\n');
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
    }

    Some(out)
}
