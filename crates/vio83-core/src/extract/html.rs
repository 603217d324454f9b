//! HTML Extraction
//!
//! Strips script/style blocks, converts block-level tags to newlines, drops
//! the remaining tags and decodes a fixed entity table plus numeric
//! entities.

use once_cell::sync::Lazy;
use regex::Regex;

use super::text::extract_text;
use super::Result;

static SCRIPT_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b.*?</script>|<style\b.*?</style>|<!--.*?-->").unwrap()
});
static BLOCK_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</?(?:p|div|br|li|ul|ol|tr|table|h[1-6]|section|article|blockquote|pre)[^>]*>")
        .unwrap()
});
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#\d+|#x[0-9a-fA-F]+|[a-zA-Z]+);").unwrap());
static BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

const ENTITIES: &[(&str, &str)] = &[
    ("amp", "&"),
    ("lt", "<"),
    ("gt", ">"),
    ("quot", "\""),
    ("apos", "'"),
    ("nbsp", " "),
    ("mdash", "-"),
    ("ndash", "-"),
    ("hellip", "..."),
    ("laquo", "«"),
    ("raquo", "»"),
    ("agrave", "à"),
    ("egrave", "è"),
    ("eacute", "é"),
    ("igrave", "ì"),
    ("ograve", "ò"),
    ("ugrave", "ù"),
    ("ccedil", "ç"),
];

fn decode_entity(name: &str) -> String {
    if let Some((_, replacement)) = ENTITIES.iter().find(|(n, _)| *n == name) {
        return (*replacement).to_string();
    }
    if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        if let Some(c) = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
            return c.to_string();
        }
    } else if let Some(dec) = name.strip_prefix('#') {
        if let Some(c) = dec.parse::<u32>().ok().and_then(char::from_u32) {
            return c.to_string();
        }
    }
    String::new()
}

/// Convert an HTML string to plain text.
pub fn html_to_text(html: &str) -> String {
    let without_scripts = SCRIPT_STYLE.replace_all(html, "");
    let with_breaks = BLOCK_TAG.replace_all(&without_scripts, "\n");
    let without_tags = ANY_TAG.replace_all(&with_breaks, "");
    let decoded = ENTITY.replace_all(&without_tags, |caps: &regex::Captures<'_>| {
        decode_entity(&caps[1])
    });

    let trimmed_lines: Vec<&str> = decoded.lines().map(str::trim).collect();
    let joined = trimmed_lines.join("\n");
    BLANK_RUN.replace_all(&joined, "\n\n").trim().to_string()
}

/// Decode and convert HTML bytes to plain text.
pub fn extract_html(bytes: &[u8]) -> Result<String> {
    let html = extract_text(bytes)?;
    Ok(html_to_text(&html))
}
