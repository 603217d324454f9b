//! Structured Metadata Extraction
//!
//! Pulls ISBN/DOI, publication year and author out of raw document text.
//! Each extractor works on a bounded prefix so pathological inputs stay
//! cheap: 5 kB for identifiers, 2 kB for the year, 3 kB for the author.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

/// Metadata recovered from a document's opening text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedMetadata {
    /// ISBN, digits only
    pub isbn: Option<String>,
    /// DOI, lowercased
    pub doi: Option<String>,
    /// Most frequent plausible four-digit year
    pub year: Option<i32>,
    /// First "by <Name>"-style author
    pub author: Option<String>,
}

static ISBN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)ISBN[-\s:]*((?:97[89][-\s]?)?\d{1,5}[-\s]?\d{1,7}[-\s]?\d{1,7}[-\s]?[\dxX])")
        .unwrap()
});
static DOI: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(10\.\d{4,9}/[-._;()/:a-z0-9]+)").unwrap());
static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(1[4-9]\d{2}|20\d{2})\b").unwrap());
static AUTHOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)(?:\bby\b|\bdi\b|\ba cura di\b)\s+((?:\p{Lu}[\p{L}'’.-]+)(?:\s+\p{Lu}[\p{L}'’.-]+){0,3})",
    )
    .unwrap()
});

/// Truncate to at most `max` bytes without splitting a UTF-8 char.
fn prefix(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Run all extractors over a text.
pub fn extract_metadata(text: &str) -> ExtractedMetadata {
    ExtractedMetadata {
        isbn: extract_isbn(text),
        doi: extract_doi(text),
        year: extract_year(text),
        author: extract_author(text),
    }
}

/// First ISBN in the opening 5 kB, normalized to digits only.
pub fn extract_isbn(text: &str) -> Option<String> {
    let head = prefix(text, 5 * 1024);
    let caps = ISBN.captures(head)?;
    let digits: String = caps[1]
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == 'X' || *c == 'x')
        .collect();
    if digits.len() == 10 || digits.len() == 13 {
        Some(digits.to_uppercase())
    } else {
        None
    }
}

/// First DOI in the opening 5 kB, lowercased.
pub fn extract_doi(text: &str) -> Option<String> {
    let head = prefix(text, 5 * 1024);
    DOI.captures(head)
        .map(|caps| caps[1].trim_end_matches(['.', ',', ';', ')']).to_lowercase())
}

/// Mode of the plausible four-digit years in the opening 2 kB. Earliest
/// year wins a tie.
pub fn extract_year(text: &str) -> Option<i32> {
    let head = prefix(text, 2 * 1024);
    let mut counts: HashMap<i32, usize> = HashMap::new();
    for caps in YEAR.captures_iter(head) {
        if let Ok(year) = caps[1].parse::<i32>() {
            *counts.entry(year).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(year, _)| year)
}

/// First capitalized name after an author label in the opening 3 kB.
pub fn extract_author(text: &str) -> Option<String> {
    let head = prefix(text, 3 * 1024);
    AUTHOR
        .captures(head)
        .map(|caps| caps[1].trim().to_string())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isbn_13() {
        let isbn = extract_isbn("Title page. ISBN 978-0-12-345678-9 first edition");
        assert_eq!(isbn.as_deref(), Some("9780123456789"));
    }

    #[test]
    fn test_isbn_10() {
        let isbn = extract_isbn("ISBN: 0-306-40615-2");
        assert_eq!(isbn.as_deref(), Some("0306406152"));
    }

    #[test]
    fn test_doi_lowercased() {
        let doi = extract_doi("see DOI 10.1000/XYZ.123 for details");
        assert_eq!(doi.as_deref(), Some("10.1000/xyz.123"));
    }

    #[test]
    fn test_year_mode() {
        let year = extract_year("published 1987, reprinted 2003, 1987 edition");
        assert_eq!(year, Some(1987));
    }

    #[test]
    fn test_year_ignores_numbers() {
        assert_eq!(extract_year("chapter 1234567 section 99"), None);
    }

    #[test]
    fn test_author_by() {
        let author = extract_author("A Treatise on Light\nby Christiaan Huygens\n1690");
        assert_eq!(author.as_deref(), Some("Christiaan Huygens"));
    }

    #[test]
    fn test_author_italian_label() {
        let author = extract_author("Saggio introduttivo, a cura di Maria Rossi");
        assert_eq!(author.as_deref(), Some("Maria Rossi"));
    }

    #[test]
    fn test_bounded_prefix() {
        // ISBN past the 5 kB boundary is not seen
        let mut text = "x".repeat(6 * 1024);
        text.push_str(" ISBN 978-0-12-345678-9");
        assert_eq!(extract_isbn(&text), None);
    }

    #[test]
    fn test_empty() {
        assert_eq!(extract_metadata(""), ExtractedMetadata::default());
    }
}
