//! Text Cleaning
//!
//! Normalization pipeline applied before chunking: NFKC, control-char strip,
//! HTML removal, optional URL/email removal, inline reference removal, OCR
//! artifact removal, whitespace collapse, page-number removal and mojibake
//! repair. Steps run in that order; each is line-local so the pipeline can
//! also be applied fragment by fragment.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Knobs for the cleaning pipeline.
#[derive(Debug, Clone)]
pub struct CleanOptions {
    /// Strip http(s):// and www. URLs
    pub remove_urls: bool,
    /// Strip email addresses
    pub remove_emails: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            remove_urls: true,
            remove_emails: true,
        }
    }
}

static HTML_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b.*?</script>|<style\b.*?</style>|<[^>]+>").unwrap()
});
static HTML_ENTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"&(#\d+|#x[0-9a-fA-F]+|[a-zA-Z]+);").unwrap());
static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:https?://|www\.)\S+").unwrap());
static EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\w.+-]+@[\w-]+\.[\w.-]+").unwrap());
static BRACKET_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(?:\d{1,3}|[a-z])\]").unwrap());
static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").unwrap());
static MULTI_NEWLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
static PAGE_NUMBER_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*\d{1,4}[ \t]*$").unwrap());

/// Bounded set of OCR artifact patterns: soft hyphens at line breaks,
/// scanner ligature escapes, repeated punctuation noise.
static OCR_ARTIFACTS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"-\n(\p{Ll})").unwrap(),        // hyphenated line break
        Regex::new(r"\u{00AD}").unwrap(),           // soft hyphen
        Regex::new(r"\u{FB01}").unwrap(),           // fi ligature, replaced below
        Regex::new(r"\u{FB02}").unwrap(),           // fl ligature
        Regex::new(r"[|¦]{2,}").unwrap(),           // scanner column noise
        Regex::new(r"([.!?]){4,}").unwrap(),        // runaway punctuation
    ]
});

/// Fixed mojibake repair table (UTF-8 read as Latin-1, twice-encoded text).
const MOJIBAKE: &[(&str, &str)] = &[
    ("â€™", "'"),
    ("â€˜", "'"),
    ("â€œ", "\""),
    ("â€\u{9d}", "\""),
    ("â€“", "-"),
    ("â€”", "-"),
    ("â€¦", "..."),
    ("Ã¨", "è"),
    ("Ã©", "é"),
    ("Ã ", "à"),
    ("Ã¹", "ù"),
    ("Ã²", "ò"),
    ("Ã¬", "ì"),
    ("Ã§", "ç"),
    ("Â ", " "),
    ("Â«", "«"),
    ("Â»", "»"),
];

/// Minimal named-entity table for HTML decoding; numeric entities are
/// decoded generically.
fn decode_entity(name: &str) -> Option<String> {
    let decoded = match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => " ",
        "mdash" => "-",
        "ndash" => "-",
        "hellip" => "...",
        "agrave" => "à",
        "egrave" => "è",
        "eacute" => "é",
        "igrave" => "ì",
        "ograve" => "ò",
        "ugrave" => "ù",
        _ => {
            if let Some(num) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                let code = u32::from_str_radix(num, 16).ok()?;
                return char::from_u32(code).map(String::from);
            }
            if let Some(num) = name.strip_prefix('#') {
                let code: u32 = num.parse().ok()?;
                return char::from_u32(code).map(String::from);
            }
            return None;
        }
    };
    Some(decoded.to_string())
}

/// Run the full cleaning pipeline over a text.
pub fn clean_text(text: &str, options: &CleanOptions) -> String {
    // 1. Unicode NFKC normalization
    let mut out: String = text.nfkc().collect();

    // 2. Strip control characters, keeping \n and \t
    out.retain(|c| !c.is_control() || c == '\n' || c == '\t');

    // 3. Remove HTML tags, then decode entities
    out = HTML_TAG.replace_all(&out, "\n").into_owned();
    out = HTML_ENTITY
        .replace_all(&out, |caps: &regex::Captures<'_>| {
            decode_entity(&caps[1]).unwrap_or_default()
        })
        .into_owned();

    // 4. URLs and emails, when configured
    if options.remove_urls {
        out = URL.replace_all(&out, " ").into_owned();
    }
    if options.remove_emails {
        out = EMAIL.replace_all(&out, " ").into_owned();
    }

    // 5. Inline bracket references: [1], [23], [a]
    out = BRACKET_REF.replace_all(&out, "").into_owned();

    // 6. OCR artifacts
    out = OCR_ARTIFACTS[0].replace_all(&out, "$1").into_owned();
    out = OCR_ARTIFACTS[1].replace_all(&out, "").into_owned();
    out = OCR_ARTIFACTS[2].replace_all(&out, "fi").into_owned();
    out = OCR_ARTIFACTS[3].replace_all(&out, "fl").into_owned();
    out = OCR_ARTIFACTS[4].replace_all(&out, " ").into_owned();
    out = OCR_ARTIFACTS[5].replace_all(&out, "$1$1$1").into_owned();

    // 7. Isolated page numbers (before the final collapse flattens lines)
    out = PAGE_NUMBER_LINE.replace_all(&out, "").into_owned();

    // 8. Collapse whitespace; keep at most one blank line
    out = MULTI_SPACE.replace_all(&out, " ").into_owned();
    out = MULTI_NEWLINE.replace_all(&out, "\n\n").into_owned();

    // 9. Mojibake repair
    for (bad, good) in MOJIBAKE {
        if out.contains(bad) {
            out = out.replace(bad, good);
        }
    }

    out.trim().to_string()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(text: &str) -> String {
        clean_text(text, &CleanOptions::default())
    }

    #[test]
    fn test_html_removed() {
        let out = clean("<p>Hello <b>world</b></p><script>alert(1)</script>");
        assert!(out.contains("Hello world"));
        assert!(!out.contains("alert"));
        assert!(!out.contains('<'));
    }

    #[test]
    fn test_entities_decoded() {
        assert_eq!(clean("fish &amp; chips &#233;"), "fish & chips é");
    }

    #[test]
    fn test_urls_and_emails() {
        let out = clean("see https://example.org/x?y=1 or mail me@example.org now");
        assert!(!out.contains("http"));
        assert!(!out.contains('@'));
        assert!(out.contains("see"));
        assert!(out.contains("now"));
    }

    #[test]
    fn test_urls_kept_when_configured() {
        let options = CleanOptions {
            remove_urls: false,
            remove_emails: false,
        };
        let out = clean_text("see https://example.org", &options);
        assert!(out.contains("https://example.org"));
    }

    #[test]
    fn test_bracket_refs_dropped() {
        assert_eq!(clean("as shown[12] before[a]."), "as shown before.");
    }

    #[test]
    fn test_page_numbers_dropped() {
        let out = clean("first page text\n42\nsecond page text");
        assert!(!out.contains("42"));
        assert!(out.contains("first page text"));
    }

    #[test]
    fn test_hyphenated_linebreak_joined() {
        assert_eq!(clean("compres-\nsione"), "compressione");
    }

    #[test]
    fn test_mojibake_repaired() {
        assert_eq!(clean("lâ€™arte"), "l'arte");
    }

    #[test]
    fn test_whitespace_collapsed() {
        let out = clean("a   b\t\tc\n\n\n\n\nd");
        assert_eq!(out, "a b c\n\nd");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(clean(""), "");
        assert_eq!(clean("  \n\t "), "");
    }
}
