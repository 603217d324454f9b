//! Snippets and Highlights
//!
//! A snippet is one window of text around the first matched query token; a
//! highlight is up to three case-insensitive word matches, each with 50
//! characters of surrounding context.

/// Snippet window radius around the match, in characters.
const SNIPPET_RADIUS: usize = 80;

/// Context per highlight span, in characters.
const HIGHLIGHT_CONTEXT: usize = 50;

/// Maximum highlight spans per result.
const MAX_HIGHLIGHTS: usize = 3;

fn char_window(chars: &[char], center: usize, radius: usize) -> String {
    let start = center.saturating_sub(radius);
    let end = (center + radius).min(chars.len());
    let mut window: String = chars[start..end].iter().collect();
    if start > 0 {
        window = format!("...{window}");
    }
    if end < chars.len() {
        window.push_str("...");
    }
    window
}

/// Find the char position of the first case-insensitive occurrence of any
/// token in `text`.
fn first_match(text_lower: &[char], tokens: &[String]) -> Option<usize> {
    let haystack: String = text_lower.iter().collect();
    tokens
        .iter()
        .filter(|t| !t.is_empty())
        .filter_map(|t| haystack.find(t.as_str()))
        .min()
        .map(|byte_pos| haystack[..byte_pos].chars().count())
}

/// Build a snippet around the first matched token, falling back to the
/// opening of the text.
pub fn make_snippet(text: &str, query_tokens: &[String]) -> String {
    if text.is_empty() {
        return String::new();
    }
    let chars: Vec<char> = text.chars().collect();
    let lower: Vec<char> = text.to_lowercase().chars().collect();

    match first_match(&lower, query_tokens) {
        Some(pos) => char_window(&chars, pos.min(chars.len()), SNIPPET_RADIUS),
        None => char_window(&chars, 0, SNIPPET_RADIUS * 2),
    }
}

/// Up to three highlight spans: case-insensitive word matches with context.
pub fn make_highlights(text: &str, query_tokens: &[String]) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let chars: Vec<char> = text.chars().collect();
    let haystack = text.to_lowercase();

    let mut spans = Vec::new();
    let mut covered: Vec<(usize, usize)> = Vec::new();

    for token in query_tokens.iter().filter(|t| !t.is_empty()) {
        let mut search_from = 0;
        while let Some(found) = haystack[search_from..].find(token.as_str()) {
            let byte_pos = search_from + found;
            let char_pos = haystack[..byte_pos].chars().count();
            search_from = byte_pos + token.len();

            // Skip matches whose context would repeat a span we already cut
            let start = char_pos.saturating_sub(HIGHLIGHT_CONTEXT);
            let end = (char_pos + token.chars().count() + HIGHLIGHT_CONTEXT).min(chars.len());
            if covered.iter().any(|&(s, e)| start < e && s < end) {
                continue;
            }
            covered.push((start, end));
            spans.push(char_window(&chars, char_pos, HIGHLIGHT_CONTEXT));

            if spans.len() >= MAX_HIGHLIGHTS {
                return spans;
            }
        }
    }

    spans
}

/// Lowercased alphanumeric tokens of a query.
pub fn query_tokens(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_centers_on_match() {
        let text = format!("{} quantum {}", "a".repeat(200), "b".repeat(200));
        let snippet = make_snippet(&text, &["quantum".to_string()]);
        assert!(snippet.contains("quantum"));
        assert!(snippet.starts_with("..."));
        assert!(snippet.ends_with("..."));
    }

    #[test]
    fn test_snippet_fallback_prefix() {
        let snippet = make_snippet("no match in here at all", &["quantum".to_string()]);
        assert!(snippet.starts_with("no match"));
    }

    #[test]
    fn test_highlights_capped_at_three() {
        let text = "alpha one alpha two alpha three alpha four alpha five".repeat(4);
        let highlights = make_highlights(&text, &["alpha".to_string()]);
        assert!(highlights.len() <= 3);
        assert!(!highlights.is_empty());
        for span in &highlights {
            assert!(span.to_lowercase().contains("alpha"));
        }
    }

    #[test]
    fn test_highlights_case_insensitive() {
        let highlights = make_highlights("The Quantum leap", &["quantum".to_string()]);
        assert_eq!(highlights.len(), 1);
        assert!(highlights[0].contains("Quantum"));
    }

    #[test]
    fn test_query_tokens() {
        assert_eq!(
            query_tokens("Quantum-Entangled photons!"),
            vec!["quantum", "entangled", "photons"]
        );
    }
}
