//! Language Detection
//!
//! Stopword-overlap detection over six language profiles plus a small
//! high-frequency token table. Deliberately deterministic: the same input
//! always yields the same (language, confidence) pair.

use std::collections::HashSet;

use once_cell::sync::Lazy;

/// A detected language with its confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedLanguage {
    /// ISO-639-1 code, or "unknown"
    pub code: String,
    /// Confidence clamped to [0, 1]
    pub confidence: f32,
}

struct LanguageProfile {
    code: &'static str,
    stopwords: &'static [&'static str],
    /// Very frequent tokens that carry extra weight
    markers: &'static [&'static str],
}

const EN_STOP: &[&str] = &[
    "the", "and", "of", "to", "in", "is", "that", "it", "for", "was", "on", "are", "as", "with",
    "his", "they", "at", "be", "this", "have", "from", "or", "by", "not", "but",
];
const IT_STOP: &[&str] = &[
    "il", "di", "che", "la", "e", "per", "un", "in", "una", "sono", "con", "non", "del", "le",
    "si", "da", "della", "nel", "come", "anche", "gli", "alla", "dei", "questo", "essere",
];
const FR_STOP: &[&str] = &[
    "le", "de", "la", "et", "les", "des", "est", "un", "une", "dans", "que", "qui", "pour", "sur",
    "avec", "pas", "par", "plus", "ce", "il", "au", "aux", "du", "cette", "mais",
];
const DE_STOP: &[&str] = &[
    "der", "die", "und", "das", "ist", "von", "den", "mit", "nicht", "ein", "eine", "auf", "für",
    "im", "des", "dem", "sich", "auch", "als", "werden", "aus", "bei", "oder", "wird", "zu",
];
const ES_STOP: &[&str] = &[
    "el", "la", "de", "que", "y", "en", "los", "del", "las", "por", "un", "una", "con", "para",
    "es", "se", "su", "al", "como", "más", "pero", "sus", "le", "este", "entre",
];
const PT_STOP: &[&str] = &[
    "o", "a", "de", "que", "e", "do", "da", "em", "um", "para", "com", "não", "uma", "os", "no",
    "se", "na", "por", "mais", "as", "dos", "como", "mas", "foi", "ao",
];

static PROFILES: Lazy<Vec<(LanguageProfile, HashSet<&'static str>)>> = Lazy::new(|| {
    let profiles = vec![
        LanguageProfile { code: "en", stopwords: EN_STOP, markers: &["the", "and", "is"] },
        LanguageProfile { code: "it", stopwords: IT_STOP, markers: &["che", "della", "sono"] },
        LanguageProfile { code: "fr", stopwords: FR_STOP, markers: &["les", "dans", "est"] },
        LanguageProfile { code: "de", stopwords: DE_STOP, markers: &["der", "und", "ist"] },
        LanguageProfile { code: "es", stopwords: ES_STOP, markers: &["los", "que", "es"] },
        LanguageProfile { code: "pt", stopwords: PT_STOP, markers: &["que", "não", "uma"] },
    ];
    profiles
        .into_iter()
        .map(|p| {
            let set: HashSet<&'static str> = p.stopwords.iter().copied().collect();
            (p, set)
        })
        .collect()
});

/// Stopword set for a language code, used by keyword extraction. Unknown
/// codes fall back to English.
pub fn stopwords(code: &str) -> &'static HashSet<&'static str> {
    PROFILES
        .iter()
        .find(|(p, _)| p.code == code)
        .map(|(_, set)| set)
        .unwrap_or_else(|| &PROFILES[0].1)
}

/// Detect the language of a text.
///
/// Scores each profile by stopword overlap with marker bonuses; fewer than
/// five tokens, or no positive score, yields "unknown".
pub fn detect_language(text: &str) -> DetectedLanguage {
    let tokens: Vec<String> = text
        .split(|c: char| !c.is_alphabetic())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect();

    if tokens.len() < 5 {
        return DetectedLanguage {
            code: "unknown".to_string(),
            confidence: 0.0,
        };
    }

    let mut best: Option<(&'static str, f32)> = None;
    for (profile, set) in PROFILES.iter() {
        let mut hits = 0usize;
        let mut marker_hits = 0usize;
        for token in &tokens {
            if set.contains(token.as_str()) {
                hits += 1;
                if profile.markers.contains(&token.as_str()) {
                    marker_hits += 1;
                }
            }
        }
        let score = (hits as f32 + marker_hits as f32 * 0.5) / tokens.len() as f32;
        match best {
            Some((_, s)) if s >= score => {}
            _ => best = Some((profile.code, score)),
        }
    }

    match best {
        Some((code, score)) if score > 0.0 => DetectedLanguage {
            code: code.to_string(),
            confidence: (score * 3.0).clamp(0.0, 1.0),
        },
        _ => DetectedLanguage {
            code: "unknown".to_string(),
            confidence: 0.0,
        },
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english() {
        let d = detect_language("the cat is on the mat and it is happy with the sun");
        assert_eq!(d.code, "en");
        assert!(d.confidence > 0.3);
    }

    #[test]
    fn test_italian() {
        let d = detect_language("il gatto è sul tappeto e la casa della nonna è grande");
        assert_eq!(d.code, "it");
    }

    #[test]
    fn test_german() {
        let d = detect_language("der Hund und die Katze sind nicht mit dem Auto gefahren");
        assert_eq!(d.code, "de");
    }

    #[test]
    fn test_too_short() {
        let d = detect_language("ciao mondo");
        assert_eq!(d.code, "unknown");
        assert_eq!(d.confidence, 0.0);
    }

    #[test]
    fn test_no_overlap() {
        let d = detect_language("zxcv qwerty asdfgh poiuy lkjhg mnbvc");
        assert_eq!(d.code, "unknown");
    }

    #[test]
    fn test_deterministic() {
        let text = "the quick brown fox jumps over the lazy dog and the cat";
        let a = detect_language(text);
        let b = detect_language(text);
        assert_eq!(a, b);
    }

    #[test]
    fn test_confidence_clamped() {
        let d = detect_language("the the the the the and and and is is");
        assert!(d.confidence <= 1.0);
    }
}
