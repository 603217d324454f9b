//! Sentiment Lexicons
//!
//! Small positive/negative word lists for the lexicon sentiment scorer.
//! English plus the Romance-language terms that dominate the harvested
//! corpus. Deliberately compact: sentiment here is a coarse document-level
//! signal, not a classifier.

use std::collections::HashSet;

use once_cell::sync::Lazy;

const POSITIVE: &[&str] = &[
    "good", "great", "excellent", "positive", "success", "successful", "improve", "improved",
    "improvement", "benefit", "beneficial", "effective", "efficient", "robust", "novel",
    "significant", "progress", "advantage", "promising", "outstanding", "remarkable", "valuable",
    "reliable", "accurate", "elegant", "clear", "strong", "useful", "important", "innovative",
    "buono", "ottimo", "eccellente", "migliore", "efficace", "vantaggio", "notevole", "utile",
    "importante", "affidabile",
];

const NEGATIVE: &[&str] = &[
    "bad", "poor", "negative", "failure", "failed", "fail", "worse", "worst", "problem",
    "problems", "difficult", "difficulty", "limitation", "limited", "weak", "error", "errors",
    "wrong", "inadequate", "insufficient", "unreliable", "inaccurate", "flawed", "harmful",
    "loss", "risk", "danger", "dangerous", "severe", "critical",
    "cattivo", "pessimo", "peggiore", "problema", "difficile", "errore", "sbagliato", "debole",
    "rischio", "pericoloso",
];

static POSITIVE_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| POSITIVE.iter().copied().collect());
static NEGATIVE_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| NEGATIVE.iter().copied().collect());

/// Sentiment polarity label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    /// Score above +0.1
    Positive,
    /// Score below -0.1
    Negative,
    /// Everything in between
    Neutral,
}

impl SentimentLabel {
    /// Short lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
        }
    }
}

/// Score sentiment over lowercase tokens: `(pos - neg) / (pos + neg)`,
/// labeled at the +-0.1 threshold.
pub fn score_sentiment<'a, I: Iterator<Item = &'a str>>(tokens: I) -> (f32, SentimentLabel) {
    let mut pos = 0usize;
    let mut neg = 0usize;
    for token in tokens {
        if POSITIVE_SET.contains(token) {
            pos += 1;
        } else if NEGATIVE_SET.contains(token) {
            neg += 1;
        }
    }

    if pos + neg == 0 {
        return (0.0, SentimentLabel::Neutral);
    }

    let score = (pos as f32 - neg as f32) / (pos + neg) as f32;
    let label = if score > 0.1 {
        SentimentLabel::Positive
    } else if score < -0.1 {
        SentimentLabel::Negative
    } else {
        SentimentLabel::Neutral
    };
    (score, label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive() {
        let (score, label) =
            score_sentiment("the results were excellent and the method robust".split_whitespace());
        assert!(score > 0.0);
        assert_eq!(label, SentimentLabel::Positive);
    }

    #[test]
    fn test_negative() {
        let (score, label) =
            score_sentiment("a severe problem and a critical error".split_whitespace());
        assert!(score < 0.0);
        assert_eq!(label, SentimentLabel::Negative);
    }

    #[test]
    fn test_neutral_no_hits() {
        let (score, label) = score_sentiment("the sky is blue today".split_whitespace());
        assert_eq!(score, 0.0);
        assert_eq!(label, SentimentLabel::Neutral);
    }

    #[test]
    fn test_balanced_is_neutral() {
        let (score, label) = score_sentiment("good bad".split_whitespace());
        assert_eq!(score, 0.0);
        assert_eq!(label, SentimentLabel::Neutral);
    }

    #[test]
    fn test_score_bounds() {
        let (score, _) = score_sentiment("excellent excellent excellent".split_whitespace());
        assert!((-1.0..=1.0).contains(&score));
        assert_eq!(score, 1.0);
    }
}
