//! Level-1 Analysis (Regex)
//!
//! The always-available floor of the pipeline: bounded-regex named entities,
//! term-frequency keywords, extractive summarization and lexicon sentiment.
//! Stronger levels reuse the summarizer and sentiment scorer and replace
//! only entities and keywords.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::preprocess::stopwords;

use super::Entity;

static DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:\d{1,2}[/-]\d{1,2}[/-]\d{2,4}|(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},?\s+\d{4}|\d{4}-\d{2}-\d{2})\b",
    )
    .unwrap()
});
static EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[\w.+-]+@[\w-]+\.[\w.-]+\b").unwrap());
static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:https?://|www\.)\S+").unwrap());
static ORG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b((?:\p{Lu}[\p{L}&.-]+\s+){0,3}\p{Lu}[\p{L}&.-]*\s+(?:Inc|Ltd|Corp|Corporation|GmbH|LLC|S\.p\.A|University|Institute|Laboratory|Foundation)\.?)\b",
    )
    .unwrap()
});
static PERSON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\p{Lu}\p{Ll}+\s+\p{Lu}\p{Ll}+(?:\s+\p{Lu}\p{Ll}+)?)\b").unwrap()
});

/// Cap on entities returned per document.
const MAX_ENTITIES: usize = 40;

/// Extract named entities with the bounded regex set.
pub fn extract_entities(text: &str) -> Vec<Entity> {
    let mut entities = Vec::new();
    let mut seen = std::collections::HashSet::new();

    let mut push = |name: &str, entity_type: &str, entities: &mut Vec<Entity>| {
        let key = (name.to_string(), entity_type.to_string());
        if entities.len() < MAX_ENTITIES && seen.insert(key) {
            entities.push(Entity {
                name: name.to_string(),
                entity_type: entity_type.to_string(),
            });
        }
    };

    for m in DATE.find_iter(text) {
        push(m.as_str(), "DATE", &mut entities);
    }
    for m in EMAIL.find_iter(text) {
        push(m.as_str(), "EMAIL", &mut entities);
    }
    for m in URL.find_iter(text) {
        push(m.as_str(), "URL", &mut entities);
    }
    for caps in ORG.captures_iter(text) {
        push(caps[1].trim(), "ORG", &mut entities);
    }
    for caps in PERSON.captures_iter(text) {
        let name = caps[1].trim();
        // Skip spans already tagged as organizations
        if !entities
            .iter()
            .any(|e| e.entity_type == "ORG" && e.name.contains(name))
        {
            push(name, "PERSON", &mut entities);
        }
    }

    entities
}

/// Term-frequency keywords: lowercase alphabetic tokens longer than three
/// chars, stopwords removed, most frequent first.
pub fn extract_keywords(text: &str, language: &str, limit: usize) -> Vec<String> {
    let stop = stopwords(language);
    let mut freq: HashMap<String, usize> = HashMap::new();

    for token in text.split(|c: char| !c.is_alphabetic()) {
        if token.len() <= 3 {
            continue;
        }
        let lower = token.to_lowercase();
        if stop.contains(lower.as_str()) {
            continue;
        }
        *freq.entry(lower).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, usize)> = freq.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.into_iter().take(limit).map(|(w, _)| w).collect()
}

/// Split text into sentences on terminal punctuation.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if (b == b'.' || b == b'!' || b == b'?')
            && bytes.get(i + 1).map_or(true, |&next| next.is_ascii_whitespace())
        {
            let sentence = text[start..=i].trim();
            if sentence.chars().filter(|c| c.is_alphabetic()).count() >= 3 {
                sentences.push(sentence);
            }
            start = i + 1;
        }
    }
    let tail = text[start..].trim();
    if tail.chars().filter(|c| c.is_alphabetic()).count() >= 3 {
        sentences.push(tail);
    }
    sentences
}

/// Extractive summary: sentences scored by normalized term frequency with a
/// 1.5x bonus to the first sentence and 1.2x to the last, returned in
/// document order and truncated to `max_chars`.
pub fn summarize(text: &str, max_sentences: usize, max_chars: usize) -> String {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return String::new();
    }
    if sentences.len() <= max_sentences {
        return truncate_chars(&sentences.join(" "), max_chars);
    }

    // Document-wide term frequencies
    let mut freq: HashMap<String, f32> = HashMap::new();
    for token in text.split(|c: char| !c.is_alphabetic()) {
        if token.len() > 3 {
            *freq.entry(token.to_lowercase()).or_insert(0.0) += 1.0;
        }
    }
    let max_freq = freq.values().cloned().fold(1.0f32, f32::max);

    let mut scored: Vec<(usize, f32)> = sentences
        .iter()
        .enumerate()
        .map(|(i, sentence)| {
            let words: Vec<&str> = sentence.split_whitespace().collect();
            let mut score: f32 = words
                .iter()
                .filter(|w| w.len() > 3)
                .filter_map(|w| freq.get(&w.to_lowercase()))
                .map(|f| f / max_freq)
                .sum();
            score /= (words.len() as f32).max(1.0);
            if i == 0 {
                score *= 1.5;
            } else if i == sentences.len() - 1 {
                score *= 1.2;
            }
            (i, score)
        })
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    let mut picked: Vec<usize> = scored.into_iter().take(max_sentences).map(|(i, _)| i).collect();
    picked.sort_unstable();

    let summary = picked
        .into_iter()
        .map(|i| sentences[i])
        .collect::<Vec<_>>()
        .join(" ");
    truncate_chars(&summary, max_chars)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

// ============================================================================
// TESTS
// ============================================================================
