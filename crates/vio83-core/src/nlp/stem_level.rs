//! Level-2 Analysis (Stemmed)
//!
//! Replaces level-1 keyword extraction with stem-normalized term frequency
//! and entity extraction with a chunked proper-noun tagger. Summaries and
//! sentiment still come from level 1.

use std::collections::HashMap;

use rust_stemmers::{Algorithm, Stemmer};

use crate::preprocess::stopwords;

use super::Entity;

/// Stemmer for a language code; unsupported languages get English.
pub fn stemmer_for(language: &str) -> Stemmer {
    let algorithm = match language {
        "it" => Algorithm::Italian,
        "fr" => Algorithm::French,
        "de" => Algorithm::German,
        "es" => Algorithm::Spanish,
        "pt" => Algorithm::Portuguese,
        _ => Algorithm::English,
    };
    Stemmer::create(algorithm)
}

/// Stem-normalized term-frequency keywords.
///
/// Tokens sharing a stem are counted together; the most frequent surface
/// form represents the group.
pub fn extract_keywords_stemmed(text: &str, language: &str, limit: usize) -> Vec<String> {
    let stemmer = stemmer_for(language);
    let stop = stopwords(language);

    // stem -> (total count, surface form counts)
    let mut groups: HashMap<String, (usize, HashMap<String, usize>)> = HashMap::new();
    for token in text.split(|c: char| !c.is_alphabetic()) {
        if token.len() <= 3 {
            continue;
        }
        let lower = token.to_lowercase();
        if stop.contains(lower.as_str()) {
            continue;
        }
        let stem = stemmer.stem(&lower).into_owned();
        let entry = groups.entry(stem).or_insert_with(|| (0, HashMap::new()));
        entry.0 += 1;
        *entry.1.entry(lower).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, usize)> = groups
        .into_values()
        .map(|(total, surfaces)| {
            let surface = surfaces
                .into_iter()
                .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
                .map(|(word, _)| word)
                .unwrap_or_default();
            (surface, total)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.into_iter().take(limit).map(|(w, _)| w).collect()
}

const ORG_SUFFIXES: &[&str] = &[
    "Inc", "Ltd", "Corp", "Corporation", "GmbH", "LLC", "University", "Institute", "Laboratory",
    "Foundation", "Society", "Academy",
];

/// Chunked proper-noun tagger: consecutive capitalized tokens form one
/// entity; the suffix decides ORG, token count decides PERSON vs ENTITY.
pub fn extract_entities_chunked(text: &str) -> Vec<Entity> {
    let mut entities = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for sentence in super::regex_level::split_sentences(text) {
        let tokens: Vec<&str> = sentence.split_whitespace().collect();
        let mut chunk: Vec<&str> = Vec::new();

        for (i, token) in tokens.iter().enumerate() {
            let word = token.trim_matches(|c: char| !c.is_alphanumeric() && c != '.');
            let is_proper = word
                .chars()
                .next()
                .map(|c| c.is_uppercase())
                .unwrap_or(false)
                && word.len() > 1;

            // The sentence-initial word is capitalized by convention, not
            // because it names something
            if is_proper && i > 0 {
                chunk.push(word);
                continue;
            }

            flush_chunk(&mut chunk, &mut entities, &mut seen);
        }
        flush_chunk(&mut chunk, &mut entities, &mut seen);
    }

    entities
}

fn flush_chunk(
    chunk: &mut Vec<&str>,
    entities: &mut Vec<Entity>,
    seen: &mut std::collections::HashSet<String>,
) {
    if chunk.is_empty() {
        return;
    }
    let name = chunk.join(" ");
    chunk.clear();

    if name.len() < 3 || !seen.insert(name.clone()) {
        return;
    }

    let entity_type = if chunk_is_org(&name) {
        "ORG"
    } else if name.split_whitespace().count() >= 2 {
        "PERSON"
    } else {
        "ENTITY"
    };
    entities.push(Entity {
        name,
        entity_type: entity_type.to_string(),
    });
}

fn chunk_is_org(name: &str) -> bool {
    name.split_whitespace()
        .last()
        .map(|last| {
            let clean = last.trim_end_matches('.');
            ORG_SUFFIXES.contains(&clean)
        })
        .unwrap_or(false)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stemmed_grouping() {
        let text = "compression compressed compressing algorithms algorithm";
        let keywords = extract_keywords_stemmed(text, "en", 5);
        // Three compression variants collapse into one group that outranks
        // the two algorithm variants
        assert_eq!(keywords.len(), 2);
        assert!(keywords[0].starts_with("compress"));
    }

    #[test]
    fn test_italian_stemmer() {
        let keywords = extract_keywords_stemmed("biblioteca biblioteche digitale", "it", 5);
        assert_eq!(keywords.len(), 2);
    }

    #[test]
    fn test_chunked_person() {
        let text = "The paper cites Enrico Fermi and the work done at Princeton University.";
        let entities = extract_entities_chunked(text);
        assert!(entities
            .iter()
            .any(|e| e.name == "Enrico Fermi" && e.entity_type == "PERSON"));
        assert!(entities
            .iter()
            .any(|e| e.name.contains("Princeton University") && e.entity_type == "ORG"));
    }

    #[test]
    fn test_sentence_initial_word_skipped() {
        let entities = extract_entities_chunked("Therefore the result holds.");
        assert!(entities.is_empty());
    }
}
