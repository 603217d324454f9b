//! Hybrid Reranking
//!
//! Post-retrieval scoring that merges vector and lexical hits into a single
//! ordering with a fixed linear blend:
//!
//! ```text
//! score = 0.50 * similarity + 0.25 * reliability + 0.15 * domain_match + 0.10 * source_bonus
//! ```
//!
//! `domain_match` is 1.0 when the query's top classified domain equals the
//! row's, 0.3 otherwise; `source_bonus` is 1.0 for vector hits and 0.7 for
//! lexical-only hits.

use crate::distill::{Category, SearchRow};

/// Blend weight on vector similarity.
pub const WEIGHT_SIMILARITY: f32 = 0.50;
/// Blend weight on source reliability.
pub const WEIGHT_RELIABILITY: f32 = 0.25;
/// Blend weight on domain match.
pub const WEIGHT_DOMAIN: f32 = 0.15;
/// Blend weight on retrieval source.
pub const WEIGHT_SOURCE: f32 = 0.10;

/// Domain factor when query and row domains agree.
pub const DOMAIN_MATCH: f32 = 1.0;
/// Domain factor when they disagree.
pub const DOMAIN_MISMATCH: f32 = 0.3;

/// Source factor for rows surfaced by vector search.
pub const SOURCE_VECTOR: f32 = 1.0;
/// Source factor for rows surfaced by lexical search only.
pub const SOURCE_LEXICAL: f32 = 0.7;

/// A candidate row entering the rerank, tagged with how it was retrieved.
#[derive(Debug, Clone)]
pub struct HybridCandidate {
    /// The joined store row
    pub row: SearchRow,
    /// Cosine similarity from the vector index, 0.0 when unavailable
    pub similarity: f32,
    /// Whether vector search surfaced this row
    pub from_vector: bool,
}

/// The fixed linear blend.
pub fn hybrid_score(similarity: f32, reliability: f32, domain_match: bool, from_vector: bool) -> f32 {
    let domain = if domain_match { DOMAIN_MATCH } else { DOMAIN_MISMATCH };
    let source = if from_vector { SOURCE_VECTOR } else { SOURCE_LEXICAL };
    WEIGHT_SIMILARITY * similarity
        + WEIGHT_RELIABILITY * reliability
        + WEIGHT_DOMAIN * domain
        + WEIGHT_SOURCE * source
}

/// Re-score every candidate against the query's domain and sort descending.
pub fn rerank_hybrid(
    candidates: Vec<HybridCandidate>,
    query_domain: Category,
) -> Vec<(HybridCandidate, f32)> {
    let mut scored: Vec<(HybridCandidate, f32)> = candidates
        .into_iter()
        .map(|candidate| {
            let score = hybrid_score(
                candidate.similarity,
                candidate.row.reliability,
                candidate.row.category == query_domain,
                candidate.from_vector,
            );
            (candidate, score)
        })
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn row(doc_id: &str, category: Category, reliability: f32) -> SearchRow {
        SearchRow {
            doc_id: doc_id.to_string(),
            title: String::new(),
            author: String::new(),
            year: None,
            language: "en".to_string(),
            category,
            origin: String::new(),
            reliability,
            keywords: String::new(),
            abstract_text: String::new(),
            bm25: 0.0,
        }
    }

    #[test]
    fn test_blend_values() {
        // Doc A: physics, reliability 0.9, similarity 0.70, query is physics
        let a = hybrid_score(0.70, 0.90, true, true);
        assert!((a - 0.825).abs() < 1e-6, "a = {a}");

        // Doc B: medicine, reliability 0.5, similarity 0.90
        let b = hybrid_score(0.90, 0.50, false, true);
        assert!((b - 0.72).abs() < 1e-6, "b = {b}");

        assert!(a > b);
    }

    #[test]
    fn test_rerank_ordering() {
        let candidates = vec![
            HybridCandidate {
                row: row("b", Category::Medicine, 0.5),
                similarity: 0.90,
                from_vector: true,
            },
            HybridCandidate {
                row: row("a", Category::Physics, 0.9),
                similarity: 0.70,
                from_vector: true,
            },
        ];

        let ranked = rerank_hybrid(candidates, Category::Physics);
        assert_eq!(ranked[0].0.row.doc_id, "a");
        assert_eq!(ranked[1].0.row.doc_id, "b");
    }

    #[test]
    fn test_lexical_only_penalty() {
        let vector = hybrid_score(0.5, 0.5, true, true);
        let lexical = hybrid_score(0.5, 0.5, true, false);
        assert!((vector - lexical - 0.03).abs() < 1e-6);
    }
}
