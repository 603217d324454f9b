//! Search Execution
//!
//! Builds the backend query, executes lexical and (in hybrid mode) vector
//! retrieval, merges, reranks, and decorates results with snippets,
//! highlights, facets and suggestions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::distill::{
    classify_domain, DistillStore, Result, SearchRow, SortOrder,
};
use crate::embedding::EmbeddingEngine;

use super::rerank::{rerank_hybrid, HybridCandidate};
use super::snippet::{make_highlights, make_snippet, query_tokens};
use super::{FacetCount, SearchQuery, SearchResponse, SearchResult, SortField};

/// Overfetch factor for the hybrid union.
const HYBRID_FETCH_FACTOR: usize = 4;

/// The search engine, a thin ranking layer over the store.
pub struct SearchEngine {
    store: Arc<DistillStore>,
    embeddings: Option<Arc<EmbeddingEngine>>,
}

impl SearchEngine {
    /// Lexical-only engine.
    pub fn new(store: Arc<DistillStore>) -> Self {
        Self {
            store,
            embeddings: None,
        }
    }

    /// Engine with an embedding backend for the hybrid path.
    pub fn with_embeddings(store: Arc<DistillStore>, embeddings: Arc<EmbeddingEngine>) -> Self {
        Self {
            store,
            embeddings: Some(embeddings),
        }
    }

    /// Build the backend match expression: one word gains a prefix
    /// wildcard; several words AND together with a wildcard on the last.
    pub fn build_match(text: &str) -> String {
        let tokens = query_tokens(text);
        match tokens.as_slice() {
            [] => String::new(),
            [single] => format!("\"{single}\"*"),
            [init @ .., last] => {
                let mut parts: Vec<String> = init.iter().map(|t| format!("\"{t}\"")).collect();
                parts.push(format!("\"{last}\"*"));
                parts.join(" ")
            }
        }
    }

    /// Answer a search request.
    pub fn search(&self, query: &SearchQuery) -> Result<SearchResponse> {
        let started = Instant::now();
        let match_expr = Self::build_match(&query.text);
        if match_expr.is_empty() {
            return Ok(SearchResponse::empty(&query.text));
        }

        let sort = match query.sort {
            SortField::Relevance => SortOrder::Relevance,
            SortField::Date => SortOrder::Date,
            SortField::Title => SortOrder::Title,
        };
        let fetch = query.offset + query.limit;

        let total_hits = self.store.count_match(&match_expr, &query.filters)?;

        // Hybrid rerank only applies to relevance ordering
        let mut results = if query.hybrid && query.sort == SortField::Relevance {
            self.hybrid_results(query, &match_expr, fetch)?
        } else {
            self.lexical_results(query, &match_expr, sort)?
        };

        if let Some(min_score) = query.min_score {
            results.retain(|r| r.score >= min_score);
        }

        let tokens = query_tokens(&query.text);
        for result in &mut results {
            let source = if result.snippet.is_empty() {
                result.title.clone()
            } else {
                result.snippet.clone()
            };
            result.snippet = make_snippet(&source, &tokens);
            if query.highlight {
                result.highlights = make_highlights(&source, &tokens);
            }
        }

        let mut facets = HashMap::new();
        for field in &query.facets {
            let counts = self
                .store
                .facet_counts(field, Some(&match_expr), &query.filters, 20)?;
            facets.insert(
                field.clone(),
                counts
                    .into_iter()
                    .map(|(value, count)| FacetCount { value, count })
                    .collect(),
            );
        }

        let suggestions = self.store.title_suggestions(&query.text, query.limit)?;
        let did_you_mean = if total_hits == 0 {
            suggestions.first().cloned()
        } else {
            None
        };

        Ok(SearchResponse {
            query: query.text.clone(),
            total_hits,
            results,
            took_ms: started.elapsed().as_millis() as u64,
            facets,
            suggestions,
            did_you_mean,
        })
    }

    fn lexical_results(
        &self,
        query: &SearchQuery,
        match_expr: &str,
        sort: SortOrder,
    ) -> Result<Vec<SearchResult>> {
        let rows = self.store.search_match(
            match_expr,
            &query.filters,
            sort,
            query.offset,
            query.limit,
        )?;
        Ok(rows.into_iter().map(row_to_result).collect())
    }

    /// Run vector kNN and FTS separately, union by doc_id with the FTS row
    /// winning duplicates, then re-score everything with the linear blend.
    fn hybrid_results(
        &self,
        query: &SearchQuery,
        match_expr: &str,
        fetch: usize,
    ) -> Result<Vec<SearchResult>> {
        let overfetch = fetch * HYBRID_FETCH_FACTOR;
        let lexical = self.store.search_match(
            match_expr,
            &query.filters,
            SortOrder::Relevance,
            0,
            overfetch,
        )?;

        let vector_hits: Vec<(String, f32)> = match self
            .embeddings
            .as_ref()
            .filter(|e| e.is_available())
            .and_then(|e| e.embed_one(&query.text))
        {
            Some(vector) => self.store.knn(&vector, overfetch)?,
            None => Vec::new(),
        };
        let similarity: HashMap<&str, f32> = vector_hits
            .iter()
            .map(|(doc_id, sim)| (doc_id.as_str(), *sim))
            .collect();

        // FTS result wins duplicates
        let mut candidates: Vec<HybridCandidate> = Vec::new();
        let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();
        for row in lexical {
            let sim = similarity.get(row.doc_id.as_str()).copied();
            seen.insert(row.doc_id.clone());
            candidates.push(HybridCandidate {
                similarity: sim.unwrap_or(0.0),
                from_vector: sim.is_some(),
                row,
            });
        }
        for (doc_id, sim) in &vector_hits {
            if seen.contains(doc_id) {
                continue;
            }
            if let Some(row) = self.row_for_doc(doc_id)? {
                candidates.push(HybridCandidate {
                    row,
                    similarity: *sim,
                    from_vector: true,
                });
            }
        }

        let (query_domain, _) = classify_domain(&query.text);
        let ranked = rerank_hybrid(candidates, query_domain);

        Ok(ranked
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .map(|(candidate, score)| {
                let mut result = row_to_result(candidate.row);
                result.score = score;
                result
            })
            .collect())
    }

    /// Reconstruct a SearchRow for a vector-only hit.
    fn row_for_doc(&self, doc_id: &str) -> Result<Option<SearchRow>> {
        let Some(metadata) = self.store.get_metadata(doc_id)? else {
            return Ok(None);
        };
        let abstract_text = self
            .store
            .get_summary(doc_id)?
            .map(|s| s.abstract_text)
            .unwrap_or_default();
        Ok(Some(SearchRow {
            doc_id: metadata.doc_id,
            title: metadata.title,
            author: metadata.author,
            year: metadata.year,
            language: metadata.language,
            category: metadata.category,
            origin: metadata.origin,
            reliability: metadata.reliability,
            keywords: metadata.keywords,
            abstract_text,
            bm25: 0.0,
        }))
    }
}

/// BM25 scores leave the engine as non-negative magnitudes regardless of
/// the backend's sign convention.
fn row_to_result(row: SearchRow) -> SearchResult {
    SearchResult {
        doc_id: row.doc_id,
        title: row.title,
        author: row.author,
        year: row.year,
        language: row.language,
        category: row.category.as_str().to_string(),
        origin: row.origin,
        score: row.bm25.abs() as f32,
        reliability: row.reliability,
        snippet: row.abstract_text,
        highlights: Vec::new(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
