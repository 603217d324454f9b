//! Search Engine
//!
//! Unified search over the distillation store: BM25 over FTS5, brute-force
//! vector kNN over the int8 shards, and a hybrid rerank blending the two
//! with reliability and domain signals. Responses carry snippets, highlight
//! spans, facet counts and title suggestions.

mod engine;
mod rerank;
mod snippet;

pub use engine::SearchEngine;
pub use rerank::{
    hybrid_score, rerank_hybrid, HybridCandidate, DOMAIN_MATCH, DOMAIN_MISMATCH, SOURCE_LEXICAL,
    SOURCE_VECTOR, WEIGHT_DOMAIN, WEIGHT_RELIABILITY, WEIGHT_SIMILARITY, WEIGHT_SOURCE,
};
pub use snippet::{make_highlights, make_snippet, query_tokens};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::distill::SearchFilters;

/// Result ordering requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    /// Best match first
    #[default]
    Relevance,
    /// Newest first
    Date,
    /// Alphabetical by title
    Title,
}

/// A search request.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Free-text query
    pub text: String,
    /// Structured filter predicates
    pub filters: SearchFilters,
    /// Result offset for paging
    pub offset: usize,
    /// Result count
    pub limit: usize,
    /// Requested ordering
    pub sort: SortField,
    /// Compute highlight spans
    pub highlight: bool,
    /// Drop results scoring below this magnitude
    pub min_score: Option<f32>,
    /// Facet fields to aggregate
    pub facets: Vec<String>,
    /// Blend vector and lexical retrieval
    pub hybrid: bool,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            text: String::new(),
            filters: SearchFilters::default(),
            offset: 0,
            limit: 10,
            sort: SortField::Relevance,
            highlight: false,
            min_score: None,
            facets: Vec::new(),
            hybrid: false,
        }
    }
}

impl SearchQuery {
    /// Query with just text and default knobs.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// One facet value with its count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacetCount {
    /// Facet value
    pub value: String,
    /// Documents carrying it within the filtered result set
    pub count: u64,
}

/// One ranked search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Document id
    pub doc_id: String,
    /// Title
    pub title: String,
    /// Author
    pub author: String,
    /// Year
    pub year: Option<i32>,
    /// Language code
    pub language: String,
    /// Category tag
    pub category: String,
    /// Origin source
    pub origin: String,
    /// Relevance as a non-negative magnitude, regardless of backend
    pub score: f32,
    /// Source reliability in [0, 1]
    pub reliability: f32,
    /// Window around the first matched token
    pub snippet: String,
    /// Up to three highlight spans
    pub highlights: Vec<String>,
}

/// A complete search response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    /// Echo of the query text
    pub query: String,
    /// Total matching documents before paging
    pub total_hits: u64,
    /// Ranked page of results
    pub results: Vec<SearchResult>,
    /// Wall time spent answering
    pub took_ms: u64,
    /// Facet counts per requested field
    pub facets: HashMap<String, Vec<FacetCount>>,
    /// Title-prefix suggestions
    pub suggestions: Vec<String>,
    /// Closest indexed title when nothing matched
    pub did_you_mean: Option<String>,
}

impl SearchResponse {
    /// Empty response for a query.
    pub fn empty(query: &str) -> Self {
        Self {
            query: query.to_string(),
            total_hits: 0,
            results: Vec::new(),
            took_ms: 0,
            facets: HashMap::new(),
            suggestions: Vec::new(),
            did_you_mean: None,
        }
    }
}
