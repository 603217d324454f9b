//! RAG Facade
//!
//! Packages top-ranked search hits into a prompt-sized context block for a
//! downstream LLM, with source attribution and an averaged confidence.
//! Also exposes the source-verification badge used to grade answers
//! against the certified corpus.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::distill::{classify_domain, DistillStore, Result};
use crate::search::{SearchEngine, SearchQuery};

/// Default context budget in (approximate) tokens.
pub const DEFAULT_MAX_CONTEXT_TOKENS: usize = 2000;

/// Default number of candidate results.
pub const DEFAULT_N_RESULTS: usize = 5;

/// Separator between context blocks.
const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// One attributed source in a packaged context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagSource {
    /// Source title
    pub title: String,
    /// Source author
    pub author: String,
    /// Source domain tag
    pub domain: String,
    /// Source reliability in [0, 1]
    pub reliability: f32,
    /// Rank score the source entered the context with
    pub similarity: f32,
}

/// A packaged retrieval context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagContext {
    /// Concatenated `[Fonte: ...]` blocks
    pub context_text: String,
    /// Sources, one per block kept
    pub sources: Vec<RagSource>,
    /// Domain the question classified into
    pub domain: String,
    /// Mean score of the kept sources
    pub confidence: f32,
    /// Whether any block made it into the context
    pub has_context: bool,
}

/// Verification grade for an answer against the corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationBadge {
    /// "gold" | "silver" | "bronze" | "unverified"
    pub badge: String,
    /// Human label
    pub label: String,
    /// Best-match confidence
    pub confidence: f32,
    /// Titles of the supporting sources
    pub sources: Vec<String>,
    /// One-line explanation
    pub note: String,
}

/// The facade over search + store.
pub struct RagFacade {
    store: Arc<DistillStore>,
    engine: SearchEngine,
}

impl RagFacade {
    /// Facade running hybrid search over `store`.
    pub fn new(store: Arc<DistillStore>, engine: SearchEngine) -> Self {
        Self { store, engine }
    }

    /// Build a prompt context for a question.
    ///
    /// Results are consumed in rank order; each becomes a
    /// `[Fonte: {title} ({author})]\n{content}` block, and blocks are added
    /// until the next one would push the estimated token count
    /// (chars / 4) over `max_context_tokens`.
    pub fn build_rag_context(
        &self,
        question: &str,
        max_context_tokens: usize,
        n_results: usize,
    ) -> Result<RagContext> {
        let (domain, _) = classify_domain(question);

        let query = SearchQuery {
            text: question.to_string(),
            limit: n_results.max(1),
            hybrid: true,
            ..Default::default()
        };
        let response = self.engine.search(&query)?;

        let max_chars = max_context_tokens * 4;
        let mut blocks: Vec<String> = Vec::new();
        let mut sources: Vec<RagSource> = Vec::new();
        let mut used_chars = 0usize;

        for result in &response.results {
            let content = match self.store.get_fulltext(&result.doc_id)? {
                Some(fulltext) => fulltext,
                None => {
                    let abstract_text = self
                        .store
                        .get_summary(&result.doc_id)?
                        .map(|s| s.abstract_text)
                        .unwrap_or_default();
                    if abstract_text.is_empty() {
                        result.snippet.clone()
                    } else {
                        abstract_text
                    }
                }
            };
            if content.trim().is_empty() {
                continue;
            }

            let block = format!("[Fonte: {} ({})]\n{}", result.title, result.author, content);
            let separator_chars = if blocks.is_empty() {
                0
            } else {
                BLOCK_SEPARATOR.chars().count()
            };
            let block_chars = block.chars().count();
            if used_chars + separator_chars + block_chars > max_chars {
                break;
            }

            used_chars += separator_chars + block_chars;
            blocks.push(block);
            sources.push(RagSource {
                title: result.title.clone(),
                author: result.author.clone(),
                domain: result.category.clone(),
                reliability: result.reliability,
                similarity: result.score,
            });
        }

        let confidence = if sources.is_empty() {
            0.0
        } else {
            sources.iter().map(|s| s.similarity).sum::<f32>() / sources.len() as f32
        };

        Ok(RagContext {
            context_text: blocks.join(BLOCK_SEPARATOR),
            has_context: !blocks.is_empty(),
            sources,
            domain: domain.as_str().to_string(),
            confidence,
        })
    }

    /// Grade a question against the corpus: gold above 0.85 confidence,
    /// silver above 0.7, bronze when something matched at all.
    pub fn verify_answer(&self, question: &str) -> Result<VerificationBadge> {
        let query = SearchQuery {
            text: question.to_string(),
            limit: 5,
            hybrid: true,
            ..Default::default()
        };
        let response = self.engine.search(&query)?;

        let Some(best) = response.results.first() else {
            return Ok(VerificationBadge {
                badge: "unverified".to_string(),
                label: "Not verified".to_string(),
                confidence: 0.0,
                sources: Vec::new(),
                note: "No certified source found for this query".to_string(),
            });
        };

        let confidence = best.score;
        let titles = |n: usize| {
            response
                .results
                .iter()
                .take(n)
                .map(|r| r.title.clone())
                .collect::<Vec<_>>()
        };

        let badge = if confidence > 0.85 {
            VerificationBadge {
                badge: "gold".to_string(),
                label: "Verified, high reliability".to_string(),
                confidence,
                sources: titles(3),
                note: format!("Confirmed by {} certified sources", response.results.len()),
            }
        } else if confidence > 0.7 {
            VerificationBadge {
                badge: "silver".to_string(),
                label: "Partially verified".to_string(),
                confidence,
                sources: titles(2),
                note: "Related sources found, not an exact match".to_string(),
            }
        } else {
            VerificationBadge {
                badge: "bronze".to_string(),
                label: "Low correlation".to_string(),
                confidence,
                sources: titles(1),
                note: "Matching sources have low correlation".to_string(),
            }
        };
        Ok(badge)
    }
}

// ============================================================================
// TESTS
// ============================================================================
