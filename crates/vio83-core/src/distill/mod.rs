//! Five-Level Distillation Store
//!
//! A document enters as raw text and leaves as five records:
//!
//! - **L1 Metadata** - who/what/when, ~400 bytes
//! - **L2 Embedding** - int8-quantized vector in an append-only shard file
//! - **L3 Summary** - extractive abstract, key concepts, domain tags
//! - **L4 Knowledge graph** - entities, relations, concepts
//! - **L5 Full text** - optional compressed body, file-referenced
//!
//! plus a BM25-capable FTS index over the searchable fields. The whole
//! point is that L1-L4 of a 300-page book fit in under two kilobytes while
//! still answering most retrieval questions.

mod categories;
mod migrations;
mod shards;
mod store;

pub use categories::{classify_domain, Category, ALL_CATEGORIES};
pub use shards::VectorShardStore;
pub use store::{sanitize_fts_query, DistillStore, SearchFilters, SearchRow, SortOrder, StoreStats};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Distillation store error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum DistillError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// IO error on shard or fulltext files
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Compression layer failure
    #[error("compression error: {0}")]
    Compression(#[from] crate::compression::CompressionError),
    /// Document not found
    #[error("document not found: {0}")]
    NotFound(String),
    /// Initialization error
    #[error("initialization error: {0}")]
    Init(String),
}

/// Distillation result type
pub type Result<T> = std::result::Result<T, DistillError>;

// ============================================================================
// LEVEL RECORDS
// ============================================================================

/// L1: the metadata record. Roughly 400 bytes serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Level1Metadata {
    /// 16-hex-char stable id
    pub doc_id: String,
    /// Title
    pub title: String,
    /// Author(s), comma-joined
    pub author: String,
    /// Publication year
    pub year: Option<i32>,
    /// ISO-639-1 code or "unknown"
    pub language: String,
    /// Domain tag from the closed set
    pub category: Category,
    /// Sub-discipline from the per-category closed set, possibly empty
    pub sub_discipline: String,
    /// Source type tag ("article", "book", "dataset", ...)
    pub source_type: String,
    /// ISBN, digits only
    pub isbn: Option<String>,
    /// DOI, lowercase
    pub doi: Option<String>,
    /// ISSN
    pub issn: Option<String>,
    /// Publisher
    pub publisher: String,
    /// Comma-joined keywords, at most ten
    pub keywords: String,
    /// Monotone reliability estimate in [0, 1], higher = better
    pub reliability: f32,
    /// Peer-reviewed flag
    pub peer_reviewed: bool,
    /// Origin source: "openalex", "crossref", "wikipedia", "local_mac", ...
    pub origin: String,
    /// Source URL or absolute path
    pub url: String,
    /// When the document was distilled
    pub distilled_at: DateTime<Utc>,
}

impl Default for Level1Metadata {
    fn default() -> Self {
        Self {
            doc_id: String::new(),
            title: String::new(),
            author: String::new(),
            year: None,
            language: "unknown".to_string(),
            category: Category::General,
            sub_discipline: String::new(),
            source_type: "article".to_string(),
            isbn: None,
            doi: None,
            issn: None,
            publisher: String::new(),
            keywords: String::new(),
            reliability: 0.5,
            peer_reviewed: false,
            origin: String::new(),
            url: String::new(),
            distilled_at: Utc::now(),
        }
    }
}

impl Level1Metadata {
    /// Apply the identifier normalization invariants: DOI lowercase, ISBN
    /// digits-only, reliability clamped to [0, 1].
    pub fn normalized(mut self) -> Self {
        self.doi = self.doi.map(|d| normalize_doi(&d));
        self.isbn = self.isbn.map(|i| normalize_isbn(&i));
        self.reliability = self.reliability.clamp(0.0, 1.0);
        self
    }
}

/// Normalize a DOI: strip resolver prefixes, lowercase.
pub fn normalize_doi(doi: &str) -> String {
    let lower = doi.trim().to_lowercase();
    lower
        .trim_start_matches("https://doi.org/")
        .trim_start_matches("http://doi.org/")
        .trim_start_matches("doi:")
        .to_string()
}

/// Normalize an ISBN to digits (keeping a trailing X check digit).
pub fn normalize_isbn(isbn: &str) -> String {
    isbn.chars()
        .filter(|c| c.is_ascii_digit() || *c == 'X' || *c == 'x')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// L2: pointer to a quantized vector in a shard file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Level2Embedding {
    /// Owning document
    pub doc_id: String,
    /// Shard file name under `embeddings/`
    pub shard_file: String,
    /// Byte offset of the vector in the shard
    pub offset: u64,
    /// Vector dimension (== stored byte count)
    pub vector_size: usize,
    /// Pre-quantization L2 norm; 0.0 denotes "no embedding"
    pub norm: f32,
    /// Model that produced the vector
    pub model_name: String,
}

/// L3: the distilled summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Level3Summary {
    /// Owning document
    pub doc_id: String,
    /// Extractive abstract, at most 500 chars
    pub abstract_text: String,
    /// Comma-joined key concepts, at most ten
    pub key_concepts: String,
    /// Primary domain tag
    pub primary_domain: Category,
    /// Secondary domain tag, when the text straddles two
    pub secondary_domain: Option<Category>,
    /// Relevance score in [0, 1]
    pub relevance_score: f32,
}

/// L4: the compact knowledge graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Level4KnowledgeGraph {
    /// Owning document
    pub doc_id: String,
    /// JSON list of {name, type} entities
    pub entities_json: String,
    /// JSON list of relations, empty for now
    pub relations_json: String,
    /// Comma-joined concepts
    pub concepts: String,
}

/// L5: reference to the compressed full text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Level5Fulltext {
    /// Owning document
    pub doc_id: String,
    /// Path of the compressed body, relative to the data dir
    pub file_path: String,
    /// Size of the stored file in bytes
    pub byte_size: u64,
    /// Whether the body is compressed
    pub compressed: bool,
    /// Word count of the original body
    pub word_count: usize,
}

/// A fully distilled document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistilledDoc {
    /// L1 metadata
    pub level1: Level1Metadata,
    /// L2 embedding pointer, when an embedding was stored
    pub level2: Option<Level2Embedding>,
    /// L3 summary
    pub level3: Level3Summary,
    /// L4 knowledge graph
    pub level4: Level4KnowledgeGraph,
    /// L5 full text reference, when kept
    pub level5: Option<Level5Fulltext>,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_doi() {
        assert_eq!(normalize_doi("https://doi.org/10.1000/XYZ"), "10.1000/xyz");
        assert_eq!(normalize_doi("doi:10.1000/AbC"), "10.1000/abc");
        assert_eq!(normalize_doi(" 10.1000/a "), "10.1000/a");
    }

    #[test]
    fn test_normalize_isbn() {
        assert_eq!(normalize_isbn("978-0-12-345678-9"), "9780123456789");
        assert_eq!(normalize_isbn("0-306-40615-x"), "030640615X");
    }

    #[test]
    fn test_metadata_normalized() {
        let meta = Level1Metadata {
            doi: Some("DOI:10.5555/FOO".to_string()),
            isbn: Some("978 0 12 345678 9".to_string()),
            reliability: 1.7,
            ..Default::default()
        }
        .normalized();

        assert_eq!(meta.doi.as_deref(), Some("10.5555/foo"));
        assert_eq!(meta.isbn.as_deref(), Some("9780123456789"));
        assert_eq!(meta.reliability, 1.0);
    }
}
