//! SQLite Distillation Store
//!
//! Five-level schema in a single embedded database, plus FTS5 and the
//! vector shard files. Separate reader/writer connections for interior
//! mutability; all methods take `&self`, so the store is shared as a
//! process-wide `Arc<DistillStore>`. Writers are serialized by the WAL.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::compression::{self, Compressor};
use crate::nlp::NlpPipeline;
use crate::quantize;

use super::{
    classify_domain, migrations, Category, DistillError, DistilledDoc, Level1Metadata,
    Level2Embedding, Level3Summary, Level4KnowledgeGraph, Level5Fulltext, Result,
    VectorShardStore,
};

/// Database file name under the data dir.
const DB_FILE: &str = "knowledge_distilled.db";

/// Concepts and entities kept per document.
const MAX_CONCEPTS: usize = 10;
const MAX_ENTITIES: usize = 20;

/// Columns callers may filter on by name.
const FILTERABLE_COLUMNS: &[&str] = &[
    "title",
    "author",
    "publisher",
    "source_type",
    "sub_discipline",
    "doi",
    "isbn",
    "issn",
    "peer_reviewed",
    "url",
];

// ============================================================================
// FILTERS AND ROWS
// ============================================================================

/// Structured filter predicates applied alongside the match expression.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    /// Restrict to these categories (OR within the list)
    pub categories: Vec<Category>,
    /// Restrict to a language code
    pub language: Option<String>,
    /// Publication year lower bound, inclusive
    pub year_from: Option<i32>,
    /// Publication year upper bound, inclusive
    pub year_to: Option<i32>,
    /// Restrict to an origin source
    pub origin: Option<String>,
    /// Arbitrary column equals; non-filterable columns are ignored
    pub fields: Vec<(String, String)>,
}

impl SearchFilters {
    fn clauses(&self) -> (String, Vec<rusqlite::types::Value>) {
        let mut sql = String::new();
        let mut values: Vec<rusqlite::types::Value> = Vec::new();

        if !self.categories.is_empty() {
            let placeholders = vec!["?"; self.categories.len()].join(", ");
            sql.push_str(&format!(" AND l1.category IN ({placeholders})"));
            for cat in &self.categories {
                values.push(cat.as_str().to_string().into());
            }
        }
        if let Some(language) = &self.language {
            sql.push_str(" AND l1.language = ?");
            values.push(language.clone().into());
        }
        if let Some(from) = self.year_from {
            sql.push_str(" AND l1.year >= ?");
            values.push(i64::from(from).into());
        }
        if let Some(to) = self.year_to {
            sql.push_str(" AND l1.year <= ?");
            values.push(i64::from(to).into());
        }
        if let Some(origin) = &self.origin {
            sql.push_str(" AND l1.origin = ?");
            values.push(origin.clone().into());
        }
        for (column, value) in &self.fields {
            if FILTERABLE_COLUMNS.contains(&column.as_str()) {
                sql.push_str(&format!(" AND l1.{column} = ?"));
                values.push(value.clone().into());
            } else {
                tracing::warn!(column = %column, "ignoring non-filterable search field");
            }
        }

        (sql, values)
    }
}

/// Sort orders for store-level search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// BM25 ascending (best match first)
    #[default]
    Relevance,
    /// Year descending
    Date,
    /// Title ascending
    Title,
}

/// One search hit joined across L1 and L3.
#[derive(Debug, Clone)]
pub struct SearchRow {
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
    pub category: Category,
    /// Origin source
    pub origin: String,
    /// Reliability in [0, 1]
    pub reliability: f32,
    /// Comma-joined keywords
    pub keywords: String,
    /// L3 abstract, empty when the document is metadata-only
    pub abstract_text: String,
    /// Raw BM25 from the engine; lower = better match
    pub bm25: f64,
}

/// Store-wide statistics.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    /// Rows per level
    pub l1_count: u64,
    /// L2 rows
    pub l2_count: u64,
    /// L3 rows
    pub l3_count: u64,
    /// L4 rows
    pub l4_count: u64,
    /// L5 rows
    pub l5_count: u64,
    /// Document count per origin
    pub by_origin: Vec<(String, u64)>,
    /// Document count per category
    pub by_category: Vec<(String, u64)>,
    /// Document count per language
    pub by_language: Vec<(String, u64)>,
    /// Size of the database file in bytes
    pub db_size_bytes: u64,
}

/// Whether a rusqlite error is an FTS5 match-expression parse failure.
fn is_invalid_query(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(_, Some(message))
            if message.contains("fts5")
                || message.contains("syntax")
                || message.contains("unterminated")
                || message.contains("malformed")
    )
}

/// Escape a free-text query into a safe FTS5 match expression: each token
/// quoted, implicit AND between tokens.
pub fn sanitize_fts_query(query: &str) -> String {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{t}\""))
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// STORE
// ============================================================================

/// The five-level distillation store.
pub struct DistillStore {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    shards: Mutex<VectorShardStore>,
    base_dir: PathBuf,
    db_path: PathBuf,
    nlp: NlpPipeline,
    compressor: &'static Compressor,
    embedding_model: String,
}

impl DistillStore {
    /// Apply performance PRAGMAs to a connection.
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    /// Open the store under `base_dir` (default `./data`, overridable with
    /// `VIO83_DATA_DIR`). Creates the directory layout on first use.
    pub fn open(base_dir: Option<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.unwrap_or_else(|| {
            std::env::var("VIO83_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data"))
        });
        std::fs::create_dir_all(&base_dir)?;
        std::fs::create_dir_all(base_dir.join("fulltext"))?;

        let db_path = base_dir.join(DB_FILE);
        let writer = Connection::open(&db_path)?;
        Self::configure_connection(&writer)?;
        migrations::apply_migrations(&writer)?;

        let reader = Connection::open(&db_path)?;
        Self::configure_connection(&reader)?;

        let shards = VectorShardStore::open(base_dir.join("embeddings"))?;

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            shards: Mutex::new(shards),
            base_dir,
            db_path,
            nlp: NlpPipeline::new(),
            compressor: compression::get_compressor(),
            embedding_model: std::env::var("VIO83_EMBEDDING_MODEL")
                .unwrap_or_else(|_| "all-MiniLM-L6-v2".to_string()),
        })
    }

    /// The data directory this store lives under.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn writer(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| DistillError::Init("writer lock poisoned".to_string()))
    }

    fn reader(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.reader
            .lock()
            .map_err(|_| DistillError::Init("reader lock poisoned".to_string()))
    }

    // ------------------------------------------------------------------
    // Distillation
    // ------------------------------------------------------------------

    /// Distill a document: write L1, optionally L2, compute L3/L4 from the
    /// text, optionally keep the compressed L5 body. Atomic per document;
    /// a failure rolls back every level for this doc_id.
    pub fn distill(
        &self,
        doc_id: &str,
        text: &str,
        metadata: Level1Metadata,
        embedding: Option<&[f32]>,
        keep_fulltext: bool,
    ) -> Result<DistilledDoc> {
        let mut level1 = Level1Metadata {
            doc_id: doc_id.to_string(),
            distilled_at: Utc::now(),
            ..metadata
        }
        .normalized();

        // Text-derived levels
        let analysis = self.nlp.analyze(text);
        let (primary_domain, secondary_domain) = classify_domain(text);
        if level1.keywords.is_empty() {
            level1.keywords = analysis
                .keywords
                .iter()
                .take(MAX_CONCEPTS)
                .cloned()
                .collect::<Vec<_>>()
                .join(",");
        }
        if level1.language == "unknown" {
            level1.language = analysis.language.clone();
        }
        if level1.category == Category::General {
            level1.category = primary_domain;
        }

        let relevance_score = (((analysis.word_count as f32 / 1000.0).min(1.0)
            + analysis.language_confidence)
            / 2.0)
            .clamp(0.0, 1.0);
        let level3 = Level3Summary {
            doc_id: doc_id.to_string(),
            abstract_text: analysis.summary.chars().take(500).collect(),
            key_concepts: analysis
                .keywords
                .iter()
                .take(MAX_CONCEPTS)
                .cloned()
                .collect::<Vec<_>>()
                .join(","),
            primary_domain,
            secondary_domain,
            relevance_score,
        };

        let entities: Vec<_> = analysis.entities.iter().take(MAX_ENTITIES).collect();
        let level4 = Level4KnowledgeGraph {
            doc_id: doc_id.to_string(),
            entities_json: serde_json::to_string(&entities).unwrap_or_else(|_| "[]".to_string()),
            relations_json: "[]".to_string(),
            concepts: level3.key_concepts.clone(),
        };

        // L2: quantize and append to the shard files before the transaction;
        // an aborted transaction orphans the bytes, the periodic sweep
        // reclaims them
        let level2 = match embedding {
            Some(vector) if !vector.is_empty() => {
                let (quantized, norm) = quantize::quantize(vector);
                let mut shards = self
                    .shards
                    .lock()
                    .map_err(|_| DistillError::Init("shard lock poisoned".to_string()))?;
                let (shard_file, offset) = shards.append(quantize::as_raw_bytes(&quantized))?;
                Some(Level2Embedding {
                    doc_id: doc_id.to_string(),
                    shard_file,
                    offset,
                    vector_size: quantized.len(),
                    norm,
                    model_name: self.embedding_model.clone(),
                })
            }
            _ => None,
        };

        // L5: compressed body on disk, row holds the reference
        let level5 = if keep_fulltext {
            let framed = self.compressor.compress_profile(text.as_bytes(), "text")?;
            let relative = format!("fulltext/{doc_id}.zlib");
            let path = self.base_dir.join(&relative);
            std::fs::write(&path, &framed)?;
            Some(Level5Fulltext {
                doc_id: doc_id.to_string(),
                file_path: relative,
                byte_size: framed.len() as u64,
                compressed: true,
                word_count: text.split_whitespace().count(),
            })
        } else {
            None
        };

        {
            let mut writer = self.writer()?;
            let tx = writer.transaction()?;
            Self::write_l1(&tx, &level1)?;
            if let Some(l2) = &level2 {
                tx.execute(
                    "INSERT OR REPLACE INTO l2_embeddings
                     (doc_id, shard_file, offset, vector_size, norm, model_name)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        l2.doc_id,
                        l2.shard_file,
                        l2.offset as i64,
                        l2.vector_size as i64,
                        l2.norm,
                        l2.model_name
                    ],
                )?;
            }
            tx.execute(
                "INSERT OR REPLACE INTO l3_summaries
                 (doc_id, abstract, key_concepts, primary_domain, secondary_domain, relevance_score)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    level3.doc_id,
                    level3.abstract_text,
                    level3.key_concepts,
                    level3.primary_domain.as_str(),
                    level3.secondary_domain.map(|c| c.as_str()),
                    level3.relevance_score
                ],
            )?;
            tx.execute(
                "INSERT OR REPLACE INTO l4_knowledge_graph
                 (doc_id, entities_json, relations_json, concepts)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    level4.doc_id,
                    level4.entities_json,
                    level4.relations_json,
                    level4.concepts
                ],
            )?;
            if let Some(l5) = &level5 {
                tx.execute(
                    "INSERT OR REPLACE INTO l5_fulltext
                     (doc_id, file_path, byte_size, compressed, word_count)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        l5.doc_id,
                        l5.file_path,
                        l5.byte_size as i64,
                        l5.compressed,
                        l5.word_count as i64
                    ],
                )?;
            }
            Self::write_fts(&tx, &level1, &level3.abstract_text, &level3.key_concepts)?;
            tx.commit()?;
        }

        Ok(DistilledDoc {
            level1,
            level2,
            level3,
            level4,
            level5,
        })
    }

    /// Fast path: write an L1 record without any text-derived level.
    /// Returns whether the doc_id was new.
    pub fn distill_metadata_only(&self, metadata: Level1Metadata) -> Result<bool> {
        Ok(self.distill_batch_metadata(std::slice::from_ref(&metadata))? == 1)
    }

    /// Bulk metadata insert used by the harvester and the local scanner.
    /// Idempotent on doc_id; returns the number of NEW documents.
    pub fn distill_batch_metadata(&self, batch: &[Level1Metadata]) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut inserted = 0usize;
        let mut writer = self.writer()?;
        let tx = writer.transaction()?;
        for metadata in batch {
            let metadata = metadata.clone().normalized();
            let existed: bool = tx
                .query_row(
                    "SELECT 1 FROM l1_metadata WHERE doc_id = ?1",
                    params![metadata.doc_id],
                    |_| Ok(true),
                )
                .optional()?
                .unwrap_or(false);

            Self::write_l1(&tx, &metadata)?;
            Self::write_fts(&tx, &metadata, "", "")?;
            if !existed {
                inserted += 1;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn write_l1(tx: &rusqlite::Transaction<'_>, metadata: &Level1Metadata) -> Result<()> {
        tx.execute(
            "INSERT OR REPLACE INTO l1_metadata
             (doc_id, title, author, year, language, category, sub_discipline, source_type,
              isbn, doi, issn, publisher, keywords, reliability, peer_reviewed, origin, url,
              distilled_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                metadata.doc_id,
                metadata.title,
                metadata.author,
                metadata.year,
                metadata.language,
                metadata.category.as_str(),
                metadata.sub_discipline,
                metadata.source_type,
                metadata.isbn,
                metadata.doi,
                metadata.issn,
                metadata.publisher,
                metadata.keywords,
                metadata.reliability,
                metadata.peer_reviewed,
                metadata.origin,
                metadata.url,
                metadata.distilled_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn write_fts(
        tx: &rusqlite::Transaction<'_>,
        metadata: &Level1Metadata,
        abstract_text: &str,
        key_concepts: &str,
    ) -> Result<()> {
        tx.execute(
            "DELETE FROM distilled_fts WHERE doc_id = ?1",
            params![metadata.doc_id],
        )?;
        tx.execute(
            "INSERT INTO distilled_fts
             (doc_id, title, author, keywords, abstract, key_concepts, category)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                metadata.doc_id,
                metadata.title,
                metadata.author,
                metadata.keywords,
                abstract_text,
                key_concepts,
                metadata.category.as_str(),
            ],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Whether a document exists.
    pub fn contains(&self, doc_id: &str) -> Result<bool> {
        let reader = self.reader()?;
        Ok(reader
            .query_row(
                "SELECT 1 FROM l1_metadata WHERE doc_id = ?1",
                params![doc_id],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false))
    }

    /// Fetch an L1 record.
    pub fn get_metadata(&self, doc_id: &str) -> Result<Option<Level1Metadata>> {
        let reader = self.reader()?;
        let row = reader
            .query_row(
                "SELECT doc_id, title, author, year, language, category, sub_discipline,
                        source_type, isbn, doi, issn, publisher, keywords, reliability,
                        peer_reviewed, origin, url, distilled_at
                 FROM l1_metadata WHERE doc_id = ?1",
                params![doc_id],
                Self::row_to_metadata,
            )
            .optional()?;
        Ok(row)
    }

    fn row_to_metadata(row: &rusqlite::Row<'_>) -> rusqlite::Result<Level1Metadata> {
        let category: String = row.get(5)?;
        let distilled_at: String = row.get(17)?;
        Ok(Level1Metadata {
            doc_id: row.get(0)?,
            title: row.get(1)?,
            author: row.get(2)?,
            year: row.get(3)?,
            language: row.get(4)?,
            category: Category::parse_name(&category),
            sub_discipline: row.get(6)?,
            source_type: row.get(7)?,
            isbn: row.get(8)?,
            doi: row.get(9)?,
            issn: row.get(10)?,
            publisher: row.get(11)?,
            keywords: row.get(12)?,
            reliability: row.get(13)?,
            peer_reviewed: row.get(14)?,
            origin: row.get(15)?,
            url: row.get(16)?,
            distilled_at: chrono::DateTime::parse_from_rfc3339(&distilled_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }

    /// Fetch an L3 summary.
    pub fn get_summary(&self, doc_id: &str) -> Result<Option<Level3Summary>> {
        let reader = self.reader()?;
        let row = reader
            .query_row(
                "SELECT doc_id, abstract, key_concepts, primary_domain, secondary_domain,
                        relevance_score
                 FROM l3_summaries WHERE doc_id = ?1",
                params![doc_id],
                |row| {
                    let primary: String = row.get(3)?;
                    let secondary: Option<String> = row.get(4)?;
                    Ok(Level3Summary {
                        doc_id: row.get(0)?,
                        abstract_text: row.get(1)?,
                        key_concepts: row.get(2)?,
                        primary_domain: Category::parse_name(&primary),
                        secondary_domain: secondary.map(|s| Category::parse_name(&s)),
                        relevance_score: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Fetch the raw quantized vector and its norm.
    pub fn get_embedding_bytes(&self, doc_id: &str) -> Result<Option<(Vec<u8>, f32)>> {
        let pointer = {
            let reader = self.reader()?;
            reader
                .query_row(
                    "SELECT shard_file, offset, vector_size, norm
                     FROM l2_embeddings WHERE doc_id = ?1",
                    params![doc_id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, i64>(2)?,
                            row.get::<_, f32>(3)?,
                        ))
                    },
                )
                .optional()?
        };

        match pointer {
            Some((shard_file, offset, size, norm)) => {
                let shards = self
                    .shards
                    .lock()
                    .map_err(|_| DistillError::Init("shard lock poisoned".to_string()))?;
                let bytes = shards.read(&shard_file, offset as u64, size as usize)?;
                Ok(Some((bytes, norm)))
            }
            None => Ok(None),
        }
    }

    /// Read and decompress the L5 body, when one was kept.
    pub fn get_fulltext(&self, doc_id: &str) -> Result<Option<String>> {
        let reference = {
            let reader = self.reader()?;
            reader
                .query_row(
                    "SELECT file_path, compressed FROM l5_fulltext WHERE doc_id = ?1",
                    params![doc_id],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?)),
                )
                .optional()?
        };

        match reference {
            Some((file_path, compressed)) => {
                let bytes = std::fs::read(self.base_dir.join(&file_path))?;
                let body = if compressed {
                    self.compressor.decompress(&bytes)?
                } else {
                    bytes
                };
                Ok(Some(String::from_utf8_lossy(&body).into_owned()))
            }
            None => Ok(None),
        }
    }

    // ------------------------------------------------------------------
    // Search primitives
    // ------------------------------------------------------------------

    /// Free-text search: tokens are sanitized and AND-ed, results ordered
    /// by BM25 ascending.
    pub fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<SearchRow>> {
        let match_expr = sanitize_fts_query(query);
        if match_expr.is_empty() {
            return Ok(Vec::new());
        }
        self.search_match(&match_expr, filters, SortOrder::Relevance, 0, limit)
    }

    /// Search with a prepared FTS5 match expression. An expression the
    /// engine cannot parse yields an empty result set, not an error.
    pub fn search_match(
        &self,
        match_expr: &str,
        filters: &SearchFilters,
        sort: SortOrder,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<SearchRow>> {
        let (filter_sql, filter_values) = filters.clauses();
        let order = match sort {
            SortOrder::Relevance => "bm25(distilled_fts) ASC",
            SortOrder::Date => "l1.year DESC",
            SortOrder::Title => "l1.title COLLATE NOCASE ASC",
        };
        let sql = format!(
            "SELECT l1.doc_id, l1.title, l1.author, l1.year, l1.language, l1.category,
                    l1.origin, l1.reliability, l1.keywords,
                    COALESCE(l3.abstract, ''), bm25(distilled_fts)
             FROM distilled_fts
             JOIN l1_metadata l1 ON l1.doc_id = distilled_fts.doc_id
             LEFT JOIN l3_summaries l3 ON l3.doc_id = l1.doc_id
             WHERE distilled_fts MATCH ?1{filter_sql}
             ORDER BY {order}
             LIMIT ?{limit_idx} OFFSET ?{offset_idx}",
            limit_idx = filter_values.len() + 2,
            offset_idx = filter_values.len() + 3,
        );

        let mut values: Vec<rusqlite::types::Value> = Vec::with_capacity(filter_values.len() + 3);
        values.push(match_expr.to_string().into());
        values.extend(filter_values);
        values.push((limit as i64).into());
        values.push((offset as i64).into());

        let reader = self.reader()?;
        let mut stmt = reader.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), Self::row_to_search_row);

        match rows {
            // An unparsable MATCH expression surfaces as per-row errors on
            // the first step; dropping them yields the empty result set
            Ok(mapped) => Ok(mapped.filter_map(|r| r.ok()).collect()),
            Err(e) if is_invalid_query(&e) => {
                tracing::debug!("invalid FTS query: {e}");
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn row_to_search_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SearchRow> {
        let category: String = row.get(5)?;
        Ok(SearchRow {
            doc_id: row.get(0)?,
            title: row.get(1)?,
            author: row.get(2)?,
            year: row.get(3)?,
            language: row.get(4)?,
            category: Category::parse_name(&category),
            origin: row.get(6)?,
            reliability: row.get(7)?,
            keywords: row.get(8)?,
            abstract_text: row.get(9)?,
            bm25: row.get(10)?,
        })
    }

    /// Total hits for a match expression under the same filters.
    pub fn count_match(&self, match_expr: &str, filters: &SearchFilters) -> Result<u64> {
        let (filter_sql, filter_values) = filters.clauses();
        let sql = format!(
            "SELECT COUNT(*)
             FROM distilled_fts
             JOIN l1_metadata l1 ON l1.doc_id = distilled_fts.doc_id
             WHERE distilled_fts MATCH ?1{filter_sql}"
        );

        let mut values: Vec<rusqlite::types::Value> = Vec::with_capacity(filter_values.len() + 1);
        values.push(match_expr.to_string().into());
        values.extend(filter_values);

        let reader = self.reader()?;
        let count = reader.query_row(&sql, params_from_iter(values.iter()), |row| {
            row.get::<_, i64>(0)
        });
        match count {
            Ok(n) => Ok(n as u64),
            Err(e) if is_invalid_query(&e) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Per-value counts of an L1 column, restricted to the same match and
    /// filters as the search itself.
    pub fn facet_counts(
        &self,
        column: &str,
        match_expr: Option<&str>,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<(String, u64)>> {
        const FACETABLE: &[&str] = &["category", "language", "origin", "year", "author", "source_type"];
        if !FACETABLE.contains(&column) {
            return Ok(Vec::new());
        }

        let (filter_sql, filter_values) = filters.clauses();
        let mut values: Vec<rusqlite::types::Value> = Vec::new();
        let sql = match match_expr {
            Some(expr) => {
                values.push(expr.to_string().into());
                values.extend(filter_values);
                format!(
                    "SELECT CAST(l1.{column} AS TEXT), COUNT(*) AS n
                     FROM distilled_fts
                     JOIN l1_metadata l1 ON l1.doc_id = distilled_fts.doc_id
                     WHERE distilled_fts MATCH ?1{filter_sql}
                       AND l1.{column} IS NOT NULL
                     GROUP BY l1.{column} ORDER BY n DESC LIMIT {limit}"
                )
            }
            None => {
                values.extend(filter_values);
                format!(
                    "SELECT CAST(l1.{column} AS TEXT), COUNT(*) AS n
                     FROM l1_metadata l1
                     WHERE l1.{column} IS NOT NULL{filter_sql}
                     GROUP BY l1.{column} ORDER BY n DESC LIMIT {limit}"
                )
            }
        };

        let reader = self.reader()?;
        let mut stmt = reader.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Title suggestions by case-insensitive prefix.
    pub fn title_suggestions(&self, prefix: &str, limit: usize) -> Result<Vec<String>> {
        let clean: String = prefix
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace())
            .collect();
        if clean.trim().is_empty() {
            return Ok(Vec::new());
        }

        let reader = self.reader()?;
        let mut stmt = reader.prepare(
            "SELECT DISTINCT title FROM l1_metadata
             WHERE title LIKE ?1 || '%' AND title != ''
             ORDER BY title LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![clean.trim(), limit as i64], |row| {
            row.get::<_, String>(0)
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Brute-force k-nearest-neighbours over the quantized vectors.
    /// Cosine runs directly on the packed int8 representation.
    pub fn knn(&self, query: &[f32], limit: usize) -> Result<Vec<(String, f32)>> {
        let (query_q, query_norm) = quantize::quantize(query);
        if query_norm == 0.0 {
            return Ok(Vec::new());
        }

        let pointers: Vec<(String, String, i64, i64, f32)> = {
            let reader = self.reader()?;
            let mut stmt = reader.prepare(
                "SELECT doc_id, shard_file, offset, vector_size, norm FROM l2_embeddings",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            })?;
            rows.filter_map(|r| r.ok()).collect()
        };

        let shards = self
            .shards
            .lock()
            .map_err(|_| DistillError::Init("shard lock poisoned".to_string()))?;

        let mut scored: Vec<(String, f32)> = Vec::new();
        for (doc_id, shard_file, offset, size, norm) in pointers {
            if norm == 0.0 {
                continue;
            }
            let Ok(bytes) = shards.read(&shard_file, offset as u64, size as usize) else {
                continue;
            };
            let similarity = quantize::cosine_int8(quantize::from_raw_bytes(&bytes), &query_q);
            scored.push((doc_id, similarity));
        }

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(limit);
        Ok(scored)
    }

    // ------------------------------------------------------------------
    // Stats
    // ------------------------------------------------------------------

    /// Per-level counts, per-origin/category/language breakdowns, DB size.
    pub fn stats(&self) -> Result<StoreStats> {
        let reader = self.reader()?;
        let count = |table: &str| -> Result<u64> {
            let n: i64 =
                reader.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?;
            Ok(n as u64)
        };

        let group = |column: &str| -> Result<Vec<(String, u64)>> {
            let mut stmt = reader.prepare(&format!(
                "SELECT {column}, COUNT(*) AS n FROM l1_metadata
                 GROUP BY {column} ORDER BY n DESC LIMIT 50"
            ))?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?;
            Ok(rows.filter_map(|r| r.ok()).collect())
        };

        Ok(StoreStats {
            l1_count: count("l1_metadata")?,
            l2_count: count("l2_embeddings")?,
            l3_count: count("l3_summaries")?,
            l4_count: count("l4_knowledge_graph")?,
            l5_count: count("l5_fulltext")?,
            by_origin: group("origin")?,
            by_category: group("category")?,
            by_language: group("language")?,
            db_size_bytes: std::fs::metadata(&self.db_path).map(|m| m.len()).unwrap_or(0),
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (tempfile::TempDir, DistillStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DistillStore::open(Some(dir.path().to_path_buf())).unwrap();
        (dir, store)
    }

    fn sample_meta(doc_id: &str, title: &str) -> Level1Metadata {
        Level1Metadata {
            doc_id: doc_id.to_string(),
            title: title.to_string(),
            author: "Enrico Fermi".to_string(),
            year: Some(1942),
            language: "en".to_string(),
            category: Category::Physics,
            origin: "openalex".to_string(),
            reliability: 0.9,
            ..Default::default()
        }
    }

    #[test]
    fn test_distill_full_roundtrip() {
        let (_dir, store) = test_store();
        let text = "Nuclear chain reactions release energy. The reactor experiment \
                    demonstrated a controlled chain reaction for the first time. \
                    The physics of neutron capture governs the reaction rate.";
        let embedding: Vec<f32> = (0..384).map(|i| (i as f32 * 0.1).sin()).collect();

        let doc = store
            .distill(
                "aaaa111122223333",
                text,
                sample_meta("aaaa111122223333", "Chain Reactions"),
                Some(&embedding),
                true,
            )
            .unwrap();

        assert_eq!(doc.level1.doc_id, "aaaa111122223333");
        assert!(!doc.level3.abstract_text.is_empty());
        assert!(doc.level3.abstract_text.chars().count() <= 500);
        assert!(doc.level2.is_some());
        assert!(doc.level5.is_some());

        // L5 body round-trips through the compressor
        let body = store.get_fulltext("aaaa111122223333").unwrap().unwrap();
        assert_eq!(body, text);

        // L2 vector comes back with a positive norm
        let (bytes, norm) = store.get_embedding_bytes("aaaa111122223333").unwrap().unwrap();
        assert_eq!(bytes.len(), 384);
        assert!(norm > 0.0);
    }

    #[test]
    fn test_metadata_only_and_search() {
        let (_dir, store) = test_store();
        store
            .distill_metadata_only(sample_meta("bbbb111122223333", "Thermodynamics of Stars"))
            .unwrap();

        let rows = store
            .search("thermodynamics", &SearchFilters::default(), 10)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].doc_id, "bbbb111122223333");
        assert_eq!(rows[0].category, Category::Physics);
    }

    #[test]
    fn test_batch_idempotent() {
        let (_dir, store) = test_store();
        let batch: Vec<Level1Metadata> = (0..5)
            .map(|i| sample_meta(&format!("{i:016x}"), &format!("Paper {i}")))
            .collect();

        assert_eq!(store.distill_batch_metadata(&batch).unwrap(), 5);
        // Re-inserting the same batch adds nothing
        assert_eq!(store.distill_batch_metadata(&batch).unwrap(), 0);
        assert_eq!(store.stats().unwrap().l1_count, 5);
    }

    #[test]
    fn test_filters() {
        let (_dir, store) = test_store();
        let mut a = sample_meta("cccc000000000001", "Quantum Fields");
        a.year = Some(1950);
        let mut b = sample_meta("cccc000000000002", "Quantum Computing");
        b.year = Some(2015);
        b.category = Category::ComputerScience;
        store.distill_batch_metadata(&[a, b]).unwrap();

        let filters = SearchFilters {
            year_from: Some(2000),
            ..Default::default()
        };
        let rows = store.search("quantum", &filters, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].doc_id, "cccc000000000002");

        let filters = SearchFilters {
            categories: vec![Category::Physics],
            ..Default::default()
        };
        let rows = store.search("quantum", &filters, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].doc_id, "cccc000000000001");
    }

    #[test]
    fn test_invalid_query_empty_not_error() {
        let (_dir, store) = test_store();
        store
            .distill_metadata_only(sample_meta("dddd000000000001", "Anything"))
            .unwrap();
        let rows = store
            .search_match("\"unbalanced", &SearchFilters::default(), SortOrder::Relevance, 0, 10)
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_knn_ranks_by_similarity() {
        let (_dir, store) = test_store();
        let base: Vec<f32> = (0..384).map(|i| (i as f32 * 0.05).sin()).collect();
        let mut near = base.clone();
        near[0] += 0.01;
        let far: Vec<f32> = (0..384).map(|i| (i as f32 * 0.21).cos()).collect();

        store
            .distill("e000000000000001", "near doc text", sample_meta("e000000000000001", "Near"), Some(&near), false)
            .unwrap();
        store
            .distill("e000000000000002", "far doc text", sample_meta("e000000000000002", "Far"), Some(&far), false)
            .unwrap();

        let hits = store.knn(&base, 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, "e000000000000001");
        assert!(hits[0].1 > hits[1].1);
    }

    #[test]
    fn test_title_suggestions() {
        let (_dir, store) = test_store();
        store
            .distill_batch_metadata(&[
                sample_meta("f000000000000001", "Quantum Mechanics"),
                sample_meta("f000000000000002", "Quantum Fields"),
                sample_meta("f000000000000003", "Classical Mechanics"),
            ])
            .unwrap();

        let suggestions = store.title_suggestions("Quantum", 10).unwrap();
        assert_eq!(suggestions.len(), 2);
        assert!(suggestions.iter().all(|s| s.starts_with("Quantum")));
    }

    #[test]
    fn test_facets_and_stats() {
        let (_dir, store) = test_store();
        let mut batch = Vec::new();
        for i in 0..3 {
            batch.push(sample_meta(&format!("0a000000000000{i:02}"), "Alpha Study"));
        }
        let mut other = sample_meta("0b00000000000001", "Alpha Review");
        other.category = Category::Medicine;
        other.origin = "crossref".to_string();
        batch.push(other);
        store.distill_batch_metadata(&batch).unwrap();

        let facets = store
            .facet_counts("category", Some("\"alpha\""), &SearchFilters::default(), 10)
            .unwrap();
        let total: u64 = facets.iter().map(|(_, n)| n).sum();
        assert_eq!(total, 4);
        assert_eq!(facets[0].0, "physics");
        assert_eq!(facets[0].1, 3);

        let stats = store.stats().unwrap();
        assert_eq!(stats.l1_count, 4);
        assert!(stats.by_origin.iter().any(|(o, n)| o == "openalex" && *n == 3));
        assert!(stats.db_size_bytes > 0);
    }
}
