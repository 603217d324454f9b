//! Database Migrations
//!
//! Schema migration definitions for the distillation store.

use rusqlite::Connection;

use super::Result;

/// Migration definitions
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Five-level schema with FTS5 and secondary indexes",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "Harvest dedup: origin+doi lookup index",
        up: MIGRATION_V2_UP,
    },
];

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Version number
    pub version: u32,
    /// Description
    pub description: &'static str,
    /// SQL to apply
    pub up: &'static str,
}

/// V1: the five-level schema
const MIGRATION_V1_UP: &str = r#"
-- L1: metadata, one row per document
CREATE TABLE IF NOT EXISTS l1_metadata (
    doc_id TEXT PRIMARY KEY,
    title TEXT NOT NULL DEFAULT '',
    author TEXT NOT NULL DEFAULT '',
    year INTEGER,
    language TEXT NOT NULL DEFAULT 'unknown',
    category TEXT NOT NULL DEFAULT 'general',
    sub_discipline TEXT NOT NULL DEFAULT '',
    source_type TEXT NOT NULL DEFAULT 'article',
    isbn TEXT,
    doi TEXT,
    issn TEXT,
    publisher TEXT NOT NULL DEFAULT '',
    keywords TEXT NOT NULL DEFAULT '',
    reliability REAL NOT NULL DEFAULT 0.5,
    peer_reviewed INTEGER NOT NULL DEFAULT 0,
    origin TEXT NOT NULL DEFAULT '',
    url TEXT NOT NULL DEFAULT '',
    distilled_at TEXT NOT NULL
);

-- L2: vectors live in append-only shard files; the row is a pointer
CREATE TABLE IF NOT EXISTS l2_embeddings (
    doc_id TEXT PRIMARY KEY REFERENCES l1_metadata(doc_id) ON DELETE CASCADE,
    shard_file TEXT NOT NULL,
    offset INTEGER NOT NULL,
    vector_size INTEGER NOT NULL,
    norm REAL NOT NULL DEFAULT 0.0,
    model_name TEXT NOT NULL DEFAULT ''
);

-- L3: distilled summaries
CREATE TABLE IF NOT EXISTS l3_summaries (
    doc_id TEXT PRIMARY KEY REFERENCES l1_metadata(doc_id) ON DELETE CASCADE,
    abstract TEXT NOT NULL DEFAULT '',
    key_concepts TEXT NOT NULL DEFAULT '',
    primary_domain TEXT NOT NULL DEFAULT 'general',
    secondary_domain TEXT,
    relevance_score REAL NOT NULL DEFAULT 0.0
);

-- L4: compact knowledge graph
CREATE TABLE IF NOT EXISTS l4_knowledge_graph (
    doc_id TEXT PRIMARY KEY REFERENCES l1_metadata(doc_id) ON DELETE CASCADE,
    entities_json TEXT NOT NULL DEFAULT '[]',
    relations_json TEXT NOT NULL DEFAULT '[]',
    concepts TEXT NOT NULL DEFAULT ''
);

-- L5: full-text file references
CREATE TABLE IF NOT EXISTS l5_fulltext (
    doc_id TEXT PRIMARY KEY REFERENCES l1_metadata(doc_id) ON DELETE CASCADE,
    file_path TEXT NOT NULL,
    byte_size INTEGER NOT NULL DEFAULT 0,
    compressed INTEGER NOT NULL DEFAULT 1,
    word_count INTEGER NOT NULL DEFAULT 0
);

-- FTS5 over the searchable fields; maintained explicitly on every write
CREATE VIRTUAL TABLE IF NOT EXISTS distilled_fts USING fts5(
    doc_id UNINDEXED,
    title,
    author,
    keywords,
    abstract,
    key_concepts,
    category,
    tokenize = 'unicode61 remove_diacritics 2'
);

CREATE INDEX IF NOT EXISTS idx_l1_category ON l1_metadata(category);
CREATE INDEX IF NOT EXISTS idx_l1_year ON l1_metadata(year);
CREATE INDEX IF NOT EXISTS idx_l1_language ON l1_metadata(language);
CREATE INDEX IF NOT EXISTS idx_l1_origin ON l1_metadata(origin);
CREATE INDEX IF NOT EXISTS idx_l1_doi ON l1_metadata(doi);
CREATE INDEX IF NOT EXISTS idx_l1_isbn ON l1_metadata(isbn);
CREATE INDEX IF NOT EXISTS idx_l1_author ON l1_metadata(author);
CREATE INDEX IF NOT EXISTS idx_l1_reliability ON l1_metadata(reliability);

-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, datetime('now'));
"#;

/// V2: composite lookup used by harvest dedup checks
const MIGRATION_V2_UP: &str = r#"
CREATE INDEX IF NOT EXISTS idx_l1_origin_doi ON l1_metadata(origin, doi);

INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (2, datetime('now'));
"#;

/// Apply all pending migrations.
pub fn apply_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current {
            tracing::info!(
                version = migration.version,
                "applying migration: {}",
                migration.description
            );
            conn.execute_batch(migration.up)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_twice_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        apply_migrations(&conn).unwrap();
        apply_migrations(&conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version as usize, MIGRATIONS.len());

        // FTS table exists and accepts a match query
        conn.execute(
            "INSERT INTO distilled_fts (doc_id, title, author, keywords, abstract, key_concepts, category)
             VALUES ('x', 'Prova di ricerca', '', '', '', '', 'general')",
            [],
        )
        .unwrap();
        let hits: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM distilled_fts WHERE distilled_fts MATCH 'ricerca'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(hits, 1);
    }
}
