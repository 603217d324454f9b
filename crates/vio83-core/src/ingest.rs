//! Ingestion Glue
//!
//! The data-plane path for local documents: extract bytes to text,
//! preprocess into chunks, optionally embed, distill into the five-level
//! store. Per-file failures are recorded in the outcome and never stop a
//! batch; an input that cleans to empty is treated the same way as an
//! extraction failure.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::distill::{DistillStore, Level1Metadata, Result};
use crate::embedding::EmbeddingEngine;
use crate::executor::{CpuPool, ProgressTracker};
use crate::extract;
use crate::ids::doc_id_from_source;
use crate::preprocess::Preprocessor;

/// Characters of text fed to the document-level embedding.
const EMBED_PREFIX_CHARS: usize = 2000;

/// Result status of one ingested document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    /// Distilled and indexed
    Ok,
    /// Extraction or preprocessing failed; nothing stored
    Error,
}

/// Outcome of one file's ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    /// Document id the file maps to
    pub doc_id: String,
    /// Source path
    pub path: String,
    /// Final status
    pub status: IngestStatus,
    /// Failure reason when status is Error
    pub error: Option<String>,
    /// Chunks the preprocessor produced (0 on error)
    pub chunk_count: usize,
}

impl IngestOutcome {
    fn failed(doc_id: String, path: &Path, reason: String) -> Self {
        Self {
            doc_id,
            path: path.to_string_lossy().into_owned(),
            status: IngestStatus::Error,
            error: Some(reason),
            chunk_count: 0,
        }
    }
}

/// Composes extractor, preprocessor, embedding engine and store.
pub struct Ingestor {
    store: Arc<DistillStore>,
    preprocessor: Preprocessor,
    embeddings: Option<Arc<EmbeddingEngine>>,
    keep_fulltext: bool,
}

impl Ingestor {
    /// Ingestor without embeddings, keeping compressed full text.
    pub fn new(store: Arc<DistillStore>) -> Self {
        Self {
            store,
            preprocessor: Preprocessor::new(),
            embeddings: None,
            keep_fulltext: true,
        }
    }

    /// Attach an embedding engine for the L2 level.
    pub fn with_embeddings(mut self, embeddings: Arc<EmbeddingEngine>) -> Self {
        self.embeddings = Some(embeddings);
        self
    }

    /// Choose whether L5 bodies are kept.
    pub fn keep_fulltext(mut self, keep: bool) -> Self {
        self.keep_fulltext = keep;
        self
    }

    /// Ingest one file end to end. Failures come back as an Error outcome,
    /// not an `Err`; only store-level faults propagate.
    pub fn ingest_file(&self, path: &Path) -> Result<IngestOutcome> {
        let path_str = path.to_string_lossy().into_owned();
        let doc_id = doc_id_from_source(&path_str);

        let text = match extract::extract_file(path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(path = %path_str, "extraction failed: {e}");
                return Ok(IngestOutcome::failed(doc_id, path, e.to_string()));
            }
        };

        let processed = self.preprocessor.process(&text, Some(&doc_id), Some(&path_str));
        if processed.chunks.is_empty() {
            return Ok(IngestOutcome::failed(
                doc_id,
                path,
                "text cleaned to empty".to_string(),
            ));
        }

        let embedding = self
            .embeddings
            .as_ref()
            .filter(|e| e.is_available())
            .and_then(|e| {
                let prefix: String = text.chars().take(EMBED_PREFIX_CHARS).collect();
                e.embed_one(&prefix)
            });

        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path_str.clone());
        let metadata = Level1Metadata {
            doc_id: doc_id.clone(),
            title,
            author: processed.metadata.author.clone().unwrap_or_default(),
            year: processed.metadata.year,
            language: processed.language.code.clone(),
            isbn: processed.metadata.isbn.clone(),
            doi: processed.metadata.doi.clone(),
            source_type: "local_file".to_string(),
            origin: "local_mac".to_string(),
            url: path_str.clone(),
            ..Default::default()
        };

        self.store.distill(
            &doc_id,
            &text,
            metadata,
            embedding.as_deref(),
            self.keep_fulltext,
        )?;

        Ok(IngestOutcome {
            doc_id,
            path: path_str,
            status: IngestStatus::Ok,
            error: None,
            chunk_count: processed.chunks.len(),
        })
    }

    /// Ingest many files over the CPU pool; outcomes keep input order and
    /// per-item failures are counted, never fatal.
    pub fn ingest_files(&self, paths: &[std::path::PathBuf], pool: &CpuPool) -> Vec<IngestOutcome> {
        let tracker = ProgressTracker::new(paths.len());
        pool.map(
            |path: &std::path::PathBuf| {
                self.ingest_file(path).map_err(|e| e.to_string())
            },
            paths,
            Some(&tracker),
            0,
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distill::SearchFilters;

    fn scaffold() -> (tempfile::TempDir, Ingestor, Arc<DistillStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DistillStore::open(Some(dir.path().join("data"))).unwrap());
        (dir, Ingestor::new(Arc::clone(&store)), store)
    }

    #[test]
    fn test_ingest_text_file() {
        let (dir, ingestor, store) = scaffold();
        let path = dir.path().join("relativity.txt");
        std::fs::write(
            &path,
            "The speed of light is constant in every inertial frame. \
             Simultaneity depends on the observer in motion.",
        )
        .unwrap();

        let outcome = ingestor.ingest_file(&path).unwrap();
        assert_eq!(outcome.status, IngestStatus::Ok);
        assert!(outcome.chunk_count >= 1);
        assert!(outcome.error.is_none());

        let rows = store.search("simultaneity", &SearchFilters::default(), 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "relativity");
    }

    #[test]
    fn test_broken_file_reports_error_and_continues() {
        let (dir, ingestor, store) = scaffold();
        let bad = dir.path().join("broken.pdf");
        std::fs::write(&bad, "not really a pdf").unwrap();
        let good = dir.path().join("fine.txt");
        std::fs::write(&good, "A perfectly ordinary text file with content.").unwrap();

        let pool = CpuPool::new(Some(2));
        let outcomes = ingestor.ingest_files(&[bad, good], &pool);
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].status, IngestStatus::Error);
        assert_eq!(outcomes[0].chunk_count, 0);
        assert!(outcomes[0].error.is_some());
        assert_eq!(outcomes[1].status, IngestStatus::Ok);

        // The failure did not block the good file
        assert_eq!(store.stats().unwrap().l1_count, 1);
    }

    #[test]
    fn test_empty_file_treated_as_error() {
        let (dir, ingestor, _store) = scaffold();
        let path = dir.path().join("blank.txt");
        std::fs::write(&path, "   \n\t  ").unwrap();

        let outcome = ingestor.ingest_file(&path).unwrap();
        assert_eq!(outcome.status, IngestStatus::Error);
        assert_eq!(outcome.chunk_count, 0);
    }
}
