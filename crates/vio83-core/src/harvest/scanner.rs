//! Local Filesystem Scanner
//!
//! Walks a directory tree in deterministic order, synthesizes L1 records
//! for supported files and batches them into the store. The walk order is
//! what makes `last_file` a valid resume anchor: resuming replays the walk
//! and discards entries until the anchor is seen again.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use walkdir::{DirEntry, WalkDir};

use crate::cancel::CancelToken;
use crate::distill::{Category, DistillStore, Level1Metadata};
use crate::ids::doc_id_from_source;

use super::{HarvestStateDb, HarvestStatus, Result, ScanState};

/// Files per store batch.
const BATCH_SIZE: usize = 100;

/// Upper size bound; empty files and anything above this are skipped.
const MAX_FILE_BYTES: u64 = 100 * 1024 * 1024;

/// Directory names never descended into.
const EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    "__pycache__",
    "venv",
    ".venv",
    "target",
    "build",
    "dist",
    "Library",
    "System",
    "Applications",
    ".Trash",
    "Pictures",
    "Movies",
    "Music",
];

/// Category by extension for local files.
fn category_for_extension(ext: &str) -> Option<Category> {
    match ext {
        "pdf" | "html" | "htm" | "json" | "jsonl" | "csv" => Some(Category::Reference),
        "epub" => Some(Category::Literature),
        "txt" | "md" | "rst" | "docx" => Some(Category::General),
        _ => None,
    }
}

fn keep_entry(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') {
        return false;
    }
    if entry.file_type().is_dir() && EXCLUDED_DIRS.contains(&name.as_ref()) {
        return false;
    }
    true
}

/// Scans a directory tree into level-1 records.
pub struct LocalScanner {
    store: Arc<DistillStore>,
    state: HarvestStateDb,
    cancel: CancelToken,
}

impl LocalScanner {
    /// Scanner writing into `store`, with state in `state`.
    pub fn new(store: Arc<DistillStore>, state: HarvestStateDb) -> Self {
        Self {
            store,
            state,
            cancel: CancelToken::global(),
        }
    }

    /// Replace the cancellation watch (scoped runs, tests).
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Walk `base_path`, indexing supported files.
    ///
    /// With `resume`, a previous scan of the same path continues after its
    /// `last_file`; counters carry over. The walk is deterministic (sorted
    /// by file name at every level), which is what makes that sound.
    pub fn scan(&self, base_path: &Path, resume: bool) -> Result<ScanState> {
        let base_str = base_path.to_string_lossy().into_owned();
        let scan_id = doc_id_from_source(&base_str);

        let mut scan = match self.state.load_scan(&scan_id)? {
            Some(existing) if resume && existing.last_file.is_some() => existing,
            _ => ScanState::new(&scan_id, &base_str),
        };
        let resume_anchor = if resume { scan.last_file.clone() } else { None };
        let mut anchor_passed = resume_anchor.is_none();
        scan.status = HarvestStatus::Running;
        self.state.save_scan(&scan)?;

        let mut batch: Vec<Level1Metadata> = Vec::with_capacity(BATCH_SIZE);
        let mut batch_bytes: u64 = 0;
        let mut batch_last: Option<String> = None;

        let walker = WalkDir::new(base_path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(keep_entry);

        for entry in walker {
            if self.cancel.is_cancelled() {
                self.flush(&mut scan, &mut batch, &mut batch_bytes, &mut batch_last)?;
                scan.status = HarvestStatus::Paused;
                self.state.save_scan(&scan)?;
                return Ok(scan);
            }

            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::debug!("walk error: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let path_str = path.to_string_lossy().into_owned();

            // Resume: discard until the anchor is seen again
            if !anchor_passed {
                if resume_anchor.as_deref() == Some(path_str.as_str()) {
                    anchor_passed = true;
                }
                continue;
            }

            let Some(category) = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase())
                .and_then(|e| category_for_extension(&e))
            else {
                continue;
            };

            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            let size = metadata.len();
            if size == 0 || size > MAX_FILE_BYTES {
                continue;
            }

            let year = metadata
                .modified()
                .ok()
                .map(|mtime| DateTime::<Utc>::from(mtime).year());
            let title = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path_str.clone());

            scan.files_scanned += 1;
            batch_bytes += size;
            batch.push(Level1Metadata {
                doc_id: doc_id_from_source(&path_str),
                title,
                year,
                category,
                source_type: "local_file".to_string(),
                origin: "local_mac".to_string(),
                url: path_str.clone(),
                reliability: 0.5,
                ..Default::default()
            });
            batch_last = Some(path_str);

            if batch.len() >= BATCH_SIZE {
                self.flush(&mut scan, &mut batch, &mut batch_bytes, &mut batch_last)?;
            }
        }

        self.flush(&mut scan, &mut batch, &mut batch_bytes, &mut batch_last)?;
        scan.status = HarvestStatus::Completed;
        self.state.save_scan(&scan)?;
        tracing::info!(
            scanned = scan.files_scanned,
            indexed = scan.files_indexed,
            "local scan finished"
        );
        Ok(scan)
    }

    /// Insert the pending batch and persist the scan state. `last_file`
    /// only advances here, after the rows are committed.
    fn flush(
        &self,
        scan: &mut ScanState,
        batch: &mut Vec<Level1Metadata>,
        batch_bytes: &mut u64,
        batch_last: &mut Option<String>,
    ) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let inserted = self.store.distill_batch_metadata(batch)?;
        scan.files_indexed += inserted as u64;
        scan.bytes_original += *batch_bytes;
        if let Some(last) = batch_last.take() {
            scan.last_file = Some(last);
        }
        batch.clear();
        *batch_bytes = 0;
        self.state.save_scan(scan)?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scaffold() -> (tempfile::TempDir, LocalScanner, Arc<DistillStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DistillStore::open(Some(dir.path().join("data"))).unwrap());
        let state = HarvestStateDb::open(&dir.path().join("data")).unwrap();
        let scanner =
            LocalScanner::new(Arc::clone(&store), state).with_cancel_token(CancelToken::local());
        (dir, scanner, store)
    }

    fn populate(root: &Path) {
        fs::create_dir_all(root.join("docs")).unwrap();
        fs::create_dir_all(root.join("node_modules")).unwrap();
        fs::create_dir_all(root.join(".hidden")).unwrap();
        fs::write(root.join("docs/a.txt"), "alpha content").unwrap();
        fs::write(root.join("docs/b.md"), "bravo content").unwrap();
        fs::write(root.join("docs/c.bin"), "not supported").unwrap();
        fs::write(root.join("docs/empty.txt"), "").unwrap();
        fs::write(root.join("node_modules/skip.txt"), "excluded").unwrap();
        fs::write(root.join(".hidden/skip.txt"), "hidden").unwrap();
        fs::write(root.join("top.pdf"), "fake pdf bytes").unwrap();
    }

    #[test]
    fn test_scan_counts_and_exclusions() {
        let (dir, scanner, store) = scaffold();
        let root = dir.path().join("tree");
        fs::create_dir_all(&root).unwrap();
        populate(&root);

        let scan = scanner.scan(&root, true).unwrap();
        // a.txt, b.md, top.pdf; c.bin unsupported, empty.txt empty,
        // node_modules and .hidden pruned
        assert_eq!(scan.files_scanned, 3);
        assert_eq!(scan.files_indexed, 3);
        assert_eq!(scan.status, HarvestStatus::Completed);
        assert_eq!(store.stats().unwrap().l1_count, 3);
    }

    #[test]
    fn test_rescan_is_idempotent() {
        let (dir, scanner, store) = scaffold();
        let root = dir.path().join("tree");
        fs::create_dir_all(&root).unwrap();
        populate(&root);

        scanner.scan(&root, true).unwrap();
        let second = scanner.scan(&root, false).unwrap();
        assert_eq!(store.stats().unwrap().l1_count, 3);
        // Second full pass found the files again but inserted none
        assert_eq!(second.files_indexed, 0);
    }

    #[test]
    fn test_resume_skips_until_anchor() {
        let (dir, scanner, store) = scaffold();
        let root = dir.path().join("tree");
        fs::create_dir_all(&root).unwrap();
        populate(&root);

        // Simulate an interrupted scan that stopped after docs/a.txt
        let base_str = root.to_string_lossy().into_owned();
        let scan_id = doc_id_from_source(&base_str);
        let mut partial = ScanState::new(&scan_id, &base_str);
        partial.files_scanned = 1;
        partial.files_indexed = 1;
        partial.last_file = Some(root.join("docs/a.txt").to_string_lossy().into_owned());
        partial.status = HarvestStatus::Paused;
        scanner.state.save_scan(&partial).unwrap();

        let resumed = scanner.scan(&root, true).unwrap();
        // b.md and top.pdf remained after the anchor
        assert_eq!(resumed.files_scanned, 3);
        assert_eq!(resumed.status, HarvestStatus::Completed);
        assert_eq!(store.stats().unwrap().l1_count, 2);
    }

    #[test]
    fn test_record_shape() {
        let (dir, scanner, store) = scaffold();
        let root = dir.path().join("tree");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("essay.txt"), "the text").unwrap();

        scanner.scan(&root, true).unwrap();
        let rows = store
            .search("essay", &crate::distill::SearchFilters::default(), 10)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "essay");
        assert_eq!(rows[0].origin, "local_mac");
    }
}
