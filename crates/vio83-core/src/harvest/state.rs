//! Harvest State Persistence
//!
//! Progress rows, an append-only event log and scan state live in their own
//! database (`harvest_state.db`), separate from the distilled store.
//! Connections are short-lived, one per operation: the state db is touched
//! from signal handlers and status commands, and must never hold the file
//! lock longer than a single statement batch.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{HarvestError, Result};

/// State database file name under the data dir.
const STATE_DB_FILE: &str = "harvest_state.db";

// ============================================================================
// TYPES
// ============================================================================

/// Harvest lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HarvestStatus {
    /// Never started
    #[default]
    Idle,
    /// Actively fetching
    Running,
    /// Interrupted, resumable
    Paused,
    /// Target reached or feed exhausted
    Completed,
    /// Stopped on a persistent failure
    Error,
}

impl HarvestStatus {
    /// Stored string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            HarvestStatus::Idle => "idle",
            HarvestStatus::Running => "running",
            HarvestStatus::Paused => "paused",
            HarvestStatus::Completed => "completed",
            HarvestStatus::Error => "error",
        }
    }

    /// Parse a stored string; unknown values map to Idle.
    pub fn parse_name(s: &str) -> HarvestStatus {
        match s {
            "running" => HarvestStatus::Running,
            "paused" => HarvestStatus::Paused,
            "completed" => HarvestStatus::Completed,
            "error" => HarvestStatus::Error,
            _ => HarvestStatus::Idle,
        }
    }
}

/// Per-source harvest progress.
///
/// The cursor is an opaque continuation token and is preserved verbatim;
/// resume is safe exactly as long as nobody reinterprets it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestProgress {
    /// Source name ("openalex", "crossref", "wikipedia")
    pub source: String,
    /// Opaque continuation cursor, verbatim from the API
    pub cursor: Option<String>,
    /// Numeric offset for sources that page by offset
    pub offset: u64,
    /// Records fetched from the API
    pub total_fetched: u64,
    /// Records actually new in the store (post-dedup)
    pub total_inserted: u64,
    /// Failed batches
    pub total_errors: u64,
    /// Fetch target
    pub target: u64,
    /// When this run started
    pub started_at: Option<DateTime<Utc>>,
    /// When the last batch landed
    pub last_batch_at: Option<DateTime<Utc>>,
    /// Size of the last batch
    pub last_batch_size: u64,
    /// Lifecycle status
    pub status: HarvestStatus,
    /// Last error message, when status is Error
    pub last_error: Option<String>,
    /// Free extra state, JSON
    pub extra: serde_json::Value,
}

impl HarvestProgress {
    /// Fresh progress for a source.
    pub fn new(source: &str, target: u64) -> Self {
        Self {
            source: source.to_string(),
            cursor: None,
            offset: 0,
            total_fetched: 0,
            total_inserted: 0,
            total_errors: 0,
            target,
            started_at: Some(Utc::now()),
            last_batch_at: None,
            last_batch_size: 0,
            status: HarvestStatus::Idle,
            last_error: None,
            extra: serde_json::Value::Null,
        }
    }

    /// Records per second since the run started.
    pub fn speed(&self) -> f64 {
        match self.started_at {
            Some(started) => {
                let elapsed = (Utc::now() - started).num_milliseconds() as f64 / 1000.0;
                if elapsed > 0.0 {
                    self.total_fetched as f64 / elapsed
                } else {
                    0.0
                }
            }
            None => 0.0,
        }
    }

    /// Estimated seconds to target at the current speed.
    pub fn eta_seconds(&self) -> Option<u64> {
        let speed = self.speed();
        if speed <= 0.0 || self.total_fetched >= self.target {
            return None;
        }
        Some(((self.target - self.total_fetched) as f64 / speed) as u64)
    }
}

/// Local scan state; `last_file` is the resume anchor in the deterministic
/// walk order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanState {
    /// Scan identifier (hash of the base path)
    pub scan_id: String,
    /// Root of the walk
    pub base_path: String,
    /// Supported files seen
    pub files_scanned: u64,
    /// Files newly indexed into the store
    pub files_indexed: u64,
    /// Sum of original file sizes
    pub bytes_original: u64,
    /// Sum of compressed sizes (when bodies were kept)
    pub bytes_compressed: u64,
    /// Last file fully processed
    pub last_file: Option<String>,
    /// Lifecycle status
    pub status: HarvestStatus,
}

impl ScanState {
    /// Fresh state for a base path.
    pub fn new(scan_id: &str, base_path: &str) -> Self {
        Self {
            scan_id: scan_id.to_string(),
            base_path: base_path.to_string(),
            files_scanned: 0,
            files_indexed: 0,
            bytes_original: 0,
            bytes_compressed: 0,
            last_file: None,
            status: HarvestStatus::Idle,
        }
    }
}

/// One row of the append-only event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestEvent {
    /// Source the event belongs to
    pub source: String,
    /// Event kind ("start", "batch", "pause", "complete", "error")
    pub event_type: String,
    /// Human message
    pub message: String,
    /// When it happened
    pub at: DateTime<Utc>,
}

// ============================================================================
// STATE DB
// ============================================================================

const STATE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS harvest_progress (
    source TEXT PRIMARY KEY,
    cursor TEXT,
    offset INTEGER NOT NULL DEFAULT 0,
    total_fetched INTEGER NOT NULL DEFAULT 0,
    total_inserted INTEGER NOT NULL DEFAULT 0,
    total_errors INTEGER NOT NULL DEFAULT 0,
    target INTEGER NOT NULL DEFAULT 0,
    started_at TEXT,
    last_batch_at TEXT,
    last_batch_size INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'idle',
    last_error TEXT,
    extra TEXT NOT NULL DEFAULT 'null'
);

CREATE TABLE IF NOT EXISTS harvest_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    event_type TEXT NOT NULL,
    message TEXT NOT NULL,
    at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_source ON harvest_events(source, id);

CREATE TABLE IF NOT EXISTS scan_state (
    scan_id TEXT PRIMARY KEY,
    base_path TEXT NOT NULL,
    files_scanned INTEGER NOT NULL DEFAULT 0,
    files_indexed INTEGER NOT NULL DEFAULT 0,
    bytes_original INTEGER NOT NULL DEFAULT 0,
    bytes_compressed INTEGER NOT NULL DEFAULT 0,
    last_file TEXT,
    status TEXT NOT NULL DEFAULT 'idle'
);
"#;

/// Handle to the harvest state database. Holds only the path; every
/// operation opens its own connection.
#[derive(Debug, Clone)]
pub struct HarvestStateDb {
    path: PathBuf,
}

impl HarvestStateDb {
    /// Open (creating if needed) the state db under a data dir.
    pub fn open(data_dir: &std::path::Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir).map_err(HarvestError::Io)?;
        let path = data_dir.join(STATE_DB_FILE);
        let db = Self { path };
        let conn = db.connect()?;
        conn.execute_batch(STATE_SCHEMA)?;
        Ok(db)
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(conn)
    }

    /// Load a source's progress.
    pub fn load_progress(&self, source: &str) -> Result<Option<HarvestProgress>> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                "SELECT source, cursor, offset, total_fetched, total_inserted, total_errors,
                        target, started_at, last_batch_at, last_batch_size, status, last_error,
                        extra
                 FROM harvest_progress WHERE source = ?1",
                params![source],
                Self::row_to_progress,
            )
            .optional()?;
        Ok(row)
    }

    /// All progress rows, for the status command.
    pub fn all_progress(&self) -> Result<Vec<HarvestProgress>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT source, cursor, offset, total_fetched, total_inserted, total_errors,
                    target, started_at, last_batch_at, last_batch_size, status, last_error, extra
             FROM harvest_progress ORDER BY source",
        )?;
        let rows = stmt.query_map([], Self::row_to_progress)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    fn row_to_progress(row: &rusqlite::Row<'_>) -> rusqlite::Result<HarvestProgress> {
        let status: String = row.get(10)?;
        let extra: String = row.get(12)?;
        Ok(HarvestProgress {
            source: row.get(0)?,
            cursor: row.get(1)?,
            offset: row.get::<_, i64>(2)? as u64,
            total_fetched: row.get::<_, i64>(3)? as u64,
            total_inserted: row.get::<_, i64>(4)? as u64,
            total_errors: row.get::<_, i64>(5)? as u64,
            target: row.get::<_, i64>(6)? as u64,
            started_at: parse_timestamp(row.get::<_, Option<String>>(7)?),
            last_batch_at: parse_timestamp(row.get::<_, Option<String>>(8)?),
            last_batch_size: row.get::<_, i64>(9)? as u64,
            status: HarvestStatus::parse_name(&status),
            last_error: row.get(11)?,
            extra: serde_json::from_str(&extra).unwrap_or(serde_json::Value::Null),
        })
    }

    /// Persist a progress row. Each save is atomic; the orchestrator calls
    /// this only after the corresponding batch insert has committed.
    pub fn save_progress(&self, progress: &HarvestProgress) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT OR REPLACE INTO harvest_progress
             (source, cursor, offset, total_fetched, total_inserted, total_errors, target,
              started_at, last_batch_at, last_batch_size, status, last_error, extra)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                progress.source,
                progress.cursor,
                progress.offset as i64,
                progress.total_fetched as i64,
                progress.total_inserted as i64,
                progress.total_errors as i64,
                progress.target as i64,
                progress.started_at.map(|t| t.to_rfc3339()),
                progress.last_batch_at.map(|t| t.to_rfc3339()),
                progress.last_batch_size as i64,
                progress.status.as_str(),
                progress.last_error,
                serde_json::to_string(&progress.extra).unwrap_or_else(|_| "null".to_string()),
            ],
        )?;
        Ok(())
    }

    /// Append to the event log.
    pub fn log_event(&self, source: &str, event_type: &str, message: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO harvest_events (source, event_type, message, at)
             VALUES (?1, ?2, ?3, ?4)",
            params![source, event_type, message, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Most recent events, newest first.
    pub fn recent_events(&self, limit: usize) -> Result<Vec<HarvestEvent>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT source, event_type, message, at
             FROM harvest_events ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            let at: String = row.get(3)?;
            Ok(HarvestEvent {
                source: row.get(0)?,
                event_type: row.get(1)?,
                message: row.get(2)?,
                at: parse_timestamp(Some(at)).unwrap_or_else(Utc::now),
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Load a scan state.
    pub fn load_scan(&self, scan_id: &str) -> Result<Option<ScanState>> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                "SELECT scan_id, base_path, files_scanned, files_indexed, bytes_original,
                        bytes_compressed, last_file, status
                 FROM scan_state WHERE scan_id = ?1",
                params![scan_id],
                |row| {
                    let status: String = row.get(7)?;
                    Ok(ScanState {
                        scan_id: row.get(0)?,
                        base_path: row.get(1)?,
                        files_scanned: row.get::<_, i64>(2)? as u64,
                        files_indexed: row.get::<_, i64>(3)? as u64,
                        bytes_original: row.get::<_, i64>(4)? as u64,
                        bytes_compressed: row.get::<_, i64>(5)? as u64,
                        last_file: row.get(6)?,
                        status: HarvestStatus::parse_name(&status),
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Persist a scan state.
    pub fn save_scan(&self, scan: &ScanState) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT OR REPLACE INTO scan_state
             (scan_id, base_path, files_scanned, files_indexed, bytes_original,
              bytes_compressed, last_file, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                scan.scan_id,
                scan.base_path,
                scan.files_scanned as i64,
                scan.files_indexed as i64,
                scan.bytes_original as i64,
                scan.bytes_compressed as i64,
                scan.last_file,
                scan.status.as_str(),
            ],
        )?;
        Ok(())
    }
}

fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

// ============================================================================
// TESTS
// ============================================================================
