//! Harvester
//!
//! Bulk acquisition of document metadata from open scholarly APIs, with
//! persistent cursor state, retry-with-backoff, rate limiting and safe
//! resume. Adapters produce level-1-only records straight from API
//! metadata; the store deduplicates by doc_id, so redoing a batch after a
//! crash is harmless.

mod crossref;
mod openalex;
mod rate_limit;
mod scanner;
mod state;
mod wikipedia;

pub use crossref::CrossrefAdapter;
pub use openalex::OpenAlexAdapter;
pub use rate_limit::RateLimiter;
pub use scanner::LocalScanner;
pub use state::{HarvestEvent, HarvestProgress, HarvestStateDb, HarvestStatus, ScanState};
pub use wikipedia::WikipediaAdapter;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::cancel::CancelToken;
use crate::distill::{DistillStore, Level1Metadata};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Harvest error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// 429 from the source
    #[error("rate limited by {0}")]
    RateLimited(String),
    /// 5xx from the source
    #[error("server error {status} from {source_name}")]
    Server {
        /// Source name
        source_name: String,
        /// HTTP status
        status: u16,
    },
    /// Response did not match the expected shape
    #[error("unexpected response shape: {0}")]
    Parse(String),
    /// State database failure
    #[error("state database error: {0}")]
    State(#[from] rusqlite::Error),
    /// Distillation store failure
    #[error("store error: {0}")]
    Store(#[from] crate::distill::DistillError),
    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Harvest result type
pub type Result<T> = std::result::Result<T, HarvestError>;

// ============================================================================
// ADAPTER CONTRACT
// ============================================================================

/// Per-request timeout for adapter HTTP calls.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Retry delays between failed batch attempts, in seconds.
const BACKOFF_DELAYS: [u64; 5] = [2, 4, 8, 16, 32];

/// Progress saved every this many batches.
const SAVE_EVERY_BATCHES: u64 = 5;

/// A one-line summary logged roughly every this many records.
const LOG_EVERY_RECORDS: u64 = 2000;

/// The User-Agent every client sends. The polite pools of OpenAlex and
/// Crossref key on this plus the `mailto` parameter; both are treated as
/// required fields.
pub fn user_agent(mailto: &str) -> String {
    format!(
        "VIO83-AI-Orchestra/2.0 (https://github.com/vio83/vio83-knowledge-engine; mailto:{mailto}) reqwest/0.12"
    )
}

/// One fetched page from a source.
#[derive(Debug, Clone, Default)]
pub struct FetchBatch {
    /// Level-1 records, already mapped to the internal schema
    pub records: Vec<Level1Metadata>,
    /// Continuation cursor for the next page, None at end of feed
    pub next_cursor: Option<String>,
    /// New numeric offset for offset-paged sources
    pub next_offset: Option<u64>,
}

/// A protocol adapter for one external source.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Source name, also the progress key
    fn name(&self) -> &str;
    /// Page size this source serves
    fn batch_size(&self) -> usize;
    /// Fetch the next page after `progress`.
    async fn fetch_batch(&self, progress: &HarvestProgress) -> Result<FetchBatch>;
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

/// Drives one adapter against the store until a target is reached, the
/// feed ends, or a stop is requested.
pub struct Harvester {
    store: Arc<DistillStore>,
    state: HarvestStateDb,
    limiter: RateLimiter,
    cancel: CancelToken,
}

impl Harvester {
    /// Harvester with the default polite rate (10 req/s).
    pub fn new(store: Arc<DistillStore>, state: HarvestStateDb) -> Self {
        Self::with_rate_limit(store, state, 10.0)
    }

    /// Harvester with an explicit requests-per-second budget.
    pub fn with_rate_limit(
        store: Arc<DistillStore>,
        state: HarvestStateDb,
        requests_per_second: f64,
    ) -> Self {
        Self {
            store,
            state,
            limiter: RateLimiter::new(requests_per_second),
            cancel: CancelToken::global(),
        }
    }

    /// Replace the cancellation watch (scoped runs, tests).
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The state database this harvester persists into.
    pub fn state(&self) -> &HarvestStateDb {
        &self.state
    }

    /// Harvest up to `target` records from a source.
    ///
    /// With `resume`, a run found in `running` or `paused` state continues
    /// from its stored cursor; otherwise the progress is reinitialized.
    /// Every progress save happens after the corresponding batch insert has
    /// committed, so a crash can redo one batch but never skip one.
    pub async fn harvest(
        &self,
        adapter: &dyn SourceAdapter,
        target: u64,
        resume: bool,
    ) -> Result<HarvestProgress> {
        let source = adapter.name().to_string();

        let mut progress = match self.state.load_progress(&source)? {
            Some(existing)
                if resume
                    && matches!(
                        existing.status,
                        HarvestStatus::Running | HarvestStatus::Paused
                    ) =>
            {
                tracing::info!(
                    source = %source,
                    fetched = existing.total_fetched,
                    "resuming harvest from stored cursor"
                );
                HarvestProgress {
                    target: target.max(existing.target),
                    ..existing
                }
            }
            _ => HarvestProgress::new(&source, target),
        };
        progress.status = HarvestStatus::Running;
        if progress.started_at.is_none() {
            progress.started_at = Some(Utc::now());
        }
        self.state.save_progress(&progress)?;
        self.state
            .log_event(&source, "start", &format!("target {target}"))?;

        let mut batches: u64 = 0;
        let mut last_logged = progress.total_fetched;

        while progress.total_fetched < progress.target && !self.cancel.is_cancelled() {
            self.limiter.acquire().await;

            let batch = match self.fetch_with_retry(adapter, &progress).await {
                Ok(batch) => batch,
                Err(e) => {
                    progress.total_errors += 1;
                    progress.status = HarvestStatus::Error;
                    progress.last_error = Some(e.to_string());
                    self.state.save_progress(&progress)?;
                    self.state.log_event(&source, "error", &e.to_string())?;
                    tracing::error!(source = %source, "harvest stopped: {e}");
                    return Ok(progress);
                }
            };

            let fetched = batch.records.len() as u64;
            if fetched > 0 {
                let inserted = self.store.distill_batch_metadata(&batch.records)? as u64;
                progress.total_fetched += fetched;
                progress.total_inserted += inserted;
            }
            progress.last_batch_at = Some(Utc::now());
            progress.last_batch_size = fetched;
            if let Some(offset) = batch.next_offset {
                progress.offset = offset;
            }

            let end_of_feed = batch
                .next_cursor
                .as_deref()
                .map(str::is_empty)
                .unwrap_or(true);
            // The cursor is opaque: store it verbatim, never reinterpret
            progress.cursor = batch.next_cursor;

            batches += 1;
            if batches % SAVE_EVERY_BATCHES == 0 {
                self.state.save_progress(&progress)?;
            }
            if progress.total_fetched - last_logged >= LOG_EVERY_RECORDS {
                last_logged = progress.total_fetched;
                tracing::info!(
                    source = %source,
                    fetched = progress.total_fetched,
                    inserted = progress.total_inserted,
                    speed = format!("{:.0}/s", progress.speed()),
                    "harvest progress"
                );
                self.state.log_event(
                    &source,
                    "batch",
                    &format!(
                        "{} fetched, {} inserted",
                        progress.total_fetched, progress.total_inserted
                    ),
                )?;
            }

            if end_of_feed {
                tracing::info!(source = %source, "end of feed");
                break;
            }
        }

        progress.status = if progress.total_fetched >= progress.target {
            HarvestStatus::Completed
        } else {
            HarvestStatus::Paused
        };
        self.state.save_progress(&progress)?;
        self.state.log_event(
            &source,
            progress.status.as_str(),
            &format!(
                "{} fetched, {} inserted",
                progress.total_fetched, progress.total_inserted
            ),
        )?;

        Ok(progress)
    }

    /// Up to five attempts with 2/4/8/16/32 s delays.
    async fn fetch_with_retry(
        &self,
        adapter: &dyn SourceAdapter,
        progress: &HarvestProgress,
    ) -> Result<FetchBatch> {
        let mut last_error = None;
        for (attempt, delay) in BACKOFF_DELAYS.iter().enumerate() {
            match adapter.fetch_batch(progress).await {
                Ok(batch) => return Ok(batch),
                Err(e) => {
                    tracing::warn!(
                        source = adapter.name(),
                        attempt = attempt + 1,
                        "batch fetch failed: {e}, retrying in {delay}s"
                    );
                    last_error = Some(e);
                    if attempt + 1 < BACKOFF_DELAYS.len() {
                        tokio::time::sleep(Duration::from_secs(*delay)).await;
                    }
                }
            }
        }
        Err(last_error.unwrap_or(HarvestError::Parse("no attempts made".to_string())))
    }
}

// ============================================================================
// TESTS
// ============================================================================
