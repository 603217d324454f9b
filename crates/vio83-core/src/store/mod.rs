//! Object Storage Adapters
//!
//! One capability set over every backend: local filesystem, the S3/GCS/
//! Azure family through the `object_store` crate, and Dropbox over its
//! HTTP API. A tiered composition layers hot/warm/cold stores with
//! read-frequency promotion. Backend selection comes from `VIO83_*`
//! environment variables; the process-wide handle is reset-able for tests.

mod cloud;
mod dropbox;
mod local;
mod tiered;

pub use cloud::CloudStore;
pub use dropbox::DropboxStore;
pub use local::LocalStore;
pub use tiered::{Tier, TierStats, TieredStore};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Object store error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Key not present in the store
    #[error("object not found: {0}")]
    NotFound(String),
    /// Backend-specific failure
    #[error("backend error: {0}")]
    Backend(String),
    /// Local filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// HTTP transport failure (Dropbox)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// Cloud backend failure
    #[error("cloud error: {0}")]
    Cloud(#[from] object_store::Error),
    /// JSON (de)serialization failure
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Invalid or incomplete configuration
    #[error("configuration error: {0}")]
    Config(String),
}

/// Object store result type
pub type Result<T> = std::result::Result<T, StoreError>;

// ============================================================================
// TYPES
// ============================================================================

/// Backend kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreKind {
    /// Local filesystem
    #[default]
    Local,
    /// Amazon S3 or any S3-compatible endpoint
    S3,
    /// Google Cloud Storage
    Gcs,
    /// Azure Blob Storage
    Azure,
    /// Dropbox API v2
    Dropbox,
}

impl StoreKind {
    fn parse_name(s: &str) -> StoreKind {
        match s.to_lowercase().as_str() {
            "s3" => StoreKind::S3,
            "gcs" => StoreKind::Gcs,
            "azure" => StoreKind::Azure,
            "dropbox" => StoreKind::Dropbox,
            _ => StoreKind::Local,
        }
    }
}

/// Metadata of one stored object.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct StorageObject {
    /// Object key
    pub key: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification, unix seconds
    pub last_modified: f64,
    /// Strong etag or content checksum
    pub etag: String,
    /// MIME type
    pub content_type: String,
    /// Free metadata map
    pub metadata: HashMap<String, String>,
}

/// Universal backend configuration, filled from the environment.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Which backend to build
    pub kind: StoreKind,
    /// Local base path
    pub local_base_path: String,
    /// S3 bucket
    pub s3_bucket: String,
    /// S3 key prefix
    pub s3_prefix: String,
    /// S3 region
    pub s3_region: String,
    /// S3 endpoint override (MinIO and friends)
    pub s3_endpoint: String,
    /// AWS access key id
    pub s3_access_key: String,
    /// AWS secret access key
    pub s3_secret_key: String,
    /// GCS bucket
    pub gcs_bucket: String,
    /// GCS key prefix
    pub gcs_prefix: String,
    /// Service-account JSON path
    pub gcs_credentials_path: String,
    /// Azure container
    pub azure_container: String,
    /// Azure key prefix
    pub azure_prefix: String,
    /// Azure connection string
    pub azure_connection_string: String,
    /// Dropbox access token
    pub dropbox_token: String,
    /// Dropbox path prefix
    pub dropbox_prefix: String,
    /// Chunk size for streaming transfers
    pub chunk_size: usize,
    /// Retry attempts for transient failures
    pub max_retries: usize,
    /// Base retry delay, doubled each attempt
    pub retry_delay: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Local,
            local_base_path: String::new(),
            s3_bucket: String::new(),
            s3_prefix: "vio83/".to_string(),
            s3_region: "eu-south-1".to_string(),
            s3_endpoint: String::new(),
            s3_access_key: String::new(),
            s3_secret_key: String::new(),
            gcs_bucket: String::new(),
            gcs_prefix: "vio83/".to_string(),
            gcs_credentials_path: String::new(),
            azure_container: String::new(),
            azure_prefix: "vio83/".to_string(),
            azure_connection_string: String::new(),
            dropbox_token: String::new(),
            dropbox_prefix: "/vio83/".to_string(),
            chunk_size: 8 * 1024 * 1024,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl StoreConfig {
    /// Load configuration from the `VIO83_*` and cloud-SDK environment
    /// variables.
    pub fn from_env() -> Self {
        let env = |name: &str| std::env::var(name).unwrap_or_default();
        let env_or = |name: &str, default: &str| {
            std::env::var(name).unwrap_or_else(|_| default.to_string())
        };

        Self {
            kind: StoreKind::parse_name(&env_or("VIO83_STORAGE_TYPE", "local")),
            local_base_path: env("VIO83_LOCAL_PATH"),
            s3_bucket: env("VIO83_S3_BUCKET"),
            s3_prefix: env_or("VIO83_S3_PREFIX", "vio83/"),
            s3_region: env_or("VIO83_S3_REGION", "eu-south-1"),
            s3_endpoint: env("VIO83_S3_ENDPOINT"),
            s3_access_key: env("AWS_ACCESS_KEY_ID"),
            s3_secret_key: env("AWS_SECRET_ACCESS_KEY"),
            gcs_bucket: env("VIO83_GCS_BUCKET"),
            gcs_prefix: env_or("VIO83_GCS_PREFIX", "vio83/"),
            gcs_credentials_path: env("GOOGLE_APPLICATION_CREDENTIALS"),
            azure_container: env("VIO83_AZURE_CONTAINER"),
            azure_prefix: env_or("VIO83_AZURE_PREFIX", "vio83/"),
            azure_connection_string: env("AZURE_STORAGE_CONNECTION_STRING"),
            dropbox_token: env("VIO83_DROPBOX_TOKEN"),
            dropbox_prefix: env_or("VIO83_DROPBOX_PREFIX", "/vio83/"),
            ..Default::default()
        }
    }
}

// ============================================================================
// CAPABILITY SET
// ============================================================================

/// The uniform capability set every backend implements.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload an object.
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        metadata: Option<HashMap<String, String>>,
    ) -> Result<StorageObject>;

    /// Download an object completely.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Download as a chunked stream.
    async fn get_stream(&self, key: &str) -> Result<BoxStream<'static, Result<Bytes>>>;

    /// Delete an object; false when it did not exist.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Whether the key exists.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// List objects under a prefix, bounded by `limit`.
    async fn list(&self, prefix: &str, limit: usize) -> Result<Vec<StorageObject>>;

    /// Object metadata without downloading.
    async fn head(&self, key: &str) -> Result<Option<StorageObject>>;

    /// Intra-store copy.
    async fn copy(&self, src_key: &str, dst_key: &str) -> Result<StorageObject>;

    /// Convenience: upload a JSON value.
    async fn put_json(&self, key: &str, value: &serde_json::Value) -> Result<StorageObject> {
        let raw = serde_json::to_vec(value)?;
        let mut metadata = HashMap::new();
        metadata.insert("content-type".to_string(), "application/json".to_string());
        self.put(key, Bytes::from(raw), Some(metadata)).await
    }

    /// Convenience: download and parse a JSON value.
    async fn get_json(&self, key: &str) -> Result<serde_json::Value> {
        let raw = self.get(key).await?;
        Ok(serde_json::from_slice(&raw)?)
    }
}

/// Retry an operation with exponential backoff: `retry_delay * 2^attempt`
/// between attempts, the last error re-raised.
pub async fn with_retry<T, F, Fut>(
    max_retries: usize,
    retry_delay: Duration,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_error = None;
    for attempt in 0..max_retries.max(1) {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let delay = retry_delay * 2u32.pow(attempt as u32);
                tracing::warn!(
                    attempt = attempt + 1,
                    max = max_retries,
                    "store operation failed: {e}, retry in {delay:?}"
                );
                last_error = Some(e);
                if attempt + 1 < max_retries {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    Err(last_error.unwrap_or(StoreError::Backend("no attempts made".to_string())))
}

// ============================================================================
// FACTORY + SINGLETON
// ============================================================================

/// Build a backend from a configuration.
pub fn make_store(config: &StoreConfig) -> Result<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match config.kind {
        StoreKind::Local => Arc::new(LocalStore::new(config)?),
        StoreKind::S3 => Arc::new(CloudStore::s3(config)?),
        StoreKind::Gcs => Arc::new(CloudStore::gcs(config)?),
        StoreKind::Azure => Arc::new(CloudStore::azure(config)?),
        StoreKind::Dropbox => Arc::new(DropboxStore::new(config)?),
    };
    Ok(store)
}

static STORE: OnceLock<Mutex<Option<Arc<dyn ObjectStore>>>> = OnceLock::new();

fn store_cell() -> &'static Mutex<Option<Arc<dyn ObjectStore>>> {
    STORE.get_or_init(|| Mutex::new(None))
}

/// Process-wide store handle, built from the environment on first use.
pub fn get_store() -> Result<Arc<dyn ObjectStore>> {
    let cell = store_cell();
    let mut guard = cell
        .lock()
        .map_err(|_| StoreError::Config("store lock poisoned".to_string()))?;
    if let Some(store) = guard.as_ref() {
        return Ok(Arc::clone(store));
    }
    let store = make_store(&StoreConfig::from_env())?;
    *guard = Some(Arc::clone(&store));
    Ok(store)
}

/// Drop the singleton so the next `get_store` rebuilds it. For tests.
pub fn reset_store() {
    if let Ok(mut guard) = store_cell().lock() {
        *guard = None;
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse() {
        assert_eq!(StoreKind::parse_name("s3"), StoreKind::S3);
        assert_eq!(StoreKind::parse_name("DROPBOX"), StoreKind::Dropbox);
        assert_eq!(StoreKind::parse_name("whatever"), StoreKind::Local);
    }

    #[tokio::test]
    async fn test_retry_backoff_gives_up() {
        let mut calls = 0;
        let result: Result<()> = with_retry(3, Duration::from_millis(1), || {
            calls += 1;
            async { Err(StoreError::Backend("always down".to_string())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_retry_succeeds_midway() {
        let mut calls = 0;
        let result = with_retry(3, Duration::from_millis(1), || {
            calls += 1;
            let ok = calls >= 2;
            async move {
                if ok {
                    Ok(42)
                } else {
                    Err(StoreError::Backend("warming up".to_string()))
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_singleton_reset() {
        reset_store();
        // After reset the cell is empty; the next get would rebuild from env
        assert!(store_cell().lock().unwrap().is_none());
    }
}
