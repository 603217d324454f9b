//! Cloud Object Stores
//!
//! S3 (and S3-compatibles), Google Cloud Storage and Azure Blob Storage
//! share one adapter over the `object_store` crate; only the builder
//! differs per provider. Keys are namespaced under the configured prefix.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path as CloudPath;
use object_store::ObjectStore as CloudObjectStore;

use super::{ObjectStore, Result, StorageObject, StoreConfig, StoreError};

/// One adapter for the three cloud providers.
pub struct CloudStore {
    inner: Arc<dyn CloudObjectStore>,
    prefix: String,
    label: &'static str,
}

impl CloudStore {
    /// Amazon S3 / MinIO / any S3-compatible endpoint.
    pub fn s3(config: &StoreConfig) -> Result<Self> {
        if config.s3_bucket.is_empty() {
            return Err(StoreError::Config("VIO83_S3_BUCKET is not set".to_string()));
        }

        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&config.s3_bucket)
            .with_region(&config.s3_region);
        if !config.s3_endpoint.is_empty() {
            builder = builder.with_endpoint(&config.s3_endpoint).with_allow_http(true);
        }
        if !config.s3_access_key.is_empty() {
            builder = builder
                .with_access_key_id(&config.s3_access_key)
                .with_secret_access_key(&config.s3_secret_key);
        }

        tracing::info!(bucket = %config.s3_bucket, "S3 store initialized");
        Ok(Self {
            inner: Arc::new(builder.build()?),
            prefix: normalize_prefix(&config.s3_prefix),
            label: "s3",
        })
    }

    /// Google Cloud Storage.
    pub fn gcs(config: &StoreConfig) -> Result<Self> {
        if config.gcs_bucket.is_empty() {
            return Err(StoreError::Config("VIO83_GCS_BUCKET is not set".to_string()));
        }

        let mut builder = GoogleCloudStorageBuilder::from_env().with_bucket_name(&config.gcs_bucket);
        if !config.gcs_credentials_path.is_empty() {
            builder = builder.with_service_account_path(&config.gcs_credentials_path);
        }

        tracing::info!(bucket = %config.gcs_bucket, "GCS store initialized");
        Ok(Self {
            inner: Arc::new(builder.build()?),
            prefix: normalize_prefix(&config.gcs_prefix),
            label: "gcs",
        })
    }

    /// Azure Blob Storage.
    pub fn azure(config: &StoreConfig) -> Result<Self> {
        if config.azure_container.is_empty() {
            return Err(StoreError::Config(
                "VIO83_AZURE_CONTAINER is not set".to_string(),
            ));
        }

        let mut builder =
            MicrosoftAzureBuilder::from_env().with_container_name(&config.azure_container);
        for (name, value) in parse_connection_string(&config.azure_connection_string) {
            match name.as_str() {
                "AccountName" => builder = builder.with_account(value),
                "AccountKey" => builder = builder.with_access_key(value),
                _ => {}
            }
        }

        tracing::info!(container = %config.azure_container, "Azure store initialized");
        Ok(Self {
            inner: Arc::new(builder.build()?),
            prefix: normalize_prefix(&config.azure_prefix),
            label: "azure",
        })
    }

    fn full_path(&self, key: &str) -> CloudPath {
        CloudPath::from(format!("{}{}", self.prefix, key.trim_start_matches('/')))
    }

    fn strip_prefix<'a>(&self, location: &'a str) -> &'a str {
        location.strip_prefix(self.prefix.as_str()).unwrap_or(location)
    }

    fn object_from_meta(&self, meta: &object_store::ObjectMeta) -> StorageObject {
        StorageObject {
            key: self.strip_prefix(meta.location.as_ref()).to_string(),
            size: meta.size as u64,
            last_modified: meta.last_modified.timestamp_millis() as f64 / 1000.0,
            etag: meta.e_tag.clone().unwrap_or_default(),
            content_type: String::new(),
            metadata: HashMap::new(),
        }
    }

    fn map_error(&self, key: &str, error: object_store::Error) -> StoreError {
        match error {
            object_store::Error::NotFound { .. } => StoreError::NotFound(key.to_string()),
            other => StoreError::Cloud(other),
        }
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}

/// Minimal `Key=Value;Key=Value` connection-string parser.
fn parse_connection_string(connection: &str) -> Vec<(String, String)> {
    connection
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

#[async_trait]
impl ObjectStore for CloudStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        metadata: Option<HashMap<String, String>>,
    ) -> Result<StorageObject> {
        let path = self.full_path(key);
        let size = data.len() as u64;
        self.inner
            .put(&path, data.into())
            .await
            .map_err(|e| self.map_error(key, e))?;

        Ok(StorageObject {
            key: key.to_string(),
            size,
            metadata: metadata.unwrap_or_default(),
            ..Default::default()
        })
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.full_path(key);
        let result = self
            .inner
            .get(&path)
            .await
            .map_err(|e| self.map_error(key, e))?;
        let bytes = result.bytes().await.map_err(|e| self.map_error(key, e))?;
        Ok(bytes.to_vec())
    }

    async fn get_stream(&self, key: &str) -> Result<BoxStream<'static, Result<Bytes>>> {
        let path = self.full_path(key);
        let result = self
            .inner
            .get(&path)
            .await
            .map_err(|e| self.map_error(key, e))?;
        let key = key.to_string();
        let label = self.label;
        Ok(result
            .into_stream()
            .map(move |chunk| {
                chunk.map_err(|e| {
                    tracing::warn!(key = %key, backend = label, "stream chunk failed: {e}");
                    StoreError::Cloud(e)
                })
            })
            .boxed())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let path = self.full_path(key);
        match self.inner.delete(&path).await {
            Ok(()) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(StoreError::Cloud(e)),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.head(key).await?.is_some())
    }

    async fn list(&self, prefix: &str, limit: usize) -> Result<Vec<StorageObject>> {
        let list_prefix = self.full_path(prefix);
        let mut stream = self.inner.list(Some(&list_prefix));

        let mut results = Vec::new();
        while let Some(entry) = stream.next().await {
            let meta = entry.map_err(StoreError::Cloud)?;
            results.push(self.object_from_meta(&meta));
            if results.len() >= limit {
                break;
            }
        }
        Ok(results)
    }

    async fn head(&self, key: &str) -> Result<Option<StorageObject>> {
        let path = self.full_path(key);
        match self.inner.head(&path).await {
            Ok(meta) => Ok(Some(self.object_from_meta(&meta))),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(StoreError::Cloud(e)),
        }
    }

    async fn copy(&self, src_key: &str, dst_key: &str) -> Result<StorageObject> {
        let src = self.full_path(src_key);
        let dst = self.full_path(dst_key);
        self.inner
            .copy(&src, &dst)
            .await
            .map_err(|e| self.map_error(src_key, e))?;
        self.head(dst_key)
            .await?
            .ok_or_else(|| StoreError::NotFound(dst_key.to_string()))
    }
}

// ============================================================================
// TESTS
// ============================================================================
