//! Dropbox Store
//!
//! Dropbox API v2 over plain HTTP: content endpoints for upload/download,
//! RPC endpoints for metadata. Payloads above the single-call ceiling go
//! through an upload session (start / append / finish).

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;

use super::{ObjectStore, Result, StorageObject, StoreConfig, StoreError};

const CONTENT_URL: &str = "https://content.dropboxapi.com/2";
const RPC_URL: &str = "https://api.dropboxapi.com/2";

/// Single-call upload ceiling; larger payloads use an upload session.
const SINGLE_UPLOAD_LIMIT: usize = 150 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct FileMetadata {
    #[serde(rename = ".tag", default)]
    tag: String,
    name: Option<String>,
    path_display: Option<String>,
    size: Option<u64>,
    server_modified: Option<String>,
    content_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListFolderResponse {
    entries: Vec<FileMetadata>,
    cursor: String,
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct SessionStartResponse {
    session_id: String,
}

/// Dropbox-backed object store.
pub struct DropboxStore {
    client: reqwest::Client,
    token: String,
    prefix: String,
    chunk_size: usize,
}

impl DropboxStore {
    /// Store for the configured token and path prefix.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        if config.dropbox_token.is_empty() {
            return Err(StoreError::Config("VIO83_DROPBOX_TOKEN is not set".to_string()));
        }
        let prefix = format!("/{}/", config.dropbox_prefix.trim_matches('/'));
        tracing::info!(prefix = %prefix, "Dropbox store initialized");
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()?,
            token: config.dropbox_token.clone(),
            prefix,
            chunk_size: config.chunk_size,
        })
    }

    fn full_path(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key.trim_start_matches('/'))
    }

    fn strip_prefix<'a>(&self, path: &'a str) -> &'a str {
        path.strip_prefix(self.prefix.as_str()).unwrap_or(path)
    }

    async fn rpc(&self, endpoint: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{RPC_URL}/{endpoint}"))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        Ok(response)
    }

    fn object_from_meta(&self, meta: &FileMetadata) -> StorageObject {
        let key = meta
            .path_display
            .as_deref()
            .map(|p| self.strip_prefix(p).to_string())
            .or_else(|| meta.name.clone())
            .unwrap_or_default();
        let last_modified = meta
            .server_modified
            .as_deref()
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.timestamp_millis() as f64 / 1000.0)
            .unwrap_or(0.0);
        StorageObject {
            key,
            size: meta.size.unwrap_or(0),
            last_modified,
            etag: meta.content_hash.clone().unwrap_or_default(),
            content_type: String::new(),
            metadata: HashMap::new(),
        }
    }

    async fn upload_single(&self, path: &str, data: &Bytes) -> Result<FileMetadata> {
        let arg = serde_json::json!({ "path": path, "mode": "overwrite", "mute": true });
        let response = self
            .client
            .post(format!("{CONTENT_URL}/files/upload"))
            .bearer_auth(&self.token)
            .header("Dropbox-API-Arg", arg.to_string())
            .header("Content-Type", "application/octet-stream")
            .body(data.clone())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::Backend(format!(
                "dropbox upload failed: {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    async fn upload_session(&self, path: &str, data: &Bytes) -> Result<FileMetadata> {
        // start
        let first = data.slice(0..self.chunk_size.min(data.len()));
        let start: SessionStartResponse = self
            .client
            .post(format!("{CONTENT_URL}/files/upload_session/start"))
            .bearer_auth(&self.token)
            .header("Dropbox-API-Arg", "{}")
            .header("Content-Type", "application/octet-stream")
            .body(first)
            .send()
            .await?
            .json()
            .await?;

        // append middle chunks, finish with the last
        let mut offset = self.chunk_size.min(data.len());
        while offset < data.len() {
            let end = (offset + self.chunk_size).min(data.len());
            let chunk = data.slice(offset..end);
            let cursor = serde_json::json!({
                "session_id": start.session_id,
                "offset": offset,
            });

            if end < data.len() {
                let arg = serde_json::json!({ "cursor": cursor });
                self.client
                    .post(format!("{CONTENT_URL}/files/upload_session/append_v2"))
                    .bearer_auth(&self.token)
                    .header("Dropbox-API-Arg", arg.to_string())
                    .header("Content-Type", "application/octet-stream")
                    .body(chunk)
                    .send()
                    .await?
                    .error_for_status()?;
            } else {
                let arg = serde_json::json!({
                    "cursor": cursor,
                    "commit": { "path": path, "mode": "overwrite", "mute": true },
                });
                let response = self
                    .client
                    .post(format!("{CONTENT_URL}/files/upload_session/finish"))
                    .bearer_auth(&self.token)
                    .header("Dropbox-API-Arg", arg.to_string())
                    .header("Content-Type", "application/octet-stream")
                    .body(chunk)
                    .send()
                    .await?
                    .error_for_status()?;
                return Ok(response.json().await?);
            }
            offset = end;
        }

        Err(StoreError::Backend("empty upload session".to_string()))
    }
}

#[async_trait]
impl ObjectStore for DropboxStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        metadata: Option<HashMap<String, String>>,
    ) -> Result<StorageObject> {
        let path = self.full_path(key);
        let meta = if data.len() <= SINGLE_UPLOAD_LIMIT {
            self.upload_single(&path, &data).await?
        } else {
            self.upload_session(&path, &data).await?
        };

        let mut object = self.object_from_meta(&meta);
        object.key = key.to_string();
        object.metadata = metadata.unwrap_or_default();
        Ok(object)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let arg = serde_json::json!({ "path": self.full_path(key) });
        let response = self
            .client
            .post(format!("{CONTENT_URL}/files/download"))
            .bearer_auth(&self.token)
            .header("Dropbox-API-Arg", arg.to_string())
            .send()
            .await?;

        if response.status().as_u16() == 409 {
            return Err(StoreError::NotFound(key.to_string()));
        }
        if !response.status().is_success() {
            return Err(StoreError::Backend(format!(
                "dropbox download failed: {}",
                response.status()
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn get_stream(&self, key: &str) -> Result<BoxStream<'static, Result<Bytes>>> {
        let data = self.get(key).await?;
        let chunk_size = self.chunk_size.max(1);
        let chunks: Vec<Result<Bytes>> = data
            .chunks(chunk_size)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let response = self
            .rpc(
                "files/delete_v2",
                serde_json::json!({ "path": self.full_path(key) }),
            )
            .await?;
        Ok(response.status().is_success())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.head(key).await?.is_some())
    }

    async fn list(&self, prefix: &str, limit: usize) -> Result<Vec<StorageObject>> {
        let path = self.full_path(prefix);
        let path = path.trim_end_matches('/');
        let response = self
            .rpc(
                "files/list_folder",
                serde_json::json!({ "path": path, "limit": limit.clamp(1, 2000) }),
            )
            .await?;
        if !response.status().is_success() {
            return Ok(Vec::new());
        }

        let mut parsed: ListFolderResponse = response.json().await?;
        let mut results: Vec<StorageObject> = Vec::new();
        loop {
            for entry in &parsed.entries {
                if entry.tag == "file" {
                    results.push(self.object_from_meta(entry));
                    if results.len() >= limit {
                        return Ok(results);
                    }
                }
            }
            if !parsed.has_more {
                break;
            }
            let response = self
                .rpc(
                    "files/list_folder/continue",
                    serde_json::json!({ "cursor": parsed.cursor }),
                )
                .await?;
            if !response.status().is_success() {
                break;
            }
            parsed = response.json().await?;
        }
        Ok(results)
    }

    async fn head(&self, key: &str) -> Result<Option<StorageObject>> {
        let response = self
            .rpc(
                "files/get_metadata",
                serde_json::json!({ "path": self.full_path(key) }),
            )
            .await?;
        if !response.status().is_success() {
            return Ok(None);
        }
        let meta: FileMetadata = response.json().await?;
        Ok(Some(self.object_from_meta(&meta)))
    }

    async fn copy(&self, src_key: &str, dst_key: &str) -> Result<StorageObject> {
        let response = self
            .rpc(
                "files/copy_v2",
                serde_json::json!({
                    "from_path": self.full_path(src_key),
                    "to_path": self.full_path(dst_key),
                }),
            )
            .await?;
        if !response.status().is_success() {
            return Err(StoreError::Backend(format!(
                "dropbox copy failed: {}",
                response.status()
            )));
        }
        self.head(dst_key)
            .await?
            .ok_or_else(|| StoreError::NotFound(dst_key.to_string()))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> DropboxStore {
        let config = StoreConfig {
            dropbox_token: "test-token".to_string(),
            dropbox_prefix: "/vio83/".to_string(),
            ..Default::default()
        };
        DropboxStore::new(&config).unwrap()
    }

    #[test]
    fn test_missing_token_rejected() {
        let config = StoreConfig::default();
        assert!(matches!(
            DropboxStore::new(&config),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn test_path_mapping() {
        let store = store();
        assert_eq!(store.full_path("a/b.txt"), "/vio83/a/b.txt");
        assert_eq!(store.strip_prefix("/vio83/a/b.txt"), "a/b.txt");
    }

    #[test]
    fn test_metadata_parsing() {
        let json = r#"{
            ".tag": "file",
            "name": "doc.pdf",
            "path_display": "/vio83/docs/doc.pdf",
            "size": 2048,
            "server_modified": "2024-03-01T10:00:00Z",
            "content_hash": "abcd"
        }"#;
        let meta: FileMetadata = serde_json::from_str(json).unwrap();
        let object = store().object_from_meta(&meta);
        assert_eq!(object.key, "docs/doc.pdf");
        assert_eq!(object.size, 2048);
        assert_eq!(object.etag, "abcd");
        assert!(object.last_modified > 0.0);
    }
}
