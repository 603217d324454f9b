//! Local Filesystem Store
//!
//! Zero-configuration default backend. Objects are plain files under a
//! base directory; metadata rides in `.meta.json` sidecars next to them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;

use super::{ObjectStore, Result, StorageObject, StoreConfig, StoreError};

/// Filesystem-backed object store.
pub struct LocalStore {
    base_path: PathBuf,
    chunk_size: usize,
}

impl LocalStore {
    /// Store rooted at the configured path, defaulting to
    /// `~/.vio83/storage`.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let base_path = if config.local_base_path.is_empty() {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".vio83").join("storage")
        } else {
            PathBuf::from(&config.local_base_path)
        };
        std::fs::create_dir_all(&base_path)?;
        tracing::info!(path = %base_path.display(), "local store initialized");
        Ok(Self {
            base_path,
            chunk_size: config.chunk_size,
        })
    }

    fn full_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key.trim_start_matches('/'))
    }

    fn meta_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(".meta.json");
        PathBuf::from(name)
    }

    fn object_for(&self, key: &str, path: &Path) -> Result<StorageObject> {
        let stat = std::fs::metadata(path)?;
        let last_modified = stat
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        let metadata = match std::fs::read_to_string(Self::meta_path(path)) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => HashMap::new(),
        };

        Ok(StorageObject {
            key: key.to_string(),
            size: stat.len(),
            last_modified,
            etag: String::new(),
            content_type: "application/octet-stream".to_string(),
            metadata,
        })
    }

    /// Disk usage for the base path: stored objects plus volume headroom.
    pub fn disk_usage(&self) -> Result<(u64, u64)> {
        let mut stored = 0u64;
        let mut files = 0u64;
        for entry in walkdir::WalkDir::new(&self.base_path) {
            let entry = entry.map_err(|e| StoreError::Backend(e.to_string()))?;
            if entry.file_type().is_file()
                && !entry.file_name().to_string_lossy().ends_with(".meta.json")
            {
                stored += entry.metadata().map(|m| m.len()).unwrap_or(0);
                files += 1;
            }
        }
        Ok((files, stored))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        metadata: Option<HashMap<String, String>>,
    ) -> Result<StorageObject> {
        let path = self.full_path(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &data)?;

        if let Some(meta) = &metadata {
            std::fs::write(Self::meta_path(&path), serde_json::to_vec(meta)?)?;
        }

        let etag = format!("{:x}", md5::compute(&data));
        let mut object = self.object_for(key, &path)?;
        object.etag = etag;
        object.metadata = metadata.unwrap_or_default();
        Ok(object)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.full_path(key);
        if !path.exists() {
            return Err(StoreError::NotFound(key.to_string()));
        }
        Ok(std::fs::read(path)?)
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
        let path = self.full_path(key);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path)?;
        let meta = Self::meta_path(&path);
        if meta.exists() {
            let _ = std::fs::remove_file(meta);
        }
        Ok(true)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.full_path(key).exists())
    }

    async fn list(&self, prefix: &str, limit: usize) -> Result<Vec<StorageObject>> {
        let search_root = if prefix.is_empty() {
            self.base_path.clone()
        } else {
            self.full_path(prefix)
        };
        if !search_root.exists() {
            return Ok(Vec::new());
        }
        if search_root.is_file() {
            return Ok(vec![self.object_for(prefix, &search_root)?]);
        }

        let mut results = Vec::new();
        let walker = walkdir::WalkDir::new(&search_root).sort_by_file_name();
        for entry in walker {
            let entry = entry.map_err(|e| StoreError::Backend(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if name.ends_with(".meta.json") {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(&self.base_path)
                .map_err(|e| StoreError::Backend(e.to_string()))?
                .to_string_lossy()
                .into_owned();
            results.push(self.object_for(&rel, entry.path())?);
            if results.len() >= limit {
                break;
            }
        }
        Ok(results)
    }

    async fn head(&self, key: &str) -> Result<Option<StorageObject>> {
        let path = self.full_path(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(self.object_for(key, &path)?))
    }

    async fn copy(&self, src_key: &str, dst_key: &str) -> Result<StorageObject> {
        let src = self.full_path(src_key);
        let dst = self.full_path(dst_key);
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&src, &dst)?;
        let src_meta = Self::meta_path(&src);
        if src_meta.exists() {
            let _ = std::fs::copy(src_meta, Self::meta_path(&dst));
        }
        self.object_for(dst_key, &dst)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn local(dir: &tempfile::TempDir) -> LocalStore {
        let config = StoreConfig {
            local_base_path: dir.path().to_string_lossy().into_owned(),
            chunk_size: 4,
            ..Default::default()
        };
        LocalStore::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = local(&dir);

        let mut meta = HashMap::new();
        meta.insert("source".to_string(), "test".to_string());
        let object = store
            .put("a/b/doc.bin", Bytes::from_static(b"payload"), Some(meta))
            .await
            .unwrap();
        assert_eq!(object.size, 7);
        assert!(!object.etag.is_empty());

        assert_eq!(store.get("a/b/doc.bin").await.unwrap(), b"payload");
        let head = store.head("a/b/doc.bin").await.unwrap().unwrap();
        assert_eq!(head.metadata.get("source").map(String::as_str), Some("test"));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = local(&dir);
        assert!(matches!(
            store.get("nope").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_stream_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let store = local(&dir);
        store
            .put("s", Bytes::from_static(b"0123456789"), None)
            .await
            .unwrap();

        let chunks: Vec<Bytes> = store
            .get_stream("s")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks.len(), 3); // 4 + 4 + 2
        assert_eq!(chunks[2].as_ref(), b"89");
    }

    #[tokio::test]
    async fn test_list_bounded_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let store = local(&dir);
        for name in ["x/3", "x/1", "x/2"] {
            store.put(name, Bytes::from_static(b"v"), None).await.unwrap();
        }

        let all = store.list("x", 10).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].key, "x/1");

        let bounded = store.list("x", 2).await.unwrap();
        assert_eq!(bounded.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_and_exists() {
        let dir = tempfile::tempdir().unwrap();
        let store = local(&dir);
        store.put("gone", Bytes::from_static(b"v"), None).await.unwrap();

        assert!(store.exists("gone").await.unwrap());
        assert!(store.delete("gone").await.unwrap());
        assert!(!store.exists("gone").await.unwrap());
        assert!(!store.delete("gone").await.unwrap());
    }

    #[tokio::test]
    async fn test_copy() {
        let dir = tempfile::tempdir().unwrap();
        let store = local(&dir);
        store.put("src", Bytes::from_static(b"data"), None).await.unwrap();

        let copied = store.copy("src", "dst").await.unwrap();
        assert_eq!(copied.key, "dst");
        assert_eq!(store.get("dst").await.unwrap(), b"data");
    }

    #[tokio::test]
    async fn test_json_convenience() {
        let dir = tempfile::tempdir().unwrap();
        let store = local(&dir);
        let value = serde_json::json!({"k": [1, 2, 3]});
        store.put_json("cfg.json", &value).await.unwrap();
        assert_eq!(store.get_json("cfg.json").await.unwrap(), value);
    }
}
