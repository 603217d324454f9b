//! Tiered Storage
//!
//! Hot/warm/cold composition: reads probe the fastest tier first and
//! promote objects that prove popular (three in-process reads). Eviction
//! is coarse and advisory; there is no global LRU, just an age-and-
//! frequency sweep from hot to warm.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use super::{ObjectStore, Result, StorageObject, StoreError};

/// Reads before an object is promoted to a faster tier.
const PROMOTION_THRESHOLD: u32 = 3;

/// Which tier to write into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tier {
    /// Fast local tier
    #[default]
    Hot,
    /// Standard cloud tier
    Warm,
    /// Archive tier
    Cold,
}

/// Per-tier object counts and sizes.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct TierStats {
    /// Objects and bytes in hot
    pub hot: (usize, u64),
    /// Objects and bytes in warm
    pub warm: Option<(usize, u64)>,
    /// Objects and bytes in cold
    pub cold: Option<(usize, u64)>,
}

/// Three-level store composition.
pub struct TieredStore {
    hot: Arc<dyn ObjectStore>,
    warm: Option<Arc<dyn ObjectStore>>,
    cold: Option<Arc<dyn ObjectStore>>,
    access_counts: Mutex<HashMap<String, u32>>,
}

impl TieredStore {
    /// Compose hot plus optional warm and cold tiers.
    pub fn new(
        hot: Arc<dyn ObjectStore>,
        warm: Option<Arc<dyn ObjectStore>>,
        cold: Option<Arc<dyn ObjectStore>>,
    ) -> Self {
        Self {
            hot,
            warm,
            cold,
            access_counts: Mutex::new(HashMap::new()),
        }
    }

    fn record_access(&self, key: &str) -> u32 {
        let mut counts = match self.access_counts.lock() {
            Ok(guard) => guard,
            Err(_) => return 0,
        };
        let count = counts.entry(key.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    fn access_count(&self, key: &str) -> u32 {
        self.access_counts
            .lock()
            .ok()
            .and_then(|counts| counts.get(key).copied())
            .unwrap_or(0)
    }

    /// Read through the tiers, fastest first, promoting popular objects.
    pub async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let reads = self.record_access(key);

        if self.hot.exists(key).await? {
            return self.hot.get(key).await;
        }

        if let Some(warm) = &self.warm {
            if warm.exists(key).await? {
                let data = warm.get(key).await?;
                if reads >= PROMOTION_THRESHOLD {
                    tracing::debug!(key = %key, "promoting to hot tier");
                    self.hot.put(key, Bytes::from(data.clone()), None).await?;
                }
                return Ok(data);
            }
        }

        if let Some(cold) = &self.cold {
            if cold.exists(key).await? {
                let data = cold.get(key).await?;
                if let Some(warm) = &self.warm {
                    warm.put(key, Bytes::from(data.clone()), None).await?;
                }
                return Ok(data);
            }
        }

        Err(StoreError::NotFound(key.to_string()))
    }

    /// Write into the requested tier; missing tiers fall back to hot.
    pub async fn put(&self, key: &str, data: Bytes, tier: Tier) -> Result<StorageObject> {
        match tier {
            Tier::Hot => self.hot.put(key, data, None).await,
            Tier::Warm => match &self.warm {
                Some(warm) => warm.put(key, data, None).await,
                None => self.hot.put(key, data, None).await,
            },
            Tier::Cold => match &self.cold {
                Some(cold) => cold.put(key, data, None).await,
                None => self.hot.put(key, data, None).await,
            },
        }
    }

    /// Move stale, unpopular objects from hot to warm: older than the
    /// cutoff AND read fewer than three times. Returns how many moved.
    pub async fn evict_cold(&self, max_age_days: u32) -> Result<usize> {
        let Some(warm) = &self.warm else {
            return Ok(0);
        };

        let cutoff = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
            - f64::from(max_age_days) * 86_400.0;

        let objects = self.hot.list("", 10_000).await?;
        let mut evicted = 0;
        for object in objects {
            if object.last_modified < cutoff && self.access_count(&object.key) < PROMOTION_THRESHOLD
            {
                let data = self.hot.get(&object.key).await?;
                warm.put(&object.key, Bytes::from(data), None).await?;
                self.hot.delete(&object.key).await?;
                evicted += 1;
                tracing::info!(key = %object.key, "evicted to warm tier");
            }
        }
        Ok(evicted)
    }

    /// Object counts and sizes per tier.
    pub async fn stats(&self) -> Result<TierStats> {
        let sum = |objects: &[StorageObject]| -> (usize, u64) {
            (objects.len(), objects.iter().map(|o| o.size).sum())
        };

        let hot = sum(&self.hot.list("", 100_000).await?);
        let warm = match &self.warm {
            Some(warm) => Some(sum(&warm.list("", 100_000).await?)),
            None => None,
        };
        let cold = match &self.cold {
            Some(cold) => Some(sum(&cold.list("", 100_000).await?)),
            None => None,
        };

        Ok(TierStats { hot, warm, cold })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{LocalStore, StoreConfig};

    fn local_tier(dir: &tempfile::TempDir, name: &str) -> Arc<dyn ObjectStore> {
        let config = StoreConfig {
            local_base_path: dir.path().join(name).to_string_lossy().into_owned(),
            ..Default::default()
        };
        Arc::new(LocalStore::new(&config).unwrap())
    }

    #[tokio::test]
    async fn test_probe_order_and_promotion() {
        let dir = tempfile::tempdir().unwrap();
        let hot = local_tier(&dir, "hot");
        let warm = local_tier(&dir, "warm");
        let tiered = TieredStore::new(Arc::clone(&hot), Some(Arc::clone(&warm)), None);

        // Object only in warm
        warm.put("doc", Bytes::from_static(b"warm data"), None)
            .await
            .unwrap();

        // Two reads: served from warm, not yet promoted
        tiered.get("doc").await.unwrap();
        tiered.get("doc").await.unwrap();
        assert!(!hot.exists("doc").await.unwrap());

        // Third read crosses the threshold and copies to hot
        let data = tiered.get("doc").await.unwrap();
        assert_eq!(data, b"warm data");
        assert!(hot.exists("doc").await.unwrap());
    }

    #[tokio::test]
    async fn test_cold_read_promotes_to_warm() {
        let dir = tempfile::tempdir().unwrap();
        let hot = local_tier(&dir, "hot");
        let warm = local_tier(&dir, "warm");
        let cold = local_tier(&dir, "cold");
        let tiered = TieredStore::new(hot, Some(Arc::clone(&warm)), Some(Arc::clone(&cold)));

        cold.put("archive", Bytes::from_static(b"cold data"), None)
            .await
            .unwrap();

        let data = tiered.get("archive").await.unwrap();
        assert_eq!(data, b"cold data");
        assert!(warm.exists("archive").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_everywhere() {
        let dir = tempfile::tempdir().unwrap();
        let tiered = TieredStore::new(local_tier(&dir, "hot"), None, None);
        assert!(matches!(
            tiered.get("ghost").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_evict_cold_respects_age_and_frequency() {
        let dir = tempfile::tempdir().unwrap();
        let hot = local_tier(&dir, "hot");
        let warm = local_tier(&dir, "warm");
        let tiered = TieredStore::new(Arc::clone(&hot), Some(Arc::clone(&warm)), None);

        tiered
            .put("fresh", Bytes::from_static(b"x"), Tier::Hot)
            .await
            .unwrap();

        // Nothing is old enough with a zero-day cutoff in the future
        // direction: everything written just now is newer than any cutoff
        let evicted = tiered.evict_cold(30).await.unwrap();
        assert_eq!(evicted, 0);
        assert!(hot.exists("fresh").await.unwrap());

        // With a zero-day cutoff everything qualifies by age; the popular
        // object stays anyway
        for _ in 0..3 {
            tiered.get("fresh").await.unwrap();
        }
        let evicted = tiered.evict_cold(0).await.unwrap();
        assert_eq!(evicted, 0);

        tiered
            .put("stale", Bytes::from_static(b"y"), Tier::Hot)
            .await
            .unwrap();
        let evicted = tiered.evict_cold(0).await.unwrap();
        assert_eq!(evicted, 1);
        assert!(!hot.exists("stale").await.unwrap());
        assert!(warm.exists("stale").await.unwrap());
    }

    #[tokio::test]
    async fn test_stats() {
        let dir = tempfile::tempdir().unwrap();
        let hot = local_tier(&dir, "hot");
        let tiered = TieredStore::new(hot, Some(local_tier(&dir, "warm")), None);
        tiered
            .put("a", Bytes::from_static(b"12345"), Tier::Hot)
            .await
            .unwrap();

        let stats = tiered.stats().await.unwrap();
        assert_eq!(stats.hot, (1, 5));
        assert_eq!(stats.warm, Some((0, 0)));
        assert!(stats.cold.is_none());
    }
}
