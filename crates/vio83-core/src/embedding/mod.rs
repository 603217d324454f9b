//! Embedding Engine
//!
//! Produces dense f32 vectors for chunks and queries. The mode is selected
//! once at init, strongest first:
//!
//! 1. **Local** - fastembed ONNX inference (feature `local-embeddings`)
//! 2. **Remote** - an OpenAI-style `/embeddings` endpoint configured via
//!    `VIO83_EMBEDDING_ENDPOINT` (+ `_MODEL`, `_API_KEY`, `_DIM`)
//! 3. **None** - no embeddings; vector search degrades to lexical only
//!
//! A failure for any single text in remote mode invalidates the whole
//! batch: `embed` returns `None` and the caller stores norm-0 vectors.
//!
//! The remote path uses a blocking HTTP client: embedding runs on CPU-pool
//! threads, never on the async runtime.

use serde::Deserialize;

/// Default vector dimension when no model dictates one.
pub const DEFAULT_DIMENSION: usize = 384;

/// How the engine produces vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingMode {
    /// Local ONNX inference
    Local,
    /// Remote HTTP endpoint
    Remote,
    /// No embeddings available
    None,
}

#[derive(Debug, Clone)]
struct RemoteConfig {
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

/// The embedding engine. Mode and dimension are fixed at construction.
pub struct EmbeddingEngine {
    mode: EmbeddingMode,
    dimension: usize,
    remote: Option<RemoteConfig>,
    #[cfg(feature = "local-embeddings")]
    local: Option<std::sync::Mutex<fastembed::TextEmbedding>>,
}

impl EmbeddingEngine {
    /// Auto-select the strongest available mode: local, then remote, then
    /// none.
    pub fn auto() -> Self {
        #[cfg(feature = "local-embeddings")]
        if let Some(engine) = Self::try_local() {
            return engine;
        }

        if let Some(engine) = Self::remote_from_env() {
            return engine;
        }

        Self::none()
    }

    /// Engine that produces no embeddings.
    pub fn none() -> Self {
        Self {
            mode: EmbeddingMode::None,
            dimension: DEFAULT_DIMENSION,
            remote: None,
            #[cfg(feature = "local-embeddings")]
            local: None,
        }
    }

    /// Remote engine from `VIO83_EMBEDDING_*` env vars, when the endpoint
    /// is configured.
    pub fn remote_from_env() -> Option<Self> {
        let endpoint = std::env::var("VIO83_EMBEDDING_ENDPOINT").ok()?;
        if endpoint.is_empty() {
            return None;
        }
        let model = std::env::var("VIO83_EMBEDDING_MODEL")
            .unwrap_or_else(|_| "text-embedding-3-small".to_string());
        let api_key = std::env::var("VIO83_EMBEDDING_API_KEY").ok().filter(|k| !k.is_empty());
        let dimension = std::env::var("VIO83_EMBEDDING_DIM")
            .ok()
            .and_then(|d| d.parse().ok())
            .unwrap_or(DEFAULT_DIMENSION);

        tracing::info!(endpoint = %endpoint, model = %model, "remote embedding mode");
        Some(Self {
            mode: EmbeddingMode::Remote,
            dimension,
            remote: Some(RemoteConfig {
                endpoint,
                model,
                api_key,
            }),
            #[cfg(feature = "local-embeddings")]
            local: None,
        })
    }

    #[cfg(feature = "local-embeddings")]
    fn try_local() -> Option<Self> {
        use fastembed::{InitOptions, TextEmbedding};

        let options = InitOptions::default().with_show_download_progress(false);
        match TextEmbedding::try_new(options) {
            Ok(model) => {
                tracing::info!("local embedding mode (fastembed)");
                Some(Self {
                    mode: EmbeddingMode::Local,
                    dimension: DEFAULT_DIMENSION,
                    remote: None,
                    local: Some(std::sync::Mutex::new(model)),
                })
            }
            Err(e) => {
                tracing::warn!("local embedding model unavailable: {e}");
                None
            }
        }
    }

    /// Selected mode.
    pub fn mode(&self) -> EmbeddingMode {
        self.mode
    }

    /// Vector dimension, fixed at init.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Whether `embed` can return vectors at all.
    pub fn is_available(&self) -> bool {
        self.mode != EmbeddingMode::None
    }

    /// Embed a batch of texts. `None` when the mode is none or any text in
    /// the batch fails.
    pub fn embed(&self, texts: &[String]) -> Option<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Some(Vec::new());
        }
        match self.mode {
            EmbeddingMode::None => None,
            EmbeddingMode::Remote => self.embed_remote(texts),
            EmbeddingMode::Local => self.embed_local(texts),
        }
    }

    /// Embed a single text.
    pub fn embed_one(&self, text: &str) -> Option<Vec<f32>> {
        self.embed(std::slice::from_ref(&text.to_string()))
            .and_then(|mut batch| batch.pop())
    }

    #[cfg(feature = "local-embeddings")]
    fn embed_local(&self, texts: &[String]) -> Option<Vec<Vec<f32>>> {
        let model = self.local.as_ref()?;
        let mut guard = model.lock().ok()?;
        let documents: Vec<&str> = texts.iter().map(String::as_str).collect();
        match guard.embed(documents, None) {
            Ok(vectors) => Some(
                vectors
                    .into_iter()
                    .map(|v| v.into_iter().take(self.dimension).collect())
                    .collect(),
            ),
            Err(e) => {
                tracing::warn!("local embedding failed: {e}");
                None
            }
        }
    }

    #[cfg(not(feature = "local-embeddings"))]
    fn embed_local(&self, _texts: &[String]) -> Option<Vec<Vec<f32>>> {
        None
    }

    fn embed_remote(&self, texts: &[String]) -> Option<Vec<Vec<f32>>> {
        #[derive(Deserialize)]
        struct EmbeddingItem {
            embedding: Vec<f32>,
        }
        #[derive(Deserialize)]
        struct EmbeddingResponse {
            data: Vec<EmbeddingItem>,
        }

        let config = self.remote.as_ref()?;
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .ok()?;

        let mut request = client.post(&config.endpoint).json(&serde_json::json!({
            "model": config.model,
            "input": texts,
        }));
        if let Some(key) = &config.api_key {
            request = request.bearer_auth(key);
        }

        let response = match request.send() {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::warn!(status = %r.status(), "embedding endpoint rejected batch");
                return None;
            }
            Err(e) => {
                tracing::warn!("embedding request failed: {e}");
                return None;
            }
        };

        let parsed: EmbeddingResponse = match response.json() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("embedding response unparsable: {e}");
                return None;
            }
        };

        // A partial batch invalidates the whole batch
        if parsed.data.len() != texts.len() {
            tracing::warn!(
                expected = texts.len(),
                got = parsed.data.len(),
                "embedding endpoint returned a partial batch"
            );
            return None;
        }

        Some(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

// ============================================================================
// TESTS
// ============================================================================
