//! # VIO83 Core
//!
//! Personal knowledge distillation and retrieval engine. Ingests
//! heterogeneous documents and open scholarly APIs, compresses each
//! document into a five-level distilled representation, and answers
//! semantic and keyword queries over hundreds of millions of records on a
//! single workstation.
//!
//! The data plane, end to end:
//!
//! - **Compression**: multi-algorithm frames with CRC32 integrity
//! - **Object store**: local / S3 / GCS / Azure / Dropbox, hot-warm-cold tiers
//! - **Extract + preprocess**: bytes to cleaned, language-tagged chunks
//! - **NLP**: level-selected entities, keywords, summaries, sentiment
//! - **Embedding + quantization**: f32 vectors packed to int8
//! - **Distillation store**: L1 metadata, L2 vectors, L3 summaries,
//!   L4 knowledge graph, L5 compressed full text, FTS5 index
//! - **Search**: BM25 + vector kNN + hybrid rerank, facets, highlights
//! - **Harvest**: OpenAlex / Crossref / Wikipedia with resumable cursors
//! - **Executor**: CPU/thread/async pools, pipeline DAG, backpressure
//! - **RAG facade**: top-k results packaged into prompt context
//!
//! Flow: `raw bytes -> extract -> preprocess -> (nlp | embedding) ->
//! distill -> search index`; queries flow `text -> search -> rerank ->
//! rag`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use vio83_core::distill::{DistillStore, Level1Metadata, SearchFilters};
//!
//! # fn main() -> vio83_core::distill::Result<()> {
//! let store = DistillStore::open(None)?;
//! store.distill_metadata_only(Level1Metadata {
//!     doc_id: "0123456789abcdef".into(),
//!     title: "A Treatise on Light".into(),
//!     ..Default::default()
//! })?;
//! let hits = store.search("light", &SearchFilters::default(), 10)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! - `bz2` / `lzma`: extra compression backends (native deps)
//! - `local-embeddings`: fastembed ONNX inference for the embedding engine

// ============================================================================
// MODULES
// ============================================================================

pub mod cancel;
pub mod compression;
pub mod distill;
pub mod embedding;
pub mod executor;
pub mod extract;
pub mod harvest;
pub mod ids;
pub mod ingest;
pub mod nlp;
pub mod preprocess;
pub mod quantize;
pub mod rag;
pub mod search;
pub mod store;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use compression::{Algo, BatchCompressor, CompressionError, Compressor};
pub use distill::{
    Category, DistillError, DistillStore, DistilledDoc, Level1Metadata, SearchFilters,
};
pub use embedding::{EmbeddingEngine, EmbeddingMode};
pub use executor::{
    AsyncPool, BatchProcessor, BatchProgress, CpuPool, Pipeline, PoolKind, ProgressTracker,
    StageConfig, ThreadPool,
};
pub use extract::{detect_format, extract, extract_file, DocumentFormat, ExtractError};
pub use harvest::{
    CrossrefAdapter, HarvestError, HarvestProgress, HarvestStateDb, HarvestStatus, Harvester,
    LocalScanner, OpenAlexAdapter, SourceAdapter, WikipediaAdapter,
};
pub use ids::doc_id_from_source;
pub use ingest::{IngestOutcome, IngestStatus, Ingestor};
pub use nlp::{AnalysisLevel, NlpPipeline, NlpResult};
pub use preprocess::{Chunk, PreprocessResult, Preprocessor};
pub use rag::{RagContext, RagFacade, VerificationBadge};
pub use search::{SearchEngine, SearchQuery, SearchResponse, SearchResult};
pub use store::{get_store, reset_store, ObjectStore, StorageObject, StoreConfig, StoreError};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding dimension of the distilled store
pub const EMBEDDING_DIM: usize = 384;

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::compression::{Algo, Compressor};
    pub use crate::distill::{
        Category, DistillStore, Level1Metadata, SearchFilters, SearchRow,
    };
    pub use crate::embedding::EmbeddingEngine;
    pub use crate::executor::{CpuPool, Pipeline, ProgressTracker, StageConfig, ThreadPool};
    pub use crate::harvest::{HarvestStateDb, Harvester, LocalScanner};
    pub use crate::preprocess::Preprocessor;
    pub use crate::rag::RagFacade;
    pub use crate::search::{SearchEngine, SearchQuery};
    pub use crate::store::{ObjectStore, StoreConfig};
}
