//! Search engine for skills
//!
//! Hybrid retrieval: BM25 over skill text + injected embeddings, fused with
//! RRF and blended with scope and priority signals.

pub mod ambiguity;
pub mod cache;
pub mod context;
pub mod embeddings;
pub mod hybrid;
pub mod ranker;
pub mod snapshot;
pub mod tantivy;

pub use ambiguity::{AmbiguityDetector, Candidate, Selection};
pub use cache::{CacheLayer, CacheStats};
pub use context::{QueryContext, scope_boost};
pub use embeddings::{Embedder, FnEmbedder, HashEmbedder, SharedEmbedder, VectorIndex};
pub use hybrid::{HybridResult, RrfConfig, fuse_results};
pub use ranker::{FusionRanker, FusionWeights, RankedSkill, RankerConfig, Ranking};
pub use snapshot::{IndexSnapshot, SnapshotHandle, SnapshotOptions, SnapshotStats};
pub use self::tantivy::{Analyzer, Bm25Index, Bm25Params, Bm25Result};
