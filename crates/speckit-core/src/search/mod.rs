//! Search Module
//!
//! The hybrid retrieval pipeline:
//! - Vector search over HNSW (USearch)
//! - Keyword search over BM25/FTS5
//! - Causal-graph neighbors as a third source
//! - Reciprocal Rank Fusion with a convergence bonus
//! - Intent classification that re-weights the ranking factors

mod fusion;
mod intent;
mod keyword;

#[cfg(feature = "vector-search")]
mod vector;

pub use fusion::{
    fuse_results, fuse_results_multi, unified_search, FusedResult, FusionMetadata, FusionOptions,
    SourceCounts, UnifiedSearchResult,
};

pub use intent::{
    apply_intent_weights, classify_intent, get_query_weights, intent_weights,
    IntentClassification, QueryIntent, QueryWeights, RankWeights,
};

pub use keyword::{sanitize_fts5_query, KeywordSearcher};

#[cfg(feature = "vector-search")]
pub use vector::{
    VectorIndex, VectorIndexConfig, VectorIndexStats, DEFAULT_CONNECTIVITY,
    DEFAULT_EXPANSION_ADD, DEFAULT_EXPANSION_SEARCH,
};
