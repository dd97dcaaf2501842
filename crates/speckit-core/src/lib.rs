//! # Speckit Core
//!
//! Spec-aware memory engine for AI coding agents. Ingests developer-authored
//! notes (decisions, rationales, trigger phrases, causal links) from spec
//! folders and serves context-optimized recall:
//!
//! - **Hybrid Search**: dense vectors (HNSW via USearch) + BM25/FTS5 +
//!   causal-graph neighbors, merged by Reciprocal Rank Fusion with a
//!   convergence bonus
//! - **Provider Chain**: remote embedding API -> local model -> lexical-only
//!   sentinel, with retry, classified fallback, and credential pre-flight
//! - **Prediction-Error Gate**: similarity + contradiction detection decide
//!   CREATE / UPDATE / SUPERSEDE / REINFORCE / CREATE_LINKED
//! - **Working Memory**: session-scoped attention scores with HOT/WARM/COLD
//!   tiers and spreading activation over the causal graph
//! - **Archival Lifecycle**: age-based candidate scans that never touch the
//!   protected importance tiers
//! - **Causal Graph**: six typed relations, depth-clamped cycle-safe
//!   traversal
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use speckit_core::{EngineConfig, MemoryEngine, SaveRequest, SearchRequest};
//!
//! let engine = MemoryEngine::new(EngineConfig::from_env(), None)?;
//! engine.initialize().await;
//!
//! engine.save(SaveRequest::new(
//!     "Rotate refresh tokens on every use.",
//!     "auth/tokens.md",
//!     "auth",
//! )).await?;
//!
//! let hits = engine.search(SearchRequest::new("token rotation")).await?;
//! ```
//!
//! ## Feature Flags
//!
//! - `local-embeddings` (default): on-device fallback tier with fastembed
//! - `vector-search` (default): HNSW vector search with USearch
//! - `full`: both of the above

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod archival;
pub mod config;
pub mod embeddings;
pub mod engine;
pub mod errors;
pub mod gate;
pub mod graph;
pub mod indexer;
pub mod layers;
pub mod preflight;
pub mod retry;
pub mod search;
pub mod session;
pub mod storage;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use config::{EngineConfig, ProviderKind};

pub use engine::{
    MemoryEngine, SaveOutcome, SaveRequest, ScanReport, SearchHit, SearchRequest, SearchResponse,
    TriggerMatch,
};

pub use errors::{
    default_hint, get_available_hints, get_recovery_hint, has_specific_hint, ErrorCode,
    MemoryError, PreflightCode, RecoveryHint, Result, Severity,
};

pub use storage::{
    ArchivalState, CheckpointInfo, CheckpointManager, EmbeddingRecord, EmbeddingStatus,
    ImportanceTier, IndexStats, MemoryRecord, MemoryStore, MemoryUpsert,
};

pub use embeddings::{
    classify_validation, cosine_similarity, validate_api_key, EmbeddingProvider, FallbackEvent,
    FallbackReason, ProviderChain, ProviderError, ProviderProfile, ProviderTier, ValidationResult,
};

pub use search::{
    apply_intent_weights, classify_intent, fuse_results, fuse_results_multi, get_query_weights,
    sanitize_fts5_query, unified_search, FusedResult, FusionMetadata, FusionOptions,
    IntentClassification, KeywordSearcher, QueryIntent, QueryWeights, RankWeights,
};

#[cfg(feature = "vector-search")]
pub use search::{VectorIndex, VectorIndexConfig, VectorIndexStats};

pub use gate::{
    detect_contradiction, evaluate_memory, ConflictRecord, Contradiction, GateCandidate,
    GateDecision, MemoryAction,
};

pub use graph::{
    CausalChain, CausalEdge, CausalGraph, CausalRelation, ChainEdge, EdgeNeighborhood, GraphStats,
    NewEdge, TraversalDirection, MAX_TRAVERSAL_DEPTH,
};

pub use indexer::{
    content_hash, content_hash_str, CategorizedFiles, FileMetadata, Indexer, ReindexDecision,
    ReindexReason,
};

pub use preflight::{
    check_anchors, check_content_size, check_duplicates, check_token_budget, estimate_tokens,
    run_preflight, AnchorReport, DuplicateReport, PreflightInput, PreflightOptions,
    PreflightReport, SizeReport, TokenReport,
};

pub use session::{
    calculate_tier, ActivationConfig, AttentionTier, ScoreUpdate, SessionRecord, SessionStats,
    WorkingMemory, WorkingMemoryEntry,
};

pub use archival::{
    ArchivalAction, ArchivalConfig, ArchivalManager, ArchivalStats, ArchivalStatus,
    BatchArchiveResult, JobStartResult, ScanResult,
};

pub use retry::{
    calculate_backoff, classify_error, retry_with_backoff, AttemptRecord, ErrorClass, ErrorSignal,
    RetryError, RetryOptions, RetrySignal,
};

pub use layers::{
    enhance_description, get_layer_for_tool, get_recommended_layers, get_token_budget, Layer,
    DEFAULT_TOKEN_BUDGET, LAYERS,
};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        ArchivalManager, CausalGraph, EngineConfig, ErrorCode, MemoryEngine, MemoryError,
        MemoryRecord, MemoryStore, ProviderChain, Result, SaveRequest, SearchRequest,
        WorkingMemory,
    };
}
