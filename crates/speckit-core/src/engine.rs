//! Memory Engine
//!
//! Wires the components into the pipeline the tools call: validate ->
//! retrieve -> fuse -> gate -> persist. Owns the provider chain, the vector
//! index rebuilt from the embedding column, the session working memory, and
//! the archival manager.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use lru::LruCache;
use serde::Serialize;

use crate::archival::{ArchivalConfig, ArchivalManager};
use crate::config::EngineConfig;
use crate::embeddings::ProviderChain;
use crate::errors::{ErrorCode, MemoryError, Result};
use crate::gate::{evaluate_memory, GateCandidate, GateDecision, MemoryAction};
use crate::graph::{CausalGraph, CausalRelation, NewEdge};
use crate::indexer::{content_hash_str, Indexer};
use crate::preflight::{run_preflight, PreflightInput, PreflightOptions, PreflightReport};
use crate::search::{
    get_query_weights, sanitize_fts5_query, unified_search, FusionMetadata, FusionOptions,
    QueryIntent, QueryWeights, RankWeights,
};
use crate::session::WorkingMemory;
use crate::storage::{
    ArchivalState, CheckpointManager, EmbeddingStatus, ImportanceTier, MemoryRecord, MemoryStore,
    MemoryUpsert,
};

#[cfg(feature = "vector-search")]
use crate::search::VectorIndex;

/// Query-embedding cache capacity
const QUERY_CACHE_SIZE: usize = 100;

/// How many candidates each source contributes before fusion
const SOURCE_FETCH_MULTIPLIER: usize = 2;

/// Seeds whose causal neighbors become the graph source
const GRAPH_SEED_COUNT: usize = 3;

// ============================================================================
// REQUEST / RESPONSE TYPES
// ============================================================================

/// Parameters for a hybrid search
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub limit: usize,
    /// Overrides the classifier when provided
    pub intent: Option<QueryIntent>,
    /// Classify the query when no override is given (default true)
    pub auto_detect_intent: bool,
    /// Restrict to one spec folder
    pub spec_folder: Option<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: 10,
            intent: None,
            auto_detect_intent: true,
            spec_folder: None,
        }
    }
}

/// One search hit with its scoring breakdown
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub memory: MemoryRecord,
    pub final_score: f64,
    pub rrf_score: f64,
    /// Cosine similarity when the vector source ranked this hit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    pub in_vector: bool,
    pub in_fts: bool,
    pub in_graph: bool,
}

/// A full search response
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    /// Intent and weights used for ranking, when classification ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<QueryWeights>,
    pub fusion: FusionMetadata,
    /// True when the chain is degraded and only keyword results exist
    pub lexical_only: bool,
}

/// Parameters for a save
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub content: String,
    pub file_path: String,
    pub spec_folder: String,
    pub title: Option<String>,
    pub importance_tier: Option<ImportanceTier>,
    pub trigger_phrases: Vec<String>,
    /// Report what would happen without persisting
    pub dry_run: bool,
    /// Skip the gate and create regardless of similar content
    pub force: bool,
}

impl SaveRequest {
    pub fn new(
        content: impl Into<String>,
        file_path: impl Into<String>,
        spec_folder: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            file_path: file_path.into(),
            spec_folder: spec_folder.into(),
            title: None,
            importance_tier: None,
            trigger_phrases: Vec::new(),
            dry_run: false,
            force: false,
        }
    }
}

/// Outcome of a save
#[derive(Debug, Clone, Serialize)]
pub struct SaveOutcome {
    pub saved: bool,
    pub dry_run: bool,
    pub blocked_by_preflight: bool,
    pub preflight: PreflightReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<GateDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superseded_id: Option<i64>,
    pub linked_ids: Vec<i64>,
}

/// Outcome of a folder scan
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub total_files: usize,
    pub indexed: usize,
    pub embedded: usize,
    pub lexical_only: usize,
    pub failed: usize,
    pub unchanged: usize,
    pub mtimes_refreshed: usize,
    pub not_found: usize,
    pub fast_path_skips: usize,
}

/// One trigger-phrase match
#[derive(Debug, Clone, Serialize)]
pub struct TriggerMatch {
    pub memory_id: i64,
    pub phrase: String,
    pub title: String,
    pub file_path: String,
}

// ============================================================================
// ENGINE
// ============================================================================

/// The composed memory engine
pub struct MemoryEngine {
    config: EngineConfig,
    store: Arc<MemoryStore>,
    chain: Arc<ProviderChain>,
    working_memory: WorkingMemory,
    archival: Arc<ArchivalManager>,
    graph: CausalGraph,
    checkpoints: CheckpointManager,
    indexer: Indexer,
    #[cfg(feature = "vector-search")]
    vector_index: tokio::sync::RwLock<Option<VectorIndex>>,
    query_cache: Mutex<LruCache<String, Option<Vec<f32>>>>,
}

impl MemoryEngine {
    /// Build the engine. `None` puts the database in the platform data dir.
    pub fn new(config: EngineConfig, db_path: Option<PathBuf>) -> Result<Self> {
        let chain = Arc::new(ProviderChain::new(config.clone()));
        Self::with_chain(config, db_path, chain)
    }

    /// Build the engine around an existing provider chain (embedded use,
    /// tests pinning the lexical sentinel)
    pub fn with_chain(
        config: EngineConfig,
        db_path: Option<PathBuf>,
        chain: Arc<ProviderChain>,
    ) -> Result<Self> {
        let store = Arc::new(MemoryStore::new(db_path)?);
        let working_memory = WorkingMemory::new(store.clone(), config.session_idle_minutes);
        let archival = Arc::new(ArchivalManager::init(
            store.clone(),
            ArchivalConfig {
                days_threshold: config.archival_days_threshold,
                scan_interval_ms: config.archival_scan_interval_ms,
                ..ArchivalConfig::default()
            },
        )?);
        let graph = CausalGraph::new(store.clone());
        let checkpoints = CheckpointManager::for_database(store.db_path())?;
        let indexer = Indexer::new(store.clone());

        Ok(Self {
            config,
            store,
            chain,
            working_memory,
            archival,
            graph,
            checkpoints,
            indexer,
            #[cfg(feature = "vector-search")]
            vector_index: tokio::sync::RwLock::new(None),
            query_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(QUERY_CACHE_SIZE).expect("cache size is non-zero"),
            )),
        })
    }

    /// Probe the provider chain and rebuild the vector index from the
    /// embedding column. Never fails; the engine degrades to lexical-only.
    pub async fn initialize(&self) {
        self.chain.initialize().await;

        #[cfg(feature = "vector-search")]
        {
            let profile = self.chain.profile().await;
            if profile.dim == 0 {
                return;
            }
            let mut index = match VectorIndex::new(profile.dim) {
                Ok(index) => index,
                Err(e) => {
                    tracing::warn!(error = %e, "vector index unavailable");
                    return;
                }
            };
            match self.store.load_all_embeddings() {
                Ok(rows) => {
                    for (id, vector) in rows {
                        if vector.len() != profile.dim {
                            // Stale rows from a previous provider; reindex
                            // will replace them.
                            continue;
                        }
                        if let Err(e) = index.upsert(id, &vector) {
                            tracing::warn!(memory_id = id, error = %e, "failed to load vector");
                        }
                    }
                }
                Err(e) => tracing::warn!(error = %e, "could not load stored embeddings"),
            }
            tracing::info!(vectors = index.len(), dim = profile.dim, "vector index ready");
            *self.vector_index.write().await = Some(index);
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub fn chain(&self) -> &Arc<ProviderChain> {
        &self.chain
    }

    pub fn working_memory(&self) -> &WorkingMemory {
        &self.working_memory
    }

    pub fn archival(&self) -> &Arc<ArchivalManager> {
        &self.archival
    }

    pub fn graph(&self) -> &CausalGraph {
        &self.graph
    }

    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    pub fn indexer(&self) -> &Indexer {
        &self.indexer
    }

    // ========================================================================
    // Embedding helpers
    // ========================================================================

    async fn embed_query_cached(&self, query: &str) -> Result<Option<Vec<f32>>> {
        if let Some(cached) = self
            .query_cache
            .lock()
            .expect("query cache lock")
            .get(query)
            .cloned()
        {
            return Ok(cached);
        }
        let vector = self.chain.embed_query(query).await?;
        self.query_cache
            .lock()
            .expect("query cache lock")
            .put(query.to_string(), vector.clone());
        Ok(vector)
    }

    #[cfg(feature = "vector-search")]
    async fn vector_candidates(&self, query_vec: &[f32], limit: usize) -> Vec<(i64, f64)> {
        let guard = self.vector_index.read().await;
        match guard.as_ref() {
            Some(index) => index.search(query_vec, limit).unwrap_or_default(),
            None => vec![],
        }
    }

    #[cfg(not(feature = "vector-search"))]
    async fn vector_candidates(&self, _query_vec: &[f32], _limit: usize) -> Vec<(i64, f64)> {
        vec![]
    }

    #[cfg(feature = "vector-search")]
    async fn index_vector(&self, memory_id: i64, vector: &[f32]) {
        let mut guard = self.vector_index.write().await;
        if let Some(index) = guard.as_mut() {
            if let Err(e) = index.upsert(memory_id, vector) {
                tracing::warn!(memory_id, error = %e, "vector index upsert failed");
            }
        }
    }

    #[cfg(not(feature = "vector-search"))]
    async fn index_vector(&self, _memory_id: i64, _vector: &[f32]) {}

    #[cfg(feature = "vector-search")]
    async fn unindex_vector(&self, memory_id: i64) {
        let mut guard = self.vector_index.write().await;
        if let Some(index) = guard.as_mut() {
            let _ = index.remove(memory_id);
        }
    }

    #[cfg(not(feature = "vector-search"))]
    async fn unindex_vector(&self, _memory_id: i64) {}

    /// Embed and persist the vector for a row; sets the embedding status
    async fn embed_and_store(&self, memory_id: i64, content: &str) -> Result<bool> {
        match self.chain.embed_document(content).await {
            Ok(Some(vector)) => {
                let profile = self.chain.profile().await;
                self.store.upsert_embedding(memory_id, &vector, &profile)?;
                self.index_vector(memory_id, &vector).await;
                self.store
                    .set_embedding_status(memory_id, EmbeddingStatus::Success)?;
                Ok(true)
            }
            Ok(None) => {
                // Lexical-only: leave the row pending so a later scan
                // embeds it once a provider is back.
                Ok(false)
            }
            Err(e) => {
                tracing::warn!(memory_id, error = %e, "embedding failed");
                self.store
                    .set_embedding_status(memory_id, EmbeddingStatus::Failed)?;
                Ok(false)
            }
        }
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// Hybrid search: vector + keyword + causal-graph sources, RRF fusion,
    /// then intent-weighted ranking over the six factors.
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        if request.query.trim().is_empty() {
            return Err(MemoryError::new(ErrorCode::EmptyQuery, "query must be non-empty"));
        }
        let fetch = request.limit.max(1) * SOURCE_FETCH_MULTIPLIER;

        // Vector source
        let query_vec = self.embed_query_cached(&request.query).await?;
        let vector_list = match &query_vec {
            Some(vec) => self.vector_candidates(vec, fetch).await,
            None => vec![],
        };

        // Keyword source
        let sanitized = sanitize_fts5_query(&request.query);
        let fts_list = if sanitized.is_empty() {
            vec![]
        } else {
            self.store.search_keyword(&sanitized, fetch)?
        };

        // Graph source: causal neighbors of the strongest seeds
        let mut graph_list: Vec<(i64, f64)> = Vec::new();
        let seeds: Vec<i64> = vector_list
            .iter()
            .chain(fts_list.iter())
            .map(|(id, _)| *id)
            .take(GRAPH_SEED_COUNT)
            .collect();
        for seed in seeds {
            let neighborhood = self.store.get_all_edges(seed)?;
            for edge in neighborhood.outgoing.iter().chain(neighborhood.incoming.iter()) {
                let neighbor = if edge.source_id == seed {
                    edge.target_id
                } else {
                    edge.source_id
                };
                if !graph_list.iter().any(|(id, _)| *id == neighbor) {
                    graph_list.push((neighbor, edge.strength));
                }
            }
        }
        graph_list.sort_by(|a, b| b.1.total_cmp(&a.1));
        graph_list.truncate(fetch);

        // Fuse
        let fusion_opts = FusionOptions {
            enabled: self.config.enable_rrf_fusion,
            ..FusionOptions::default()
        };
        let fused = unified_search(&vector_list, &fts_list, &graph_list, &fusion_opts);

        // Intent weights
        let intent = match request.intent {
            Some(forced) => Some(QueryWeights {
                intent: forced,
                confidence: 1.0,
                fallback: false,
                weights: crate::search::intent_weights(forced),
            }),
            None if request.auto_detect_intent => {
                Some(get_query_weights(&request.query, &RankWeights::default()))
            }
            None => None,
        };
        let weights = intent
            .as_ref()
            .map(|i| i.weights)
            .unwrap_or_default();

        // Score and join
        let max_rrf = fused
            .results
            .iter()
            .map(|r| r.rrf_score)
            .fold(0.0_f64, f64::max)
            .max(f64::EPSILON);
        let now = chrono::Utc::now();

        let mut hits: Vec<SearchHit> = Vec::new();
        for fused_result in &fused.results {
            let Some(record) = self.store.get_memory(fused_result.id)? else {
                continue;
            };
            if record.is_archived != ArchivalState::Active {
                continue;
            }
            if let Some(folder) = &request.spec_folder {
                if record.spec_folder != *folder {
                    continue;
                }
            }

            let similarity = fused_result
                .vector_rank
                .and_then(|_| vector_list.iter().find(|(id, _)| *id == fused_result.id))
                .map(|(_, sim)| *sim);

            let rrf_norm = if fused.metadata.fusion_applied {
                fused_result.rrf_score / max_rrf
            } else {
                // Bypassed fusion carries no scores; fall back to rank order
                1.0 / fused_result
                    .vector_rank
                    .or(fused_result.fts_rank)
                    .or(fused_result.graph_rank)
                    .unwrap_or(1) as f64
            };

            let final_score = score_record(&record, similarity, rrf_norm, now, &weights);
            hits.push(SearchHit {
                memory: record,
                final_score,
                rrf_score: fused_result.rrf_score,
                similarity,
                in_vector: fused_result.in_vector,
                in_fts: fused_result.in_fts,
                in_graph: fused_result.in_graph,
            });
        }

        hits.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
        hits.truncate(request.limit.max(1));

        for hit in &hits {
            self.store.touch_last_accessed(hit.memory.id)?;
        }

        Ok(SearchResponse {
            results: hits,
            intent,
            fusion: fused.metadata,
            lexical_only: self.chain.is_bm25_only().await,
        })
    }

    // ========================================================================
    // Save
    // ========================================================================

    /// Gate candidates for new content: vector neighbors with their rows
    async fn gate_candidates(&self, content: &str) -> Result<Vec<GateCandidate>> {
        let Some(vector) = self.chain.embed_document(content).await.ok().flatten() else {
            return Ok(vec![]);
        };
        let neighbors = self.vector_candidates(&vector, 10).await;
        let mut candidates = Vec::new();
        for (id, similarity) in neighbors {
            if let Some(record) = self.store.get_memory(id)? {
                if record.is_archived == ArchivalState::Active {
                    candidates.push(GateCandidate {
                        id,
                        similarity: similarity.clamp(0.0, 1.0),
                        content: record.content,
                    });
                }
            }
        }
        Ok(candidates)
    }

    /// The save pipeline: preflight -> gate -> persist (+ causal edges)
    pub async fn save(&self, request: SaveRequest) -> Result<SaveOutcome> {
        let mut candidates = self.gate_candidates(&request.content).await?;

        let preflight_input = PreflightInput {
            content: &request.content,
            file_path: &request.file_path,
            spec_folder: &request.spec_folder,
            store: Some(&self.store),
            similar_top: candidates
                .first()
                .map(|c| (c.id, c.similarity)),
        };
        let preflight_opts = PreflightOptions {
            dry_run: request.dry_run,
            check_duplicates: !request.force,
            ..PreflightOptions::default()
        };
        let preflight = run_preflight(&preflight_input, &preflight_opts)?;

        // An exact hash duplicate is the gate's REINFORCE case, not a block
        if let Some(dup) = preflight.duplicates.as_ref() {
            if dup.duplicate_type == Some("exact") {
                if let (Some(id), Some(existing)) =
                    (dup.existing_id, dup.existing_id.and_then(|id| self.store.get_memory(id).ok().flatten()))
                {
                    if !candidates.iter().any(|c| c.id == id) {
                        candidates.push(GateCandidate {
                            id,
                            similarity: 1.0,
                            content: existing.content,
                        });
                    } else if let Some(c) = candidates.iter_mut().find(|c| c.id == id) {
                        c.similarity = 1.0;
                    }
                }
            }
        }

        let blocking: Vec<_> = preflight
            .errors
            .iter()
            .filter(|e| e.code != crate::errors::PreflightCode::DuplicateExact)
            .collect();
        let would_block = if preflight.dry_run {
            preflight.dry_run_would_pass == Some(false) && !blocking.is_empty()
        } else {
            !blocking.is_empty()
        };
        if would_block && !request.dry_run {
            return Ok(SaveOutcome {
                saved: false,
                dry_run: false,
                blocked_by_preflight: true,
                preflight,
                decision: None,
                memory_id: None,
                superseded_id: None,
                linked_ids: vec![],
            });
        }

        let decision = if request.force {
            GateDecision {
                action: MemoryAction::Create,
                reason: "Forced create".to_string(),
                similarity: 0.0,
                candidate: None,
                contradiction: None,
                related_ids: None,
            }
        } else {
            evaluate_memory(&candidates, &request.content, true)
        };

        if request.dry_run {
            return Ok(SaveOutcome {
                saved: false,
                dry_run: true,
                blocked_by_preflight: would_block,
                preflight,
                decision: Some(decision),
                memory_id: None,
                superseded_id: None,
                linked_ids: vec![],
            });
        }

        if let Some(record) = decision.conflict_record(&request.spec_folder, &request.content) {
            self.store.insert_conflict(&record)?;
        }

        let outcome = self.apply_decision(&request, &decision).await?;
        Ok(SaveOutcome {
            saved: true,
            dry_run: false,
            blocked_by_preflight: false,
            preflight,
            decision: Some(decision),
            memory_id: outcome.0,
            superseded_id: outcome.1,
            linked_ids: outcome.2,
        })
    }

    async fn apply_decision(
        &self,
        request: &SaveRequest,
        decision: &GateDecision,
    ) -> Result<(Option<i64>, Option<i64>, Vec<i64>)> {
        let upsert_for = |file_path: &str| MemoryUpsert {
            spec_folder: request.spec_folder.clone(),
            file_path: file_path.to_string(),
            title: request
                .title
                .clone()
                .unwrap_or_else(|| title_from_content(&request.content)),
            content: request.content.clone(),
            content_hash: content_hash_str(&request.content),
            file_mtime_ms: None,
            importance_tier: request.importance_tier,
            importance_weight: None,
            trigger_phrases: request.trigger_phrases.clone(),
        };

        match decision.action {
            MemoryAction::Reinforce => {
                let candidate = decision
                    .candidate
                    .as_ref()
                    .expect("reinforce always has a candidate");
                // No new memory and no new embedding; just strengthen
                self.store.touch_last_accessed(candidate.id)?;
                Ok((Some(candidate.id), None, vec![]))
            }
            MemoryAction::Update => {
                let candidate = decision
                    .candidate
                    .as_ref()
                    .expect("update always has a candidate");
                let existing = self.store.get_memory(candidate.id)?.ok_or_else(|| {
                    MemoryError::new(
                        ErrorCode::MemoryNotFound,
                        format!("gate candidate {} vanished", candidate.id),
                    )
                })?;
                let record = self.store.upsert_memory(&upsert_for(&existing.file_path))?;
                self.embed_and_store(record.id, &request.content).await?;
                Ok((Some(record.id), None, vec![]))
            }
            MemoryAction::Supersede => {
                let candidate = decision
                    .candidate
                    .as_ref()
                    .expect("supersede always has a candidate");
                let record = self.store.upsert_memory(&upsert_for(&request.file_path))?;
                self.embed_and_store(record.id, &request.content).await?;

                self.store.insert_edge(&NewEdge {
                    source_id: record.id,
                    target_id: candidate.id,
                    relation: CausalRelation::Supersedes,
                    strength: decision.similarity.clamp(0.0, 1.0),
                    evidence: decision
                        .contradiction
                        .as_ref()
                        .and_then(|c| c.pattern.clone()),
                })?;
                self.store.set_archival_state(
                    candidate.id,
                    ArchivalState::Archived,
                    Some(chrono::Utc::now()),
                )?;
                self.unindex_vector(candidate.id).await;
                Ok((Some(record.id), Some(candidate.id), vec![]))
            }
            MemoryAction::CreateLinked => {
                let record = self.store.upsert_memory(&upsert_for(&request.file_path))?;
                self.embed_and_store(record.id, &request.content).await?;

                let related = decision.related_ids.clone().unwrap_or_default();
                let mut linked = Vec::new();
                for target in related {
                    if target == record.id {
                        continue;
                    }
                    let edge = NewEdge {
                        source_id: record.id,
                        target_id: target,
                        relation: CausalRelation::Supports,
                        strength: decision.similarity.clamp(0.0, 1.0),
                        evidence: None,
                    };
                    match self.store.insert_edge(&edge) {
                        Ok(_) => linked.push(target),
                        Err(e) => tracing::debug!(target, error = %e, "link skipped"),
                    }
                }
                Ok((Some(record.id), None, linked))
            }
            MemoryAction::Create => {
                let record = self.store.upsert_memory(&upsert_for(&request.file_path))?;
                self.embed_and_store(record.id, &request.content).await?;
                Ok((Some(record.id), None, vec![]))
            }
        }
    }

    /// Re-embed one memory's current content; true when a vector was stored
    pub async fn reembed(&self, id: i64) -> Result<bool> {
        let record = self.store.get_memory(id)?.ok_or_else(|| {
            MemoryError::new(ErrorCode::MemoryNotFound, format!("memory {id} not found"))
        })?;
        self.embed_and_store(id, &record.content).await
    }

    // ========================================================================
    // Delete
    // ========================================================================

    /// Explicit delete: row, embedding, FTS entry, edges, vector index
    pub async fn delete_memory(&self, id: i64) -> Result<bool> {
        self.unindex_vector(id).await;
        self.store.delete_memory(id)
    }

    // ========================================================================
    // Folder scan
    // ========================================================================

    /// Walk a spec-folder root, reconcile the index, embed changed files
    pub async fn scan_folder(&self, root: &Path, force: bool) -> Result<ScanReport> {
        if !root.is_dir() {
            return Err(MemoryError::new(
                ErrorCode::FileNotFound,
                format!("{} is not a directory", root.display()),
            ));
        }

        let mut files = Vec::new();
        collect_markdown_files(root, &mut files)?;
        let file_refs: Vec<&Path> = files.iter().map(|p| p.as_path()).collect();

        let categorized = self.indexer.categorize_files_for_indexing(&file_refs, force)?;
        let mut report = ScanReport {
            total_files: categorized.stats.total,
            unchanged: categorized.unchanged.len(),
            not_found: categorized.not_found.len(),
            fast_path_skips: categorized.stats.fast_path_skips,
            ..ScanReport::default()
        };

        // Refresh mtimes for touched-but-unchanged files
        let updates: Vec<(i64, i64)> = categorized
            .needs_mtime_update
            .iter()
            .map(|r| (r.memory_id, r.mtime_ms))
            .collect();
        report.mtimes_refreshed = self.indexer.batch_update_mtimes(&updates)?;

        for path_str in &categorized.needs_indexing {
            let path = Path::new(path_str);
            let Some(metadata) = self.indexer.get_file_metadata(path)? else {
                report.not_found += 1;
                continue;
            };
            let content = match std::fs::read_to_string(path) {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "unreadable file");
                    report.failed += 1;
                    continue;
                }
            };

            let spec_folder = path
                .strip_prefix(root)
                .ok()
                .and_then(|p| p.components().next())
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .unwrap_or_else(|| {
                    root.file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default()
                });

            let record = self.store.upsert_memory(&MemoryUpsert {
                spec_folder,
                file_path: path_str.clone(),
                title: title_from_content(&content),
                content: content.clone(),
                content_hash: metadata.content_hash,
                file_mtime_ms: Some(metadata.mtime_ms),
                importance_tier: None,
                importance_weight: None,
                trigger_phrases: vec![],
            })?;

            report.indexed += 1;
            if self.embed_and_store(record.id, &content).await? {
                report.embedded += 1;
            } else if self.chain.is_bm25_only().await {
                report.lexical_only += 1;
            } else {
                report.failed += 1;
            }
        }

        Ok(report)
    }

    // ========================================================================
    // Trigger matching
    // ========================================================================

    /// Match a message against stored trigger phrases (case-insensitive,
    /// whole-phrase substring)
    pub fn match_triggers(&self, message: &str) -> Result<Vec<TriggerMatch>> {
        let haystack = message.to_lowercase();
        let mut matches = Vec::new();

        for record in self.store.list_memories(None, false, 10_000, 0)? {
            for phrase in &record.trigger_phrases {
                let needle = phrase.trim().to_lowercase();
                if !needle.is_empty() && haystack.contains(&needle) {
                    matches.push(TriggerMatch {
                        memory_id: record.id,
                        phrase: phrase.clone(),
                        title: record.title.clone(),
                        file_path: record.file_path.clone(),
                    });
                }
            }
        }
        Ok(matches)
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Intent-weighted ranking over the six factors
fn score_record(
    record: &MemoryRecord,
    similarity: Option<f64>,
    rrf_norm: f64,
    now: chrono::DateTime<chrono::Utc>,
    weights: &RankWeights,
) -> f64 {
    let similarity_factor = similarity.unwrap_or(rrf_norm).clamp(0.0, 1.0);
    let importance = record.importance_weight.clamp(0.0, 1.0);

    let updated_days = (now - record.updated_at).num_days().max(0) as f64;
    let recency = (-updated_days / 30.0).exp();

    let popularity = 1.0 - (-(record.access_count as f64) / 10.0).exp();

    let tier_boost = match record.importance_tier {
        ImportanceTier::Normal => 0.0,
        ImportanceTier::Important => 1.0 / 3.0,
        ImportanceTier::Constitutional => 2.0 / 3.0,
        ImportanceTier::Critical => 1.0,
    };

    let accessed_days = (now - record.last_accessed).num_days().max(0) as f64;
    let retrievability = (-accessed_days / 90.0).exp();

    weights.similarity * similarity_factor
        + weights.importance * importance
        + weights.recency * recency
        + weights.popularity * popularity
        + weights.tier_boost * tier_boost
        + weights.retrievability * retrievability
}

/// First markdown heading, else the first non-empty line
fn title_from_content(content: &str) -> String {
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let title = trimmed.trim_start_matches('#').trim();
        if !title.is_empty() {
            return title.chars().take(120).collect();
        }
    }
    "Untitled".to_string()
}

fn collect_markdown_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_markdown_files(&path, out)?;
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("md" | "markdown")
        ) {
            out.push(path);
        }
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{EmbeddingProvider, ProviderTier};
    use tempfile::TempDir;

    /// Engine pinned to the lexical sentinel: deterministic, no models
    async fn lexical_engine() -> (MemoryEngine, TempDir) {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::default();
        let chain = Arc::new(ProviderChain::with_provider(
            config.clone(),
            EmbeddingProvider::Lexical,
            ProviderTier::Tertiary,
        ));
        let engine =
            MemoryEngine::with_chain(config, Some(dir.path().join("test.db")), chain).unwrap();
        (engine, dir)
    }

    #[tokio::test]
    async fn test_save_and_keyword_search() {
        let (engine, _dir) = lexical_engine().await;

        let outcome = engine
            .save(SaveRequest::new(
                "Retry failed requests with exponential backoff.",
                "net/retry.md",
                "net",
            ))
            .await
            .unwrap();
        assert!(outcome.saved);
        assert_eq!(
            outcome.decision.as_ref().unwrap().action,
            MemoryAction::Create
        );
        let id = outcome.memory_id.unwrap();

        let response = engine
            .search(SearchRequest::new("exponential backoff"))
            .await
            .unwrap();
        assert!(response.lexical_only);
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].memory.id, id);
        assert!(response.results[0].in_fts);
        assert!(!response.fusion.fusion_applied);
    }

    #[tokio::test]
    async fn test_duplicate_save_reinforces_without_new_memory() {
        let (engine, _dir) = lexical_engine().await;
        let content = "Use strict equality";

        let first = engine
            .save(SaveRequest::new(content, "style/eq.md", "style"))
            .await
            .unwrap();
        let first_id = first.memory_id.unwrap();

        let second = engine
            .save(SaveRequest::new(content, "style/eq-again.md", "style"))
            .await
            .unwrap();
        let decision = second.decision.as_ref().unwrap();
        assert_eq!(decision.action, MemoryAction::Reinforce);
        assert!((decision.similarity - 1.0).abs() < 1e-9);
        assert_eq!(second.memory_id, Some(first_id));

        // No new memory row was created
        assert_eq!(engine.store().stats().unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_dry_run_persists_nothing() {
        let (engine, _dir) = lexical_engine().await;
        let outcome = engine
            .save(SaveRequest {
                dry_run: true,
                ..SaveRequest::new("A reasonable decision to record.", "f/a.md", "f")
            })
            .await
            .unwrap();
        assert!(!outcome.saved);
        assert!(outcome.dry_run);
        assert!(outcome.decision.is_some());
        assert_eq!(engine.store().stats().unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_preflight_blocks_bad_content() {
        let (engine, _dir) = lexical_engine().await;
        let outcome = engine
            .save(SaveRequest::new("tiny", "f/a.md", "f"))
            .await
            .unwrap();
        assert!(!outcome.saved);
        assert!(outcome.blocked_by_preflight);
        assert_eq!(engine.store().stats().unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_force_skips_gate() {
        let (engine, _dir) = lexical_engine().await;
        let content = "Use strict equality";
        engine
            .save(SaveRequest::new(content, "f/a.md", "f"))
            .await
            .unwrap();

        let forced = engine
            .save(SaveRequest {
                force: true,
                ..SaveRequest::new(content, "f/b.md", "f")
            })
            .await
            .unwrap();
        assert!(forced.saved);
        assert_eq!(
            forced.decision.as_ref().unwrap().reason,
            "Forced create"
        );
        assert_eq!(engine.store().stats().unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_trigger_matching() {
        let (engine, _dir) = lexical_engine().await;
        engine
            .save(SaveRequest {
                trigger_phrases: vec!["strict equality".to_string()],
                ..SaveRequest::new("Always compare with strict equality.", "f/eq.md", "f")
            })
            .await
            .unwrap();

        let matches = engine
            .match_triggers("should we use Strict Equality here?")
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].phrase, "strict equality");

        assert!(engine.match_triggers("unrelated message").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scan_folder_indexes_markdown() {
        let (engine, dir) = lexical_engine().await;
        let specs = dir.path().join("specs");
        std::fs::create_dir_all(specs.join("auth")).unwrap();
        std::fs::write(
            specs.join("auth/decision.md"),
            "# Token refresh\nRefresh tokens rotate on every use.",
        )
        .unwrap();
        std::fs::write(specs.join("auth/notes.txt"), "ignored").unwrap();

        let report = engine.scan_folder(&specs, false).await.unwrap();
        assert_eq!(report.total_files, 1);
        assert_eq!(report.indexed, 1);
        assert_eq!(report.lexical_only, 1);

        let record = engine
            .store()
            .get_memory_by_path(&specs.join("auth/decision.md").to_string_lossy())
            .unwrap()
            .unwrap();
        assert_eq!(record.title, "Token refresh");
        assert_eq!(record.spec_folder, "auth");

        // Second scan: the row is still pending (no embedding provider),
        // so it is picked up again rather than fast-pathed
        let again = engine.scan_folder(&specs, false).await.unwrap();
        assert_eq!(again.indexed, 1);
        assert_eq!(again.fast_path_skips, 0);
    }

    #[tokio::test]
    async fn test_delete_memory_cleans_up() {
        let (engine, _dir) = lexical_engine().await;
        let outcome = engine
            .save(SaveRequest::new("Content worth deleting later.", "f/a.md", "f"))
            .await
            .unwrap();
        let id = outcome.memory_id.unwrap();

        assert!(engine.delete_memory(id).await.unwrap());
        assert!(engine.store().get_memory(id).unwrap().is_none());
        assert!(!engine.delete_memory(id).await.unwrap());
    }

    #[test]
    fn test_title_extraction() {
        assert_eq!(title_from_content("# Heading\nbody"), "Heading");
        assert_eq!(title_from_content("\n\nplain first line\nmore"), "plain first line");
        assert_eq!(title_from_content(""), "Untitled");
    }

    #[test]
    fn test_score_record_prefers_protected_tiers_on_tier_factor() {
        let now = chrono::Utc::now();
        let base = MemoryRecord {
            id: 1,
            spec_folder: "f".to_string(),
            file_path: "f/a.md".to_string(),
            title: "t".to_string(),
            importance_tier: ImportanceTier::Normal,
            importance_weight: 0.5,
            content: "c".to_string(),
            content_hash: "h".to_string(),
            file_mtime_ms: None,
            embedding_status: EmbeddingStatus::Success,
            trigger_phrases: vec![],
            created_at: now,
            updated_at: now,
            last_accessed: now,
            access_count: 0,
            is_archived: ArchivalState::Active,
            archived_at: None,
        };
        let critical = MemoryRecord {
            importance_tier: ImportanceTier::Critical,
            ..base.clone()
        };

        let weights = RankWeights::default();
        let normal_score = score_record(&base, Some(0.8), 0.8, now, &weights);
        let critical_score = score_record(&critical, Some(0.8), 0.8, now, &weights);
        assert!(critical_score > normal_score);
    }
}
