//! Reciprocal Rank Fusion
//!
//! Merges ranked lists from the vector, keyword, and graph sources:
//!
//! score(d) = sum over sources s containing d of 1 / (k + rank_s(d)), k = 60
//!
//! Documents ranked by two or more sources receive a convergence bonus;
//! graph-sourced documents may receive a fixed additive boost. When only one
//! source has results, fusion is bypassed and the winning list is returned
//! as-is.

use serde::Serialize;

// ============================================================================
// OPTIONS
// ============================================================================

/// Fusion tuning
#[derive(Debug, Clone)]
pub struct FusionOptions {
    /// RRF dampening constant
    pub k: f64,
    /// Additive bonus when a document appears in two or more sources
    pub convergence_bonus: f64,
    /// Fixed additive boost for graph-sourced documents
    pub graph_boost: f64,
    /// Feature flag; disabled fusion falls back to single-source selection
    pub enabled: bool,
}

impl Default for FusionOptions {
    fn default() -> Self {
        Self {
            k: 60.0,
            convergence_bonus: 0.10,
            graph_boost: 0.05,
            enabled: true,
        }
    }
}

// ============================================================================
// RESULT TYPES
// ============================================================================

/// One fused document
#[derive(Debug, Clone, Serialize)]
pub struct FusedResult {
    pub id: i64,
    pub rrf_score: f64,
    pub source_count: usize,
    pub in_vector: bool,
    pub in_fts: bool,
    pub in_graph: bool,
    /// 1-based rank in the vector list, when present
    pub vector_rank: Option<usize>,
    pub fts_rank: Option<usize>,
    pub graph_rank: Option<usize>,
}

/// Per-source counts for result metadata
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceCounts {
    pub vector: usize,
    pub fts: usize,
    pub graph: usize,
}

/// Metadata describing how a unified search was assembled
#[derive(Debug, Clone, Serialize)]
pub struct FusionMetadata {
    pub fusion_applied: bool,
    pub active_sources: Vec<&'static str>,
    pub source_counts: SourceCounts,
}

/// Results plus how they were produced
#[derive(Debug, Clone, Serialize)]
pub struct UnifiedSearchResult {
    pub results: Vec<FusedResult>,
    pub metadata: FusionMetadata,
}

// ============================================================================
// FUSION
// ============================================================================

fn rank_of(list: &[(i64, f64)], id: i64) -> Option<usize> {
    list.iter().position(|(doc, _)| *doc == id).map(|i| i + 1)
}

fn fuse(
    vector: &[(i64, f64)],
    fts: &[(i64, f64)],
    graph: &[(i64, f64)],
    opts: &FusionOptions,
) -> Vec<FusedResult> {
    // Preserve first-seen order for deterministic tie-breaks
    let mut ids: Vec<i64> = Vec::new();
    for (id, _) in vector.iter().chain(fts.iter()).chain(graph.iter()) {
        if !ids.contains(id) {
            ids.push(*id);
        }
    }

    let mut results: Vec<FusedResult> = ids
        .into_iter()
        .map(|id| {
            let vector_rank = rank_of(vector, id);
            let fts_rank = rank_of(fts, id);
            let graph_rank = rank_of(graph, id);

            let mut score = 0.0;
            let mut source_count = 0;
            for rank in [vector_rank, fts_rank, graph_rank].into_iter().flatten() {
                score += 1.0 / (opts.k + rank as f64);
                source_count += 1;
            }
            if source_count >= 2 {
                score += opts.convergence_bonus;
            }
            if graph_rank.is_some() {
                score += opts.graph_boost;
            }

            FusedResult {
                id,
                rrf_score: score,
                source_count,
                in_vector: vector_rank.is_some(),
                in_fts: fts_rank.is_some(),
                in_graph: graph_rank.is_some(),
                vector_rank,
                fts_rank,
                graph_rank,
            }
        })
        .collect();

    results.sort_by(|a, b| b.rrf_score.total_cmp(&a.rrf_score).then(a.id.cmp(&b.id)));
    results
}

/// Pass a single source through unfused, keeping its native order
fn passthrough(
    list: &[(i64, f64)],
    tag: fn(&mut FusedResult, usize),
) -> Vec<FusedResult> {
    list.iter()
        .enumerate()
        .map(|(i, (id, _))| {
            let mut result = FusedResult {
                id: *id,
                rrf_score: 0.0,
                source_count: 1,
                in_vector: false,
                in_fts: false,
                in_graph: false,
                vector_rank: None,
                fts_rank: None,
                graph_rank: None,
            };
            tag(&mut result, i + 1);
            result
        })
        .collect()
}

fn tag_vector(r: &mut FusedResult, rank: usize) {
    r.in_vector = true;
    r.vector_rank = Some(rank);
}

fn tag_fts(r: &mut FusedResult, rank: usize) {
    r.in_fts = true;
    r.fts_rank = Some(rank);
}

fn tag_graph(r: &mut FusedResult, rank: usize) {
    r.in_graph = true;
    r.graph_rank = Some(rank);
}

/// Two-source fusion (vector + keyword)
pub fn fuse_results(
    vector: &[(i64, f64)],
    fts: &[(i64, f64)],
    opts: &FusionOptions,
) -> Vec<FusedResult> {
    fuse(vector, fts, &[], opts)
}

/// Three-source fusion (vector + keyword + graph)
pub fn fuse_results_multi(
    vector: &[(i64, f64)],
    fts: &[(i64, f64)],
    graph: &[(i64, f64)],
    opts: &FusionOptions,
) -> Vec<FusedResult> {
    fuse(vector, fts, graph, opts)
}

/// Merge the three sources, bypassing fusion when only one is non-empty or
/// when fusion is disabled (preference order: vector > fts > graph).
pub fn unified_search(
    vector: &[(i64, f64)],
    fts: &[(i64, f64)],
    graph: &[(i64, f64)],
    opts: &FusionOptions,
) -> UnifiedSearchResult {
    let mut active_sources = Vec::new();
    if !vector.is_empty() {
        active_sources.push("vector");
    }
    if !fts.is_empty() {
        active_sources.push("fts");
    }
    if !graph.is_empty() {
        active_sources.push("graph");
    }

    let source_counts = SourceCounts {
        vector: vector.len(),
        fts: fts.len(),
        graph: graph.len(),
    };

    let single_source = active_sources.len() <= 1;
    let fusion_applied = opts.enabled && !single_source;

    let results = if fusion_applied {
        fuse(vector, fts, graph, opts)
    } else if !vector.is_empty() {
        passthrough(vector, tag_vector)
    } else if !fts.is_empty() {
        passthrough(fts, tag_fts)
    } else {
        passthrough(graph, tag_graph)
    };

    UnifiedSearchResult {
        results,
        metadata: FusionMetadata {
            fusion_applied,
            active_sources,
            source_counts,
        },
    }
}

// ============================================================================
// TESTS
// ============================================================================
