//! Causal Edge Graph
//!
//! Typed directed edges between memories, plus the only cycle-aware reader
//! in the engine: a breadth-first chain traversal with a visited set and a
//! hard depth ceiling. The graph permits cycles by domain (back-edges of
//! `supports` are legitimate); traversal must terminate anyway.

mod types;

pub use types::{
    BatchInsertResult, CausalEdge, CausalRelation, GraphStats, NewEdge, TraversalDirection,
};

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;

use serde::Serialize;

use crate::errors::Result;
use crate::storage::MemoryStore;

/// Hard ceiling on traversal depth; caller requests are clamped to this
pub const MAX_TRAVERSAL_DEPTH: u32 = 10;

// ============================================================================
// RESULT TYPES
// ============================================================================

/// Incoming and outgoing edges of one memory
#[derive(Debug, Clone, Serialize)]
pub struct EdgeNeighborhood {
    pub incoming: Vec<CausalEdge>,
    pub outgoing: Vec<CausalEdge>,
    pub total: usize,
}

/// An edge found during traversal, with the depth it was reached at
#[derive(Debug, Clone, Serialize)]
pub struct ChainEdge {
    #[serde(flatten)]
    pub edge: CausalEdge,
    /// 1-based distance from the root at which this edge was expanded
    pub depth: u32,
}

/// Echo of the (clamped) traversal parameters
#[derive(Debug, Clone, Serialize)]
pub struct TraversalOptions {
    pub direction: TraversalDirection,
    pub relations: Option<Vec<CausalRelation>>,
    pub max_depth: u32,
}

/// A depth-limited causal chain from one root memory
#[derive(Debug, Clone, Serialize)]
pub struct CausalChain {
    pub root: i64,
    pub edges: Vec<ChainEdge>,
    pub by_relation: BTreeMap<&'static str, Vec<ChainEdge>>,
    pub traversal_options: TraversalOptions,
}

impl CausalChain {
    fn grouped(&self, relation: CausalRelation) -> &[ChainEdge] {
        self.by_relation
            .get(relation.as_str())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn by_cause(&self) -> &[ChainEdge] {
        self.grouped(CausalRelation::Caused)
    }

    pub fn by_enabled(&self) -> &[ChainEdge] {
        self.grouped(CausalRelation::Enabled)
    }

    pub fn by_derived_from(&self) -> &[ChainEdge] {
        self.grouped(CausalRelation::DerivedFrom)
    }

    pub fn by_supports(&self) -> &[ChainEdge] {
        self.grouped(CausalRelation::Supports)
    }

    pub fn by_supersedes(&self) -> &[ChainEdge] {
        self.grouped(CausalRelation::Supersedes)
    }

    pub fn by_contradicts(&self) -> &[ChainEdge] {
        self.grouped(CausalRelation::Contradicts)
    }
}

// ============================================================================
// GRAPH
// ============================================================================

/// Causal graph reader over the store
pub struct CausalGraph {
    store: Arc<MemoryStore>,
}

impl CausalGraph {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    /// Breadth-first chain traversal from `root`.
    ///
    /// `max_depth` is clamped to [`MAX_TRAVERSAL_DEPTH`]. A visited-node set
    /// bounds cycles: each node is expanded at most once.
    pub fn get_causal_chain(
        &self,
        root: i64,
        direction: TraversalDirection,
        relations: Option<&[CausalRelation]>,
        max_depth: u32,
    ) -> Result<CausalChain> {
        let max_depth = max_depth.min(MAX_TRAVERSAL_DEPTH);
        let relation_filter: Option<HashSet<CausalRelation>> =
            relations.map(|r| r.iter().copied().collect());

        let mut visited: HashSet<i64> = HashSet::new();
        let mut seen_edges: HashSet<i64> = HashSet::new();
        let mut edges: Vec<ChainEdge> = Vec::new();
        let mut queue: VecDeque<(i64, u32)> = VecDeque::new();

        visited.insert(root);
        queue.push_back((root, 0));

        while let Some((node, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }

            let mut frontier: Vec<CausalEdge> = Vec::new();
            if matches!(direction, TraversalDirection::Outgoing | TraversalDirection::Both) {
                frontier.extend(self.store.get_edges_from(node, None)?);
            }
            if matches!(direction, TraversalDirection::Incoming | TraversalDirection::Both) {
                frontier.extend(self.store.get_edges_to(node, None)?);
            }

            for edge in frontier {
                if let Some(filter) = &relation_filter {
                    if !filter.contains(&edge.relation) {
                        continue;
                    }
                }
                if !seen_edges.insert(edge.id) {
                    continue;
                }

                let neighbor = if edge.source_id == node {
                    edge.target_id
                } else {
                    edge.source_id
                };

                edges.push(ChainEdge {
                    edge,
                    depth: depth + 1,
                });

                if visited.insert(neighbor) {
                    queue.push_back((neighbor, depth + 1));
                }
            }
        }

        let mut by_relation: BTreeMap<&'static str, Vec<ChainEdge>> = BTreeMap::new();
        for chain_edge in &edges {
            by_relation
                .entry(chain_edge.edge.relation.as_str())
                .or_default()
                .push(chain_edge.clone());
        }

        Ok(CausalChain {
            root,
            edges,
            by_relation,
            traversal_options: TraversalOptions {
                direction,
                relations: relations.map(|r| r.to_vec()),
                max_depth,
            },
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
