//! Vector Search
//!
//! HNSW (Hierarchical Navigable Small World) index over memory ids via
//! USearch. Cosine metric; distances come back as `1 - similarity`.

use std::collections::HashSet;

use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use crate::errors::{ErrorCode, MemoryError, Result};

// ============================================================================
// CONSTANTS
// ============================================================================

/// HNSW connectivity parameter (higher = better recall, more memory)
pub const DEFAULT_CONNECTIVITY: usize = 16;

/// HNSW expansion factor for index building
pub const DEFAULT_EXPANSION_ADD: usize = 128;

/// HNSW expansion factor for search (higher = better recall, slower)
pub const DEFAULT_EXPANSION_SEARCH: usize = 64;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the vector index
#[derive(Debug, Clone)]
pub struct VectorIndexConfig {
    /// Number of dimensions; must match the active provider profile
    pub dimensions: usize,
    pub connectivity: usize,
    pub expansion_add: usize,
    pub expansion_search: usize,
}

impl VectorIndexConfig {
    pub fn for_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions,
            connectivity: DEFAULT_CONNECTIVITY,
            expansion_add: DEFAULT_EXPANSION_ADD,
            expansion_search: DEFAULT_EXPANSION_SEARCH,
        }
    }
}

/// Index statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct VectorIndexStats {
    pub total_vectors: usize,
    pub dimensions: usize,
    pub connectivity: usize,
}

// ============================================================================
// VECTOR INDEX
// ============================================================================

/// In-memory HNSW index keyed by memory id.
///
/// Rebuilt from the embedding column at startup; the store remains the
/// durable owner of vectors.
pub struct VectorIndex {
    index: Index,
    config: VectorIndexConfig,
    keys: HashSet<i64>,
}

impl VectorIndex {
    pub fn new(dimensions: usize) -> Result<Self> {
        Self::with_config(VectorIndexConfig::for_dimensions(dimensions))
    }

    pub fn with_config(config: VectorIndexConfig) -> Result<Self> {
        let options = IndexOptions {
            dimensions: config.dimensions,
            metric: MetricKind::Cos,
            quantization: ScalarKind::I8,
            connectivity: config.connectivity,
            expansion_add: config.expansion_add,
            expansion_search: config.expansion_search,
            multi: false,
        };

        let index = Index::new(&options).map_err(|e| {
            MemoryError::new(ErrorCode::VectorIndexUnavailable, e.to_string())
        })?;

        Ok(Self {
            index,
            config,
            keys: HashSet::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.index.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    pub fn contains(&self, memory_id: i64) -> bool {
        self.keys.contains(&memory_id)
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.config.dimensions {
            return Err(MemoryError::new(
                ErrorCode::EmbeddingDimensionMismatch,
                format!(
                    "vector has {} dimensions, index expects {}",
                    vector.len(),
                    self.config.dimensions
                ),
            ));
        }
        Ok(())
    }

    fn reserve(&self, capacity: usize) -> Result<()> {
        self.index.reserve(capacity).map_err(|e| {
            MemoryError::new(
                ErrorCode::VectorIndexUnavailable,
                format!("failed to reserve capacity: {e}"),
            )
        })
    }

    /// Insert or replace the vector for a memory id
    pub fn upsert(&mut self, memory_id: i64, vector: &[f32]) -> Result<()> {
        self.check_dimensions(vector)?;
        let key = memory_id as u64;

        if self.keys.contains(&memory_id) {
            self.index
                .remove(key)
                .map_err(|e| MemoryError::new(ErrorCode::VectorIndexUnavailable, e.to_string()))?;
            self.reserve(self.index.size() + 1)?;
        } else {
            // usearch requires reserve() before add()
            let capacity = self.index.capacity();
            let size = self.index.size();
            if size >= capacity {
                self.reserve(std::cmp::max(capacity * 2, 16))?;
            }
        }

        self.index
            .add(key, vector)
            .map_err(|e| MemoryError::new(ErrorCode::VectorIndexUnavailable, e.to_string()))?;
        self.keys.insert(memory_id);
        Ok(())
    }

    /// Remove a memory's vector; false when it was not indexed
    pub fn remove(&mut self, memory_id: i64) -> Result<bool> {
        if !self.keys.remove(&memory_id) {
            return Ok(false);
        }
        self.index
            .remove(memory_id as u64)
            .map_err(|e| MemoryError::new(ErrorCode::VectorIndexUnavailable, e.to_string()))?;
        Ok(true)
    }

    /// Nearest neighbors by cosine similarity, descending
    pub fn search(&self, query: &[f32], limit: usize) -> Result<Vec<(i64, f64)>> {
        self.check_dimensions(query)?;
        if self.is_empty() {
            return Ok(vec![]);
        }

        let matches = self
            .index
            .search(query, limit)
            .map_err(|e| MemoryError::new(ErrorCode::SearchFailed, e.to_string()))?;

        let mut out = Vec::with_capacity(matches.keys.len());
        for (key, distance) in matches.keys.iter().zip(matches.distances.iter()) {
            out.push((*key as i64, (1.0 - distance) as f64));
        }
        Ok(out)
    }

    /// Neighbors at or above a similarity floor
    pub fn search_with_threshold(
        &self,
        query: &[f32],
        limit: usize,
        min_similarity: f64,
    ) -> Result<Vec<(i64, f64)>> {
        let results = self.search(query, limit)?;
        Ok(results
            .into_iter()
            .filter(|(_, score)| *score >= min_similarity)
            .collect())
    }

    pub fn stats(&self) -> VectorIndexStats {
        VectorIndexStats {
            total_vectors: self.len(),
            dimensions: self.config.dimensions,
            connectivity: self.config.connectivity,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
