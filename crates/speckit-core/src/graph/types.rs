//! Causal Graph Types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The closed set of causal relations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CausalRelation {
    Caused,
    Enabled,
    Supersedes,
    Contradicts,
    DerivedFrom,
    Supports,
}

impl CausalRelation {
    pub const ALL: &'static [CausalRelation] = &[
        CausalRelation::Caused,
        CausalRelation::Enabled,
        CausalRelation::Supersedes,
        CausalRelation::Contradicts,
        CausalRelation::DerivedFrom,
        CausalRelation::Supports,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CausalRelation::Caused => "caused",
            CausalRelation::Enabled => "enabled",
            CausalRelation::Supersedes => "supersedes",
            CausalRelation::Contradicts => "contradicts",
            CausalRelation::DerivedFrom => "derived_from",
            CausalRelation::Supports => "supports",
        }
    }

    pub fn parse(s: &str) -> Option<CausalRelation> {
        Self::ALL.iter().copied().find(|r| r.as_str() == s)
    }
}

impl std::fmt::Display for CausalRelation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored causal edge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CausalEdge {
    pub id: i64,
    pub source_id: i64,
    pub target_id: i64,
    pub relation: CausalRelation,
    pub strength: f64,
    pub evidence: Option<String>,
    pub extracted_at: DateTime<Utc>,
}

/// Input for inserting an edge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEdge {
    pub source_id: i64,
    pub target_id: i64,
    pub relation: CausalRelation,
    /// Strength in [0, 1]; defaults to 0.5
    #[serde(default = "default_strength")]
    pub strength: f64,
    #[serde(default)]
    pub evidence: Option<String>,
}

fn default_strength() -> f64 {
    0.5
}

/// Direction for chain traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraversalDirection {
    Outgoing,
    Incoming,
    Both,
}

/// Outcome of a batch insert; partial failure never aborts the batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchInsertResult {
    pub total: usize,
    pub inserted: usize,
    pub failed: usize,
    /// (input index, error message) per failure
    pub failures: Vec<(usize, String)>,
}

/// Graph-wide counters
#[derive(Debug, Clone, Serialize)]
pub struct GraphStats {
    pub total_edges: i64,
    pub edges_by_relation: Vec<(String, i64)>,
    pub distinct_sources: i64,
    pub distinct_targets: i64,
}
