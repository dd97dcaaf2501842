//! Storage Row Types
//!
//! The memory index row is the single source of truth for a memory; the
//! embedding table, FTS index, and edge store reference it by id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// ENUMERATIONS
// ============================================================================

/// Importance tier of a memory.
///
/// `constitutional` and `critical` are protected: never eligible for
/// archival regardless of age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportanceTier {
    Normal,
    Important,
    Constitutional,
    Critical,
}

impl ImportanceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportanceTier::Normal => "normal",
            ImportanceTier::Important => "important",
            ImportanceTier::Constitutional => "constitutional",
            ImportanceTier::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> ImportanceTier {
        match s {
            "important" => ImportanceTier::Important,
            "constitutional" => ImportanceTier::Constitutional,
            "critical" => ImportanceTier::Critical,
            _ => ImportanceTier::Normal,
        }
    }

    /// Protected tiers are excluded from archival
    pub fn is_protected(&self) -> bool {
        matches!(self, ImportanceTier::Constitutional | ImportanceTier::Critical)
    }
}

/// Embedding lifecycle of a memory row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingStatus {
    Pending,
    Success,
    Failed,
}

impl EmbeddingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingStatus::Pending => "pending",
            EmbeddingStatus::Success => "success",
            EmbeddingStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> EmbeddingStatus {
        match s {
            "success" => EmbeddingStatus::Success,
            "failed" => EmbeddingStatus::Failed,
            _ => EmbeddingStatus::Pending,
        }
    }
}

/// Archival state stored as an integer: 0 active, 1 archived, 2 soft-deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchivalState {
    Active,
    Archived,
    SoftDeleted,
}

impl ArchivalState {
    pub fn as_i64(&self) -> i64 {
        match self {
            ArchivalState::Active => 0,
            ArchivalState::Archived => 1,
            ArchivalState::SoftDeleted => 2,
        }
    }

    pub fn from_i64(v: i64) -> ArchivalState {
        match v {
            1 => ArchivalState::Archived,
            2 => ArchivalState::SoftDeleted,
            _ => ArchivalState::Active,
        }
    }
}

// ============================================================================
// ROWS
// ============================================================================

/// A full memory row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: i64,
    pub spec_folder: String,
    pub file_path: String,
    pub title: String,
    pub importance_tier: ImportanceTier,
    pub importance_weight: f64,
    pub content: String,
    /// SHA-256 hex of the file bytes
    pub content_hash: String,
    /// File mtime in ms since epoch, when known
    pub file_mtime_ms: Option<i64>,
    pub embedding_status: EmbeddingStatus,
    pub trigger_phrases: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: i64,
    pub is_archived: ArchivalState,
    pub archived_at: Option<DateTime<Utc>>,
}

/// Input for creating or updating a memory row by file path
#[derive(Debug, Clone, Default)]
pub struct MemoryUpsert {
    pub spec_folder: String,
    pub file_path: String,
    pub title: String,
    pub content: String,
    pub content_hash: String,
    pub file_mtime_ms: Option<i64>,
    pub importance_tier: Option<ImportanceTier>,
    pub importance_weight: Option<f64>,
    pub trigger_phrases: Vec<String>,
}

/// Index-wide counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexStats {
    pub total: i64,
    pub success: i64,
    pub pending: i64,
    pub failed: i64,
    pub archived: i64,
}

/// A stored embedding with its provider profile
#[derive(Debug, Clone)]
pub struct EmbeddingRecord {
    pub memory_id: i64,
    pub vector: Vec<f32>,
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protected_tiers() {
        assert!(ImportanceTier::Constitutional.is_protected());
        assert!(ImportanceTier::Critical.is_protected());
        assert!(!ImportanceTier::Normal.is_protected());
        assert!(!ImportanceTier::Important.is_protected());
    }

    #[test]
    fn test_tier_round_trip() {
        for tier in [
            ImportanceTier::Normal,
            ImportanceTier::Important,
            ImportanceTier::Constitutional,
            ImportanceTier::Critical,
        ] {
            assert_eq!(ImportanceTier::parse(tier.as_str()), tier);
        }
        assert_eq!(ImportanceTier::parse("unknown"), ImportanceTier::Normal);
    }

    #[test]
    fn test_archival_state_round_trip() {
        for state in [
            ArchivalState::Active,
            ArchivalState::Archived,
            ArchivalState::SoftDeleted,
        ] {
            assert_eq!(ArchivalState::from_i64(state.as_i64()), state);
        }
    }
}
