//! Duplicate Detection
//!
//! Exact duplicates match on the SHA-256 content hash against the index.
//! Similar duplicates come from a caller-supplied nearest-neighbor hit at
//! or above the similarity threshold (the caller runs the vector search;
//! this check stays synchronous and storage-only).

use serde::Serialize;

use crate::errors::Result;
use crate::indexer::content_hash_str;
use crate::storage::MemoryStore;

/// Default similarity at or above which content counts as a near-duplicate
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.95;

/// Result of the duplicate check
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateReport {
    pub is_duplicate: bool,
    /// "exact" or "similar" when a duplicate was found
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    /// Always returned so the caller can reuse it for the save
    pub content_hash: String,
}

/// Check for exact and near duplicates.
///
/// `similar_top` is the best nearest-neighbor hit for the candidate
/// content, if the caller ran one: (memory id, similarity).
pub fn check_duplicates(
    store: &MemoryStore,
    content: &str,
    similar_top: Option<(i64, f64)>,
    similarity_threshold: f64,
) -> Result<DuplicateReport> {
    let hash = content_hash_str(content);

    if let Some(existing) = store.find_by_content_hash(&hash)? {
        return Ok(DuplicateReport {
            is_duplicate: true,
            duplicate_type: Some("exact"),
            existing_id: Some(existing.id),
            existing_path: Some(existing.file_path),
            similarity: Some(1.0),
            content_hash: hash,
        });
    }

    if let Some((id, similarity)) = similar_top {
        if similarity >= similarity_threshold {
            let existing_path = store.get_memory(id)?.map(|m| m.file_path);
            return Ok(DuplicateReport {
                is_duplicate: true,
                duplicate_type: Some("similar"),
                existing_id: Some(id),
                existing_path,
                similarity: Some(similarity),
                content_hash: hash,
            });
        }
    }

    Ok(DuplicateReport {
        is_duplicate: false,
        duplicate_type: None,
        existing_id: None,
        existing_path: None,
        similarity: None,
        content_hash: hash,
    })
}

// ============================================================================
// TESTS
// ============================================================================
