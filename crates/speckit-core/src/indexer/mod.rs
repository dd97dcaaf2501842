//! Incremental Indexer
//!
//! Decides which files need (re)embedding. The mtime fast path skips hash
//! computation entirely; when the mtime moved but the bytes did not, only
//! the stored mtime is refreshed so the next pass takes the fast path again.

use std::path::Path;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use chrono::DateTime;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::errors::Result;
use crate::storage::{EmbeddingStatus, MemoryRecord, MemoryStore};

// ============================================================================
// HASHING
// ============================================================================

/// SHA-256 hex over raw bytes. Byte-exact, so unicode-safe; the empty input
/// hashes to the well-known empty digest.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// SHA-256 hex of a string's UTF-8 bytes
pub fn content_hash_str(text: &str) -> String {
    content_hash(text.as_bytes())
}

// ============================================================================
// TYPES
// ============================================================================

/// On-disk metadata for one file
#[derive(Debug, Clone, Serialize)]
pub struct FileMetadata {
    pub mtime_ms: i64,
    pub mtime_iso: String,
    pub content_hash: String,
    pub file_size: u64,
}

/// Reason codes for a reindex decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReindexReason {
    FileNotFound,
    ForceRequested,
    NewFile,
    EmbeddingPending,
    EmbeddingFailed,
    MtimeUnchanged,
    ContentUnchanged,
    ContentChanged,
}

/// Outcome of `should_reindex` for one file
#[derive(Debug, Clone, Serialize)]
pub struct ReindexDecision {
    pub reindex: bool,
    pub reason: ReindexReason,
    /// Set when the mtime fast path short-circuited before hashing
    pub fast_path: bool,
    /// Existing row id, when the file is already indexed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_hash: Option<String>,
    /// (id, mtime_ms) side effect: refresh the stored mtime without reindexing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_mtime: Option<(i64, i64)>,
}

impl ReindexDecision {
    fn skip(reason: ReindexReason) -> Self {
        Self {
            reindex: false,
            reason,
            fast_path: false,
            existing_id: None,
            old_hash: None,
            new_hash: None,
            update_mtime: None,
        }
    }

    fn index(reason: ReindexReason) -> Self {
        Self {
            reindex: true,
            ..Self::skip(reason)
        }
    }
}

/// One entry in the mtime-refresh bucket
#[derive(Debug, Clone, Serialize)]
pub struct MtimeRefresh {
    pub path: String,
    pub memory_id: i64,
    pub mtime_ms: i64,
}

/// Buckets from a categorization pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct CategorizedFiles {
    pub needs_indexing: Vec<String>,
    pub unchanged: Vec<String>,
    pub needs_mtime_update: Vec<MtimeRefresh>,
    pub not_found: Vec<String>,
    pub stats: CategorizationStats,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CategorizationStats {
    pub total: usize,
    pub fast_path_skips: usize,
    pub hash_checks: usize,
}

// ============================================================================
// INDEXER
// ============================================================================

/// Incremental index maintenance over the store
pub struct Indexer {
    store: Arc<MemoryStore>,
}

impl Indexer {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    /// Stat and hash a file; `None` when it does not exist
    pub fn get_file_metadata(&self, path: &Path) -> Result<Option<FileMetadata>> {
        let Some(mtime_ms) = stat_mtime_ms(path) else {
            return Ok(None);
        };
        let bytes = std::fs::read(path)?;
        Ok(Some(FileMetadata {
            mtime_ms,
            mtime_iso: mtime_iso(mtime_ms),
            content_hash: content_hash(&bytes),
            file_size: bytes.len() as u64,
        }))
    }

    /// The stored row for a path, if any
    pub fn get_stored_metadata(&self, path: &Path) -> Result<Option<MemoryRecord>> {
        self.store.get_memory_by_path(&path.to_string_lossy())
    }

    /// The decision table. The mtime fast path runs before any hashing.
    pub fn should_reindex(&self, path: &Path, force: bool) -> Result<ReindexDecision> {
        let Some(current_mtime) = stat_mtime_ms(path) else {
            return Ok(ReindexDecision::skip(ReindexReason::FileNotFound));
        };

        let stored = self.get_stored_metadata(path)?;

        let Some(stored) = stored else {
            return Ok(ReindexDecision::index(ReindexReason::NewFile));
        };

        if force {
            return Ok(ReindexDecision {
                existing_id: Some(stored.id),
                ..ReindexDecision::index(ReindexReason::ForceRequested)
            });
        }

        match stored.embedding_status {
            EmbeddingStatus::Pending => {
                return Ok(ReindexDecision {
                    existing_id: Some(stored.id),
                    ..ReindexDecision::index(ReindexReason::EmbeddingPending)
                });
            }
            EmbeddingStatus::Failed => {
                return Ok(ReindexDecision {
                    existing_id: Some(stored.id),
                    ..ReindexDecision::index(ReindexReason::EmbeddingFailed)
                });
            }
            EmbeddingStatus::Success => {}
        }

        if stored.file_mtime_ms == Some(current_mtime) {
            return Ok(ReindexDecision {
                fast_path: true,
                existing_id: Some(stored.id),
                ..ReindexDecision::skip(ReindexReason::MtimeUnchanged)
            });
        }

        // mtime moved: compare content
        let bytes = std::fs::read(path)?;
        let new_hash = content_hash(&bytes);

        if new_hash == stored.content_hash {
            return Ok(ReindexDecision {
                existing_id: Some(stored.id),
                update_mtime: Some((stored.id, current_mtime)),
                ..ReindexDecision::skip(ReindexReason::ContentUnchanged)
            });
        }

        Ok(ReindexDecision {
            existing_id: Some(stored.id),
            old_hash: Some(stored.content_hash),
            new_hash: Some(new_hash),
            ..ReindexDecision::index(ReindexReason::ContentChanged)
        })
    }

    /// Bucket a set of paths by what the next indexing pass must do
    pub fn categorize_files_for_indexing(
        &self,
        paths: &[&Path],
        force: bool,
    ) -> Result<CategorizedFiles> {
        let mut out = CategorizedFiles {
            stats: CategorizationStats {
                total: paths.len(),
                ..CategorizationStats::default()
            },
            ..CategorizedFiles::default()
        };

        for path in paths {
            let decision = self.should_reindex(path, force)?;
            let path_str = path.to_string_lossy().to_string();

            if decision.fast_path {
                out.stats.fast_path_skips += 1;
            } else if !matches!(
                decision.reason,
                ReindexReason::FileNotFound | ReindexReason::NewFile
            ) {
                out.stats.hash_checks += 1;
            }

            match decision.reason {
                ReindexReason::FileNotFound => out.not_found.push(path_str),
                ReindexReason::MtimeUnchanged => out.unchanged.push(path_str),
                ReindexReason::ContentUnchanged => {
                    if let Some((memory_id, mtime_ms)) = decision.update_mtime {
                        out.needs_mtime_update.push(MtimeRefresh {
                            path: path_str,
                            memory_id,
                            mtime_ms,
                        });
                    }
                }
                _ => out.needs_indexing.push(path_str),
            }
        }

        Ok(out)
    }

    pub fn update_file_mtime(&self, id: i64, mtime_ms: i64) -> Result<()> {
        self.store.update_file_mtime(id, mtime_ms)
    }

    /// Alias kept for callers that distinguish "stamp after indexing"
    pub fn set_indexed_mtime(&self, id: i64, mtime_ms: i64) -> Result<()> {
        self.store.update_file_mtime(id, mtime_ms)
    }

    pub fn batch_update_mtimes(&self, updates: &[(i64, i64)]) -> Result<usize> {
        self.store.batch_update_mtimes(updates)
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn stat_mtime_ms(path: &Path) -> Option<i64> {
    let metadata = std::fs::metadata(path).ok()?;
    let modified = metadata.modified().ok()?;
    let since_epoch = modified.duration_since(UNIX_EPOCH).ok()?;
    Some(since_epoch.as_millis() as i64)
}

fn mtime_iso(mtime_ms: i64) -> String {
    DateTime::from_timestamp_millis(mtime_ms)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

// ============================================================================
// TESTS
// ============================================================================
