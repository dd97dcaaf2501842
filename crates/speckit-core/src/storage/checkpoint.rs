//! Checkpoint Lifecycle
//!
//! Full-database snapshots via the SQLite online backup API. Each snapshot
//! is a standalone database file with a JSON metadata sidecar; restore backs
//! the snapshot into the live database after writing a safety copy.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::backup::Backup;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ErrorCode, MemoryError, Result};

// ============================================================================
// TYPES
// ============================================================================

/// Metadata for one checkpoint snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointInfo {
    pub id: String,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub memory_count: i64,
}

/// Manages checkpoint snapshots for one database file
pub struct CheckpointManager {
    db_path: PathBuf,
    checkpoint_dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(db_path: impl Into<PathBuf>, checkpoint_dir: impl Into<PathBuf>) -> Result<Self> {
        let checkpoint_dir = checkpoint_dir.into();
        std::fs::create_dir_all(&checkpoint_dir)?;
        Ok(Self {
            db_path: db_path.into(),
            checkpoint_dir,
        })
    }

    /// Default checkpoint directory: a `checkpoints/` sibling of the database
    pub fn for_database(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let dir = db_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("checkpoints");
        Self::new(db_path, dir)
    }

    fn snapshot_path(&self, id: &str) -> PathBuf {
        self.checkpoint_dir.join(format!("{id}.db"))
    }

    fn metadata_path(&self, id: &str) -> PathBuf {
        self.checkpoint_dir.join(format!("{id}.json"))
    }

    // ========================================================================
    // Create
    // ========================================================================

    /// Snapshot the live database
    pub fn create(&self, label: Option<&str>) -> Result<CheckpointInfo> {
        let id = format!(
            "ckpt-{}-{}",
            Utc::now().format("%Y%m%d%H%M%S"),
            &Uuid::new_v4().to_string()[..8]
        );
        let snapshot = self.snapshot_path(&id);

        backup_database(&self.db_path, &snapshot).map_err(|e| {
            MemoryError::new(ErrorCode::CheckpointCreateFailed, e.to_string())
        })?;

        let size_bytes = std::fs::metadata(&snapshot).map(|m| m.len()).unwrap_or(0);
        let memory_count = count_memories(&snapshot).unwrap_or(0);

        let info = CheckpointInfo {
            id: id.clone(),
            label: label.map(str::to_string),
            created_at: Utc::now(),
            size_bytes,
            memory_count,
        };

        let metadata = serde_json::to_string_pretty(&info)?;
        std::fs::write(self.metadata_path(&id), metadata)?;

        tracing::info!(checkpoint = %id, size_bytes, "checkpoint created");
        Ok(info)
    }

    // ========================================================================
    // List
    // ========================================================================

    /// All checkpoints, newest first
    pub fn list(&self) -> Result<Vec<CheckpointInfo>> {
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&self.checkpoint_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let text = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<CheckpointInfo>(&text) {
                Ok(info) => out.push(info),
                Err(e) => tracing::warn!("unreadable checkpoint metadata {:?}: {}", path, e),
            }
        }
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    pub fn get(&self, id: &str) -> Result<Option<CheckpointInfo>> {
        let path = self.metadata_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    // ========================================================================
    // Restore
    // ========================================================================

    /// Restore a snapshot over the live database.
    ///
    /// A safety copy of the current state is written next to the database
    /// before any bytes change; on failure the live file is untouched.
    pub fn restore(&self, id: &str) -> Result<CheckpointInfo> {
        let info = self.get(id)?.ok_or_else(|| {
            MemoryError::new(
                ErrorCode::CheckpointNotFound,
                format!("no checkpoint with id {id}"),
            )
        })?;
        let snapshot = self.snapshot_path(id);
        if !snapshot.exists() {
            return Err(MemoryError::new(
                ErrorCode::CheckpointNotFound,
                format!("checkpoint file missing for {id}"),
            ));
        }

        // Safety copy of current state
        let safety = self.db_path.with_extension("pre-restore.db");
        backup_database(&self.db_path, &safety).map_err(|e| {
            MemoryError::new(
                ErrorCode::CheckpointRestoreFailed,
                format!("safety copy failed, restore aborted: {e}"),
            )
        })?;

        // Back the snapshot into the live database so open connections
        // observe the restored content.
        backup_database(&snapshot, &self.db_path).map_err(|e| {
            MemoryError::new(ErrorCode::CheckpointRestoreFailed, e.to_string())
        })?;

        tracing::info!(checkpoint = %id, "checkpoint restored");
        Ok(info)
    }

    // ========================================================================
    // Delete
    // ========================================================================

    pub fn delete(&self, id: &str) -> Result<bool> {
        let snapshot = self.snapshot_path(id);
        let metadata = self.metadata_path(id);
        if !metadata.exists() && !snapshot.exists() {
            return Ok(false);
        }
        for path in [snapshot, metadata] {
            if path.exists() {
                std::fs::remove_file(&path).map_err(|e| {
                    MemoryError::new(ErrorCode::CheckpointDeleteFailed, e.to_string())
                })?;
            }
        }
        Ok(true)
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn backup_database(from: &Path, to: &Path) -> rusqlite::Result<()> {
    let src = Connection::open(from)?;
    let mut dst = Connection::open(to)?;
    let backup = Backup::new(&src, &mut dst)?;
    backup.run_to_completion(64, std::time::Duration::from_millis(20), None)
}

fn count_memories(db: &Path) -> rusqlite::Result<i64> {
    let conn = Connection::open(db)?;
    conn.query_row("SELECT COUNT(*) FROM memory_index", [], |row| row.get(0))
}

// ============================================================================
// TESTS
// ============================================================================
