//! Archival candidate queries

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::errors::Result;
use crate::storage::queries::memory_crud::row_to_memory;
use crate::storage::types::MemoryRecord;

/// Active memories whose last access predates the cutoff, excluding the
/// protected tiers, oldest first.
pub fn archival_candidates(
    conn: &Connection,
    cutoff: DateTime<Utc>,
    limit: usize,
) -> Result<Vec<MemoryRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, spec_folder, file_path, title, importance_tier, importance_weight, \
         content, content_hash, file_mtime_ms, embedding_status, trigger_phrases, \
         created_at, updated_at, last_accessed, access_count, is_archived, archived_at \
         FROM memory_index \
         WHERE last_accessed < ?1 \
           AND is_archived = 0 \
           AND importance_tier NOT IN ('constitutional', 'critical') \
         ORDER BY last_accessed ASC \
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![cutoff, limit as i64], |row| row_to_memory(row))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Add the archival columns when a pre-archival database is opened.
///
/// The migration chain normally creates them; this is the repair path for
/// stores created by older builds.
pub fn ensure_archival_columns(conn: &Connection) -> Result<()> {
    let mut has_is_archived = false;
    let mut has_archived_at = false;

    let mut stmt = conn.prepare("PRAGMA table_info(memory_index)")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in rows {
        match name?.as_str() {
            "is_archived" => has_is_archived = true,
            "archived_at" => has_archived_at = true,
            _ => {}
        }
    }

    if !has_is_archived {
        conn.execute_batch(
            "ALTER TABLE memory_index ADD COLUMN is_archived INTEGER NOT NULL DEFAULT 0 \
             CHECK (is_archived IN (0, 1, 2));",
        )?;
    }
    if !has_archived_at {
        conn.execute_batch("ALTER TABLE memory_index ADD COLUMN archived_at TEXT;")?;
    }
    Ok(())
}

/// Restore a row to active without touching any other column
pub fn unarchive(conn: &Connection, id: i64) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE memory_index SET is_archived = 0, archived_at = NULL WHERE id = ?1",
        params![id],
    )?;
    Ok(affected > 0)
}
