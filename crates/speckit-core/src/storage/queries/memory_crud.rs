//! Memory row CRUD

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::errors::Result;
use crate::storage::types::{
    ArchivalState, EmbeddingStatus, ImportanceTier, IndexStats, MemoryRecord, MemoryUpsert,
};

const MEMORY_COLUMNS: &str = "id, spec_folder, file_path, title, importance_tier, \
     importance_weight, content, content_hash, file_mtime_ms, embedding_status, \
     trigger_phrases, created_at, updated_at, last_accessed, access_count, \
     is_archived, archived_at";

pub(crate) fn row_to_memory(row: &Row<'_>) -> rusqlite::Result<MemoryRecord> {
    let tier: String = row.get(4)?;
    let status: String = row.get(9)?;
    let triggers_json: String = row.get(10)?;
    let archived: i64 = row.get(15)?;
    Ok(MemoryRecord {
        id: row.get(0)?,
        spec_folder: row.get(1)?,
        file_path: row.get(2)?,
        title: row.get(3)?,
        importance_tier: ImportanceTier::parse(&tier),
        importance_weight: row.get(5)?,
        content: row.get(6)?,
        content_hash: row.get(7)?,
        file_mtime_ms: row.get(8)?,
        embedding_status: EmbeddingStatus::parse(&status),
        trigger_phrases: serde_json::from_str(&triggers_json).unwrap_or_default(),
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
        last_accessed: row.get(13)?,
        access_count: row.get(14)?,
        is_archived: ArchivalState::from_i64(archived),
        archived_at: row.get(16)?,
    })
}

/// Insert a new row or update the existing row with the same file path.
///
/// Concurrent upserts to the same path are serialized by the unique
/// constraint; content-hash equality makes the operation idempotent.
pub fn upsert_memory(conn: &Connection, input: &MemoryUpsert) -> Result<MemoryRecord> {
    let now = Utc::now();
    let triggers_json = serde_json::to_string(&input.trigger_phrases)?;

    let existing = get_memory_by_path(conn, &input.file_path)?;

    match existing {
        Some(record) => {
            let tier = input.importance_tier.unwrap_or(record.importance_tier);
            let weight = input.importance_weight.unwrap_or(record.importance_weight);
            conn.execute(
                "UPDATE memory_index SET spec_folder = ?1, title = ?2, content = ?3, \
                 content_hash = ?4, file_mtime_ms = ?5, importance_tier = ?6, \
                 importance_weight = ?7, trigger_phrases = ?8, embedding_status = 'pending', \
                 updated_at = ?9, last_accessed = ?9 WHERE id = ?10",
                params![
                    input.spec_folder,
                    input.title,
                    input.content,
                    input.content_hash,
                    input.file_mtime_ms,
                    tier.as_str(),
                    weight,
                    triggers_json,
                    now,
                    record.id,
                ],
            )?;
            Ok(get_memory(conn, record.id)?.expect("row just updated"))
        }
        None => {
            let tier = input.importance_tier.unwrap_or(ImportanceTier::Normal);
            let weight = input.importance_weight.unwrap_or(0.5);
            conn.execute(
                "INSERT INTO memory_index (spec_folder, file_path, title, importance_tier, \
                 importance_weight, content, content_hash, file_mtime_ms, embedding_status, \
                 trigger_phrases, created_at, updated_at, last_accessed) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'pending', ?9, ?10, ?10, ?10)",
                params![
                    input.spec_folder,
                    input.file_path,
                    input.title,
                    tier.as_str(),
                    weight,
                    input.content,
                    input.content_hash,
                    input.file_mtime_ms,
                    triggers_json,
                    now,
                ],
            )?;
            let id = conn.last_insert_rowid();
            Ok(get_memory(conn, id)?.expect("row just inserted"))
        }
    }
}

pub fn get_memory(conn: &Connection, id: i64) -> Result<Option<MemoryRecord>> {
    let record = conn
        .query_row(
            &format!("SELECT {MEMORY_COLUMNS} FROM memory_index WHERE id = ?1"),
            params![id],
            |row| row_to_memory(row),
        )
        .optional()?;
    Ok(record)
}

pub fn find_by_content_hash(conn: &Connection, hash: &str) -> Result<Option<MemoryRecord>> {
    let record = conn
        .query_row(
            &format!(
                "SELECT {MEMORY_COLUMNS} FROM memory_index \
                 WHERE content_hash = ?1 ORDER BY id ASC LIMIT 1"
            ),
            params![hash],
            |row| row_to_memory(row),
        )
        .optional()?;
    Ok(record)
}

pub fn get_memory_by_path(conn: &Connection, file_path: &str) -> Result<Option<MemoryRecord>> {
    let record = conn
        .query_row(
            &format!("SELECT {MEMORY_COLUMNS} FROM memory_index WHERE file_path = ?1"),
            params![file_path],
            |row| row_to_memory(row),
        )
        .optional()?;
    Ok(record)
}

/// List memories, optionally filtered by spec folder; archived and
/// soft-deleted rows are excluded unless requested.
pub fn list_memories(
    conn: &Connection,
    spec_folder: Option<&str>,
    include_archived: bool,
    limit: usize,
    offset: usize,
) -> Result<Vec<MemoryRecord>> {
    let archived_clause = if include_archived { 2 } else { 0 };
    let mut out = Vec::new();

    match spec_folder {
        Some(folder) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MEMORY_COLUMNS} FROM memory_index \
                 WHERE spec_folder = ?1 AND is_archived <= ?2 \
                 ORDER BY updated_at DESC LIMIT ?3 OFFSET ?4"
            ))?;
            let rows = stmt.query_map(
                params![folder, archived_clause, limit as i64, offset as i64],
                |row| row_to_memory(row),
            )?;
            for row in rows {
                out.push(row?);
            }
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MEMORY_COLUMNS} FROM memory_index \
                 WHERE is_archived <= ?1 \
                 ORDER BY updated_at DESC LIMIT ?2 OFFSET ?3"
            ))?;
            let rows = stmt.query_map(
                params![archived_clause, limit as i64, offset as i64],
                |row| row_to_memory(row),
            )?;
            for row in rows {
                out.push(row?);
            }
        }
    }

    Ok(out)
}

pub fn get_by_folder(conn: &Connection, spec_folder: &str) -> Result<Vec<MemoryRecord>> {
    list_memories(conn, Some(spec_folder), false, usize::MAX >> 1, 0)
}

/// Deleting a missing id returns false rather than an error
pub fn delete_memory(conn: &Connection, id: i64) -> Result<bool> {
    let affected = conn.execute("DELETE FROM memory_index WHERE id = ?1", params![id])?;
    Ok(affected > 0)
}

pub fn delete_by_path(conn: &Connection, file_path: &str) -> Result<bool> {
    let affected = conn.execute(
        "DELETE FROM memory_index WHERE file_path = ?1",
        params![file_path],
    )?;
    Ok(affected > 0)
}

pub fn touch_last_accessed(conn: &Connection, id: i64) -> Result<()> {
    conn.execute(
        "UPDATE memory_index SET last_accessed = ?1, access_count = access_count + 1 \
         WHERE id = ?2",
        params![Utc::now(), id],
    )?;
    Ok(())
}

pub fn set_embedding_status(conn: &Connection, id: i64, status: EmbeddingStatus) -> Result<()> {
    conn.execute(
        "UPDATE memory_index SET embedding_status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    Ok(())
}

pub fn set_importance(
    conn: &Connection,
    id: i64,
    tier: ImportanceTier,
    weight: f64,
) -> Result<()> {
    conn.execute(
        "UPDATE memory_index SET importance_tier = ?1, importance_weight = ?2, updated_at = ?3 \
         WHERE id = ?4",
        params![tier.as_str(), weight, Utc::now(), id],
    )?;
    Ok(())
}

pub fn update_file_mtime(conn: &Connection, id: i64, mtime_ms: i64) -> Result<()> {
    conn.execute(
        "UPDATE memory_index SET file_mtime_ms = ?1 WHERE id = ?2",
        params![mtime_ms, id],
    )?;
    Ok(())
}

/// Batch mtime refresh; returns how many rows changed
pub fn batch_update_mtimes(conn: &Connection, updates: &[(i64, i64)]) -> Result<usize> {
    let mut count = 0;
    for (id, mtime_ms) in updates {
        count += conn.execute(
            "UPDATE memory_index SET file_mtime_ms = ?1 WHERE id = ?2",
            params![mtime_ms, id],
        )?;
    }
    Ok(count)
}

pub fn set_archival_state(
    conn: &Connection,
    id: i64,
    state: ArchivalState,
    archived_at: Option<DateTime<Utc>>,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE memory_index SET is_archived = ?1, archived_at = ?2 WHERE id = ?3",
        params![state.as_i64(), archived_at, id],
    )?;
    Ok(affected > 0)
}

pub fn index_stats(conn: &Connection) -> Result<IndexStats> {
    conn.query_row(
        "SELECT COUNT(*), \
         COALESCE(SUM(embedding_status = 'success'), 0), \
         COALESCE(SUM(embedding_status = 'pending'), 0), \
         COALESCE(SUM(embedding_status = 'failed'), 0), \
         COALESCE(SUM(is_archived > 0), 0) \
         FROM memory_index",
        [],
        |row| {
            Ok(IndexStats {
                total: row.get(0)?,
                success: row.get(1)?,
                pending: row.get(2)?,
                failed: row.get(3)?,
                archived: row.get(4)?,
            })
        },
    )
    .map_err(Into::into)
}
