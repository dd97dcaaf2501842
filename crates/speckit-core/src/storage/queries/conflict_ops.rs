//! Gate decision / conflict log rows

use rusqlite::{params, Connection};

use crate::errors::Result;
use crate::gate::ConflictRecord;

pub fn insert_conflict(conn: &Connection, record: &ConflictRecord) -> Result<i64> {
    conn.execute(
        "INSERT INTO conflict_log (timestamp, spec_folder, action, similarity, candidate_id, \
         candidate_content_preview, new_content_preview, contradiction_pattern) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            record.timestamp,
            record.spec_folder,
            record.action,
            record.similarity,
            record.candidate_id,
            record.candidate_content_preview,
            record.new_content_preview,
            record.contradiction_pattern,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Most recent conflicts first, optionally filtered by action
pub fn list_conflicts(
    conn: &Connection,
    action: Option<&str>,
    limit: usize,
) -> Result<Vec<ConflictRecord>> {
    let mut out = Vec::new();
    let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<ConflictRecord> {
        Ok(ConflictRecord {
            timestamp: row.get(0)?,
            spec_folder: row.get(1)?,
            action: row.get(2)?,
            similarity: row.get(3)?,
            candidate_id: row.get(4)?,
            candidate_content_preview: row.get(5)?,
            new_content_preview: row.get(6)?,
            contradiction_pattern: row.get(7)?,
        })
    };

    match action {
        Some(action) => {
            let mut stmt = conn.prepare(
                "SELECT timestamp, spec_folder, action, similarity, candidate_id, \
                 candidate_content_preview, new_content_preview, contradiction_pattern \
                 FROM conflict_log WHERE action = ?1 ORDER BY id DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![action, limit as i64], map_row)?;
            for row in rows {
                out.push(row?);
            }
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT timestamp, spec_folder, action, similarity, candidate_id, \
                 candidate_content_preview, new_content_preview, contradiction_pattern \
                 FROM conflict_log ORDER BY id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit as i64], map_row)?;
            for row in rows {
                out.push(row?);
            }
        }
    }
    Ok(out)
}
