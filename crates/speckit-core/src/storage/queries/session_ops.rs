//! Session and working-memory rows

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::errors::Result;
use crate::session::{SessionRecord, WorkingMemoryEntry};

pub fn get_or_create_session(conn: &Connection, session_id: &str) -> Result<SessionRecord> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO sessions (session_id, created_at, last_activity) VALUES (?1, ?2, ?2) \
         ON CONFLICT(session_id) DO UPDATE SET last_activity = excluded.last_activity",
        params![session_id, now],
    )?;
    let record = conn.query_row(
        "SELECT session_id, created_at, last_activity FROM sessions WHERE session_id = ?1",
        params![session_id],
        |row| {
            Ok(SessionRecord {
                session_id: row.get(0)?,
                created_at: row.get(1)?,
                last_activity: row.get(2)?,
            })
        },
    )?;
    Ok(record)
}

/// Drop a session and its working memory; returns true if it existed
pub fn clear_session(conn: &Connection, session_id: &str) -> Result<bool> {
    conn.execute(
        "DELETE FROM working_memory WHERE session_id = ?1",
        params![session_id],
    )?;
    let affected = conn.execute(
        "DELETE FROM sessions WHERE session_id = ?1",
        params![session_id],
    )?;
    Ok(affected > 0)
}

/// Reap sessions idle since before the cutoff; returns how many were removed
pub fn delete_idle_sessions(conn: &Connection, cutoff: DateTime<Utc>) -> Result<usize> {
    conn.execute(
        "DELETE FROM working_memory WHERE session_id IN \
         (SELECT session_id FROM sessions WHERE last_activity < ?1)",
        params![cutoff],
    )?;
    let affected = conn.execute(
        "DELETE FROM sessions WHERE last_activity < ?1",
        params![cutoff],
    )?;
    Ok(affected)
}

pub fn get_working_memory(
    conn: &Connection,
    session_id: &str,
    memory_id: i64,
) -> Result<Option<WorkingMemoryEntry>> {
    let entry = conn
        .query_row(
            "SELECT session_id, memory_id, attention_score, tier, last_turn \
             FROM working_memory WHERE session_id = ?1 AND memory_id = ?2",
            params![session_id, memory_id],
            |row| {
                Ok(WorkingMemoryEntry {
                    session_id: row.get(0)?,
                    memory_id: row.get(1)?,
                    attention_score: row.get(2)?,
                    tier: crate::session::AttentionTier::parse(&row.get::<_, String>(3)?),
                    last_turn: row.get::<_, i64>(4)? as u64,
                })
            },
        )
        .optional()?;
    Ok(entry)
}

pub fn get_session_memories(
    conn: &Connection,
    session_id: &str,
) -> Result<Vec<WorkingMemoryEntry>> {
    let mut stmt = conn.prepare(
        "SELECT session_id, memory_id, attention_score, tier, last_turn \
         FROM working_memory WHERE session_id = ?1 \
         ORDER BY attention_score DESC, memory_id ASC",
    )?;
    let rows = stmt.query_map(params![session_id], |row| {
        Ok(WorkingMemoryEntry {
            session_id: row.get(0)?,
            memory_id: row.get(1)?,
            attention_score: row.get(2)?,
            tier: crate::session::AttentionTier::parse(&row.get::<_, String>(3)?),
            last_turn: row.get::<_, i64>(4)? as u64,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Write a score and its recomputed tier atomically for (session, memory)
pub fn upsert_working_memory(
    conn: &Connection,
    session_id: &str,
    memory_id: i64,
    score: f64,
    tier: &str,
    turn: u64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO working_memory (session_id, memory_id, attention_score, tier, last_turn, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
         ON CONFLICT(session_id, memory_id) DO UPDATE SET \
         attention_score = excluded.attention_score, tier = excluded.tier, \
         last_turn = excluded.last_turn, updated_at = excluded.updated_at",
        params![session_id, memory_id, score, tier, turn as i64, Utc::now()],
    )?;
    Ok(())
}

/// (entries, hot, warm, cold) for a session
pub fn session_tier_counts(conn: &Connection, session_id: &str) -> Result<(i64, i64, i64, i64)> {
    conn.query_row(
        "SELECT COUNT(*), \
         COALESCE(SUM(tier = 'HOT'), 0), \
         COALESCE(SUM(tier = 'WARM'), 0), \
         COALESCE(SUM(tier = 'COLD'), 0) \
         FROM working_memory WHERE session_id = ?1",
        params![session_id],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
    )
    .map_err(Into::into)
}
