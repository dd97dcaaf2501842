//! BM25 keyword search over the FTS5 index
//!
//! Ordering is deterministic for a fixed corpus: ties on the BM25 score are
//! broken by rowid.

use rusqlite::{params, Connection};

use crate::errors::{ErrorCode, MemoryError, Result};

/// Run a BM25-ranked full-text query. Returns (memory_id, relevance) with
/// higher relevance first. The query must already be FTS5-sanitized.
pub fn search_keyword(
    conn: &Connection,
    fts_query: &str,
    limit: usize,
) -> Result<Vec<(i64, f64)>> {
    if fts_query.trim().is_empty() {
        return Ok(vec![]);
    }

    let mut stmt = conn.prepare(
        "SELECT rowid, bm25(memory_fts) FROM memory_fts \
         WHERE memory_fts MATCH ?1 \
         ORDER BY bm25(memory_fts) ASC, rowid ASC \
         LIMIT ?2",
    )?;

    let rows = stmt
        .query_map(params![fts_query, limit as i64], |row| {
            let id: i64 = row.get(0)?;
            let bm25: f64 = row.get(1)?;
            Ok((id, bm25))
        })
        .map_err(|e| {
            MemoryError::new(ErrorCode::FtsSyntaxError, e.to_string())
                .with_suggestion("remove FTS operators or quote the phrase")
        })?;

    let mut out = Vec::new();
    for row in rows {
        // bm25() is lower-is-better; flip the sign so callers rank descending
        let (id, bm25) = row?;
        out.push((id, -bm25));
    }
    Ok(out)
}
