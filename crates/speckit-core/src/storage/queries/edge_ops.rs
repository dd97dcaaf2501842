//! Causal edge CRUD

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::errors::{ErrorCode, MemoryError, Result};
use crate::graph::{CausalEdge, CausalRelation, GraphStats, NewEdge};

fn row_to_edge(row: &Row<'_>) -> rusqlite::Result<CausalEdge> {
    let relation: String = row.get(3)?;
    Ok(CausalEdge {
        id: row.get(0)?,
        source_id: row.get(1)?,
        target_id: row.get(2)?,
        // The CHECK constraint keeps this in the closed set
        relation: CausalRelation::parse(&relation).unwrap_or(CausalRelation::Supports),
        strength: row.get(4)?,
        evidence: row.get(5)?,
        extracted_at: row.get(6)?,
    })
}

const EDGE_COLUMNS: &str = "id, source_id, target_id, relation, strength, evidence, extracted_at";

pub fn validate_edge(edge: &NewEdge) -> Result<()> {
    if edge.source_id == edge.target_id {
        return Err(MemoryError::new(
            ErrorCode::SelfReferenceEdge,
            format!("edge source and target are both {}", edge.source_id),
        ));
    }
    if edge.source_id <= 0 || edge.target_id <= 0 {
        return Err(MemoryError::new(
            ErrorCode::EdgeValidationFailed,
            "edge endpoints must be positive memory ids",
        ));
    }
    if !(0.0..=1.0).contains(&edge.strength) {
        return Err(MemoryError::new(
            ErrorCode::EdgeValidationFailed,
            format!("strength {} outside [0, 1]", edge.strength),
        ));
    }
    Ok(())
}

pub fn insert_edge(conn: &Connection, edge: &NewEdge) -> Result<CausalEdge> {
    validate_edge(edge)?;

    let result = conn.execute(
        "INSERT INTO causal_edges (source_id, target_id, relation, strength, evidence, extracted_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            edge.source_id,
            edge.target_id,
            edge.relation.as_str(),
            edge.strength,
            edge.evidence,
            Utc::now(),
        ],
    );

    match result {
        Ok(_) => {
            let id = conn.last_insert_rowid();
            Ok(get_edge(conn, id)?.expect("edge just inserted"))
        }
        Err(rusqlite::Error::SqliteFailure(e, msg))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            let text = msg.unwrap_or_default();
            if text.contains("UNIQUE") {
                Err(MemoryError::new(
                    ErrorCode::DuplicateEdge,
                    format!(
                        "edge {} -[{}]-> {} already exists",
                        edge.source_id, edge.relation, edge.target_id
                    ),
                ))
            } else {
                Err(MemoryError::new(ErrorCode::EdgeValidationFailed, text))
            }
        }
        Err(e) => Err(e.into()),
    }
}

pub fn get_edge(conn: &Connection, id: i64) -> Result<Option<CausalEdge>> {
    let edge = conn
        .query_row(
            &format!("SELECT {EDGE_COLUMNS} FROM causal_edges WHERE id = ?1"),
            params![id],
            |row| row_to_edge(row),
        )
        .optional()?;
    Ok(edge)
}

pub fn get_edges_from(
    conn: &Connection,
    source_id: i64,
    relation: Option<CausalRelation>,
) -> Result<Vec<CausalEdge>> {
    query_edges(conn, "source_id", source_id, relation)
}

pub fn get_edges_to(
    conn: &Connection,
    target_id: i64,
    relation: Option<CausalRelation>,
) -> Result<Vec<CausalEdge>> {
    query_edges(conn, "target_id", target_id, relation)
}

fn query_edges(
    conn: &Connection,
    column: &str,
    id: i64,
    relation: Option<CausalRelation>,
) -> Result<Vec<CausalEdge>> {
    let mut out = Vec::new();
    match relation {
        Some(rel) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EDGE_COLUMNS} FROM causal_edges \
                 WHERE {column} = ?1 AND relation = ?2 ORDER BY strength DESC, id ASC"
            ))?;
            let rows = stmt.query_map(params![id, rel.as_str()], |row| row_to_edge(row))?;
            for row in rows {
                out.push(row?);
            }
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EDGE_COLUMNS} FROM causal_edges \
                 WHERE {column} = ?1 ORDER BY strength DESC, id ASC"
            ))?;
            let rows = stmt.query_map(params![id], |row| row_to_edge(row))?;
            for row in rows {
                out.push(row?);
            }
        }
    }
    Ok(out)
}

pub fn update_edge(
    conn: &Connection,
    id: i64,
    strength: Option<f64>,
    evidence: Option<&str>,
) -> Result<Option<CausalEdge>> {
    if let Some(s) = strength {
        if !(0.0..=1.0).contains(&s) {
            return Err(MemoryError::new(
                ErrorCode::EdgeValidationFailed,
                format!("strength {s} outside [0, 1]"),
            ));
        }
        conn.execute(
            "UPDATE causal_edges SET strength = ?1 WHERE id = ?2",
            params![s, id],
        )?;
    }
    if let Some(e) = evidence {
        conn.execute(
            "UPDATE causal_edges SET evidence = ?1 WHERE id = ?2",
            params![e, id],
        )?;
    }
    get_edge(conn, id)
}

pub fn delete_edge(conn: &Connection, id: i64) -> Result<bool> {
    let affected = conn.execute("DELETE FROM causal_edges WHERE id = ?1", params![id])?;
    Ok(affected > 0)
}

/// Remove every edge touching a memory; returns how many were removed
pub fn delete_edges_for_memory(conn: &Connection, memory_id: i64) -> Result<usize> {
    let affected = conn.execute(
        "DELETE FROM causal_edges WHERE source_id = ?1 OR target_id = ?1",
        params![memory_id],
    )?;
    Ok(affected)
}

pub fn graph_stats(conn: &Connection) -> Result<GraphStats> {
    let (total_edges, distinct_sources, distinct_targets) = conn.query_row(
        "SELECT COUNT(*), COUNT(DISTINCT source_id), COUNT(DISTINCT target_id) FROM causal_edges",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    let mut stmt = conn.prepare(
        "SELECT relation, COUNT(*) FROM causal_edges GROUP BY relation ORDER BY COUNT(*) DESC",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
    let mut edges_by_relation = Vec::new();
    for row in rows {
        edges_by_relation.push(row?);
    }

    Ok(GraphStats {
        total_edges,
        edges_by_relation,
        distinct_sources,
        distinct_targets,
    })
}

/// Edges whose endpoints no longer exist in the memory index
pub fn find_orphaned_edges(conn: &Connection) -> Result<Vec<CausalEdge>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EDGE_COLUMNS} FROM causal_edges e \
         WHERE NOT EXISTS (SELECT 1 FROM memory_index m WHERE m.id = e.source_id) \
            OR NOT EXISTS (SELECT 1 FROM memory_index m WHERE m.id = e.target_id) \
         ORDER BY e.id ASC"
    ))?;
    let rows = stmt.query_map([], |row| row_to_edge(row))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
