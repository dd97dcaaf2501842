//! Embedding column ownership
//!
//! The store is the only writer of `memory_embeddings`. Vectors are stored
//! as little-endian f32 blobs; a dimension mismatch against the provider
//! profile is a hard error at write time, never a silent truncation.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::embeddings::ProviderProfile;
use crate::errors::{ErrorCode, MemoryError, Result};
use crate::storage::types::EmbeddingRecord;

pub(crate) fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub(crate) fn blob_to_vector(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }
    Some(
        blob.chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

pub fn upsert_embedding(
    conn: &Connection,
    memory_id: i64,
    vector: &[f32],
    profile: &ProviderProfile,
) -> Result<()> {
    if vector.len() != profile.dim {
        return Err(MemoryError::new(
            ErrorCode::EmbeddingDimensionMismatch,
            format!(
                "vector has {} dimensions, provider profile expects {}",
                vector.len(),
                profile.dim
            ),
        )
        .with_details(serde_json::json!({
            "memory_id": memory_id,
            "provider": profile.name,
            "model": profile.model,
        })));
    }

    conn.execute(
        "INSERT INTO memory_embeddings (memory_id, embedding, provider, model, dimensions, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
         ON CONFLICT(memory_id) DO UPDATE SET \
         embedding = excluded.embedding, provider = excluded.provider, \
         model = excluded.model, dimensions = excluded.dimensions, \
         created_at = excluded.created_at",
        params![
            memory_id,
            vector_to_blob(vector),
            profile.name,
            profile.model,
            profile.dim as i64,
            Utc::now(),
        ],
    )?;
    Ok(())
}

pub fn get_embedding(conn: &Connection, memory_id: i64) -> Result<Option<EmbeddingRecord>> {
    let row = conn
        .query_row(
            "SELECT memory_id, embedding, provider, model, dimensions, created_at \
             FROM memory_embeddings WHERE memory_id = ?1",
            params![memory_id],
            |row| {
                let blob: Vec<u8> = row.get(1)?;
                Ok((
                    row.get::<_, i64>(0)?,
                    blob,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, chrono::DateTime<chrono::Utc>>(5)?,
                ))
            },
        )
        .optional()?;

    Ok(row.and_then(|(memory_id, blob, provider, model, dimensions, created_at)| {
        blob_to_vector(&blob).map(|vector| EmbeddingRecord {
            memory_id,
            vector,
            provider,
            model,
            dimensions: dimensions as usize,
            created_at,
        })
    }))
}

pub fn delete_embedding(conn: &Connection, memory_id: i64) -> Result<bool> {
    let affected = conn.execute(
        "DELETE FROM memory_embeddings WHERE memory_id = ?1",
        params![memory_id],
    )?;
    Ok(affected > 0)
}

/// Load every stored (id, vector) pair, for rebuilding the vector index
pub fn load_all_embeddings(conn: &Connection) -> Result<Vec<(i64, Vec<f32>)>> {
    let mut stmt = conn.prepare("SELECT memory_id, embedding FROM memory_embeddings")?;
    let rows = stmt.query_map([], |row| {
        let blob: Vec<u8> = row.get(1)?;
        Ok((row.get::<_, i64>(0)?, blob))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (id, blob) = row?;
        if let Some(vector) = blob_to_vector(&blob) {
            out.push((id, vector));
        }
    }
    Ok(out)
}
