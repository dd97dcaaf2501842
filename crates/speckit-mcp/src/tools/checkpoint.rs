//! Checkpoint tools: create / list / restore / delete database snapshots.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use speckit_core::{ErrorCode, MemoryEngine, MemoryError};

pub fn create_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "label": {
                "type": "string",
                "description": "Optional label, e.g. 'before-migration'"
            }
        }
    })
}

pub fn list_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {}
    })
}

pub fn restore_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "id": {
                "type": "string",
                "description": "Checkpoint id from checkpoint_list"
            }
        },
        "required": ["id"]
    })
}

pub fn delete_schema() -> Value {
    restore_schema()
}

#[derive(Debug, Default, Deserialize)]
struct CreateArgs {
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdArgs {
    id: String,
}

fn parse_id(args: Option<Value>, tool: &str) -> Result<String, MemoryError> {
    let args: IdArgs = match args {
        Some(v) => serde_json::from_value(v)
            .map_err(|e| MemoryError::new(ErrorCode::InvalidParameterFormat, e.to_string()))?,
        None => {
            return Err(MemoryError::new(
                ErrorCode::MissingParameter,
                format!("{tool} requires a checkpoint id"),
            ))
        }
    };
    Ok(args.id)
}

pub async fn execute_create(
    engine: &Arc<MemoryEngine>,
    args: Option<Value>,
) -> Result<Value, MemoryError> {
    let args: CreateArgs = match args {
        Some(v) => serde_json::from_value(v)
            .map_err(|e| MemoryError::new(ErrorCode::InvalidParameterFormat, e.to_string()))?,
        None => CreateArgs::default(),
    };
    let info = engine.checkpoints().create(args.label.as_deref())?;
    Ok(serde_json::json!({ "created": true, "checkpoint": info }))
}

pub async fn execute_list(
    engine: &Arc<MemoryEngine>,
    _args: Option<Value>,
) -> Result<Value, MemoryError> {
    let checkpoints = engine.checkpoints().list()?;
    let count = checkpoints.len();
    Ok(serde_json::json!({
        "checkpoints": checkpoints,
        "count": count,
    }))
}

pub async fn execute_restore(
    engine: &Arc<MemoryEngine>,
    args: Option<Value>,
) -> Result<Value, MemoryError> {
    let id = parse_id(args, "checkpoint_restore")?;
    let info = engine.checkpoints().restore(&id)?;
    Ok(serde_json::json!({ "restored": true, "checkpoint": info }))
}

pub async fn execute_delete(
    engine: &Arc<MemoryEngine>,
    args: Option<Value>,
) -> Result<Value, MemoryError> {
    let id = parse_id(args, "checkpoint_delete")?;
    let deleted = engine.checkpoints().delete(&id)?;
    Ok(serde_json::json!({ "deleted": deleted, "id": id }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{seed_memory, test_engine};

    #[tokio::test]
    async fn test_checkpoint_lifecycle() {
        let (engine, _dir) = test_engine();
        seed_memory(&engine, "a.md", "Content that the snapshot should keep.").await;

        let created = execute_create(&engine, Some(serde_json::json!({"label": "t"})))
            .await
            .unwrap();
        let id = created["checkpoint"]["id"].as_str().unwrap().to_string();
        assert_eq!(created["checkpoint"]["memory_count"], 1);

        let listed = execute_list(&engine, None).await.unwrap();
        assert_eq!(listed["count"], 1);

        // Mutate, then restore the snapshot
        seed_memory(&engine, "b.md", "Content added after the snapshot.").await;
        assert_eq!(engine.store().stats().unwrap().total, 2);

        let restored = execute_restore(&engine, Some(serde_json::json!({"id": id})))
            .await
            .unwrap();
        assert_eq!(restored["restored"], true);
        assert_eq!(engine.store().stats().unwrap().total, 1);

        let deleted = execute_delete(&engine, Some(serde_json::json!({"id": id})))
            .await
            .unwrap();
        assert_eq!(deleted["deleted"], true);
        assert_eq!(execute_list(&engine, None).await.unwrap()["count"], 0);
    }

    #[tokio::test]
    async fn test_restore_unknown_id() {
        let (engine, _dir) = test_engine();
        let err = execute_restore(&engine, Some(serde_json::json!({"id": "ckpt-none"})))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::CheckpointNotFound);
    }

    #[tokio::test]
    async fn test_restore_requires_id() {
        let (engine, _dir) = test_engine();
        let err = execute_restore(&engine, None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingParameter);
    }
}
