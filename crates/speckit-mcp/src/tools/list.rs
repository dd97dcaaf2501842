//! memory_list tool: browse the index.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use speckit_core::{ErrorCode, MemoryEngine, MemoryError};

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "specFolder": {
                "type": "string",
                "description": "Only memories from this spec folder"
            },
            "includeArchived": {
                "type": "boolean",
                "description": "Include archived and soft-deleted entries",
                "default": false
            },
            "limit": {
                "type": "integer",
                "default": 20,
                "minimum": 1,
                "maximum": 200
            },
            "offset": {
                "type": "integer",
                "default": 0,
                "minimum": 0
            }
        }
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListArgs {
    spec_folder: Option<String>,
    #[serde(default)]
    include_archived: bool,
    limit: Option<usize>,
    offset: Option<usize>,
}

pub async fn execute(
    engine: &Arc<MemoryEngine>,
    args: Option<Value>,
) -> Result<Value, MemoryError> {
    let args: ListArgs = match args {
        Some(v) => serde_json::from_value(v)
            .map_err(|e| MemoryError::new(ErrorCode::InvalidParameterFormat, e.to_string()))?,
        None => ListArgs::default(),
    };

    let records = engine.store().list_memories(
        args.spec_folder.as_deref(),
        args.include_archived,
        args.limit.unwrap_or(20).clamp(1, 200),
        args.offset.unwrap_or(0),
    )?;

    let memories: Vec<Value> = records
        .iter()
        .map(|m| {
            serde_json::json!({
                "id": m.id,
                "specFolder": m.spec_folder,
                "filePath": m.file_path,
                "title": m.title,
                "importanceTier": m.importance_tier,
                "embeddingStatus": m.embedding_status,
                "isArchived": m.is_archived,
                "updatedAt": m.updated_at,
                "lastAccessed": m.last_accessed,
            })
        })
        .collect();

    let count = memories.len();
    Ok(serde_json::json!({
        "memories": memories,
        "count": count,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{seed_memory, test_engine};

    #[tokio::test]
    async fn test_list_defaults() {
        let (engine, _dir) = test_engine();
        seed_memory(&engine, "a.md", "First memory with some content.").await;
        seed_memory(&engine, "b.md", "Second memory with other content.").await;

        let result = execute(&engine, None).await.unwrap();
        assert_eq!(result["count"], 2);
    }

    #[tokio::test]
    async fn test_list_filters_by_folder() {
        let (engine, _dir) = test_engine();
        seed_memory(&engine, "a.md", "Memory in the default spec folder.").await;

        let result = execute(
            &engine,
            Some(serde_json::json!({"specFolder": "other"})),
        )
        .await
        .unwrap();
        assert_eq!(result["count"], 0);

        let result = execute(&engine, Some(serde_json::json!({"specFolder": "spec"})))
            .await
            .unwrap();
        assert_eq!(result["count"], 1);
    }

    #[tokio::test]
    async fn test_pagination() {
        let (engine, _dir) = test_engine();
        for i in 0..5 {
            seed_memory(
                &engine,
                &format!("{i}.md"),
                &format!("Numbered memory body {i} for paging."),
            )
            .await;
        }

        let page = execute(&engine, Some(serde_json::json!({"limit": 2, "offset": 4})))
            .await
            .unwrap();
        assert_eq!(page["count"], 1);
    }
}
