//! memory_update tool: targeted edits to one memory.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use speckit_core::{
    content_hash_str, ErrorCode, ImportanceTier, MemoryEngine, MemoryError, MemoryUpsert,
};

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "id": {
                "type": "integer",
                "description": "Memory id to update"
            },
            "content": {
                "type": "string",
                "description": "New content; triggers a re-embed"
            },
            "title": { "type": "string" },
            "importanceTier": {
                "type": "string",
                "enum": ["normal", "important", "constitutional", "critical"]
            },
            "importanceWeight": {
                "type": "number",
                "minimum": 0.0,
                "maximum": 1.0
            },
            "triggerPhrases": {
                "type": "array",
                "items": { "type": "string" }
            }
        },
        "required": ["id"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateArgs {
    id: i64,
    content: Option<String>,
    title: Option<String>,
    importance_tier: Option<String>,
    importance_weight: Option<f64>,
    trigger_phrases: Option<Vec<String>>,
}

pub async fn execute(
    engine: &Arc<MemoryEngine>,
    args: Option<Value>,
) -> Result<Value, MemoryError> {
    let args: UpdateArgs = match args {
        Some(v) => serde_json::from_value(v)
            .map_err(|e| MemoryError::new(ErrorCode::InvalidParameterFormat, e.to_string()))?,
        None => {
            return Err(MemoryError::new(
                ErrorCode::MissingParameter,
                "memory_update requires an id",
            ))
        }
    };

    if let Some(weight) = args.importance_weight {
        if !(0.0..=1.0).contains(&weight) {
            return Err(MemoryError::new(
                ErrorCode::ParameterOutOfRange,
                format!("importanceWeight {weight} outside [0, 1]"),
            ));
        }
    }

    let existing = engine.store().get_memory(args.id)?.ok_or_else(|| {
        MemoryError::new(
            ErrorCode::MemoryNotFound,
            format!("memory {} not found", args.id),
        )
    })?;

    let mut re_embedded = false;
    if args.content.is_some() || args.title.is_some() || args.trigger_phrases.is_some() {
        let content = args.content.clone().unwrap_or(existing.content.clone());
        let record = engine.store().upsert_memory(&MemoryUpsert {
            spec_folder: existing.spec_folder.clone(),
            file_path: existing.file_path.clone(),
            title: args.title.clone().unwrap_or(existing.title.clone()),
            content_hash: content_hash_str(&content),
            content,
            file_mtime_ms: existing.file_mtime_ms,
            importance_tier: None,
            importance_weight: None,
            trigger_phrases: args
                .trigger_phrases
                .clone()
                .unwrap_or(existing.trigger_phrases.clone()),
        })?;

        if args.content.is_some() {
            re_embedded = engine.reembed(record.id).await?;
        }
    }

    if args.importance_tier.is_some() || args.importance_weight.is_some() {
        let tier = args
            .importance_tier
            .as_deref()
            .map(ImportanceTier::parse)
            .unwrap_or(existing.importance_tier);
        let weight = args.importance_weight.unwrap_or(existing.importance_weight);
        engine.store().set_importance(args.id, tier, weight)?;
    }

    let updated = engine.store().get_memory(args.id)?.ok_or_else(|| {
        MemoryError::new(ErrorCode::MemoryUpdateFailed, "row vanished during update")
    })?;

    Ok(serde_json::json!({
        "updated": true,
        "reEmbedded": re_embedded,
        "memory": {
            "id": updated.id,
            "title": updated.title,
            "filePath": updated.file_path,
            "importanceTier": updated.importance_tier,
            "importanceWeight": updated.importance_weight,
            "embeddingStatus": updated.embedding_status,
            "triggerPhrases": updated.trigger_phrases,
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{seed_memory, test_engine};

    #[tokio::test]
    async fn test_update_title_and_tier() {
        let (engine, _dir) = test_engine();
        let id = seed_memory(&engine, "a.md", "Original content for the update test.").await;

        let result = execute(
            &engine,
            Some(serde_json::json!({
                "id": id,
                "title": "Renamed",
                "importanceTier": "constitutional"
            })),
        )
        .await
        .unwrap();

        assert_eq!(result["updated"], true);
        assert_eq!(result["memory"]["title"], "Renamed");
        assert_eq!(result["memory"]["importanceTier"], "constitutional");
    }

    #[tokio::test]
    async fn test_update_content_changes_hash() {
        let (engine, _dir) = test_engine();
        let id = seed_memory(&engine, "a.md", "Original content for the update test.").await;
        let before = engine.store().get_memory(id).unwrap().unwrap();

        execute(
            &engine,
            Some(serde_json::json!({"id": id, "content": "Replaced content, still long enough."})),
        )
        .await
        .unwrap();

        let after = engine.store().get_memory(id).unwrap().unwrap();
        assert_ne!(before.content_hash, after.content_hash);
        assert_eq!(after.content, "Replaced content, still long enough.");
    }

    #[tokio::test]
    async fn test_update_missing_memory() {
        let (engine, _dir) = test_engine();
        let err = execute(&engine, Some(serde_json::json!({"id": 999})))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::MemoryNotFound);
    }

    #[tokio::test]
    async fn test_weight_out_of_range() {
        let (engine, _dir) = test_engine();
        let id = seed_memory(&engine, "a.md", "Content for the weight range test.").await;
        let err = execute(
            &engine,
            Some(serde_json::json!({"id": id, "importanceWeight": 1.5})),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ParameterOutOfRange);
    }
}
