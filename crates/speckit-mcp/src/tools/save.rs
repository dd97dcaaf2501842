//! memory_save tool: preflight, gate, persist.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use speckit_core::{ErrorCode, ImportanceTier, MemoryEngine, MemoryError, SaveRequest};

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "content": {
                "type": "string",
                "description": "The note to remember (decision, rationale, constraint)"
            },
            "file_path": {
                "type": "string",
                "description": "Unique path for this memory within the spec folder"
            },
            "spec_folder": {
                "type": "string",
                "description": "Spec folder the memory belongs to"
            },
            "title": {
                "type": "string",
                "description": "Optional title; defaults to the first heading"
            },
            "importanceTier": {
                "type": "string",
                "enum": ["normal", "important", "constitutional", "critical"],
                "description": "Importance tier; constitutional and critical never archive"
            },
            "triggerPhrases": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Phrases that should surface this memory when seen"
            },
            "dryRun": {
                "type": "boolean",
                "description": "Report the gate decision without persisting",
                "default": false
            },
            "force": {
                "type": "boolean",
                "description": "Skip the gate and create regardless of similar content",
                "default": false
            }
        },
        "required": ["content", "file_path", "spec_folder"]
    })
}

#[derive(Debug, Deserialize)]
struct SaveArgs {
    content: String,
    file_path: String,
    spec_folder: String,
    title: Option<String>,
    #[serde(rename = "importanceTier")]
    importance_tier: Option<String>,
    #[serde(rename = "triggerPhrases", default)]
    trigger_phrases: Vec<String>,
    #[serde(rename = "dryRun", default)]
    dry_run: bool,
    #[serde(default)]
    force: bool,
}

pub async fn execute(
    engine: &Arc<MemoryEngine>,
    args: Option<Value>,
) -> Result<Value, MemoryError> {
    let args: SaveArgs = match args {
        Some(v) => serde_json::from_value(v)
            .map_err(|e| MemoryError::new(ErrorCode::InvalidParameterFormat, e.to_string()))?,
        None => {
            return Err(MemoryError::new(
                ErrorCode::MissingParameter,
                "memory_save requires content, file_path, and spec_folder",
            ))
        }
    };

    let outcome = engine
        .save(SaveRequest {
            content: args.content,
            file_path: args.file_path,
            spec_folder: args.spec_folder,
            title: args.title,
            importance_tier: args.importance_tier.as_deref().map(ImportanceTier::parse),
            trigger_phrases: args.trigger_phrases,
            dry_run: args.dry_run,
            force: args.force,
        })
        .await?;

    Ok(serde_json::json!({
        "saved": outcome.saved,
        "dryRun": outcome.dry_run,
        "blockedByPreflight": outcome.blocked_by_preflight,
        "action": outcome.decision.as_ref().map(|d| d.action.as_str()),
        "reason": outcome.decision.as_ref().map(|d| d.reason.clone()),
        "similarity": outcome.decision.as_ref().map(|d| d.similarity),
        "contradiction": outcome.decision.as_ref().and_then(|d| d.contradiction.clone()),
        "memoryId": outcome.memory_id,
        "supersededId": outcome.superseded_id,
        "linkedIds": outcome.linked_ids,
        "preflight": outcome.preflight,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::test_engine;

    fn save_args(content: &str, path: &str) -> Value {
        serde_json::json!({
            "content": content,
            "file_path": path,
            "spec_folder": "spec"
        })
    }

    #[test]
    fn test_schema_required_fields() {
        let s = schema();
        let required: Vec<&str> = s["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(required, vec!["content", "file_path", "spec_folder"]);
    }

    #[tokio::test]
    async fn test_save_creates() {
        let (engine, _dir) = test_engine();
        let result = execute(
            &engine,
            Some(save_args("Rotate refresh tokens on every use.", "auth/tokens.md")),
        )
        .await
        .unwrap();

        assert_eq!(result["saved"], true);
        assert_eq!(result["action"], "CREATE");
        assert!(result["memoryId"].is_i64());
    }

    #[tokio::test]
    async fn test_duplicate_reinforces() {
        let (engine, _dir) = test_engine();
        let content = "Use strict equality";
        execute(&engine, Some(save_args(content, "a.md"))).await.unwrap();

        let second = execute(&engine, Some(save_args(content, "b.md"))).await.unwrap();
        assert_eq!(second["action"], "REINFORCE");
        assert_eq!(second["similarity"], 1.0);
    }

    #[tokio::test]
    async fn test_dry_run_reports_without_saving() {
        let (engine, _dir) = test_engine();
        let result = execute(
            &engine,
            Some(serde_json::json!({
                "content": "A decision worth keeping around.",
                "file_path": "f/a.md",
                "spec_folder": "f",
                "dryRun": true
            })),
        )
        .await
        .unwrap();

        assert_eq!(result["saved"], false);
        assert_eq!(result["dryRun"], true);
        assert_eq!(result["action"], "CREATE");
        assert_eq!(engine.store().stats().unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_preflight_block_is_reported() {
        let (engine, _dir) = test_engine();
        let result = execute(&engine, Some(save_args("tiny", "f/a.md"))).await.unwrap();
        assert_eq!(result["saved"], false);
        assert_eq!(result["blockedByPreflight"], true);
        assert!(result["preflight"]["errors"].as_array().unwrap().len() > 0);
    }

    #[tokio::test]
    async fn test_tier_and_triggers_are_stored() {
        let (engine, _dir) = test_engine();
        let result = execute(
            &engine,
            Some(serde_json::json!({
                "content": "Never log credentials anywhere.",
                "file_path": "sec/logging.md",
                "spec_folder": "sec",
                "importanceTier": "critical",
                "triggerPhrases": ["log credentials"]
            })),
        )
        .await
        .unwrap();

        let id = result["memoryId"].as_i64().unwrap();
        let record = engine.store().get_memory(id).unwrap().unwrap();
        assert_eq!(record.importance_tier, ImportanceTier::Critical);
        assert_eq!(record.trigger_phrases, vec!["log credentials"]);
    }
}
