//! memory_get_learning_history tool: the gate's decision trail.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use speckit_core::{ErrorCode, MemoryEngine, MemoryError};

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "action": {
                "type": "string",
                "enum": ["CREATE", "UPDATE", "SUPERSEDE", "REINFORCE", "CREATE_LINKED"],
                "description": "Only decisions with this action"
            },
            "limit": {
                "type": "integer",
                "default": 50,
                "minimum": 1,
                "maximum": 500
            }
        }
    })
}

#[derive(Debug, Default, Deserialize)]
struct HistoryArgs {
    action: Option<String>,
    limit: Option<usize>,
}

pub async fn execute(
    engine: &Arc<MemoryEngine>,
    args: Option<Value>,
) -> Result<Value, MemoryError> {
    let args: HistoryArgs = match args {
        Some(v) => serde_json::from_value(v)
            .map_err(|e| MemoryError::new(ErrorCode::InvalidParameterFormat, e.to_string()))?,
        None => HistoryArgs::default(),
    };

    let conflicts = engine.store().list_conflicts(
        args.action.as_deref(),
        args.limit.unwrap_or(50).clamp(1, 500),
    )?;

    let count = conflicts.len();
    Ok(serde_json::json!({
        "history": conflicts,
        "count": count,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{seed_memory, test_engine};

    #[tokio::test]
    async fn test_history_records_gate_decisions() {
        let (engine, _dir) = test_engine();
        let content = "Use strict equality";
        seed_memory(&engine, "a.md", content).await;
        // Duplicate save: REINFORCE, which lands in the history
        engine
            .save(speckit_core::SaveRequest::new(content, "b.md", "spec"))
            .await
            .unwrap();

        let result = execute(&engine, None).await.unwrap();
        assert_eq!(result["count"], 1);
        assert_eq!(result["history"][0]["action"], "REINFORCE");

        let filtered = execute(
            &engine,
            Some(serde_json::json!({"action": "SUPERSEDE"})),
        )
        .await
        .unwrap();
        assert_eq!(filtered["count"], 0);
    }

    #[tokio::test]
    async fn test_history_empty() {
        let (engine, _dir) = test_engine();
        let result = execute(&engine, None).await.unwrap();
        assert_eq!(result["count"], 0);
    }
}
