//! memory_delete tool: the only way a memory physically leaves the store.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use speckit_core::{ErrorCode, MemoryEngine, MemoryError};

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "id": {
                "type": "integer",
                "description": "Memory id to delete permanently"
            }
        },
        "required": ["id"]
    })
}

#[derive(Debug, Deserialize)]
struct DeleteArgs {
    id: i64,
}

pub async fn execute(
    engine: &Arc<MemoryEngine>,
    args: Option<Value>,
) -> Result<Value, MemoryError> {
    let args: DeleteArgs = match args {
        Some(v) => serde_json::from_value(v)
            .map_err(|e| MemoryError::new(ErrorCode::InvalidParameterFormat, e.to_string()))?,
        None => {
            return Err(MemoryError::new(
                ErrorCode::MissingParameter,
                "memory_delete requires an id",
            ))
        }
    };

    let deleted = engine.delete_memory(args.id).await?;
    Ok(serde_json::json!({
        "deleted": deleted,
        "id": args.id,
    }))
}
