//! memory_match_triggers tool: surface memories whose trigger phrases
//! appear in a message.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use speckit_core::{ErrorCode, MemoryEngine, MemoryError};

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "message": {
                "type": "string",
                "description": "The message to scan for trigger phrases"
            }
        },
        "required": ["message"]
    })
}

#[derive(Debug, Deserialize)]
struct TriggerArgs {
    message: String,
}

pub async fn execute(
    engine: &Arc<MemoryEngine>,
    args: Option<Value>,
) -> Result<Value, MemoryError> {
    let args: TriggerArgs = match args {
        Some(v) => serde_json::from_value(v)
            .map_err(|e| MemoryError::new(ErrorCode::InvalidParameterFormat, e.to_string()))?,
        None => {
            return Err(MemoryError::new(
                ErrorCode::MissingParameter,
                "memory_match_triggers requires a message",
            ))
        }
    };

    let matches = engine.match_triggers(&args.message)?;
    let count = matches.len();
    Ok(serde_json::json!({
        "matches": matches,
        "count": count,
    }))
}
