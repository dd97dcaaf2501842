//! memory_index_scan tool: reconcile the index with a spec-folder root.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use speckit_core::{ErrorCode, MemoryEngine, MemoryError};

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "root": {
                "type": "string",
                "description": "Spec-folder root directory to walk"
            },
            "force": {
                "type": "boolean",
                "description": "Reindex every file regardless of mtime and hash",
                "default": false
            }
        },
        "required": ["root"]
    })
}

#[derive(Debug, Deserialize)]
struct ScanArgs {
    root: String,
    #[serde(default)]
    force: bool,
}

pub async fn execute(
    engine: &Arc<MemoryEngine>,
    args: Option<Value>,
) -> Result<Value, MemoryError> {
    let args: ScanArgs = match args {
        Some(v) => serde_json::from_value(v)
            .map_err(|e| MemoryError::new(ErrorCode::InvalidParameterFormat, e.to_string()))?,
        None => {
            return Err(MemoryError::new(
                ErrorCode::MissingParameter,
                "memory_index_scan requires a root directory",
            ))
        }
    };

    let report = engine
        .scan_folder(&PathBuf::from(&args.root), args.force)
        .await?;

    serde_json::to_value(&report)
        .map_err(|e| MemoryError::new(ErrorCode::InvalidParameterFormat, e.to_string()))
}
