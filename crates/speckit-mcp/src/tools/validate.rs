//! memory_validate tool: standalone preflight over candidate content.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use speckit_core::{
    run_preflight, ErrorCode, MemoryEngine, MemoryError, PreflightInput, PreflightOptions,
};

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "content": {
                "type": "string",
                "description": "Candidate memory content"
            },
            "file_path": {
                "type": "string",
                "description": "Intended path (context only)"
            },
            "spec_folder": {
                "type": "string",
                "description": "Intended spec folder (context only)"
            },
            "checkAnchors": { "type": "boolean", "default": true },
            "checkDuplicates": { "type": "boolean", "default": true },
            "checkTokens": { "type": "boolean", "default": true },
            "checkSize": { "type": "boolean", "default": true },
            "dryRun": {
                "type": "boolean",
                "description": "Force pass=true and record the real verdict",
                "default": false
            }
        },
        "required": ["content"]
    })
}

#[derive(Debug, Deserialize)]
struct ValidateArgs {
    content: String,
    #[serde(default)]
    file_path: Option<String>,
    #[serde(default)]
    spec_folder: Option<String>,
    #[serde(rename = "checkAnchors")]
    check_anchors: Option<bool>,
    #[serde(rename = "checkDuplicates")]
    check_duplicates: Option<bool>,
    #[serde(rename = "checkTokens")]
    check_tokens: Option<bool>,
    #[serde(rename = "checkSize")]
    check_size: Option<bool>,
    #[serde(rename = "dryRun", default)]
    dry_run: bool,
}

pub async fn execute(
    engine: &Arc<MemoryEngine>,
    args: Option<Value>,
) -> Result<Value, MemoryError> {
    let args: ValidateArgs = match args {
        Some(v) => serde_json::from_value(v)
            .map_err(|e| MemoryError::new(ErrorCode::InvalidParameterFormat, e.to_string()))?,
        None => {
            return Err(MemoryError::new(
                ErrorCode::MissingParameter,
                "memory_validate requires content",
            ))
        }
    };

    let opts = PreflightOptions {
        check_anchors: args.check_anchors.unwrap_or(true),
        check_duplicates: args.check_duplicates.unwrap_or(true),
        check_tokens: args.check_tokens.unwrap_or(true),
        check_size: args.check_size.unwrap_or(true),
        dry_run: args.dry_run,
        ..PreflightOptions::default()
    };

    let report = run_preflight(
        &PreflightInput {
            content: &args.content,
            file_path: args.file_path.as_deref().unwrap_or(""),
            spec_folder: args.spec_folder.as_deref().unwrap_or(""),
            store: Some(engine.store()),
            similar_top: None,
        },
        &opts,
    )?;

    serde_json::to_value(&report)
        .map_err(|e| MemoryError::new(ErrorCode::InvalidParameterFormat, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{seed_memory, test_engine};

    #[tokio::test]
    async fn test_valid_content() {
        let (engine, _dir) = test_engine();
        let result = execute(
            &engine,
            Some(serde_json::json!({"content": "A well-formed decision memory."})),
        )
        .await
        .unwrap();
        assert_eq!(result["pass"], true);
    }

    #[tokio::test]
    async fn test_anchor_error_reported() {
        let (engine, _dir) = test_engine();
        let result = execute(
            &engine,
            Some(serde_json::json!({
                "content": "<!-- ANCHOR:x --> unclosed anchor body text"
            })),
        )
        .await
        .unwrap();
        assert_eq!(result["pass"], false);
        assert_eq!(result["errors"][0]["code"], "PF001");
    }

    #[tokio::test]
    async fn test_duplicate_detected() {
        let (engine, _dir) = test_engine();
        seed_memory(&engine, "a.md", "Exactly this content already exists.").await;

        let result = execute(
            &engine,
            Some(serde_json::json!({"content": "Exactly this content already exists."})),
        )
        .await
        .unwrap();
        assert_eq!(result["pass"], false);
        assert_eq!(result["duplicates"]["duplicate_type"], "exact");
    }

    #[tokio::test]
    async fn test_dry_run_never_blocks() {
        let (engine, _dir) = test_engine();
        let result = execute(
            &engine,
            Some(serde_json::json!({"content": "tiny", "dryRun": true})),
        )
        .await
        .unwrap();
        assert_eq!(result["pass"], true);
        assert_eq!(result["dry_run_would_pass"], false);
    }
}
