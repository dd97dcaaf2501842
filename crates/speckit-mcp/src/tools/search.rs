//! memory_search tool: hybrid retrieval with intent-weighted ranking.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use speckit_core::{
    ErrorCode, MemoryEngine, MemoryError, QueryIntent, SearchRequest,
};

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "What to search for"
            },
            "limit": {
                "type": "integer",
                "description": "Maximum results (default 10)",
                "default": 10,
                "minimum": 1,
                "maximum": 50
            },
            "intent": {
                "type": "string",
                "enum": ["add_feature", "fix_bug", "refactor", "security_audit", "understand"],
                "description": "Overrides the intent classifier when provided"
            },
            "autoDetectIntent": {
                "type": "boolean",
                "description": "Classify the query intent automatically (default true)",
                "default": true
            },
            "specFolder": {
                "type": "string",
                "description": "Restrict results to one spec folder"
            }
        },
        "required": ["query"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchArgs {
    query: String,
    limit: Option<usize>,
    intent: Option<String>,
    auto_detect_intent: Option<bool>,
    spec_folder: Option<String>,
}

pub async fn execute(
    engine: &Arc<MemoryEngine>,
    args: Option<Value>,
) -> Result<Value, MemoryError> {
    let args: SearchArgs = match args {
        Some(v) => serde_json::from_value(v)
            .map_err(|e| MemoryError::new(ErrorCode::InvalidParameterFormat, e.to_string()))?,
        None => {
            return Err(MemoryError::new(
                ErrorCode::MissingParameter,
                "memory_search requires a query",
            ))
        }
    };

    let intent = match args.intent.as_deref() {
        Some(raw) => Some(QueryIntent::parse(raw).ok_or_else(|| {
            MemoryError::new(
                ErrorCode::InvalidParameterFormat,
                format!("unknown intent '{raw}'"),
            )
        })?),
        None => None,
    };

    let response = engine
        .search(SearchRequest {
            query: args.query,
            limit: args.limit.unwrap_or(10).clamp(1, 50),
            intent,
            auto_detect_intent: args.auto_detect_intent.unwrap_or(true),
            spec_folder: args.spec_folder,
        })
        .await?;

    let results: Vec<Value> = response
        .results
        .iter()
        .map(|hit| {
            serde_json::json!({
                "id": hit.memory.id,
                "title": hit.memory.title,
                "filePath": hit.memory.file_path,
                "specFolder": hit.memory.spec_folder,
                "importanceTier": hit.memory.importance_tier,
                "score": hit.final_score,
                "rrfScore": hit.rrf_score,
                "similarity": hit.similarity,
                "sources": {
                    "vector": hit.in_vector,
                    "fts": hit.in_fts,
                    "graph": hit.in_graph,
                },
                "preview": preview(&hit.memory.content),
            })
        })
        .collect();

    let count = results.len();
    Ok(serde_json::json!({
        "results": results,
        "count": count,
        "intent": response.intent,
        "fusion": response.fusion,
        "lexicalOnly": response.lexical_only,
    }))
}

fn preview(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() <= 240 {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(240).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{seed_memory, test_engine};

    #[test]
    fn test_schema_requires_query() {
        let s = schema();
        assert_eq!(s["required"][0], "query");
    }

    #[tokio::test]
    async fn test_missing_args_fails() {
        let (engine, _dir) = test_engine();
        let err = execute(&engine, None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingParameter);
    }

    #[tokio::test]
    async fn test_search_finds_seeded_memory() {
        let (engine, _dir) = test_engine();
        seed_memory(&engine, "net/retry.md", "Retry with exponential backoff on 503.").await;

        let result = execute(
            &engine,
            Some(serde_json::json!({"query": "exponential backoff"})),
        )
        .await
        .unwrap();

        assert_eq!(result["count"], 1);
        assert_eq!(result["results"][0]["filePath"], "net/retry.md");
        assert_eq!(result["lexicalOnly"], true);
    }

    #[tokio::test]
    async fn test_intent_override() {
        let (engine, _dir) = test_engine();
        seed_memory(&engine, "net/retry.md", "Retry with exponential backoff on 503.").await;

        let result = execute(
            &engine,
            Some(serde_json::json!({"query": "backoff", "intent": "fix_bug"})),
        )
        .await
        .unwrap();
        assert_eq!(result["intent"]["intent"], "fix_bug");
        assert_eq!(result["intent"]["confidence"], 1.0);
    }

    #[tokio::test]
    async fn test_unknown_intent_rejected() {
        let (engine, _dir) = test_engine();
        let err = execute(
            &engine,
            Some(serde_json::json!({"query": "x", "intent": "make_coffee"})),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParameterFormat);
    }

    #[tokio::test]
    async fn test_empty_query_is_typed_error() {
        let (engine, _dir) = test_engine();
        let err = execute(&engine, Some(serde_json::json!({"query": "  "})))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EmptyQuery);
    }
}
