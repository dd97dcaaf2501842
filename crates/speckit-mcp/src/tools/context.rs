//! memory_context tool: the unified retrieval entry point.
//!
//! Runs hybrid search, pulls each hit into the session's working memory
//! with a rank-derived attention score, spreads activation from the top
//! hit, and formats content under the orchestration layer's token budget.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use speckit_core::{
    estimate_tokens, get_token_budget, ErrorCode, MemoryEngine, MemoryError, SearchRequest,
};

const TOOL_NAME: &str = "memory_context";

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "What the agent is working on right now"
            },
            "sessionId": {
                "type": "string",
                "description": "Session to track attention in (created on first use)"
            },
            "turn": {
                "type": "integer",
                "description": "Conversation turn number (default 0)",
                "minimum": 0
            },
            "limit": {
                "type": "integer",
                "description": "Maximum memories to consider (default 5)",
                "default": 5,
                "minimum": 1,
                "maximum": 20
            },
            "specFolder": {
                "type": "string",
                "description": "Restrict to one spec folder"
            }
        },
        "required": ["query"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContextArgs {
    query: String,
    session_id: Option<String>,
    turn: Option<u64>,
    limit: Option<usize>,
    spec_folder: Option<String>,
}

pub async fn execute(
    engine: &Arc<MemoryEngine>,
    args: Option<Value>,
) -> Result<Value, MemoryError> {
    let args: ContextArgs = match args {
        Some(v) => serde_json::from_value(v)
            .map_err(|e| MemoryError::new(ErrorCode::InvalidParameterFormat, e.to_string()))?,
        None => {
            return Err(MemoryError::new(
                ErrorCode::MissingParameter,
                "memory_context requires a query",
            ))
        }
    };

    let limit = args.limit.unwrap_or(5).clamp(1, 20);
    let turn = args.turn.unwrap_or(0);

    let response = engine
        .search(SearchRequest {
            query: args.query.clone(),
            limit,
            intent: None,
            auto_detect_intent: true,
            spec_folder: args.spec_folder,
        })
        .await?;

    // Attention: the best hit gets the full score, the rest fall off by rank
    let mut working_set = Vec::new();
    if let Some(session_id) = &args.session_id {
        let wm = engine.working_memory();
        for (rank, hit) in response.results.iter().enumerate() {
            let score = (1.0 - rank as f64 * 0.15).clamp(0.0, 1.0);
            let entry = wm.set_attention_score(session_id, hit.memory.id, score, turn)?;
            working_set.push(serde_json::json!({
                "memoryId": entry.memory_id,
                "attentionScore": entry.attention_score,
                "tier": entry.tier.as_str(),
            }));
        }
        if let Some(top) = response.results.first() {
            let boosted = wm.spread_activation(session_id, top.memory.id, turn)?;
            if !boosted.is_empty() {
                tracing::debug!(?boosted, "spreading activation from top hit");
            }
        }
    }

    // Fill the layer's token budget, most relevant first
    let budget = get_token_budget(TOOL_NAME) as usize;
    let mut spent = 0usize;
    let mut blocks = Vec::new();
    for hit in &response.results {
        let block = format!(
            "## {} ({})\n{}",
            hit.memory.title, hit.memory.file_path, hit.memory.content
        );
        let cost = estimate_tokens(&block, false);
        if spent + cost > budget && !blocks.is_empty() {
            break;
        }
        spent += cost;
        blocks.push(serde_json::json!({
            "id": hit.memory.id,
            "title": hit.memory.title,
            "filePath": hit.memory.file_path,
            "score": hit.final_score,
            "content": hit.memory.content,
        }));
    }

    Ok(serde_json::json!({
        "context": blocks,
        "intent": response.intent,
        "workingMemory": working_set,
        "budget": {
            "layerBudget": budget,
            "estimatedTokens": spent,
        },
        "lexicalOnly": response.lexical_only,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{seed_memory, test_engine};

    #[tokio::test]
    async fn test_context_without_session() {
        let (engine, _dir) = test_engine();
        seed_memory(&engine, "auth/tokens.md", "Rotate refresh tokens on every use.").await;

        let result = execute(
            &engine,
            Some(serde_json::json!({"query": "refresh tokens"})),
        )
        .await
        .unwrap();

        assert_eq!(result["context"].as_array().unwrap().len(), 1);
        assert!(result["workingMemory"].as_array().unwrap().is_empty());
        assert!(result["budget"]["estimatedTokens"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_context_tracks_working_memory() {
        let (engine, _dir) = test_engine();
        seed_memory(&engine, "auth/tokens.md", "Rotate refresh tokens on every use.").await;

        let result = execute(
            &engine,
            Some(serde_json::json!({
                "query": "refresh tokens",
                "sessionId": "s1",
                "turn": 2
            })),
        )
        .await
        .unwrap();

        let working = result["workingMemory"].as_array().unwrap();
        assert_eq!(working.len(), 1);
        assert_eq!(working[0]["tier"], "HOT");

        let stats = engine.working_memory().get_session_stats("s1").unwrap();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hot, 1);
    }

    #[tokio::test]
    async fn test_budget_is_layer_budget() {
        let (engine, _dir) = test_engine();
        seed_memory(&engine, "a.md", "Content one about fusion ranking.").await;

        let result = execute(&engine, Some(serde_json::json!({"query": "fusion"})))
            .await
            .unwrap();
        assert_eq!(result["budget"]["layerBudget"], 2000);
    }

    #[tokio::test]
    async fn test_missing_query_fails() {
        let (engine, _dir) = test_engine();
        let err = execute(&engine, None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingParameter);
    }
}
