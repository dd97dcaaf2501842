//! task_preflight / task_postflight tools: bracket a task with memory.
//!
//! Preflight gathers what the agent should know before starting; postflight
//! captures what was learned and wires it into the causal graph.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use speckit_core::{
    get_recommended_layers, CausalRelation, ErrorCode, MemoryEngine, MemoryError, NewEdge,
    ProviderTier, SaveRequest, SearchRequest,
};

// ============================================================================
// PREFLIGHT
// ============================================================================

pub fn preflight_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "task": {
                "type": "string",
                "description": "What the agent is about to do"
            },
            "sessionId": { "type": "string" },
            "limit": {
                "type": "integer",
                "default": 5,
                "minimum": 1,
                "maximum": 20
            }
        },
        "required": ["task"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreflightArgs {
    task: String,
    session_id: Option<String>,
    limit: Option<usize>,
}

pub async fn execute_preflight(
    engine: &Arc<MemoryEngine>,
    args: Option<Value>,
) -> Result<Value, MemoryError> {
    let args: PreflightArgs = match args {
        Some(v) => serde_json::from_value(v)
            .map_err(|e| MemoryError::new(ErrorCode::InvalidParameterFormat, e.to_string()))?,
        None => {
            return Err(MemoryError::new(
                ErrorCode::MissingParameter,
                "task_preflight requires a task description",
            ))
        }
    };

    let response = engine
        .search(SearchRequest {
            query: args.task.clone(),
            limit: args.limit.unwrap_or(5).clamp(1, 20),
            intent: None,
            auto_detect_intent: true,
            spec_folder: None,
        })
        .await?;

    let triggered = engine.match_triggers(&args.task)?;

    let mut warnings = Vec::new();
    if engine.chain().active_tier().await == ProviderTier::Tertiary {
        warnings.push("lexical-only mode: semantic recall is unavailable".to_string());
    }
    let stats = engine.store().stats()?;
    if stats.failed > 0 {
        warnings.push(format!("{} memories have failed embeddings", stats.failed));
    }

    if let Some(session_id) = &args.session_id {
        engine.working_memory().get_or_create_session(session_id)?;
    }

    let task_class = response
        .intent
        .as_ref()
        .map(|i| match i.intent {
            speckit_core::QueryIntent::Understand => "search",
            speckit_core::QueryIntent::AddFeature | speckit_core::QueryIntent::FixBug => "modify",
            speckit_core::QueryIntent::Refactor => "modify",
            speckit_core::QueryIntent::SecurityAudit => "analyze",
        })
        .unwrap_or("search");

    let relevant: Vec<Value> = response
        .results
        .iter()
        .map(|hit| {
            serde_json::json!({
                "id": hit.memory.id,
                "title": hit.memory.title,
                "filePath": hit.memory.file_path,
                "score": hit.final_score,
            })
        })
        .collect();

    Ok(serde_json::json!({
        "relevantMemories": relevant,
        "triggeredMemories": triggered,
        "intent": response.intent,
        "recommendedLayers": get_recommended_layers(task_class),
        "warnings": warnings,
    }))
}

// ============================================================================
// POSTFLIGHT
// ============================================================================

pub fn postflight_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "learnings": {
                "type": "array",
                "description": "What the task taught; each runs through the gate",
                "items": {
                    "type": "object",
                    "properties": {
                        "content": { "type": "string" },
                        "file_path": { "type": "string" },
                        "spec_folder": { "type": "string" }
                    },
                    "required": ["content", "file_path", "spec_folder"]
                }
            },
            "links": {
                "type": "array",
                "description": "Causal edges between memory ids",
                "items": {
                    "type": "object",
                    "properties": {
                        "source_id": { "type": "integer" },
                        "target_id": { "type": "integer" },
                        "relation": {
                            "type": "string",
                            "enum": ["caused", "enabled", "supersedes", "contradicts",
                                     "derived_from", "supports"]
                        },
                        "strength": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
                        "evidence": { "type": "string" }
                    },
                    "required": ["source_id", "target_id", "relation"]
                }
            }
        },
        "required": ["learnings"]
    })
}

#[derive(Debug, Deserialize)]
struct PostflightArgs {
    learnings: Vec<LearningItem>,
    #[serde(default)]
    links: Vec<LinkItem>,
}

#[derive(Debug, Deserialize)]
struct LearningItem {
    content: String,
    file_path: String,
    spec_folder: String,
}

#[derive(Debug, Deserialize)]
struct LinkItem {
    source_id: i64,
    target_id: i64,
    relation: String,
    strength: Option<f64>,
    evidence: Option<String>,
}

pub async fn execute_postflight(
    engine: &Arc<MemoryEngine>,
    args: Option<Value>,
) -> Result<Value, MemoryError> {
    let args: PostflightArgs = match args {
        Some(v) => serde_json::from_value(v)
            .map_err(|e| MemoryError::new(ErrorCode::InvalidParameterFormat, e.to_string()))?,
        None => {
            return Err(MemoryError::new(
                ErrorCode::MissingParameter,
                "task_postflight requires learnings",
            ))
        }
    };
    if args.learnings.is_empty() {
        return Err(MemoryError::new(
            ErrorCode::MissingParameter,
            "learnings must be a non-empty list",
        ));
    }

    let mut results = Vec::new();
    for (i, item) in args.learnings.iter().enumerate() {
        match engine
            .save(SaveRequest::new(
                item.content.clone(),
                item.file_path.clone(),
                item.spec_folder.clone(),
            ))
            .await
        {
            Ok(outcome) => results.push(serde_json::json!({
                "index": i,
                "saved": outcome.saved,
                "action": outcome.decision.as_ref().map(|d| d.action.as_str()),
                "memoryId": outcome.memory_id,
                "blockedByPreflight": outcome.blocked_by_preflight,
            })),
            Err(e) => results.push(serde_json::json!({
                "index": i,
                "saved": false,
                "error": e.to_string(),
            })),
        }
    }

    // Links go through the batch path: partial failure never aborts
    let edges: Vec<NewEdge> = args
        .links
        .iter()
        .filter_map(|link| {
            CausalRelation::parse(&link.relation).map(|relation| NewEdge {
                source_id: link.source_id,
                target_id: link.target_id,
                relation,
                strength: link.strength.unwrap_or(0.5),
                evidence: link.evidence.clone(),
            })
        })
        .collect();
    let unparsed_links = args.links.len() - edges.len();
    let link_result = engine.store().insert_edges_batch(&edges)?;

    Ok(serde_json::json!({
        "learnings": results,
        "links": {
            "total": args.links.len(),
            "inserted": link_result.inserted,
            "failed": link_result.failed + unparsed_links,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{seed_memory, test_engine};

    #[tokio::test]
    async fn test_preflight_surfaces_memories_and_warnings() {
        let (engine, _dir) = test_engine();
        seed_memory(&engine, "db/pool.md", "Size the connection pool carefully.").await;

        let result = execute_preflight(
            &engine,
            Some(serde_json::json!({"task": "fix the connection pool exhaustion"})),
        )
        .await
        .unwrap();

        assert_eq!(result["relevantMemories"].as_array().unwrap().len(), 1);
        // Lexical sentinel always warns
        assert!(!result["warnings"].as_array().unwrap().is_empty());
        assert!(result["recommendedLayers"].as_array().unwrap().len() > 0);
    }

    #[tokio::test]
    async fn test_postflight_saves_and_links() {
        let (engine, _dir) = test_engine();
        let existing = seed_memory(&engine, "a.md", "The old approach caused flaky tests.").await;

        let result = execute_postflight(
            &engine,
            Some(serde_json::json!({
                "learnings": [
                    {
                        "content": "Pin the container clock in integration tests.",
                        "file_path": "ci/clock.md",
                        "spec_folder": "ci"
                    }
                ],
                "links": []
            })),
        )
        .await
        .unwrap();

        let learnings = result["learnings"].as_array().unwrap();
        assert_eq!(learnings.len(), 1);
        assert_eq!(learnings[0]["saved"], true);
        let new_id = learnings[0]["memoryId"].as_i64().unwrap();

        // Now link it to the prior memory
        let linked = execute_postflight(
            &engine,
            Some(serde_json::json!({
                "learnings": [
                    {
                        "content": "Flakiness disappeared after pinning the clock.",
                        "file_path": "ci/outcome.md",
                        "spec_folder": "ci"
                    }
                ],
                "links": [
                    {"source_id": existing, "target_id": new_id, "relation": "caused"}
                ]
            })),
        )
        .await
        .unwrap();
        assert_eq!(linked["links"]["inserted"], 1);
    }

    #[tokio::test]
    async fn test_postflight_bad_link_does_not_abort() {
        let (engine, _dir) = test_engine();
        let a = seed_memory(&engine, "a.md", "First memory for linking tests.").await;
        let b = seed_memory(&engine, "b.md", "Second memory for linking tests.").await;

        let result = execute_postflight(
            &engine,
            Some(serde_json::json!({
                "learnings": [
                    {
                        "content": "A learning that should still be saved.",
                        "file_path": "c.md",
                        "spec_folder": "spec"
                    }
                ],
                "links": [
                    {"source_id": a, "target_id": b, "relation": "supports"},
                    {"source_id": a, "target_id": a, "relation": "supports"},
                    {"source_id": a, "target_id": b, "relation": "not_a_relation"}
                ]
            })),
        )
        .await
        .unwrap();

        assert_eq!(result["links"]["inserted"], 1);
        assert_eq!(result["links"]["failed"], 2);
        assert_eq!(result["learnings"][0]["saved"], true);
    }

    #[tokio::test]
    async fn test_postflight_empty_learnings_rejected() {
        let (engine, _dir) = test_engine();
        let err = execute_postflight(&engine, Some(serde_json::json!({"learnings": []})))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingParameter);
    }
}
