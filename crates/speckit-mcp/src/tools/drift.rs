//! memory_drift_why tool: decision lineage from incoming causal edges.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use speckit_core::{
    ErrorCode, MemoryEngine, MemoryError, TraversalDirection, MAX_TRAVERSAL_DEPTH,
};

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "id": {
                "type": "integer",
                "description": "Memory whose lineage to explain"
            },
            "maxDepth": {
                "type": "integer",
                "description": "Traversal depth; clamped to 10",
                "default": 5,
                "minimum": 1
            }
        },
        "required": ["id"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriftArgs {
    id: i64,
    max_depth: Option<u32>,
}

pub async fn execute(
    engine: &Arc<MemoryEngine>,
    args: Option<Value>,
) -> Result<Value, MemoryError> {
    let args: DriftArgs = match args {
        Some(v) => serde_json::from_value(v)
            .map_err(|e| MemoryError::new(ErrorCode::InvalidParameterFormat, e.to_string()))?,
        None => {
            return Err(MemoryError::new(
                ErrorCode::MissingParameter,
                "memory_drift_why requires a memory id",
            ))
        }
    };

    let root = engine.store().get_memory(args.id)?.ok_or_else(|| {
        MemoryError::new(
            ErrorCode::MemoryNotFound,
            format!("memory {} not found", args.id),
        )
    })?;

    let chain = engine.graph().get_causal_chain(
        args.id,
        TraversalDirection::Incoming,
        None,
        args.max_depth.unwrap_or(5).min(MAX_TRAVERSAL_DEPTH),
    )?;

    // Lineage entries joined with titles so the agent can read the story
    let mut lineage = Vec::new();
    for chain_edge in &chain.edges {
        let source = engine.store().get_memory(chain_edge.edge.source_id)?;
        lineage.push(serde_json::json!({
            "depth": chain_edge.depth,
            "relation": chain_edge.edge.relation,
            "strength": chain_edge.edge.strength,
            "evidence": chain_edge.edge.evidence,
            "sourceId": chain_edge.edge.source_id,
            "sourceTitle": source.as_ref().map(|m| m.title.clone()),
            "sourcePath": source.as_ref().map(|m| m.file_path.clone()),
            "targetId": chain_edge.edge.target_id,
        }));
    }

    Ok(serde_json::json!({
        "memory": {
            "id": root.id,
            "title": root.title,
            "filePath": root.file_path,
        },
        "lineage": lineage,
        "byRelation": chain.by_relation,
        "traversalOptions": chain.traversal_options,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{seed_memory, test_engine};
    use speckit_core::{CausalRelation, NewEdge};

    #[tokio::test]
    async fn test_lineage_walks_incoming_edges() {
        let (engine, _dir) = test_engine();
        let cause = seed_memory(&engine, "a.md", "We hit N+1 queries on the list page.").await;
        let decision =
            seed_memory(&engine, "b.md", "Batch-load associations on list endpoints.").await;
        engine
            .store()
            .insert_edge(&NewEdge {
                source_id: cause,
                target_id: decision,
                relation: CausalRelation::Caused,
                strength: 0.9,
                evidence: Some("profiling session".to_string()),
            })
            .unwrap();

        let result = execute(&engine, Some(serde_json::json!({"id": decision})))
            .await
            .unwrap();
        let lineage = result["lineage"].as_array().unwrap();
        assert_eq!(lineage.len(), 1);
        assert_eq!(lineage[0]["relation"], "caused");
        assert_eq!(lineage[0]["sourceId"], cause);
        assert!(lineage[0]["sourceTitle"].is_string());
    }

    #[tokio::test]
    async fn test_depth_is_clamped() {
        let (engine, _dir) = test_engine();
        let id = seed_memory(&engine, "a.md", "A memory with no lineage at all.").await;

        let result = execute(
            &engine,
            Some(serde_json::json!({"id": id, "maxDepth": 50})),
        )
        .await
        .unwrap();
        assert_eq!(result["traversalOptions"]["max_depth"], 10);
        assert!(result["lineage"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_memory() {
        let (engine, _dir) = test_engine();
        let err = execute(&engine, Some(serde_json::json!({"id": 404})))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::MemoryNotFound);
    }
}
