//! MCP Tools
//!
//! One module per tool family. The exposed catalog is generated from the
//! layer registry, so a tool that is not registered there cannot be listed:
//! the registry fails closed.

pub mod checkpoint;
pub mod context;
pub mod delete;
pub mod drift;
pub mod health;
pub mod index_scan;
pub mod learning_history;
pub mod list;
pub mod save;
pub mod search;
pub mod stats;
pub mod task_flight;
pub mod triggers;
pub mod update;
pub mod validate;

use std::sync::Arc;

use serde_json::Value;
use speckit_core::{layers, MemoryEngine, MemoryError};

/// Static description and schema for one tool name
struct ToolSpec {
    description: &'static str,
    schema: fn() -> Value,
}

fn spec_for(name: &str) -> Option<ToolSpec> {
    let spec = match name {
        "memory_context" => ToolSpec {
            description: "Unified retrieval entry point. Classifies the query intent, runs \
                          hybrid search, touches session working memory, and returns a \
                          token-budgeted context block.",
            schema: context::schema,
        },
        "memory_search" => ToolSpec {
            description: "Hybrid search over memories: dense vectors + BM25 + causal graph, \
                          merged by reciprocal rank fusion with intent-weighted ranking.",
            schema: search::schema,
        },
        "memory_save" => ToolSpec {
            description: "Save developer-authored content through preflight validation and \
                          the prediction-error gate (CREATE / UPDATE / SUPERSEDE / REINFORCE / \
                          CREATE_LINKED).",
            schema: save::schema,
        },
        "memory_match_triggers" => ToolSpec {
            description: "Match a message against stored trigger phrases and return the \
                          memories they belong to.",
            schema: triggers::schema,
        },
        "memory_list" => ToolSpec {
            description: "Browse memories by spec folder with pagination; archived entries \
                          are excluded unless requested.",
            schema: list::schema,
        },
        "memory_stats" => ToolSpec {
            description: "Index, embedding, graph, session, and archival statistics.",
            schema: stats::schema,
        },
        "memory_health" => ToolSpec {
            description: "Health snapshot: database, FTS, provider tier, vector index, \
                          orphaned edges, and the recent fallback log.",
            schema: health::schema,
        },
        "memory_update" => ToolSpec {
            description: "Edit one memory: content (re-embedded), title, importance tier or \
                          weight, trigger phrases.",
            schema: update::schema,
        },
        "memory_delete" => ToolSpec {
            description: "Explicitly delete a memory, its embedding, FTS entry, and every \
                          causal edge touching it.",
            schema: delete::schema,
        },
        "memory_validate" => ToolSpec {
            description: "Run preflight validation (anchors, duplicates, token budget, size) \
                          over candidate content without saving.",
            schema: validate::schema,
        },
        "checkpoint_create" => ToolSpec {
            description: "Snapshot the whole memory database.",
            schema: checkpoint::create_schema,
        },
        "checkpoint_list" => ToolSpec {
            description: "List checkpoint snapshots, newest first.",
            schema: checkpoint::list_schema,
        },
        "checkpoint_restore" => ToolSpec {
            description: "Restore a snapshot over the live database; a safety copy is \
                          written first.",
            schema: checkpoint::restore_schema,
        },
        "checkpoint_delete" => ToolSpec {
            description: "Delete a checkpoint snapshot and its metadata.",
            schema: checkpoint::delete_schema,
        },
        "memory_drift_why" => ToolSpec {
            description: "Decision lineage: traverse incoming causal edges from a memory to \
                          show what led to it.",
            schema: drift::schema,
        },
        "task_preflight" => ToolSpec {
            description: "Pre-task readiness: relevant memories, trigger hits, health \
                          warnings, and recommended layers for the task.",
            schema: task_flight::preflight_schema,
        },
        "task_postflight" => ToolSpec {
            description: "Post-task capture: save learnings through the gate and link them \
                          into the causal graph.",
            schema: task_flight::postflight_schema,
        },
        "memory_index_scan" => ToolSpec {
            description: "Walk a spec-folder root, reconcile the index incrementally \
                          (mtime fast path, content hashes), and embed changed files.",
            schema: index_scan::schema,
        },
        "memory_get_learning_history" => ToolSpec {
            description: "Gate decisions and conflicts, newest first, optionally filtered \
                          by action.",
            schema: learning_history::schema,
        },
        _ => return None,
    };
    Some(spec)
}

/// (name, enriched description, schema) for every registered tool,
/// in layer order
pub fn catalog() -> Vec<(String, String, Value)> {
    let mut out = Vec::new();
    for layer in layers::LAYERS {
        for name in layer.tools {
            let Some(spec) = spec_for(name) else {
                tracing::warn!(tool = name, "registered tool has no implementation entry");
                continue;
            };
            out.push((
                name.to_string(),
                layers::enhance_description(name, spec.description),
                (spec.schema)(),
            ));
        }
    }
    out
}

/// Route a tools/call to its implementation
pub async fn dispatch(
    name: &str,
    engine: &Arc<MemoryEngine>,
    args: Option<Value>,
) -> Option<Result<Value, MemoryError>> {
    let result = match name {
        "memory_context" => context::execute(engine, args).await,
        "memory_search" => search::execute(engine, args).await,
        "memory_save" => save::execute(engine, args).await,
        "memory_match_triggers" => triggers::execute(engine, args).await,
        "memory_list" => list::execute(engine, args).await,
        "memory_stats" => stats::execute(engine, args).await,
        "memory_health" => health::execute(engine, args).await,
        "memory_update" => update::execute(engine, args).await,
        "memory_delete" => delete::execute(engine, args).await,
        "memory_validate" => validate::execute(engine, args).await,
        "checkpoint_create" => checkpoint::execute_create(engine, args).await,
        "checkpoint_list" => checkpoint::execute_list(engine, args).await,
        "checkpoint_restore" => checkpoint::execute_restore(engine, args).await,
        "checkpoint_delete" => checkpoint::execute_delete(engine, args).await,
        "memory_drift_why" => drift::execute(engine, args).await,
        "task_preflight" => task_flight::execute_preflight(engine, args).await,
        "task_postflight" => task_flight::execute_postflight(engine, args).await,
        "memory_index_scan" => index_scan::execute(engine, args).await,
        "memory_get_learning_history" => learning_history::execute(engine, args).await,
        _ => return None,
    };
    Some(result)
}

// ============================================================================
// SHARED TEST HARNESS
// ============================================================================

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use speckit_core::embeddings::{EmbeddingProvider, ProviderTier};
    use speckit_core::{EngineConfig, MemoryEngine, ProviderChain};
    use tempfile::TempDir;

    /// Engine pinned to the lexical sentinel: deterministic, no network,
    /// no model downloads
    pub fn test_engine() -> (Arc<MemoryEngine>, TempDir) {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::default();
        let chain = Arc::new(ProviderChain::with_provider(
            config.clone(),
            EmbeddingProvider::Lexical,
            ProviderTier::Tertiary,
        ));
        let engine =
            MemoryEngine::with_chain(config, Some(dir.path().join("test.db")), chain).unwrap();
        (Arc::new(engine), dir)
    }

    pub async fn seed_memory(engine: &Arc<MemoryEngine>, path: &str, content: &str) -> i64 {
        engine
            .save(speckit_core::SaveRequest::new(content, path, "spec"))
            .await
            .unwrap()
            .memory_id
            .unwrap()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_covers_every_registered_tool() {
        let catalog = catalog();
        let total_registered: usize = layers::LAYERS.iter().map(|l| l.tools.len()).sum();
        assert_eq!(catalog.len(), total_registered);
    }

    #[test]
    fn test_catalog_descriptions_are_enriched() {
        for (name, description, schema) in catalog() {
            assert!(
                description.starts_with('['),
                "{name} description missing layer prefix"
            );
            assert_eq!(schema["type"], "object", "{name} schema is not an object");
        }
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool_is_none() {
        let (engine, _dir) = testing::test_engine();
        assert!(dispatch("mystery_tool", &engine, None).await.is_none());
    }
}
