//! memory_stats tool: counters across the whole engine.

use std::sync::Arc;

use serde_json::Value;
use speckit_core::{MemoryEngine, MemoryError};

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {}
    })
}

pub async fn execute(
    engine: &Arc<MemoryEngine>,
    _args: Option<Value>,
) -> Result<Value, MemoryError> {
    let index = engine.store().stats()?;
    let graph = engine.store().graph_stats()?;
    let profile = engine.chain().profile().await;
    let tier = engine.chain().active_tier().await;
    let chain_stats = engine.chain().stats();
    let archival = engine.archival().get_stats();

    Ok(serde_json::json!({
        "index": index,
        "graph": graph,
        "provider": {
            "profile": profile,
            "tier": tier,
            "embedsSucceeded": chain_stats.embeds_succeeded,
            "embedsFailed": chain_stats.embeds_failed,
            "fallbacks": chain_stats.fallbacks,
        },
        "archival": archival,
    }))
}
