//! Layer / Tool Registry
//!
//! Seven layers govern the tool surface: every exposed tool belongs to
//! exactly one layer, each layer carries a token budget, and tool
//! descriptions are enriched with the owning layer's prefix at the boundary.

use serde::Serialize;

// ============================================================================
// LAYER DEFINITIONS
// ============================================================================

/// Token budget returned for tools that are not in the registry
pub const DEFAULT_TOKEN_BUDGET: u32 = 1_000;

/// A tool layer
#[derive(Debug, Clone, Serialize)]
pub struct Layer {
    /// Short id ("L1")
    pub id: &'static str,
    /// Display name
    pub name: &'static str,
    /// What the layer is for
    pub description: &'static str,
    /// Token budget shared by the layer's tools
    pub token_budget: u32,
    /// Ordering priority (lower = consulted first)
    pub priority: u8,
    /// When an agent should reach for this layer
    pub use_case: &'static str,
    /// Tools owned by the layer
    pub tools: &'static [&'static str],
}

/// The full registry, L1 through L7
pub const LAYERS: &[Layer] = &[
    Layer {
        id: "L1",
        name: "Orchestration",
        description: "Unified entry point that plans retrieval across the lower layers",
        token_budget: 2_000,
        priority: 1,
        use_case: "Start here when you need context and don't know which tool fits",
        tools: &["memory_context"],
    },
    Layer {
        id: "L2",
        name: "Core",
        description: "Primary search and save operations",
        token_budget: 1_500,
        priority: 2,
        use_case: "Direct retrieval or persistence of a known-shaped memory",
        tools: &["memory_search", "memory_save", "memory_match_triggers"],
    },
    Layer {
        id: "L3",
        name: "Discovery",
        description: "Browsing and introspection over the index",
        token_budget: 800,
        priority: 3,
        use_case: "Explore what exists before searching or mutating",
        tools: &["memory_list", "memory_stats", "memory_health"],
    },
    Layer {
        id: "L4",
        name: "Mutation",
        description: "Targeted edits to individual memories",
        token_budget: 500,
        priority: 4,
        use_case: "Update, delete, or validate a specific memory",
        tools: &["memory_update", "memory_delete", "memory_validate"],
    },
    Layer {
        id: "L5",
        name: "Lifecycle",
        description: "Database checkpoint snapshots",
        token_budget: 600,
        priority: 5,
        use_case: "Protect or restore the whole store",
        tools: &[
            "checkpoint_create",
            "checkpoint_list",
            "checkpoint_restore",
            "checkpoint_delete",
        ],
    },
    Layer {
        id: "L6",
        name: "Analysis",
        description: "Decision lineage and task-boundary checks",
        token_budget: 1_200,
        priority: 6,
        use_case: "Understand why a memory exists, or bracket a task with checks",
        tools: &["memory_drift_why", "task_preflight", "task_postflight"],
    },
    Layer {
        id: "L7",
        name: "Maintenance",
        description: "Index reconciliation and learning history",
        token_budget: 1_000,
        priority: 7,
        use_case: "Keep the index in sync with the spec folders",
        tools: &["memory_index_scan", "memory_get_learning_history"],
    },
];

// ============================================================================
// LOOKUPS
// ============================================================================

/// The layer that owns a tool, if any
pub fn get_layer_for_tool(tool: &str) -> Option<&'static Layer> {
    LAYERS.iter().find(|l| l.tools.contains(&tool))
}

/// The owning layer's token budget, or the default for unknown tools
pub fn get_token_budget(tool: &str) -> u32 {
    get_layer_for_tool(tool)
        .map(|l| l.token_budget)
        .unwrap_or(DEFAULT_TOKEN_BUDGET)
}

/// Prefix a tool description with its layer tag ("[L2:Core] ...").
///
/// Unknown tools get no prefix; the registry is the authority on what is
/// exposed, so an unregistered name reaching this point is logged.
pub fn enhance_description(tool: &str, description: &str) -> String {
    match get_layer_for_tool(tool) {
        Some(layer) => format!("[{}:{}] {}", layer.id, layer.name, description),
        None => {
            tracing::debug!("no layer registered for tool '{}'", tool);
            description.to_string()
        }
    }
}

/// Ordered layers an agent should consult for a task class.
///
/// Unknown task classes get a default list beginning with L1.
pub fn get_recommended_layers(task: &str) -> Vec<&'static str> {
    match task {
        "search" => vec!["L1", "L2", "L3"],
        "browse" => vec!["L3", "L1"],
        "modify" => vec!["L4", "L2", "L3"],
        "checkpoint" => vec!["L5", "L3"],
        "analyze" => vec!["L6", "L1", "L3"],
        "maintenance" => vec!["L7", "L3", "L5"],
        _ => vec!["L1", "L2", "L3", "L6"],
    }
}

/// Sum of all layer budgets
pub fn total_budget() -> u32 {
    LAYERS.iter().map(|l| l.token_budget).sum()
}

// ============================================================================
// TESTS
// ============================================================================
