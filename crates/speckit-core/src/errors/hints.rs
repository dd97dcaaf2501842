//! Recovery Hint Catalog
//!
//! Every error code maps to a hint: what happened, what to do about it, and
//! how bad it is. Tool-specific overrides take precedence over the generic
//! catalog; unknown codes fall through to `DEFAULT_HINT`, which always points
//! at `memory_health()`.

use std::collections::HashMap;

use serde::Serialize;

use super::codes::{ErrorCode, Severity};

// ============================================================================
// HINT TYPE
// ============================================================================

/// A recovery hint attached to an error at the tool boundary
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryHint {
    /// One-sentence explanation of the likely cause
    pub hint: &'static str,
    /// Ordered actions the caller should try
    pub actions: &'static [&'static str],
    /// Severity band of the underlying code
    pub severity: Severity,
    /// Optional extra guidance for tool UIs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_tip: Option<&'static str>,
}

/// Fallback hint for codes outside the registry
pub const DEFAULT_HINT: RecoveryHint = RecoveryHint {
    hint: "An unrecognized error occurred",
    actions: &[
        "Run memory_health() to check overall system state",
        "Retry the operation once",
        "Report the error code if it persists",
    ],
    severity: Severity::Medium,
    tool_tip: None,
};

/// Returns the fallback hint
pub fn default_hint() -> RecoveryHint {
    DEFAULT_HINT.clone()
}

// ============================================================================
// GENERIC CATALOG
// ============================================================================

fn generic_hint(code: ErrorCode) -> RecoveryHint {
    let severity = code.severity();
    match code {
        // Embedding
        ErrorCode::EmbeddingGenerationFailed => RecoveryHint {
            hint: "The active embedding provider failed to produce a vector",
            actions: &[
                "Check provider status with memory_health()",
                "Retry; the chain falls back to lexical-only search automatically",
            ],
            severity,
            tool_tip: Some("Search keeps working in lexical-only mode"),
        },
        ErrorCode::EmbeddingDimensionMismatch => RecoveryHint {
            hint: "A vector's length does not match the provider profile dimension",
            actions: &[
                "Re-run memory_index_scan with force=true to re-embed affected memories",
                "Verify EMBEDDINGS_PROVIDER did not change without a re-index",
            ],
            severity,
            tool_tip: None,
        },
        ErrorCode::EmbeddingModelUnavailable => RecoveryHint {
            hint: "No embedding model could be initialized",
            actions: &[
                "Check EMBEDDINGS_PROVIDER and credentials",
                "Enable the local fallback with ENABLE_LOCAL_FALLBACK=true",
            ],
            severity,
            tool_tip: None,
        },
        ErrorCode::EmbeddingBatchFailed => RecoveryHint {
            hint: "A batch embedding call failed partway",
            actions: &["Retry the batch", "Reduce the batch size"],
            severity,
            tool_tip: None,
        },

        // File
        ErrorCode::FileNotFound => RecoveryHint {
            hint: "The referenced file does not exist on disk",
            actions: &[
                "Verify the path is relative to the spec folder root",
                "Run memory_index_scan to reconcile the index with the filesystem",
            ],
            severity,
            tool_tip: None,
        },
        ErrorCode::FileReadFailed => RecoveryHint {
            hint: "The file exists but could not be read",
            actions: &["Check file permissions", "Retry the operation"],
            severity,
            tool_tip: None,
        },
        ErrorCode::FileWriteFailed => RecoveryHint {
            hint: "Writing to disk failed",
            actions: &["Check disk space and permissions", "Retry the operation"],
            severity,
            tool_tip: None,
        },
        ErrorCode::FileTooLarge => RecoveryHint {
            hint: "The file exceeds the configured size limit",
            actions: &["Split the document into smaller memories"],
            severity,
            tool_tip: None,
        },
        ErrorCode::InvalidFilePath => RecoveryHint {
            hint: "The path is malformed or escapes the spec folder",
            actions: &["Use a relative path inside the spec folder"],
            severity,
            tool_tip: None,
        },

        // Database
        ErrorCode::DbConnectionFailed => RecoveryHint {
            hint: "The memory database could not be opened",
            actions: &[
                "Run checkpoint_list() to find a restorable snapshot",
                "Check the database path and permissions",
                "Restore with checkpoint_restore if the file is damaged",
            ],
            severity,
            tool_tip: Some("Data may be recoverable from the latest checkpoint"),
        },
        ErrorCode::DbQueryFailed => RecoveryHint {
            hint: "A database query failed unexpectedly",
            actions: &["Retry once", "Run memory_health() if it persists"],
            severity,
            tool_tip: None,
        },
        ErrorCode::DbCorruption => RecoveryHint {
            hint: "The database reports corruption",
            actions: &[
                "Run checkpoint_list() immediately",
                "Restore the most recent checkpoint with checkpoint_restore",
                "Do not write further memories until restored",
            ],
            severity,
            tool_tip: Some("Stop writes until a checkpoint is restored"),
        },
        ErrorCode::DbMigrationFailed => RecoveryHint {
            hint: "A schema migration did not complete",
            actions: &[
                "Run checkpoint_list() to locate a pre-migration snapshot",
                "Restore and retry with a clean shutdown",
            ],
            severity,
            tool_tip: None,
        },
        ErrorCode::DbLocked => RecoveryHint {
            hint: "Another writer holds the database lock",
            actions: &["Retry; the busy timeout usually clears this"],
            severity,
            tool_tip: None,
        },

        // Parameters
        ErrorCode::MissingParameter => RecoveryHint {
            hint: "A required parameter was not supplied",
            actions: &["Check the tool's input schema and resubmit"],
            severity,
            tool_tip: None,
        },
        ErrorCode::InvalidParameterType => RecoveryHint {
            hint: "A parameter has the wrong JSON type",
            actions: &["Check the tool's input schema and resubmit"],
            severity,
            tool_tip: None,
        },
        ErrorCode::ParameterOutOfRange => RecoveryHint {
            hint: "A parameter is outside its allowed range",
            actions: &["Clamp the value to the documented range"],
            severity,
            tool_tip: None,
        },
        ErrorCode::InvalidParameterFormat => RecoveryHint {
            hint: "A parameter could not be parsed",
            actions: &["Check the tool's input schema and resubmit"],
            severity,
            tool_tip: None,
        },

        // Search
        ErrorCode::SearchFailed => RecoveryHint {
            hint: "The search pipeline failed",
            actions: &[
                "Retry with a simpler query",
                "Run memory_health() to check index state",
            ],
            severity,
            tool_tip: None,
        },
        ErrorCode::EmptyQuery => RecoveryHint {
            hint: "The query string is empty",
            actions: &["Provide a non-empty query"],
            severity,
            tool_tip: None,
        },
        ErrorCode::FtsSyntaxError => RecoveryHint {
            hint: "The query contains characters the full-text engine rejects",
            actions: &["Remove quotes and operators, or quote the phrase fully"],
            severity,
            tool_tip: None,
        },
        ErrorCode::VectorIndexUnavailable => RecoveryHint {
            hint: "The vector index is not available; results are lexical-only",
            actions: &[
                "Check embedding provider status with memory_health()",
                "Re-run memory_index_scan once the provider recovers",
            ],
            severity,
            tool_tip: Some("Lexical results are still returned"),
        },
        ErrorCode::FusionFailed => RecoveryHint {
            hint: "Rank fusion failed; a single source was returned instead",
            actions: &["Retry; report if it persists"],
            severity,
            tool_tip: None,
        },

        // Auth / provider
        ErrorCode::ApiKeyInvalid => RecoveryHint {
            hint: "The embedding provider rejected the API key",
            actions: &[
                "Check VOYAGE_API_KEY / OPENAI_API_KEY",
                "Switch EMBEDDINGS_PROVIDER to a local provider to continue offline",
            ],
            severity,
            tool_tip: None,
        },
        ErrorCode::ApiKeyMissing => RecoveryHint {
            hint: "No API key is configured for the selected provider",
            actions: &[
                "Set the provider's API key environment variable",
                "Or select a local provider that needs no key",
            ],
            severity,
            tool_tip: None,
        },
        ErrorCode::ProviderUnavailable => RecoveryHint {
            hint: "The embedding provider is unreachable or erroring",
            actions: &[
                "Check the fallback log via memory_health()",
                "The chain degrades to local then lexical-only automatically",
            ],
            severity,
            tool_tip: None,
        },
        ErrorCode::ValidationTimeout => RecoveryHint {
            hint: "The credential pre-flight probe timed out",
            actions: &[
                "Check network connectivity",
                "Raise VALIDATION_TIMEOUT_MS or set SPECKIT_SKIP_API_VALIDATION=true",
            ],
            severity,
            tool_tip: None,
        },

        // Checkpoints
        ErrorCode::CheckpointCreateFailed => RecoveryHint {
            hint: "The checkpoint snapshot could not be written",
            actions: &["Check disk space", "Retry checkpoint_create"],
            severity,
            tool_tip: None,
        },
        ErrorCode::CheckpointNotFound => RecoveryHint {
            hint: "No checkpoint exists with that id",
            actions: &["Run checkpoint_list() for available snapshots"],
            severity,
            tool_tip: None,
        },
        ErrorCode::CheckpointRestoreFailed => RecoveryHint {
            hint: "Restoring the checkpoint failed; the live database is unchanged",
            actions: &[
                "Verify the checkpoint with checkpoint_list()",
                "Retry; a pre-restore safety copy protects current data",
            ],
            severity,
            tool_tip: Some("Data-loss risk; verify before retrying"),
        },
        ErrorCode::CheckpointDeleteFailed => RecoveryHint {
            hint: "The checkpoint file could not be removed",
            actions: &["Check file permissions", "Retry checkpoint_delete"],
            severity,
            tool_tip: None,
        },

        // Sessions
        ErrorCode::SessionNotFound => RecoveryHint {
            hint: "The session id is unknown",
            actions: &["Sessions are created on first use; resubmit with any id"],
            severity,
            tool_tip: None,
        },
        ErrorCode::SessionExpired => RecoveryHint {
            hint: "The session was reaped after the idle timeout",
            actions: &["Continue with the same id; a fresh session is created"],
            severity,
            tool_tip: Some("Self-healing; no action usually needed"),
        },
        ErrorCode::SessionLimitExceeded => RecoveryHint {
            hint: "Too many concurrent sessions",
            actions: &["Clear stale sessions or wait for the idle sweep"],
            severity,
            tool_tip: None,
        },

        // Memory operations
        ErrorCode::MemoryNotFound => RecoveryHint {
            hint: "No memory exists with that id",
            actions: &[
                "Use memory_list or memory_search to find the right id",
            ],
            severity,
            tool_tip: None,
        },
        ErrorCode::MemorySaveFailed => RecoveryHint {
            hint: "The save did not persist",
            actions: &[
                "Run memory_validate on the content first",
                "Retry with dryRun=true to see what preflight reports",
            ],
            severity,
            tool_tip: None,
        },
        ErrorCode::MemoryUpdateFailed => RecoveryHint {
            hint: "The update did not persist",
            actions: &["Verify the id exists", "Retry the update"],
            severity,
            tool_tip: None,
        },
        ErrorCode::MemoryDeleteFailed => RecoveryHint {
            hint: "The delete did not complete; the row may be partially removed",
            actions: &[
                "Run memory_health() to check for orphaned edges",
                "Retry the delete",
            ],
            severity,
            tool_tip: None,
        },
        ErrorCode::MemoryArchived => RecoveryHint {
            hint: "The memory is archived and excluded from this operation",
            actions: &["Unarchive it first, or include archived entries explicitly"],
            severity,
            tool_tip: None,
        },

        // Validation
        ErrorCode::ValidationFailed => RecoveryHint {
            hint: "Preflight validation rejected the content",
            actions: &[
                "Inspect the per-check results in details",
                "Use dryRun=true to preview without blocking",
            ],
            severity,
            tool_tip: None,
        },
        ErrorCode::AnchorMalformed => RecoveryHint {
            hint: "Anchor markers are unbalanced or have invalid ids",
            actions: &[
                "Ensure every <!-- ANCHOR:id --> has a matching close marker",
                "Anchor ids may use letters, digits, hyphen, underscore, slash",
            ],
            severity,
            tool_tip: None,
        },
        ErrorCode::DuplicateContent => RecoveryHint {
            hint: "Identical or near-identical content already exists",
            actions: &[
                "Reuse the existing memory id from details",
                "Pass force=true to save anyway",
            ],
            severity,
            tool_tip: None,
        },
        ErrorCode::TokenBudgetExceeded => RecoveryHint {
            hint: "The content exceeds the token budget for its layer",
            actions: &["Shorten the content or split it across memories"],
            severity,
            tool_tip: None,
        },

        // Causal graph
        ErrorCode::EdgeValidationFailed => RecoveryHint {
            hint: "The edge failed validation (relation, strength, or ids)",
            actions: &[
                "Use one of: caused, enabled, supersedes, contradicts, derived_from, supports",
                "Keep strength within [0, 1]",
            ],
            severity,
            tool_tip: None,
        },
        ErrorCode::SelfReferenceEdge => RecoveryHint {
            hint: "An edge cannot point from a memory to itself",
            actions: &["Use distinct source and target ids"],
            severity,
            tool_tip: None,
        },
        ErrorCode::DuplicateEdge => RecoveryHint {
            hint: "An edge with this (source, target, relation) already exists",
            actions: &["Update the existing edge instead of inserting"],
            severity,
            tool_tip: None,
        },
        ErrorCode::GraphTraversalFailed => RecoveryHint {
            hint: "The causal chain traversal failed",
            actions: &[
                "Reduce max_depth (ceiling is 10)",
                "Run memory_health() to check for orphaned edges",
            ],
            severity,
            tool_tip: None,
        },

        // HTTP-style aliases
        ErrorCode::RateLimited => RecoveryHint {
            hint: "The provider is rate limiting requests",
            actions: &["Wait and retry; backoff is applied automatically"],
            severity,
            tool_tip: Some("Self-healing; no action usually needed"),
        },
        ErrorCode::ServiceUnavailable => RecoveryHint {
            hint: "The provider reports a service outage",
            actions: &[
                "The chain falls back to local / lexical automatically",
                "Check the fallback log via memory_health()",
            ],
            severity,
            tool_tip: None,
        },
    }
}

// ============================================================================
// TOOL-SPECIFIC OVERRIDES
// ============================================================================

fn tool_hint(tool: &str, code: ErrorCode) -> Option<RecoveryHint> {
    match (tool, code) {
        ("memory_search", ErrorCode::SearchFailed) => Some(RecoveryHint {
            hint: "Hybrid search failed; the query may be too complex for FTS5",
            actions: &[
                "Retry with plain keywords (no quotes or operators)",
                "Pass intent explicitly to skip auto-detection",
            ],
            severity: Severity::Medium,
            tool_tip: Some("Try: memory_search({query: \"plain words\"})"),
        }),
        ("memory_search", ErrorCode::VectorIndexUnavailable) => Some(RecoveryHint {
            hint: "Semantic ranking is offline; results come from keyword match only",
            actions: &[
                "Results are still usable; relevance ordering may differ",
                "Run memory_index_scan after the provider recovers",
            ],
            severity: Severity::Medium,
            tool_tip: None,
        }),
        ("memory_save", ErrorCode::DuplicateContent) => Some(RecoveryHint {
            hint: "The gate found identical content; it was reinforced instead of duplicated",
            actions: &[
                "No action needed; the existing memory was strengthened",
                "Pass force=true to create a separate memory anyway",
            ],
            severity: Severity::Low,
            tool_tip: None,
        }),
        ("memory_save", ErrorCode::ValidationFailed) => Some(RecoveryHint {
            hint: "Preflight blocked the save",
            actions: &[
                "Call memory_validate with the same content for the full report",
                "Re-run with dryRun=true to preview all check results",
            ],
            severity: Severity::Medium,
            tool_tip: None,
        }),
        ("checkpoint_restore", ErrorCode::CheckpointRestoreFailed) => Some(RecoveryHint {
            hint: "Restore aborted; the live database was left untouched",
            actions: &[
                "Verify the snapshot id with checkpoint_list()",
                "Create a fresh checkpoint before retrying the restore",
            ],
            severity: Severity::High,
            tool_tip: Some("The pre-restore safety copy is kept next to the database"),
        }),
        ("memory_index_scan", ErrorCode::FileNotFound) => Some(RecoveryHint {
            hint: "A file listed in the index no longer exists on disk",
            actions: &[
                "The scan reports it under not_found; delete the stale memory",
                "Or restore the file and re-scan",
            ],
            severity: Severity::Medium,
            tool_tip: None,
        }),
        ("memory_index_scan", ErrorCode::EmbeddingGenerationFailed) => Some(RecoveryHint {
            hint: "Some files were indexed lexically because embedding failed",
            actions: &[
                "Affected rows keep embedding_status=failed and are retried next scan",
                "Check provider status with memory_health()",
            ],
            severity: Severity::Medium,
            tool_tip: None,
        }),
        ("memory_drift_why", ErrorCode::MemoryNotFound) => Some(RecoveryHint {
            hint: "Cannot build a lineage for an id that does not exist",
            actions: &["Find the id with memory_search, then retry"],
            severity: Severity::Medium,
            tool_tip: None,
        }),
        ("memory_drift_why", ErrorCode::GraphTraversalFailed) => Some(RecoveryHint {
            hint: "Lineage traversal failed partway; partial results may be returned",
            actions: &["Retry with a smaller max_depth"],
            severity: Severity::High,
            tool_tip: None,
        }),
        ("task_postflight", ErrorCode::EdgeValidationFailed) => Some(RecoveryHint {
            hint: "A causal link in the postflight payload was rejected",
            actions: &[
                "Check relation spelling and that source differs from target",
                "Valid learnings were still saved; only the bad link was skipped",
            ],
            severity: Severity::Medium,
            tool_tip: None,
        }),
        _ => None,
    }
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Look up the recovery hint for a (tool, code) pair.
///
/// Tool-specific override first, then the generic catalog, then
/// `DEFAULT_HINT` for unknown codes.
pub fn get_recovery_hint(tool: &str, code: &str) -> RecoveryHint {
    let Some(parsed) = ErrorCode::from_str_code(code) else {
        return DEFAULT_HINT.clone();
    };
    tool_hint(tool, parsed).unwrap_or_else(|| generic_hint(parsed))
}

/// Whether any hint (tool-specific or generic) is registered for the code
pub fn has_specific_hint(_tool: &str, code: &str) -> bool {
    ErrorCode::from_str_code(code).is_some()
}

/// Merged view of every hint visible to a tool (tool-specific overrides win)
pub fn get_available_hints(tool: &str) -> HashMap<&'static str, RecoveryHint> {
    ErrorCode::ALL
        .iter()
        .map(|code| {
            let hint = tool_hint(tool, *code).unwrap_or_else(|| generic_hint(*code));
            (code.as_str(), hint)
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
