//! Error Code Registry
//!
//! Closed registry of 49 codes, grouped by range. Codes are stable: tools,
//! logs, and recovery hints key on the string form (e.g. "E080").

use serde::{Deserialize, Serialize};

// ============================================================================
// SEVERITY
// ============================================================================

/// Severity bands for error codes.
///
/// Critical is reserved for database-loss or inconsistency conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

// ============================================================================
// ERROR CODES
// ============================================================================

/// The closed error-code registry.
///
/// Ranges: E001–E004 embedding, E010–E014 file, E020–E024 database,
/// E030–E033 parameters, E040–E044 search, E050–E053 auth/provider,
/// E060–E063 checkpoints, E070–E072 sessions, E080–E084 memory ops,
/// E090–E093 validation, E100–E103 causal graph, plus the HTTP-style
/// aliases E429 and E503.
///
/// Serializes as the string form ("E080"); tools and logs key on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Embedding (E001–E004)
    EmbeddingGenerationFailed,
    EmbeddingDimensionMismatch,
    EmbeddingModelUnavailable,
    EmbeddingBatchFailed,

    // File (E010–E014)
    FileNotFound,
    FileReadFailed,
    FileWriteFailed,
    FileTooLarge,
    InvalidFilePath,

    // Database (E020–E024)
    DbConnectionFailed,
    DbQueryFailed,
    DbCorruption,
    DbMigrationFailed,
    DbLocked,

    // Parameters (E030–E033)
    MissingParameter,
    InvalidParameterType,
    ParameterOutOfRange,
    InvalidParameterFormat,

    // Search (E040–E044)
    SearchFailed,
    EmptyQuery,
    FtsSyntaxError,
    VectorIndexUnavailable,
    FusionFailed,

    // Auth / provider (E050–E053)
    ApiKeyInvalid,
    ApiKeyMissing,
    ProviderUnavailable,
    ValidationTimeout,

    // Checkpoints (E060–E063)
    CheckpointCreateFailed,
    CheckpointNotFound,
    CheckpointRestoreFailed,
    CheckpointDeleteFailed,

    // Sessions (E070–E072)
    SessionNotFound,
    SessionExpired,
    SessionLimitExceeded,

    // Memory operations (E080–E084)
    MemoryNotFound,
    MemorySaveFailed,
    MemoryUpdateFailed,
    MemoryDeleteFailed,
    MemoryArchived,

    // Validation (E090–E093)
    ValidationFailed,
    AnchorMalformed,
    DuplicateContent,
    TokenBudgetExceeded,

    // Causal graph (E100–E103)
    EdgeValidationFailed,
    SelfReferenceEdge,
    DuplicateEdge,
    GraphTraversalFailed,

    // HTTP-style aliases
    RateLimited,
    ServiceUnavailable,
}

impl ErrorCode {
    /// Every code in the registry, in range order.
    pub const ALL: &'static [ErrorCode] = &[
        ErrorCode::EmbeddingGenerationFailed,
        ErrorCode::EmbeddingDimensionMismatch,
        ErrorCode::EmbeddingModelUnavailable,
        ErrorCode::EmbeddingBatchFailed,
        ErrorCode::FileNotFound,
        ErrorCode::FileReadFailed,
        ErrorCode::FileWriteFailed,
        ErrorCode::FileTooLarge,
        ErrorCode::InvalidFilePath,
        ErrorCode::DbConnectionFailed,
        ErrorCode::DbQueryFailed,
        ErrorCode::DbCorruption,
        ErrorCode::DbMigrationFailed,
        ErrorCode::DbLocked,
        ErrorCode::MissingParameter,
        ErrorCode::InvalidParameterType,
        ErrorCode::ParameterOutOfRange,
        ErrorCode::InvalidParameterFormat,
        ErrorCode::SearchFailed,
        ErrorCode::EmptyQuery,
        ErrorCode::FtsSyntaxError,
        ErrorCode::VectorIndexUnavailable,
        ErrorCode::FusionFailed,
        ErrorCode::ApiKeyInvalid,
        ErrorCode::ApiKeyMissing,
        ErrorCode::ProviderUnavailable,
        ErrorCode::ValidationTimeout,
        ErrorCode::CheckpointCreateFailed,
        ErrorCode::CheckpointNotFound,
        ErrorCode::CheckpointRestoreFailed,
        ErrorCode::CheckpointDeleteFailed,
        ErrorCode::SessionNotFound,
        ErrorCode::SessionExpired,
        ErrorCode::SessionLimitExceeded,
        ErrorCode::MemoryNotFound,
        ErrorCode::MemorySaveFailed,
        ErrorCode::MemoryUpdateFailed,
        ErrorCode::MemoryDeleteFailed,
        ErrorCode::MemoryArchived,
        ErrorCode::ValidationFailed,
        ErrorCode::AnchorMalformed,
        ErrorCode::DuplicateContent,
        ErrorCode::TokenBudgetExceeded,
        ErrorCode::EdgeValidationFailed,
        ErrorCode::SelfReferenceEdge,
        ErrorCode::DuplicateEdge,
        ErrorCode::GraphTraversalFailed,
        ErrorCode::RateLimited,
        ErrorCode::ServiceUnavailable,
    ];

    /// Stable string form ("E080")
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::EmbeddingGenerationFailed => "E001",
            ErrorCode::EmbeddingDimensionMismatch => "E002",
            ErrorCode::EmbeddingModelUnavailable => "E003",
            ErrorCode::EmbeddingBatchFailed => "E004",
            ErrorCode::FileNotFound => "E010",
            ErrorCode::FileReadFailed => "E011",
            ErrorCode::FileWriteFailed => "E012",
            ErrorCode::FileTooLarge => "E013",
            ErrorCode::InvalidFilePath => "E014",
            ErrorCode::DbConnectionFailed => "E020",
            ErrorCode::DbQueryFailed => "E021",
            ErrorCode::DbCorruption => "E022",
            ErrorCode::DbMigrationFailed => "E023",
            ErrorCode::DbLocked => "E024",
            ErrorCode::MissingParameter => "E030",
            ErrorCode::InvalidParameterType => "E031",
            ErrorCode::ParameterOutOfRange => "E032",
            ErrorCode::InvalidParameterFormat => "E033",
            ErrorCode::SearchFailed => "E040",
            ErrorCode::EmptyQuery => "E041",
            ErrorCode::FtsSyntaxError => "E042",
            ErrorCode::VectorIndexUnavailable => "E043",
            ErrorCode::FusionFailed => "E044",
            ErrorCode::ApiKeyInvalid => "E050",
            ErrorCode::ApiKeyMissing => "E051",
            ErrorCode::ProviderUnavailable => "E052",
            ErrorCode::ValidationTimeout => "E053",
            ErrorCode::CheckpointCreateFailed => "E060",
            ErrorCode::CheckpointNotFound => "E061",
            ErrorCode::CheckpointRestoreFailed => "E062",
            ErrorCode::CheckpointDeleteFailed => "E063",
            ErrorCode::SessionNotFound => "E070",
            ErrorCode::SessionExpired => "E071",
            ErrorCode::SessionLimitExceeded => "E072",
            ErrorCode::MemoryNotFound => "E080",
            ErrorCode::MemorySaveFailed => "E081",
            ErrorCode::MemoryUpdateFailed => "E082",
            ErrorCode::MemoryDeleteFailed => "E083",
            ErrorCode::MemoryArchived => "E084",
            ErrorCode::ValidationFailed => "E090",
            ErrorCode::AnchorMalformed => "E091",
            ErrorCode::DuplicateContent => "E092",
            ErrorCode::TokenBudgetExceeded => "E093",
            ErrorCode::EdgeValidationFailed => "E100",
            ErrorCode::SelfReferenceEdge => "E101",
            ErrorCode::DuplicateEdge => "E102",
            ErrorCode::GraphTraversalFailed => "E103",
            ErrorCode::RateLimited => "E429",
            ErrorCode::ServiceUnavailable => "E503",
        }
    }

    /// Parse a string form back into a code
    pub fn from_str_code(code: &str) -> Option<ErrorCode> {
        Self::ALL.iter().copied().find(|c| c.as_str() == code)
    }

    /// Severity band. Critical is reserved for database-loss conditions.
    pub fn severity(&self) -> Severity {
        match self {
            ErrorCode::DbConnectionFailed
            | ErrorCode::DbCorruption
            | ErrorCode::DbMigrationFailed => Severity::Critical,

            ErrorCode::CheckpointRestoreFailed
            | ErrorCode::MemoryDeleteFailed
            | ErrorCode::GraphTraversalFailed => Severity::High,

            // Self-healing conditions
            ErrorCode::RateLimited | ErrorCode::SessionExpired => Severity::Low,

            ErrorCode::EmptyQuery
            | ErrorCode::MissingParameter
            | ErrorCode::InvalidParameterType
            | ErrorCode::ParameterOutOfRange
            | ErrorCode::InvalidParameterFormat
            | ErrorCode::DuplicateEdge => Severity::Low,

            _ => Severity::Medium,
        }
    }

    /// Default recoverability used by `MemoryError::new`
    pub fn default_recoverable(&self) -> bool {
        match self {
            // Transient by nature
            ErrorCode::RateLimited
            | ErrorCode::ServiceUnavailable
            | ErrorCode::DbLocked
            | ErrorCode::ValidationTimeout
            | ErrorCode::SessionExpired => true,

            // Caller can correct the input and resubmit
            ErrorCode::MissingParameter
            | ErrorCode::InvalidParameterType
            | ErrorCode::ParameterOutOfRange
            | ErrorCode::InvalidParameterFormat
            | ErrorCode::EmptyQuery
            | ErrorCode::FtsSyntaxError
            | ErrorCode::AnchorMalformed
            | ErrorCode::DuplicateContent
            | ErrorCode::TokenBudgetExceeded
            | ErrorCode::ValidationFailed
            | ErrorCode::EdgeValidationFailed
            | ErrorCode::SelfReferenceEdge
            | ErrorCode::DuplicateEdge => true,

            // Everything else needs operator attention
            _ => false,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ============================================================================
// PREFLIGHT CODES
// ============================================================================

/// Parallel code namespace for preflight validation findings (PF001–PF031).
///
/// Same structural contract as `ErrorCode`: stable string form, severity,
/// recoverability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreflightCode {
    // Anchors (PF001–PF005)
    AnchorUnclosed,
    AnchorUnopened,
    AnchorDuplicateId,
    AnchorInvalidId,
    AnchorNestingInvalid,

    // Duplicates (PF010–PF012)
    DuplicateExact,
    DuplicateSimilar,
    HashUnavailable,

    // Token budget (PF020–PF022)
    TokenBudgetWarning,
    TokenBudgetExceeded,
    TokenEstimateFailed,

    // Content size (PF030–PF031)
    ContentTooSmall,
    ContentTooLarge,
}

impl PreflightCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreflightCode::AnchorUnclosed => "PF001",
            PreflightCode::AnchorUnopened => "PF002",
            PreflightCode::AnchorDuplicateId => "PF003",
            PreflightCode::AnchorInvalidId => "PF004",
            PreflightCode::AnchorNestingInvalid => "PF005",
            PreflightCode::DuplicateExact => "PF010",
            PreflightCode::DuplicateSimilar => "PF011",
            PreflightCode::HashUnavailable => "PF012",
            PreflightCode::TokenBudgetWarning => "PF020",
            PreflightCode::TokenBudgetExceeded => "PF021",
            PreflightCode::TokenEstimateFailed => "PF022",
            PreflightCode::ContentTooSmall => "PF030",
            PreflightCode::ContentTooLarge => "PF031",
        }
    }

    /// Warnings do not block; errors do (outside dry-run).
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            PreflightCode::TokenBudgetWarning
                | PreflightCode::DuplicateSimilar
                | PreflightCode::HashUnavailable
        )
    }
}

impl std::fmt::Display for PreflightCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PreflightCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ============================================================================
// TESTS
// ============================================================================
