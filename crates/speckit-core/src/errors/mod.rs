//! Error Taxonomy and Recovery Catalog
//!
//! Every error that crosses a component boundary is a structured value with a
//! stable code, a human-readable message, a recoverability flag, and a
//! suggestion. The tool boundary attaches a recovery hint looked up by
//! (tool, code) before anything is returned to the caller.

mod codes;
mod hints;

pub use codes::{ErrorCode, PreflightCode, Severity};
pub use hints::{
    default_hint, get_available_hints, get_recovery_hint, has_specific_hint, RecoveryHint,
};

use serde::Serialize;

// ============================================================================
// STRUCTURED ERROR VALUE
// ============================================================================

/// Structured error carried through every component boundary.
///
/// Components return `Result<T, MemoryError>`; only the outermost tool
/// handler may translate this into a transport-level error.
#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[error("[{code}] {message}")]
pub struct MemoryError {
    /// Stable error code from the closed registry
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional structured context (ids, paths, limits)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Whether the caller can reasonably retry or correct and resubmit
    pub recoverable: bool,
    /// Short actionable suggestion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl MemoryError {
    /// Create an error with the code's default recoverability
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            recoverable: code.default_recoverable(),
            suggestion: None,
        }
    }

    /// Attach structured details
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Attach a suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Override the recoverability flag
    pub fn recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable;
        self
    }

    /// Severity of this error's code
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Serialize to the wire shape used at the tool boundary,
    /// with the recovery hint for the given tool attached.
    pub fn to_tool_payload(&self, tool: &str) -> serde_json::Value {
        let hint = get_recovery_hint(tool, self.code.as_str());
        serde_json::json!({
            "error": {
                "code": self.code.as_str(),
                "message": self.message,
                "details": self.details,
                "recoverable": self.recoverable,
                "suggestion": self.suggestion,
                "severity": self.code.severity().as_str(),
                "recovery": hint,
            }
        })
    }
}

/// Result alias used throughout the engine
pub type Result<T> = std::result::Result<T, MemoryError>;

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<rusqlite::Error> for MemoryError {
    fn from(err: rusqlite::Error) -> Self {
        let (code, recoverable) = match &err {
            rusqlite::Error::SqliteFailure(e, _) => match e.code {
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                    (ErrorCode::DbLocked, true)
                }
                rusqlite::ErrorCode::DatabaseCorrupt | rusqlite::ErrorCode::NotADatabase => {
                    (ErrorCode::DbCorruption, false)
                }
                rusqlite::ErrorCode::CannotOpen => (ErrorCode::DbConnectionFailed, false),
                _ => (ErrorCode::DbQueryFailed, false),
            },
            _ => (ErrorCode::DbQueryFailed, false),
        };
        MemoryError::new(code, err.to_string()).recoverable(recoverable)
    }
}

impl From<std::io::Error> for MemoryError {
    fn from(err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::FileNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorCode::FileReadFailed,
            _ => ErrorCode::FileReadFailed,
        };
        MemoryError::new(code, err.to_string())
    }
}

impl From<serde_json::Error> for MemoryError {
    fn from(err: serde_json::Error) -> Self {
        MemoryError::new(ErrorCode::InvalidParameterFormat, err.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_code() {
        let err = MemoryError::new(ErrorCode::MemoryNotFound, "memory 42 not found");
        let text = err.to_string();
        assert!(text.contains("E080"));
        assert!(text.contains("memory 42 not found"));
    }

    #[test]
    fn test_builder_chain() {
        let err = MemoryError::new(ErrorCode::TokenBudgetExceeded, "too large")
            .with_details(serde_json::json!({"tokens": 5000, "max": 4000}))
            .with_suggestion("split the content into smaller memories");
        assert!(err.details.is_some());
        assert!(err.suggestion.is_some());
        assert!(err.recoverable);
    }

    #[test]
    fn test_tool_payload_carries_recovery_hint() {
        let err = MemoryError::new(ErrorCode::SearchFailed, "fts query failed");
        let payload = err.to_tool_payload("memory_search");
        assert_eq!(payload["error"]["code"], "E040");
        assert!(payload["error"]["recovery"]["hint"].is_string());
    }

    #[test]
    fn test_sqlite_busy_maps_to_locked() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        );
        let mapped: MemoryError = err.into();
        assert_eq!(mapped.code, ErrorCode::DbLocked);
        assert!(mapped.recoverable);
    }

    #[test]
    fn test_io_not_found_maps_to_file_not_found() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let mapped: MemoryError = err.into();
        assert_eq!(mapped.code, ErrorCode::FileNotFound);
    }
}
