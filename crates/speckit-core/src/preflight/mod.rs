//! Preflight Validation
//!
//! Candidate memory content passes through four toggleable sub-checks
//! before the gate sees it: anchor format, duplicates, token budget, and
//! content size. In dry-run mode nothing blocks; the real verdict is
//! recorded in `dry_run_would_pass`.

mod anchors;
mod budget;
mod duplicates;

pub use anchors::{check_anchors, AnchorReport, AnchorSpan};
pub use budget::{
    check_content_size, check_token_budget, estimate_tokens, SizeReport, TokenReport,
    EMBEDDING_OVERHEAD_TOKENS,
};
pub use duplicates::{check_duplicates, DuplicateReport, DEFAULT_SIMILARITY_THRESHOLD};

use serde::Serialize;

use crate::errors::{PreflightCode, Result};
use crate::storage::MemoryStore;

// ============================================================================
// ISSUES
// ============================================================================

/// One finding from a sub-check
#[derive(Debug, Clone, Serialize)]
pub struct PreflightIssue {
    pub code: PreflightCode,
    pub message: String,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl PreflightIssue {
    pub fn error(code: PreflightCode, message: String, suggestion: Option<String>) -> Self {
        Self {
            code,
            message,
            recoverable: true,
            suggestion,
            details: None,
        }
    }

    pub fn warning(code: PreflightCode, message: String) -> Self {
        Self {
            code,
            message,
            recoverable: true,
            suggestion: None,
            details: None,
        }
    }
}

// ============================================================================
// OPTIONS AND REPORT
// ============================================================================

/// Which checks run and with what thresholds
#[derive(Debug, Clone)]
pub struct PreflightOptions {
    pub check_anchors: bool,
    pub check_duplicates: bool,
    pub check_tokens: bool,
    pub check_size: bool,
    /// Report instead of block
    pub dry_run: bool,
    pub similarity_threshold: f64,
    pub max_tokens: usize,
    /// Add the embedding overhead to the token estimate
    pub include_embedding_overhead: bool,
    pub min_length: usize,
    pub max_length: usize,
}

impl Default for PreflightOptions {
    fn default() -> Self {
        Self {
            check_anchors: true,
            check_duplicates: true,
            check_tokens: true,
            check_size: true,
            dry_run: false,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_tokens: 4_000,
            include_embedding_overhead: true,
            min_length: 10,
            max_length: 100_000,
        }
    }
}

/// Everything preflight needs to look at
pub struct PreflightInput<'a> {
    pub content: &'a str,
    pub file_path: &'a str,
    pub spec_folder: &'a str,
    /// Store for the duplicate check; skipping it skips exact detection
    pub store: Option<&'a MemoryStore>,
    /// Best nearest-neighbor hit for the content, if the caller ran one
    pub similar_top: Option<(i64, f64)>,
}

/// The combined report
#[derive(Debug, Clone, Serialize)]
pub struct PreflightReport {
    /// Overall verdict; forced true in dry-run mode
    pub pass: bool,
    pub dry_run: bool,
    /// Real verdict when dry-run forced `pass`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run_would_pass: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchors: Option<AnchorReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicates: Option<DuplicateReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<SizeReport>,
    pub errors: Vec<PreflightIssue>,
    pub warnings: Vec<PreflightIssue>,
}

// ============================================================================
// ENTRY POINT
// ============================================================================

/// Run the enabled sub-checks over candidate content
pub fn run_preflight(input: &PreflightInput<'_>, opts: &PreflightOptions) -> Result<PreflightReport> {
    let mut errors: Vec<PreflightIssue> = Vec::new();
    let mut warnings: Vec<PreflightIssue> = Vec::new();

    let anchors = if opts.check_anchors {
        let report = check_anchors(input.content);
        errors.extend(report.errors.iter().cloned());
        warnings.extend(report.warnings.iter().cloned());
        Some(report)
    } else {
        None
    };

    let duplicates = if opts.check_duplicates {
        match input.store {
            Some(store) => {
                let report = check_duplicates(
                    store,
                    input.content,
                    input.similar_top,
                    opts.similarity_threshold,
                )?;
                if report.is_duplicate {
                    match report.duplicate_type {
                        Some("exact") => errors.push(PreflightIssue::error(
                            PreflightCode::DuplicateExact,
                            format!(
                                "identical content already stored as memory {} ({})",
                                report.existing_id.unwrap_or(-1),
                                report.existing_path.as_deref().unwrap_or("?")
                            ),
                            Some("reuse the existing memory, or pass force".to_string()),
                        )),
                        _ => warnings.push(PreflightIssue::warning(
                            PreflightCode::DuplicateSimilar,
                            format!(
                                "near-duplicate of memory {} at {:.1}% similarity",
                                report.existing_id.unwrap_or(-1),
                                report.similarity.unwrap_or(0.0) * 100.0
                            ),
                        )),
                    }
                }
                Some(report)
            }
            None => {
                warnings.push(PreflightIssue::warning(
                    PreflightCode::HashUnavailable,
                    "duplicate check skipped: no store supplied".to_string(),
                ));
                None
            }
        }
    } else {
        None
    };

    let tokens = if opts.check_tokens {
        let report = check_token_budget(
            input.content,
            opts.max_tokens,
            opts.include_embedding_overhead,
        );
        errors.extend(report.errors.iter().cloned());
        warnings.extend(report.warnings.iter().cloned());
        Some(report)
    } else {
        None
    };

    let size = if opts.check_size {
        let report = check_content_size(input.content, opts.min_length, opts.max_length);
        errors.extend(report.errors.iter().cloned());
        Some(report)
    } else {
        None
    };

    let would_pass = errors.is_empty();
    let (pass, dry_run_would_pass) = if opts.dry_run {
        (true, Some(would_pass))
    } else {
        (would_pass, None)
    };

    Ok(PreflightReport {
        pass,
        dry_run: opts.dry_run,
        dry_run_would_pass,
        anchors,
        duplicates,
        tokens,
        size,
        errors,
        warnings,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::content_hash_str;
    use crate::storage::MemoryUpsert;
    use tempfile::TempDir;

    fn input<'a>(content: &'a str, store: Option<&'a MemoryStore>) -> PreflightInput<'a> {
        PreflightInput {
            content,
            file_path: "f/a.md",
            spec_folder: "f",
            store,
            similar_top: None,
        }
    }

    #[test]
    fn test_clean_content_passes() {
        let report = run_preflight(
            &input("A perfectly reasonable decision note.", None),
            &PreflightOptions {
                check_duplicates: false,
                ..PreflightOptions::default()
            },
        )
        .unwrap();
        assert!(report.pass);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_failing_check_blocks() {
        let report = run_preflight(
            &input("tiny", None),
            &PreflightOptions {
                check_duplicates: false,
                ..PreflightOptions::default()
            },
        )
        .unwrap();
        assert!(!report.pass);
        assert!(report
            .errors
            .iter()
            .any(|e| e.code == PreflightCode::ContentTooSmall));
    }

    #[test]
    fn test_dry_run_forces_pass_and_records_verdict() {
        let report = run_preflight(
            &input("tiny", None),
            &PreflightOptions {
                check_duplicates: false,
                dry_run: true,
                ..PreflightOptions::default()
            },
        )
        .unwrap();
        assert!(report.pass);
        assert_eq!(report.dry_run_would_pass, Some(false));

        let report = run_preflight(
            &input("A perfectly reasonable decision note.", None),
            &PreflightOptions {
                check_duplicates: false,
                dry_run: true,
                ..PreflightOptions::default()
            },
        )
        .unwrap();
        assert!(report.pass);
        assert_eq!(report.dry_run_would_pass, Some(true));
    }

    #[test]
    fn test_checks_can_be_toggled_off() {
        let report = run_preflight(
            &input("tiny", None),
            &PreflightOptions {
                check_anchors: false,
                check_duplicates: false,
                check_tokens: false,
                check_size: false,
                ..PreflightOptions::default()
            },
        )
        .unwrap();
        assert!(report.pass);
        assert!(report.anchors.is_none());
        assert!(report.tokens.is_none());
        assert!(report.size.is_none());
    }

    #[test]
    fn test_exact_duplicate_blocks() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new(Some(dir.path().join("test.db"))).unwrap();
        let content = "Use strict equality in all comparisons.";
        store
            .upsert_memory(&MemoryUpsert {
                spec_folder: "f".to_string(),
                file_path: "f/existing.md".to_string(),
                title: "t".to_string(),
                content: content.to_string(),
                content_hash: content_hash_str(content),
                ..MemoryUpsert::default()
            })
            .unwrap();

        let report = run_preflight(&input(content, Some(&store)), &PreflightOptions::default())
            .unwrap();
        assert!(!report.pass);
        assert!(report
            .errors
            .iter()
            .any(|e| e.code == PreflightCode::DuplicateExact));
        let duplicates = report.duplicates.unwrap();
        assert_eq!(duplicates.duplicate_type, Some("exact"));
    }

    #[test]
    fn test_similar_duplicate_warns_but_passes() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new(Some(dir.path().join("test.db"))).unwrap();
        let id = store
            .upsert_memory(&MemoryUpsert {
                spec_folder: "f".to_string(),
                file_path: "f/existing.md".to_string(),
                title: "t".to_string(),
                content: "Use strict equality.".to_string(),
                content_hash: content_hash_str("Use strict equality."),
                ..MemoryUpsert::default()
            })
            .unwrap()
            .id;

        let preflight_input = PreflightInput {
            similar_top: Some((id, 0.96)),
            ..input("Prefer strict equality in comparisons.", Some(&store))
        };
        let report = run_preflight(&preflight_input, &PreflightOptions::default()).unwrap();
        assert!(report.pass);
        assert!(report
            .warnings
            .iter()
            .any(|w| w.code == PreflightCode::DuplicateSimilar));
    }

    #[test]
    fn test_anchor_errors_flow_through() {
        let report = run_preflight(
            &input("<!-- ANCHOR:x --> content without a close, long enough.", None),
            &PreflightOptions {
                check_duplicates: false,
                ..PreflightOptions::default()
            },
        )
        .unwrap();
        assert!(!report.pass);
        assert!(report
            .errors
            .iter()
            .any(|e| e.code == PreflightCode::AnchorUnclosed));
    }
}
