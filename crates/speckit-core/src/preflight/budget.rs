//! Token Budget and Content Size Checks

use serde::Serialize;

use crate::errors::PreflightCode;

use super::PreflightIssue;

/// Characters per token for the estimate
const CHARS_PER_TOKEN: f64 = 3.5;

/// Fixed overhead added when the content will also be embedded
pub const EMBEDDING_OVERHEAD_TOKENS: usize = 150;

/// Warn at this share of the budget
const WARN_RATIO: f64 = 0.80;

// ============================================================================
// TOKENS
// ============================================================================

/// Token estimate against a budget
#[derive(Debug, Clone, Serialize)]
pub struct TokenReport {
    pub estimated_tokens: usize,
    pub max_tokens: usize,
    pub within_budget: bool,
    pub errors: Vec<PreflightIssue>,
    pub warnings: Vec<PreflightIssue>,
}

/// `ceil(chars / 3.5)` plus the embedding overhead when requested
pub fn estimate_tokens(content: &str, include_embedding_overhead: bool) -> usize {
    let chars = content.chars().count();
    let base = (chars as f64 / CHARS_PER_TOKEN).ceil() as usize;
    if include_embedding_overhead {
        base + EMBEDDING_OVERHEAD_TOKENS
    } else {
        base
    }
}

/// Check the estimate against a budget: warning at 80%, error above 100%
pub fn check_token_budget(
    content: &str,
    max_tokens: usize,
    include_embedding_overhead: bool,
) -> TokenReport {
    let estimated = estimate_tokens(content, include_embedding_overhead);
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if estimated > max_tokens {
        errors.push(PreflightIssue::error(
            PreflightCode::TokenBudgetExceeded,
            format!("estimated {estimated} tokens exceeds the budget of {max_tokens}"),
            Some("shorten the content or split it across memories".to_string()),
        ));
    } else if (estimated as f64) >= (max_tokens as f64) * WARN_RATIO {
        warnings.push(PreflightIssue::warning(
            PreflightCode::TokenBudgetWarning,
            format!("estimated {estimated} tokens is at 80% or more of the {max_tokens} budget"),
        ));
    }

    TokenReport {
        estimated_tokens: estimated,
        max_tokens,
        within_budget: errors.is_empty(),
        errors,
        warnings,
    }
}

// ============================================================================
// SIZE
// ============================================================================

/// Content length against the configured bounds
#[derive(Debug, Clone, Serialize)]
pub struct SizeReport {
    pub length: usize,
    pub min_length: usize,
    pub max_length: usize,
    pub within_bounds: bool,
    pub errors: Vec<PreflightIssue>,
}

pub fn check_content_size(content: &str, min_length: usize, max_length: usize) -> SizeReport {
    let length = content.chars().count();
    let mut errors = Vec::new();

    if length < min_length {
        errors.push(PreflightIssue::error(
            PreflightCode::ContentTooSmall,
            format!("content is {length} characters, minimum is {min_length}"),
            Some("a memory should carry enough context to stand alone".to_string()),
        ));
    }
    if length > max_length {
        errors.push(PreflightIssue::error(
            PreflightCode::ContentTooLarge,
            format!("content is {length} characters, maximum is {max_length}"),
            Some("split the document into smaller memories".to_string()),
        ));
    }

    SizeReport {
        length,
        min_length,
        max_length,
        within_bounds: errors.is_empty(),
        errors,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_rounds_up() {
        // 7 chars / 3.5 = 2 exactly; 8 chars -> ceil(2.29) = 3
        assert_eq!(estimate_tokens("abcdefg", false), 2);
        assert_eq!(estimate_tokens("abcdefgh", false), 3);
        assert_eq!(estimate_tokens("", false), 0);
    }

    #[test]
    fn test_embedding_overhead() {
        assert_eq!(
            estimate_tokens("abcdefg", true),
            2 + EMBEDDING_OVERHEAD_TOKENS
        );
    }

    #[test]
    fn test_under_budget() {
        let report = check_token_budget("short", 1_000, false);
        assert!(report.within_budget);
        assert!(report.errors.is_empty());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_warning_at_80_percent() {
        // 100-token budget; 80 tokens = 280 chars
        let content = "x".repeat(280);
        let report = check_token_budget(&content, 100, false);
        assert!(report.within_budget);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].code, PreflightCode::TokenBudgetWarning);
    }

    #[test]
    fn test_error_above_budget() {
        let content = "x".repeat(360);
        let report = check_token_budget(&content, 100, false);
        assert!(!report.within_budget);
        assert_eq!(report.errors[0].code, PreflightCode::TokenBudgetExceeded);
    }

    #[test]
    fn test_exactly_at_budget_passes() {
        // 350 chars / 3.5 = 100 tokens exactly
        let content = "x".repeat(350);
        let report = check_token_budget(&content, 100, false);
        assert!(report.within_budget);
        // but it does warn, being over 80%
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_size_bounds() {
        let report = check_content_size("tiny", 10, 100);
        assert!(!report.within_bounds);
        assert_eq!(report.errors[0].code, PreflightCode::ContentTooSmall);

        let report = check_content_size(&"x".repeat(200), 10, 100);
        assert!(!report.within_bounds);
        assert_eq!(report.errors[0].code, PreflightCode::ContentTooLarge);

        let report = check_content_size("just right, long enough", 10, 100);
        assert!(report.within_bounds);
    }
}
