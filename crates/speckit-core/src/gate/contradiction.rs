//! Lexical Contradiction Detection
//!
//! Compares two texts against an ordered table of opposing term pairs. A hit
//! means the texts pull in opposite directions on the same axis (e.g. one
//! says "always", the other "never") and the gate should supersede rather
//! than update.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

// ============================================================================
// PATTERN TABLE
// ============================================================================

/// One opposing pair with its contradiction type
#[derive(Debug, Clone, Copy)]
pub struct ContradictionPattern {
    /// Category label ("absolute", "directive", ...)
    pub kind: &'static str,
    /// Affirmative side
    pub left: &'static str,
    /// Negating side
    pub right: &'static str,
}

/// Ordered pattern table; earlier rows win when several match
pub const PATTERNS: &[ContradictionPattern] = &[
    ContradictionPattern { kind: "absolute", left: "always", right: "never" },
    ContradictionPattern { kind: "directive", left: "use", right: "don't use" },
    ContradictionPattern { kind: "toggle", left: "enable", right: "disable" },
    ContradictionPattern { kind: "preference", left: "prefer", right: "avoid" },
    ContradictionPattern { kind: "recommendation", left: "should", right: "should not" },
    ContradictionPattern { kind: "boolean", left: "true", right: "false" },
    ContradictionPattern { kind: "affirmation", left: "yes", right: "no" },
    ContradictionPattern { kind: "inclusion", left: "include", right: "exclude" },
    ContradictionPattern { kind: "permission", left: "allow", right: "deny" },
    ContradictionPattern { kind: "requirement", left: "must", right: "must not" },
];

// ============================================================================
// DETECTION
// ============================================================================

/// Result of a contradiction check
#[derive(Debug, Clone, Serialize)]
pub struct Contradiction {
    /// Whether any pattern matched
    pub found: bool,
    /// Category of the matching pattern
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    /// The matching pair rendered as "left<->right"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// The pair as (left, right)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pair: Option<(&'static str, &'static str)>,
}

impl Contradiction {
    pub fn none() -> Self {
        Self {
            found: false,
            kind: None,
            pattern: None,
            pair: None,
        }
    }

    fn matched(p: &ContradictionPattern) -> Self {
        Self {
            found: true,
            kind: Some(p.kind),
            pattern: Some(format!("{}<->{}", p.left, p.right)),
            pair: Some((p.left, p.right)),
        }
    }
}

fn term_regexes() -> &'static Vec<(Regex, Regex)> {
    static REGEXES: OnceLock<Vec<(Regex, Regex)>> = OnceLock::new();
    REGEXES.get_or_init(|| {
        PATTERNS
            .iter()
            .map(|p| (term_regex(p.left), term_regex(p.right)))
            .collect()
    })
}

fn term_regex(term: &str) -> Regex {
    // Whole-word, case-insensitive; apostrophes in terms like "don't use"
    // need escaping but not boundary special-casing.
    let escaped = regex::escape(term);
    Regex::new(&format!(r"(?i)\b{escaped}\b")).expect("pattern terms are valid regex")
}

/// Check two texts for opposing term pairs.
///
/// The negating side masks the affirmative side: a text containing
/// "should not" does not count as containing "should" for the
/// recommendation pair. Empty inputs never contradict.
pub fn detect_contradiction(existing: &str, incoming: &str) -> Contradiction {
    if existing.trim().is_empty() || incoming.trim().is_empty() {
        return Contradiction::none();
    }

    for (pattern, (left_re, right_re)) in PATTERNS.iter().zip(term_regexes().iter()) {
        let existing_left = left_re.is_match(existing) && !right_re.is_match(existing);
        let existing_right = right_re.is_match(existing);
        let incoming_left = left_re.is_match(incoming) && !right_re.is_match(incoming);
        let incoming_right = right_re.is_match(incoming);

        if (existing_left && incoming_right) || (existing_right && incoming_left) {
            return Contradiction::matched(pattern);
        }
    }

    Contradiction::none()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_pair() {
        let result = detect_contradiction("Always use var", "Never use var");
        assert!(result.found);
        assert_eq!(result.kind, Some("absolute"));
        assert_eq!(result.pair, Some(("always", "never")));
    }

    #[test]
    fn test_directive_pair() {
        let result = detect_contradiction("Use tabs for indentation", "Don't use tabs here");
        assert!(result.found);
        assert_eq!(result.kind, Some("directive"));
    }

    #[test]
    fn test_toggle_pair() {
        let result = detect_contradiction("Enable strict mode", "Disable strict mode");
        assert!(result.found);
        assert_eq!(result.kind, Some("toggle"));
    }

    #[test]
    fn test_recommendation_negation_masks_affirmative() {
        // Both texts contain "should"; only one is the negated form
        let result = detect_contradiction(
            "You should validate input",
            "You should not validate twice",
        );
        assert!(result.found);
        assert_eq!(result.kind, Some("recommendation"));

        // Both negated: no contradiction on this axis
        let result = detect_contradiction("should not do X", "should not do Y");
        assert!(!result.found);
    }

    #[test]
    fn test_requirement_pair() {
        let result = detect_contradiction("Inputs must be escaped", "Inputs must not be escaped");
        assert!(result.found);
        assert_eq!(result.kind, Some("requirement"));
    }

    #[test]
    fn test_ordering_earlier_pattern_wins() {
        // Matches both absolute and directive axes; absolute is first
        let result = detect_contradiction("Always use semicolons", "Never, don't use semicolons");
        assert!(result.found);
        assert_eq!(result.kind, Some("absolute"));
    }

    #[test]
    fn test_empty_inputs() {
        assert!(!detect_contradiction("", "").found);
        assert!(!detect_contradiction("always", "").found);
        assert!(!detect_contradiction("", "never").found);
        assert!(!detect_contradiction("   ", "never").found);
    }

    #[test]
    fn test_no_contradiction() {
        let result = detect_contradiction(
            "Use strict equality in comparisons",
            "Strict equality avoids coercion bugs",
        );
        // "use" on one side only, "avoid"/"prefer" axis needs both sides
        assert!(!result.found);
    }

    #[test]
    fn test_word_boundaries() {
        // "usefulness" must not match the "use" term
        let result = detect_contradiction("usefulness matters", "don't use shortcuts");
        assert!(!result.found);
    }

    #[test]
    fn test_same_direction_no_contradiction() {
        assert!(!detect_contradiction("always test", "always lint").found);
        assert!(!detect_contradiction("never test", "never lint").found);
    }
}
