//! Anchor Format Check
//!
//! Anchors delimit logical subsections of a memory document:
//! `<!-- ANCHOR:id -->...<!-- /ANCHOR:id -->`. The keyword is
//! case-insensitive; ids are `[A-Za-z0-9/_-]+` and unique per document;
//! every open needs a matching close and pairs must nest properly.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::errors::PreflightCode;

use super::PreflightIssue;

// ============================================================================
// TYPES
// ============================================================================

/// One well-formed anchor pair
#[derive(Debug, Clone, Serialize)]
pub struct AnchorSpan {
    pub id: String,
    /// Byte offset of the open marker
    pub start: usize,
    /// Byte offset just past the close marker
    pub end: usize,
}

/// Result of the anchor check
#[derive(Debug, Clone, Serialize)]
pub struct AnchorReport {
    pub valid: bool,
    pub anchors: Vec<AnchorSpan>,
    pub errors: Vec<PreflightIssue>,
    pub warnings: Vec<PreflightIssue>,
}

// ============================================================================
// SCANNING
// ============================================================================

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Lenient id capture; the charset is validated separately so bad ids
    // are reported instead of silently ignored.
    RE.get_or_init(|| {
        Regex::new(r"(?i)<!--\s*(/?)\s*anchor:([^\s>]+?)\s*-->").expect("anchor marker regex")
    })
}

fn id_is_valid(id: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9/_-]+$").expect("anchor id regex"))
        .is_match(id)
}

/// Scan a document for anchor markers and validate pairing
pub fn check_anchors(content: &str) -> AnchorReport {
    let mut anchors = Vec::new();
    let mut errors = Vec::new();
    let warnings = Vec::new();

    // Stack of (id, open offset) for nesting checks
    let mut open_stack: Vec<(String, usize)> = Vec::new();
    let mut seen_ids: HashSet<String> = HashSet::new();

    for capture in marker_regex().captures_iter(content) {
        let whole = capture.get(0).expect("match 0");
        let is_close = !capture[1].is_empty();
        let id = capture[2].to_string();

        if !id_is_valid(&id) {
            errors.push(PreflightIssue::error(
                PreflightCode::AnchorInvalidId,
                format!("anchor id '{id}' contains invalid characters"),
                Some("ids may use letters, digits, hyphen, underscore, slash".to_string()),
            ));
            continue;
        }

        if is_close {
            match open_stack.iter().rposition(|(open_id, _)| *open_id == id) {
                None => {
                    errors.push(PreflightIssue::error(
                        PreflightCode::AnchorUnopened,
                        format!("close marker for '{id}' has no matching open"),
                        None,
                    ));
                }
                Some(pos) => {
                    if pos != open_stack.len() - 1 {
                        errors.push(PreflightIssue::error(
                            PreflightCode::AnchorNestingInvalid,
                            format!("anchor '{id}' closes across another open anchor"),
                            Some("close inner anchors before outer ones".to_string()),
                        ));
                    }
                    let (_, start) = open_stack.remove(pos);
                    anchors.push(AnchorSpan {
                        id,
                        start,
                        end: whole.end(),
                    });
                }
            }
        } else {
            if !seen_ids.insert(id.clone()) {
                errors.push(PreflightIssue::error(
                    PreflightCode::AnchorDuplicateId,
                    format!("anchor id '{id}' appears more than once"),
                    Some("anchor ids must be unique within a document".to_string()),
                ));
                continue;
            }
            open_stack.push((id, whole.start()));
        }
    }

    for (id, _) in open_stack {
        errors.push(PreflightIssue::error(
            PreflightCode::AnchorUnclosed,
            format!("anchor '{id}' is never closed"),
            Some(format!("add <!-- /ANCHOR:{id} --> after the section")),
        ));
    }

    anchors.sort_by_key(|a| a.start);

    AnchorReport {
        valid: errors.is_empty(),
        anchors,
        errors,
        warnings,
    }
}

// ============================================================================
// TESTS
// ============================================================================
