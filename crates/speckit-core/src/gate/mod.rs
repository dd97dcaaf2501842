//! Prediction-Error Gate
//!
//! Decides what to do with incoming content given how surprising it is
//! relative to what is already stored. High similarity means low prediction
//! error (reinforce); a contradiction at high similarity means the old
//! memory is stale (supersede); low similarity means genuinely new content
//! (create).

mod contradiction;

pub use contradiction::{detect_contradiction, Contradiction, ContradictionPattern, PATTERNS};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// THRESHOLDS
// ============================================================================

/// Similarity at or above which content is considered a duplicate
pub const DUPLICATE_THRESHOLD: f64 = 0.95;

/// Similarity at or above which content is a strong match of an existing memory
pub const HIGH_MATCH_THRESHOLD: f64 = 0.90;

/// Similarity at or above which content is related enough to link
pub const MEDIUM_MATCH_THRESHOLD: f64 = 0.70;

/// Maximum related ids attached to a CREATE_LINKED decision
const MAX_RELATED_IDS: usize = 5;

// ============================================================================
// TYPES
// ============================================================================

/// What the gate decided to do with the incoming content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemoryAction {
    Create,
    Update,
    Supersede,
    Reinforce,
    CreateLinked,
}

impl MemoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryAction::Create => "CREATE",
            MemoryAction::Update => "UPDATE",
            MemoryAction::Supersede => "SUPERSEDE",
            MemoryAction::Reinforce => "REINFORCE",
            MemoryAction::CreateLinked => "CREATE_LINKED",
        }
    }

    /// Priority for dashboards and reconciliation:
    /// SUPERSEDE > UPDATE > CREATE_LINKED > REINFORCE > CREATE
    pub fn priority(&self) -> u8 {
        match self {
            MemoryAction::Supersede => 5,
            MemoryAction::Update => 4,
            MemoryAction::CreateLinked => 3,
            MemoryAction::Reinforce => 2,
            MemoryAction::Create => 1,
        }
    }
}

/// A ranked candidate from the similarity search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateCandidate {
    /// Memory id
    pub id: i64,
    /// Cosine similarity to the incoming content, in [0, 1]
    pub similarity: f64,
    /// Candidate content (used for the contradiction check and previews)
    pub content: String,
}

/// The gate's full decision
#[derive(Debug, Clone, Serialize)]
pub struct GateDecision {
    /// Action to take
    pub action: MemoryAction,
    /// Human-readable reason, includes the similarity percentage
    pub reason: String,
    /// Best candidate similarity (0.0 when there were no candidates)
    pub similarity: f64,
    /// The best candidate, if any
    pub candidate: Option<GateCandidate>,
    /// Contradiction details when one drove the decision
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contradiction: Option<Contradiction>,
    /// Related ids attached to CREATE_LINKED
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_ids: Option<Vec<i64>>,
}

/// Persistable record of a non-trivial gate decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub timestamp: DateTime<Utc>,
    pub spec_folder: String,
    pub action: String,
    pub similarity: f64,
    pub candidate_id: Option<i64>,
    pub candidate_content_preview: Option<String>,
    pub new_content_preview: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contradiction_pattern: Option<String>,
}

const PREVIEW_CHARS: usize = 120;

fn preview(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= PREVIEW_CHARS {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    }
}

// ============================================================================
// DECISION
// ============================================================================

/// Evaluate incoming content against ranked candidates.
///
/// Decision table:
/// - no candidates: CREATE
/// - similarity >= 0.95: REINFORCE
/// - 0.90 <= similarity < 0.95: SUPERSEDE on contradiction, else UPDATE
/// - 0.70 <= similarity < 0.90: CREATE_LINKED with related ids
/// - below 0.70: CREATE
pub fn evaluate_memory(
    candidates: &[GateCandidate],
    new_content: &str,
    check_contradictions: bool,
) -> GateDecision {
    let Some(best) = candidates
        .iter()
        .max_by(|a, b| a.similarity.total_cmp(&b.similarity))
    else {
        return GateDecision {
            action: MemoryAction::Create,
            reason: "No similar memories found".to_string(),
            similarity: 0.0,
            candidate: None,
            contradiction: None,
            related_ids: None,
        };
    };

    let similarity = best.similarity;
    let pct = format!("{:.1}%", similarity * 100.0);

    if similarity >= DUPLICATE_THRESHOLD {
        return GateDecision {
            action: MemoryAction::Reinforce,
            reason: format!("Near-duplicate of memory {} ({pct} similar)", best.id),
            similarity,
            candidate: Some(best.clone()),
            contradiction: None,
            related_ids: None,
        };
    }

    if similarity >= HIGH_MATCH_THRESHOLD {
        let contradiction = if check_contradictions {
            detect_contradiction(&best.content, new_content)
        } else {
            Contradiction::none()
        };

        if contradiction.found {
            let pattern = contradiction.pattern.clone().unwrap_or_default();
            return GateDecision {
                action: MemoryAction::Supersede,
                reason: format!(
                    "Contradicts memory {} ({pct} similar, pattern {pattern})",
                    best.id
                ),
                similarity,
                candidate: Some(best.clone()),
                contradiction: Some(contradiction),
                related_ids: None,
            };
        }

        return GateDecision {
            action: MemoryAction::Update,
            reason: format!("Strong match of memory {} ({pct} similar)", best.id),
            similarity,
            candidate: Some(best.clone()),
            contradiction: None,
            related_ids: None,
        };
    }

    if similarity >= MEDIUM_MATCH_THRESHOLD {
        let mut related: Vec<(i64, f64)> = candidates
            .iter()
            .filter(|c| c.similarity >= MEDIUM_MATCH_THRESHOLD)
            .map(|c| (c.id, c.similarity))
            .collect();
        related.sort_by(|a, b| b.1.total_cmp(&a.1));
        let related_ids: Vec<i64> = related
            .into_iter()
            .take(MAX_RELATED_IDS)
            .map(|(id, _)| id)
            .collect();

        return GateDecision {
            action: MemoryAction::CreateLinked,
            reason: format!(
                "Related to {} existing memories (best {pct} similar)",
                related_ids.len()
            ),
            similarity,
            candidate: Some(best.clone()),
            contradiction: None,
            related_ids: Some(related_ids),
        };
    }

    GateDecision {
        action: MemoryAction::Create,
        reason: format!("No strong match (best {pct} similar)"),
        similarity,
        candidate: Some(best.clone()),
        contradiction: None,
        related_ids: None,
    }
}

impl GateDecision {
    /// Build the conflict record for this decision, if it warrants one.
    ///
    /// Plain creates with zero similarity are uninteresting; everything else
    /// is logged for the learning history.
    pub fn conflict_record(&self, spec_folder: &str, new_content: &str) -> Option<ConflictRecord> {
        if self.action == MemoryAction::Create && self.similarity == 0.0 {
            return None;
        }
        Some(ConflictRecord {
            timestamp: Utc::now(),
            spec_folder: spec_folder.to_string(),
            action: self.action.as_str().to_string(),
            similarity: self.similarity,
            candidate_id: self.candidate.as_ref().map(|c| c.id),
            candidate_content_preview: self.candidate.as_ref().map(|c| preview(&c.content)),
            new_content_preview: preview(new_content),
            contradiction_pattern: self
                .contradiction
                .as_ref()
                .and_then(|c| c.pattern.clone()),
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
