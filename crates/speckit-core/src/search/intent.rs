//! Query Intent Classification
//!
//! Maps a query string to one of five coarse intents and re-weights the six
//! ranking factors accordingly. Classification mixes whole-word keyword
//! scoring (primary 1.0, secondary 0.5) with regex patterns, combined
//! 60% keyword / 40% pattern. Queries with no signal fall back to
//! `understand` with `fallback = true`.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// ============================================================================
// INTENTS
// ============================================================================

/// The five query intents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    AddFeature,
    FixBug,
    Refactor,
    SecurityAudit,
    Understand,
}

impl QueryIntent {
    pub const ALL: &'static [QueryIntent] = &[
        QueryIntent::AddFeature,
        QueryIntent::FixBug,
        QueryIntent::Refactor,
        QueryIntent::SecurityAudit,
        QueryIntent::Understand,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryIntent::AddFeature => "add_feature",
            QueryIntent::FixBug => "fix_bug",
            QueryIntent::Refactor => "refactor",
            QueryIntent::SecurityAudit => "security_audit",
            QueryIntent::Understand => "understand",
        }
    }

    pub fn parse(s: &str) -> Option<QueryIntent> {
        Self::ALL.iter().copied().find(|i| i.as_str() == s)
    }
}

// ============================================================================
// RANKING WEIGHTS
// ============================================================================

/// The six ranking factors. Every weight map sums to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankWeights {
    pub similarity: f64,
    pub importance: f64,
    pub recency: f64,
    pub popularity: f64,
    pub tier_boost: f64,
    pub retrievability: f64,
}

impl RankWeights {
    pub fn sum(&self) -> f64 {
        self.similarity
            + self.importance
            + self.recency
            + self.popularity
            + self.tier_boost
            + self.retrievability
    }
}

impl Default for RankWeights {
    fn default() -> Self {
        Self {
            similarity: 0.35,
            importance: 0.15,
            recency: 0.15,
            popularity: 0.10,
            tier_boost: 0.10,
            retrievability: 0.15,
        }
    }
}

/// Per-intent weight adjustments
pub fn intent_weights(intent: QueryIntent) -> RankWeights {
    match intent {
        QueryIntent::AddFeature => RankWeights {
            similarity: 0.30,
            importance: 0.15,
            recency: 0.20,
            popularity: 0.10,
            tier_boost: 0.10,
            retrievability: 0.15,
        },
        QueryIntent::FixBug => RankWeights {
            similarity: 0.35,
            importance: 0.10,
            recency: 0.30,
            popularity: 0.05,
            tier_boost: 0.05,
            retrievability: 0.15,
        },
        QueryIntent::Refactor => RankWeights {
            similarity: 0.30,
            importance: 0.20,
            recency: 0.10,
            popularity: 0.15,
            tier_boost: 0.10,
            retrievability: 0.15,
        },
        QueryIntent::SecurityAudit => RankWeights {
            similarity: 0.25,
            importance: 0.30,
            recency: 0.10,
            popularity: 0.05,
            tier_boost: 0.20,
            retrievability: 0.10,
        },
        QueryIntent::Understand => RankWeights {
            similarity: 0.40,
            importance: 0.10,
            recency: 0.05,
            popularity: 0.15,
            tier_boost: 0.05,
            retrievability: 0.25,
        },
    }
}

/// Overlay an intent's adjustments onto a base map.
///
/// Every intent defines all six factors, so the overlay is a full
/// replacement; the base is returned untouched only when asked for an
/// intent with no adjustments (which does not exist today).
pub fn apply_intent_weights(_base: &RankWeights, intent: QueryIntent) -> RankWeights {
    intent_weights(intent)
}

// ============================================================================
// CLASSIFIER
// ============================================================================

/// Minimum combined score before a classification is trusted
const CONFIDENCE_THRESHOLD: f64 = 0.20;

const KEYWORD_MIX: f64 = 0.60;
const PATTERN_MIX: f64 = 0.40;

struct IntentProfile {
    intent: QueryIntent,
    primary: &'static [&'static str],
    secondary: &'static [&'static str],
    patterns: &'static [&'static str],
}

const PROFILES: &[IntentProfile] = &[
    IntentProfile {
        intent: QueryIntent::AddFeature,
        primary: &["add", "implement", "create", "build", "new"],
        secondary: &["feature", "support", "endpoint", "introduce", "extend"],
        patterns: &[
            r"(?i)\badd(ing)?\b.*\b(feature|support|endpoint|option)\b",
            r"(?i)\bimplement(ing)?\b",
            r"(?i)\bbuild(ing)?\b.*\bnew\b",
        ],
    },
    IntentProfile {
        intent: QueryIntent::FixBug,
        primary: &["fix", "bug", "error", "crash", "broken"],
        secondary: &["debug", "issue", "fails", "regression", "wrong"],
        patterns: &[
            r"(?i)\bfix(ing|es)?\b",
            r"(?i)\b(error|exception|panic|stack trace)\b",
            r"(?i)(doesn'?t|does not|won'?t) work",
        ],
    },
    IntentProfile {
        intent: QueryIntent::Refactor,
        primary: &["refactor", "cleanup", "restructure", "simplify", "extract"],
        secondary: &["rename", "reorganize", "consolidate", "tidy", "split"],
        patterns: &[
            r"(?i)\brefactor(ing)?\b",
            r"(?i)\bclean\s?up\b",
            r"(?i)\bextract\b.*\b(function|method|module|crate)\b",
        ],
    },
    IntentProfile {
        intent: QueryIntent::SecurityAudit,
        primary: &["security", "vulnerability", "audit", "exploit", "injection"],
        secondary: &["auth", "sanitize", "escape", "cve", "permissions"],
        patterns: &[
            r"(?i)\bsecurity\b",
            r"(?i)\b(sql injection|xss|csrf)\b",
            r"(?i)\bvulnerab",
        ],
    },
    IntentProfile {
        intent: QueryIntent::Understand,
        primary: &["how", "what", "why", "explain", "understand"],
        secondary: &["where", "works", "overview", "architecture", "docs"],
        patterns: &[
            r"(?i)^\s*(how|what|why|where)\b",
            r"(?i)\bexplain\b",
            r"\?\s*$",
        ],
    },
];

fn compiled_patterns() -> &'static Vec<Vec<Regex>> {
    static PATTERNS: OnceLock<Vec<Vec<Regex>>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        PROFILES
            .iter()
            .map(|p| {
                p.patterns
                    .iter()
                    .map(|src| Regex::new(src).expect("intent patterns are valid regex"))
                    .collect()
            })
            .collect()
    })
}

fn has_word(words: &[&str], needle: &str) -> bool {
    words.iter().any(|w| *w == needle)
}

/// A classification outcome
#[derive(Debug, Clone, Serialize)]
pub struct IntentClassification {
    pub intent: QueryIntent,
    pub confidence: f64,
    /// True when no signal crossed the threshold and `understand` was assumed
    pub fallback: bool,
}

/// Classify a query string
pub fn classify_intent(query: &str) -> IntentClassification {
    let lower = query.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
        .collect();

    let mut best: Option<(QueryIntent, f64)> = None;

    for (profile, regexes) in PROFILES.iter().zip(compiled_patterns().iter()) {
        let mut keyword_raw: f64 = 0.0;
        for kw in profile.primary {
            if has_word(&words, kw) {
                keyword_raw += 1.0;
            }
        }
        for kw in profile.secondary {
            if has_word(&words, kw) {
                keyword_raw += 0.5;
            }
        }
        // Two primary hits saturate the keyword side
        let keyword_score = (keyword_raw / 2.0).min(1.0);

        let pattern_hits = regexes.iter().filter(|re| re.is_match(query)).count();
        let pattern_score = (pattern_hits as f64 / regexes.len() as f64).min(1.0);

        let combined = KEYWORD_MIX * keyword_score + PATTERN_MIX * pattern_score;
        if best.map(|(_, s)| combined > s).unwrap_or(true) {
            best = Some((profile.intent, combined));
        }
    }

    match best {
        Some((intent, confidence)) if confidence >= CONFIDENCE_THRESHOLD => {
            IntentClassification {
                intent,
                confidence,
                fallback: false,
            }
        }
        Some((_, confidence)) => IntentClassification {
            intent: QueryIntent::Understand,
            confidence,
            fallback: true,
        },
        None => IntentClassification {
            intent: QueryIntent::Understand,
            confidence: 0.0,
            fallback: true,
        },
    }
}

/// Classification plus the resulting ranking weights
#[derive(Debug, Clone, Serialize)]
pub struct QueryWeights {
    pub intent: QueryIntent,
    pub confidence: f64,
    pub fallback: bool,
    pub weights: RankWeights,
}

/// Classify and overlay in one step
pub fn get_query_weights(query: &str, base: &RankWeights) -> QueryWeights {
    let classification = classify_intent(query);
    QueryWeights {
        intent: classification.intent,
        confidence: classification.confidence,
        fallback: classification.fallback,
        weights: apply_intent_weights(base, classification.intent),
    }
}

// ============================================================================
// TESTS
// ============================================================================
