//! Session Working Memory
//!
//! Session-scoped attention state. Each retrieved memory can enter a
//! session's working set with an attention score in [0, 1]; the tier is a
//! coarse band over the score and is recomputed on every write, never
//! stored by hand.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{ErrorCode, MemoryError, Result};
use crate::storage::MemoryStore;

// ============================================================================
// TYPES
// ============================================================================

/// A session row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// Attention tier over the score: HOT >= 0.80, WARM >= 0.25, COLD below
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttentionTier {
    #[serde(rename = "HOT")]
    Hot,
    #[serde(rename = "WARM")]
    Warm,
    #[serde(rename = "COLD")]
    Cold,
}

impl AttentionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttentionTier::Hot => "HOT",
            AttentionTier::Warm => "WARM",
            AttentionTier::Cold => "COLD",
        }
    }

    pub fn parse(s: &str) -> AttentionTier {
        match s {
            "HOT" => AttentionTier::Hot,
            "WARM" => AttentionTier::Warm,
            _ => AttentionTier::Cold,
        }
    }
}

/// One working-memory entry, unique per (session, memory)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingMemoryEntry {
    pub session_id: String,
    pub memory_id: i64,
    pub attention_score: f64,
    pub tier: AttentionTier,
    pub last_turn: u64,
}

/// A single score write in a batch
#[derive(Debug, Clone, Deserialize)]
pub struct ScoreUpdate {
    pub memory_id: i64,
    pub score: f64,
    pub turn: u64,
}

/// Aggregate view of a session's working set
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub session_id: String,
    pub entries: i64,
    pub hot: i64,
    pub warm: i64,
    pub cold: i64,
}

/// Spreading-activation tuning
#[derive(Debug, Clone)]
pub struct ActivationConfig {
    /// Score added to each related memory
    pub boost_amount: f64,
    /// Fan-out limit per boosted memory
    pub max_related_memories: usize,
    /// Scores never exceed this cap
    pub max_score_cap: f64,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            boost_amount: 0.35,
            max_related_memories: 5,
            max_score_cap: 1.0,
        }
    }
}

// ============================================================================
// TIER FUNCTION
// ============================================================================

/// Map an attention score to its tier
pub fn calculate_tier(score: f64) -> AttentionTier {
    if score >= 0.80 {
        AttentionTier::Hot
    } else if score >= 0.25 {
        AttentionTier::Warm
    } else {
        AttentionTier::Cold
    }
}

// ============================================================================
// WORKING MEMORY MANAGER
// ============================================================================

/// Session-scoped attention state over the store
pub struct WorkingMemory {
    store: Arc<MemoryStore>,
    activation: ActivationConfig,
    idle_minutes: i64,
    /// (session, turn, source, target) triples boosted this turn, to stop
    /// cycles and double-boosting within one turn
    boosted_this_turn: Mutex<HashSet<(String, u64, i64, i64)>>,
}

impl WorkingMemory {
    pub fn new(store: Arc<MemoryStore>, idle_minutes: i64) -> Self {
        Self {
            store,
            activation: ActivationConfig::default(),
            idle_minutes,
            boosted_this_turn: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_activation(mut self, config: ActivationConfig) -> Self {
        self.activation = config;
        self
    }

    fn validate_session_id(session_id: &str) -> Result<()> {
        if session_id.trim().is_empty() {
            return Err(MemoryError::new(
                ErrorCode::MissingParameter,
                "session_id must be non-empty",
            ));
        }
        Ok(())
    }

    fn validate_memory_id(memory_id: i64) -> Result<()> {
        if memory_id < 0 {
            return Err(MemoryError::new(
                ErrorCode::ParameterOutOfRange,
                format!("memory_id must be a non-negative integer, got {memory_id}"),
            ));
        }
        Ok(())
    }

    fn validate_score(score: f64) -> Result<()> {
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(MemoryError::new(
                ErrorCode::ParameterOutOfRange,
                format!("attention score must be within [0, 1], got {score}"),
            ));
        }
        Ok(())
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    pub fn get_or_create_session(&self, session_id: &str) -> Result<SessionRecord> {
        Self::validate_session_id(session_id)?;
        self.store.get_or_create_session(session_id)
    }

    pub fn clear_session(&self, session_id: &str) -> Result<bool> {
        Self::validate_session_id(session_id)?;
        let mut boosted = self.boosted_this_turn.lock().expect("boost set lock");
        boosted.retain(|(sid, _, _, _)| sid != session_id);
        drop(boosted);
        self.store.clear_session(session_id)
    }

    /// Reap sessions idle longer than the configured timeout
    pub fn cleanup_old_sessions(&self) -> Result<usize> {
        let cutoff = Utc::now() - Duration::minutes(self.idle_minutes);
        let removed = self.store.delete_idle_sessions(cutoff)?;
        if removed > 0 {
            tracing::debug!(removed, "reaped idle sessions");
        }
        Ok(removed)
    }

    // ========================================================================
    // Attention scores
    // ========================================================================

    pub fn get_working_memory(
        &self,
        session_id: &str,
        memory_id: i64,
    ) -> Result<Option<WorkingMemoryEntry>> {
        Self::validate_session_id(session_id)?;
        Self::validate_memory_id(memory_id)?;
        self.store.get_working_memory(session_id, memory_id)
    }

    pub fn get_session_memories(&self, session_id: &str) -> Result<Vec<WorkingMemoryEntry>> {
        Self::validate_session_id(session_id)?;
        self.store.get_session_memories(session_id)
    }

    /// Write a score; the tier is recomputed here, atomically with the write
    pub fn set_attention_score(
        &self,
        session_id: &str,
        memory_id: i64,
        score: f64,
        turn: u64,
    ) -> Result<WorkingMemoryEntry> {
        Self::validate_session_id(session_id)?;
        Self::validate_memory_id(memory_id)?;
        Self::validate_score(score)?;

        self.store.get_or_create_session(session_id)?;
        let tier = calculate_tier(score);
        self.store
            .upsert_working_memory(session_id, memory_id, score, tier.as_str(), turn)?;

        Ok(WorkingMemoryEntry {
            session_id: session_id.to_string(),
            memory_id,
            attention_score: score,
            tier,
            last_turn: turn,
        })
    }

    /// Apply a non-empty batch of score writes
    pub fn batch_update_scores(
        &self,
        session_id: &str,
        updates: &[ScoreUpdate],
    ) -> Result<Vec<WorkingMemoryEntry>> {
        if updates.is_empty() {
            return Err(MemoryError::new(
                ErrorCode::MissingParameter,
                "updates must be a non-empty list",
            ));
        }
        let mut out = Vec::with_capacity(updates.len());
        for update in updates {
            out.push(self.set_attention_score(
                session_id,
                update.memory_id,
                update.score,
                update.turn,
            )?);
        }
        Ok(out)
    }

    pub fn get_session_stats(&self, session_id: &str) -> Result<SessionStats> {
        Self::validate_session_id(session_id)?;
        let (entries, hot, warm, cold) = self.store.session_tier_counts(session_id)?;
        Ok(SessionStats {
            session_id: session_id.to_string(),
            entries,
            hot,
            warm,
            cold,
        })
    }

    // ========================================================================
    // Spreading activation
    // ========================================================================

    /// Propagate a boost from a memory touched this turn to its causal
    /// neighbors. Each (source, target) pair fires at most once per turn.
    /// Returns the ids that were boosted.
    pub fn spread_activation(
        &self,
        session_id: &str,
        source_id: i64,
        turn: u64,
    ) -> Result<Vec<i64>> {
        Self::validate_session_id(session_id)?;
        Self::validate_memory_id(source_id)?;

        let neighborhood = self.store.get_all_edges(source_id)?;
        let mut related: Vec<i64> = Vec::new();
        for id in neighborhood
            .outgoing
            .iter()
            .map(|e| e.target_id)
            .chain(neighborhood.incoming.iter().map(|e| e.source_id))
        {
            if id != source_id && !related.contains(&id) {
                related.push(id);
            }
        }
        related.truncate(self.activation.max_related_memories);

        let mut boosted = Vec::new();
        for target in related {
            let key = (session_id.to_string(), turn, source_id, target);
            {
                let mut seen = self.boosted_this_turn.lock().expect("boost set lock");
                // Drop stale entries for this session from earlier turns
                seen.retain(|(sid, t, _, _)| sid != session_id || *t == turn);
                if !seen.insert(key) {
                    continue;
                }
            }

            let current = self
                .store
                .get_working_memory(session_id, target)?
                .map(|e| e.attention_score)
                .unwrap_or(0.0);
            let new_score =
                (current + self.activation.boost_amount).min(self.activation.max_score_cap);
            self.set_attention_score(session_id, target, new_score, turn)?;
            boosted.push(target);
        }

        Ok(boosted)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CausalRelation, NewEdge};
    use crate::storage::MemoryUpsert;
    use tempfile::TempDir;

    fn setup() -> (WorkingMemory, Arc<MemoryStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new(Some(dir.path().join("test.db"))).unwrap());
        let wm = WorkingMemory::new(store.clone(), 30);
        (wm, store, dir)
    }

    fn add_memory(store: &MemoryStore, path: &str) -> i64 {
        store
            .upsert_memory(&MemoryUpsert {
                spec_folder: "f".to_string(),
                file_path: path.to_string(),
                title: "t".to_string(),
                content: "c".to_string(),
                content_hash: path.to_string(),
                ..MemoryUpsert::default()
            })
            .unwrap()
            .id
    }

    #[test]
    fn test_tier_function() {
        assert_eq!(calculate_tier(1.0), AttentionTier::Hot);
        assert_eq!(calculate_tier(0.80), AttentionTier::Hot);
        assert_eq!(calculate_tier(0.79), AttentionTier::Warm);
        assert_eq!(calculate_tier(0.25), AttentionTier::Warm);
        assert_eq!(calculate_tier(0.24), AttentionTier::Cold);
        assert_eq!(calculate_tier(0.0), AttentionTier::Cold);
    }

    #[test]
    fn test_set_score_recomputes_tier() {
        let (wm, store, _dir) = setup();
        let id = add_memory(&store, "a.md");

        let entry = wm.set_attention_score("s1", id, 0.9, 1).unwrap();
        assert_eq!(entry.tier, AttentionTier::Hot);

        let entry = wm.set_attention_score("s1", id, 0.1, 2).unwrap();
        assert_eq!(entry.tier, AttentionTier::Cold);
        let stored = wm.get_working_memory("s1", id).unwrap().unwrap();
        assert_eq!(stored.tier, AttentionTier::Cold);
        assert_eq!(stored.last_turn, 2);
    }

    #[test]
    fn test_validation() {
        let (wm, store, _dir) = setup();
        let id = add_memory(&store, "a.md");

        assert_eq!(
            wm.set_attention_score("", id, 0.5, 0).unwrap_err().code,
            ErrorCode::MissingParameter
        );
        assert_eq!(
            wm.set_attention_score("s1", -1, 0.5, 0).unwrap_err().code,
            ErrorCode::ParameterOutOfRange
        );
        assert_eq!(
            wm.set_attention_score("s1", id, 1.5, 0).unwrap_err().code,
            ErrorCode::ParameterOutOfRange
        );
        assert_eq!(
            wm.batch_update_scores("s1", &[]).unwrap_err().code,
            ErrorCode::MissingParameter
        );
    }

    #[test]
    fn test_batch_update() {
        let (wm, store, _dir) = setup();
        let a = add_memory(&store, "a.md");
        let b = add_memory(&store, "b.md");

        let entries = wm
            .batch_update_scores(
                "s1",
                &[
                    ScoreUpdate { memory_id: a, score: 0.85, turn: 1 },
                    ScoreUpdate { memory_id: b, score: 0.3, turn: 1 },
                ],
            )
            .unwrap();
        assert_eq!(entries.len(), 2);

        let stats = wm.get_session_stats("s1").unwrap();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.hot, 1);
        assert_eq!(stats.warm, 1);
    }

    #[test]
    fn test_spread_activation_boosts_neighbors_once_per_turn() {
        let (wm, store, _dir) = setup();
        let a = add_memory(&store, "a.md");
        let b = add_memory(&store, "b.md");
        store
            .insert_edge(&NewEdge {
                source_id: a,
                target_id: b,
                relation: CausalRelation::Supports,
                strength: 0.9,
                evidence: None,
            })
            .unwrap();

        let boosted = wm.spread_activation("s1", a, 1).unwrap();
        assert_eq!(boosted, vec![b]);
        let entry = wm.get_working_memory("s1", b).unwrap().unwrap();
        assert!((entry.attention_score - 0.35).abs() < 1e-9);

        // Same turn: no double boost
        let boosted = wm.spread_activation("s1", a, 1).unwrap();
        assert!(boosted.is_empty());
        let entry = wm.get_working_memory("s1", b).unwrap().unwrap();
        assert!((entry.attention_score - 0.35).abs() < 1e-9);

        // Next turn boosts again
        let boosted = wm.spread_activation("s1", a, 2).unwrap();
        assert_eq!(boosted, vec![b]);
        let entry = wm.get_working_memory("s1", b).unwrap().unwrap();
        assert!((entry.attention_score - 0.70).abs() < 1e-9);
    }

    #[test]
    fn test_spread_activation_score_is_capped() {
        let (wm, store, _dir) = setup();
        let a = add_memory(&store, "a.md");
        let b = add_memory(&store, "b.md");
        store
            .insert_edge(&NewEdge {
                source_id: a,
                target_id: b,
                relation: CausalRelation::Supports,
                strength: 0.9,
                evidence: None,
            })
            .unwrap();

        wm.set_attention_score("s1", b, 0.9, 1).unwrap();
        wm.spread_activation("s1", a, 1).unwrap();
        let entry = wm.get_working_memory("s1", b).unwrap().unwrap();
        assert_eq!(entry.attention_score, 1.0);
    }

    #[test]
    fn test_cycle_in_graph_terminates() {
        let (wm, store, _dir) = setup();
        let a = add_memory(&store, "a.md");
        let b = add_memory(&store, "b.md");
        for (s, t) in [(a, b), (b, a)] {
            store
                .insert_edge(&NewEdge {
                    source_id: s,
                    target_id: t,
                    relation: CausalRelation::Supports,
                    strength: 0.5,
                    evidence: None,
                })
                .unwrap();
        }

        wm.spread_activation("s1", a, 1).unwrap();
        wm.spread_activation("s1", b, 1).unwrap();
        // Each direction fires once; nothing loops forever
        assert!(wm.spread_activation("s1", a, 1).unwrap().is_empty());
    }

    #[test]
    fn test_clear_session() {
        let (wm, store, _dir) = setup();
        let a = add_memory(&store, "a.md");
        wm.set_attention_score("s1", a, 0.5, 1).unwrap();
        assert!(wm.clear_session("s1").unwrap());
        assert!(wm.get_working_memory("s1", a).unwrap().is_none());
    }
}
