//! SQLite Memory Store
//!
//! Single relational store for the memory index, embedding column, FTS5
//! index, causal edges, sessions, and the conflict log.
//!
//! Uses separate reader/writer connections behind Mutexes so all methods
//! take `&self`; the store is `Send + Sync` and shared as `Arc<MemoryStore>`.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use rusqlite::Connection;

use crate::embeddings::ProviderProfile;
use crate::errors::{ErrorCode, MemoryError, Result};
use crate::gate::ConflictRecord;
use crate::graph::{
    BatchInsertResult, CausalEdge, CausalRelation, EdgeNeighborhood, GraphStats, NewEdge,
};
use crate::session::{SessionRecord, WorkingMemoryEntry};
use crate::storage::queries::{
    archival_ops, conflict_ops, edge_ops, embedding_ops, fts_ops, memory_crud, session_ops,
};
use crate::storage::types::{
    ArchivalState, EmbeddingRecord, EmbeddingStatus, ImportanceTier, IndexStats, MemoryRecord,
    MemoryUpsert,
};

// ============================================================================
// STORE
// ============================================================================

/// The memory store
pub struct MemoryStore {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    db_path: PathBuf,
}

impl MemoryStore {
    /// Apply PRAGMAs to a connection
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    /// Open (or create) the store. `None` uses the platform data directory.
    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        let path = match db_path {
            Some(p) => p,
            None => {
                let proj_dirs = ProjectDirs::from("dev", "speckit", "memory").ok_or_else(|| {
                    MemoryError::new(
                        ErrorCode::DbConnectionFailed,
                        "could not determine project directories",
                    )
                })?;
                let data_dir = proj_dirs.data_dir();
                std::fs::create_dir_all(data_dir)?;
                // Restrict directory permissions to owner-only on Unix
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let perms = std::fs::Permissions::from_mode(0o700);
                    let _ = std::fs::set_permissions(data_dir, perms);
                }
                data_dir.join("speckit-memory.db")
            }
        };

        let writer_conn = Connection::open(&path).map_err(|e| {
            MemoryError::new(
                ErrorCode::DbConnectionFailed,
                format!("cannot open {}: {e}", path.display()),
            )
        })?;

        #[cfg(unix)]
        if path.exists() {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&path, perms);
        }

        Self::configure_connection(&writer_conn)?;

        super::migrations::apply_migrations(&writer_conn).map_err(|e| {
            MemoryError::new(ErrorCode::DbMigrationFailed, e.to_string())
        })?;

        let reader_conn = Connection::open(&path).map_err(|e| {
            MemoryError::new(
                ErrorCode::DbConnectionFailed,
                format!("cannot open {}: {e}", path.display()),
            )
        })?;
        Self::configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
            db_path: path,
        })
    }

    /// Path of the backing database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn write(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| MemoryError::new(ErrorCode::DbConnectionFailed, "writer lock poisoned"))
    }

    fn read(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.reader
            .lock()
            .map_err(|_| MemoryError::new(ErrorCode::DbConnectionFailed, "reader lock poisoned"))
    }

    // ========================================================================
    // Memory rows
    // ========================================================================

    pub fn upsert_memory(&self, input: &MemoryUpsert) -> Result<MemoryRecord> {
        memory_crud::upsert_memory(&*self.write()?, input)
    }

    pub fn get_memory(&self, id: i64) -> Result<Option<MemoryRecord>> {
        memory_crud::get_memory(&*self.read()?, id)
    }

    pub fn get_memory_by_path(&self, file_path: &str) -> Result<Option<MemoryRecord>> {
        memory_crud::get_memory_by_path(&*self.read()?, file_path)
    }

    pub fn find_by_content_hash(&self, hash: &str) -> Result<Option<MemoryRecord>> {
        memory_crud::find_by_content_hash(&*self.read()?, hash)
    }

    pub fn list_memories(
        &self,
        spec_folder: Option<&str>,
        include_archived: bool,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<MemoryRecord>> {
        memory_crud::list_memories(&*self.read()?, spec_folder, include_archived, limit, offset)
    }

    pub fn get_by_folder(&self, spec_folder: &str) -> Result<Vec<MemoryRecord>> {
        memory_crud::get_by_folder(&*self.read()?, spec_folder)
    }

    /// Delete a memory row and every edge touching it.
    /// The embedding row and FTS entry follow via cascade and trigger.
    pub fn delete_memory(&self, id: i64) -> Result<bool> {
        let conn = self.write()?;
        edge_ops::delete_edges_for_memory(&conn, id)?;
        memory_crud::delete_memory(&conn, id)
    }

    pub fn delete_by_path(&self, file_path: &str) -> Result<bool> {
        let conn = self.write()?;
        if let Some(record) = memory_crud::get_memory_by_path(&conn, file_path)? {
            edge_ops::delete_edges_for_memory(&conn, record.id)?;
        }
        memory_crud::delete_by_path(&conn, file_path)
    }

    pub fn touch_last_accessed(&self, id: i64) -> Result<()> {
        memory_crud::touch_last_accessed(&*self.write()?, id)
    }

    pub fn set_embedding_status(&self, id: i64, status: EmbeddingStatus) -> Result<()> {
        memory_crud::set_embedding_status(&*self.write()?, id, status)
    }

    pub fn set_importance(&self, id: i64, tier: ImportanceTier, weight: f64) -> Result<()> {
        memory_crud::set_importance(&*self.write()?, id, tier, weight)
    }

    pub fn update_file_mtime(&self, id: i64, mtime_ms: i64) -> Result<()> {
        memory_crud::update_file_mtime(&*self.write()?, id, mtime_ms)
    }

    pub fn batch_update_mtimes(&self, updates: &[(i64, i64)]) -> Result<usize> {
        memory_crud::batch_update_mtimes(&*self.write()?, updates)
    }

    pub fn set_archival_state(
        &self,
        id: i64,
        state: ArchivalState,
        archived_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        memory_crud::set_archival_state(&*self.write()?, id, state, archived_at)
    }

    pub fn stats(&self) -> Result<IndexStats> {
        memory_crud::index_stats(&*self.read()?)
    }

    // ========================================================================
    // Embedding column
    // ========================================================================

    pub fn upsert_embedding(
        &self,
        memory_id: i64,
        vector: &[f32],
        profile: &ProviderProfile,
    ) -> Result<()> {
        embedding_ops::upsert_embedding(&*self.write()?, memory_id, vector, profile)
    }

    pub fn get_embedding(&self, memory_id: i64) -> Result<Option<EmbeddingRecord>> {
        embedding_ops::get_embedding(&*self.read()?, memory_id)
    }

    pub fn delete_embedding(&self, memory_id: i64) -> Result<bool> {
        embedding_ops::delete_embedding(&*self.write()?, memory_id)
    }

    pub fn load_all_embeddings(&self) -> Result<Vec<(i64, Vec<f32>)>> {
        embedding_ops::load_all_embeddings(&*self.read()?)
    }

    // ========================================================================
    // Keyword search
    // ========================================================================

    /// BM25-ranked FTS query; `fts_query` must already be sanitized
    pub fn search_keyword(&self, fts_query: &str, limit: usize) -> Result<Vec<(i64, f64)>> {
        fts_ops::search_keyword(&*self.read()?, fts_query, limit)
    }

    // ========================================================================
    // Causal edges
    // ========================================================================

    pub fn insert_edge(&self, edge: &NewEdge) -> Result<CausalEdge> {
        edge_ops::insert_edge(&*self.write()?, edge)
    }

    /// Insert a batch; individual failures are collected, never aborting
    /// the rest of the batch.
    pub fn insert_edges_batch(&self, edges: &[NewEdge]) -> Result<BatchInsertResult> {
        let conn = self.write()?;
        let mut inserted = 0;
        let mut failures = Vec::new();
        for (i, edge) in edges.iter().enumerate() {
            match edge_ops::insert_edge(&conn, edge) {
                Ok(_) => inserted += 1,
                Err(e) => failures.push((i, e.to_string())),
            }
        }
        Ok(BatchInsertResult {
            total: edges.len(),
            inserted,
            failed: failures.len(),
            failures,
        })
    }

    pub fn get_edge(&self, id: i64) -> Result<Option<CausalEdge>> {
        edge_ops::get_edge(&*self.read()?, id)
    }

    pub fn get_edges_from(
        &self,
        source_id: i64,
        relation: Option<CausalRelation>,
    ) -> Result<Vec<CausalEdge>> {
        edge_ops::get_edges_from(&*self.read()?, source_id, relation)
    }

    pub fn get_edges_to(
        &self,
        target_id: i64,
        relation: Option<CausalRelation>,
    ) -> Result<Vec<CausalEdge>> {
        edge_ops::get_edges_to(&*self.read()?, target_id, relation)
    }

    pub fn get_all_edges(&self, memory_id: i64) -> Result<EdgeNeighborhood> {
        let conn = self.read()?;
        let incoming = edge_ops::get_edges_to(&conn, memory_id, None)?;
        let outgoing = edge_ops::get_edges_from(&conn, memory_id, None)?;
        let total = incoming.len() + outgoing.len();
        Ok(EdgeNeighborhood {
            incoming,
            outgoing,
            total,
        })
    }

    pub fn update_edge(
        &self,
        id: i64,
        strength: Option<f64>,
        evidence: Option<&str>,
    ) -> Result<Option<CausalEdge>> {
        edge_ops::update_edge(&*self.write()?, id, strength, evidence)
    }

    pub fn delete_edge(&self, id: i64) -> Result<bool> {
        edge_ops::delete_edge(&*self.write()?, id)
    }

    pub fn delete_edges_for_memory(&self, memory_id: i64) -> Result<usize> {
        edge_ops::delete_edges_for_memory(&*self.write()?, memory_id)
    }

    pub fn graph_stats(&self) -> Result<GraphStats> {
        edge_ops::graph_stats(&*self.read()?)
    }

    pub fn find_orphaned_edges(&self) -> Result<Vec<CausalEdge>> {
        edge_ops::find_orphaned_edges(&*self.read()?)
    }

    // ========================================================================
    // Sessions and working memory
    // ========================================================================

    pub fn get_or_create_session(&self, session_id: &str) -> Result<SessionRecord> {
        session_ops::get_or_create_session(&*self.write()?, session_id)
    }

    pub fn clear_session(&self, session_id: &str) -> Result<bool> {
        session_ops::clear_session(&*self.write()?, session_id)
    }

    pub fn delete_idle_sessions(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        session_ops::delete_idle_sessions(&*self.write()?, cutoff)
    }

    pub fn get_working_memory(
        &self,
        session_id: &str,
        memory_id: i64,
    ) -> Result<Option<WorkingMemoryEntry>> {
        session_ops::get_working_memory(&*self.read()?, session_id, memory_id)
    }

    pub fn get_session_memories(&self, session_id: &str) -> Result<Vec<WorkingMemoryEntry>> {
        session_ops::get_session_memories(&*self.read()?, session_id)
    }

    pub fn upsert_working_memory(
        &self,
        session_id: &str,
        memory_id: i64,
        score: f64,
        tier: &str,
        turn: u64,
    ) -> Result<()> {
        session_ops::upsert_working_memory(&*self.write()?, session_id, memory_id, score, tier, turn)
    }

    pub fn session_tier_counts(&self, session_id: &str) -> Result<(i64, i64, i64, i64)> {
        session_ops::session_tier_counts(&*self.read()?, session_id)
    }

    // ========================================================================
    // Conflict log
    // ========================================================================

    pub fn insert_conflict(&self, record: &ConflictRecord) -> Result<i64> {
        conflict_ops::insert_conflict(&*self.write()?, record)
    }

    pub fn list_conflicts(
        &self,
        action: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ConflictRecord>> {
        conflict_ops::list_conflicts(&*self.read()?, action, limit)
    }

    // ========================================================================
    // Archival
    // ========================================================================

    pub fn archival_candidates(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>> {
        archival_ops::archival_candidates(&*self.read()?, cutoff, limit)
    }

    pub fn ensure_archival_columns(&self) -> Result<()> {
        archival_ops::ensure_archival_columns(&*self.write()?)
    }

    pub fn unarchive(&self, id: i64) -> Result<bool> {
        archival_ops::unarchive(&*self.write()?, id)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (MemoryStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new(Some(dir.path().join("test.db"))).unwrap();
        (store, dir)
    }

    fn sample_upsert(path: &str, content: &str) -> MemoryUpsert {
        MemoryUpsert {
            spec_folder: "auth-flow".to_string(),
            file_path: path.to_string(),
            title: "Decision".to_string(),
            content: content.to_string(),
            content_hash: format!("hash-of-{content}"),
            file_mtime_ms: Some(1_700_000_000_000),
            ..MemoryUpsert::default()
        }
    }

    #[test]
    fn test_upsert_then_get() {
        let (store, _dir) = test_store();
        let record = store
            .upsert_memory(&sample_upsert("auth-flow/decision.md", "Use strict equality"))
            .unwrap();
        assert!(record.id > 0);
        assert_eq!(record.embedding_status, EmbeddingStatus::Pending);

        let fetched = store.get_memory(record.id).unwrap().unwrap();
        assert_eq!(fetched.file_path, "auth-flow/decision.md");
        assert_eq!(fetched.content, "Use strict equality");
    }

    #[test]
    fn test_upsert_same_path_updates_in_place() {
        let (store, _dir) = test_store();
        let first = store
            .upsert_memory(&sample_upsert("auth-flow/decision.md", "v1"))
            .unwrap();
        let second = store
            .upsert_memory(&sample_upsert("auth-flow/decision.md", "v2"))
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.content, "v2");
        assert_eq!(store.stats().unwrap().total, 1);
    }

    #[test]
    fn test_delete_missing_returns_false() {
        let (store, _dir) = test_store();
        assert!(!store.delete_memory(12345).unwrap());
    }

    #[test]
    fn test_keyword_search_finds_content() {
        let (store, _dir) = test_store();
        store
            .upsert_memory(&sample_upsert("a.md", "retry requests with exponential backoff"))
            .unwrap();
        store
            .upsert_memory(&sample_upsert("b.md", "cache invalidation strategy"))
            .unwrap();

        let hits = store.search_keyword("backoff", 10).unwrap();
        assert_eq!(hits.len(), 1);

        let all = store.search_keyword("strategy OR backoff", 10).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_embedding_round_trip_and_dimension_guard() {
        let (store, _dir) = test_store();
        let record = store.upsert_memory(&sample_upsert("a.md", "text")).unwrap();

        let profile = ProviderProfile {
            name: "voyage".to_string(),
            model: "voyage-3".to_string(),
            dim: 4,
        };
        store
            .upsert_embedding(record.id, &[0.1, 0.2, 0.3, 0.4], &profile)
            .unwrap();

        let stored = store.get_embedding(record.id).unwrap().unwrap();
        assert_eq!(stored.vector.len(), 4);
        assert_eq!(stored.provider, "voyage");

        let err = store
            .upsert_embedding(record.id, &[0.1, 0.2], &profile)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EmbeddingDimensionMismatch);
    }

    #[test]
    fn test_edge_insert_and_duplicate() {
        let (store, _dir) = test_store();
        let a = store.upsert_memory(&sample_upsert("a.md", "a")).unwrap();
        let b = store.upsert_memory(&sample_upsert("b.md", "b")).unwrap();

        let edge = NewEdge {
            source_id: a.id,
            target_id: b.id,
            relation: CausalRelation::Caused,
            strength: 0.8,
            evidence: Some("observed in review".to_string()),
        };
        let stored = store.insert_edge(&edge).unwrap();
        assert_eq!(stored.relation, CausalRelation::Caused);

        let dup = store.insert_edge(&edge).unwrap_err();
        assert_eq!(dup.code, ErrorCode::DuplicateEdge);
    }

    #[test]
    fn test_edge_self_reference_rejected() {
        let (store, _dir) = test_store();
        let a = store.upsert_memory(&sample_upsert("a.md", "a")).unwrap();
        let err = store
            .insert_edge(&NewEdge {
                source_id: a.id,
                target_id: a.id,
                relation: CausalRelation::Supports,
                strength: 0.5,
                evidence: None,
            })
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::SelfReferenceEdge);
    }

    #[test]
    fn test_batch_insert_partial_failure() {
        let (store, _dir) = test_store();
        let a = store.upsert_memory(&sample_upsert("a.md", "a")).unwrap();
        let b = store.upsert_memory(&sample_upsert("b.md", "b")).unwrap();

        let edges = vec![
            NewEdge {
                source_id: a.id,
                target_id: b.id,
                relation: CausalRelation::Enabled,
                strength: 0.5,
                evidence: None,
            },
            NewEdge {
                source_id: a.id,
                target_id: a.id, // invalid
                relation: CausalRelation::Enabled,
                strength: 0.5,
                evidence: None,
            },
            NewEdge {
                source_id: b.id,
                target_id: a.id,
                relation: CausalRelation::Supports,
                strength: 1.5, // invalid
                evidence: None,
            },
        ];

        let result = store.insert_edges_batch(&edges).unwrap();
        assert_eq!(result.total, 3);
        assert_eq!(result.inserted, 1);
        assert_eq!(result.failed, 2);
    }

    #[test]
    fn test_delete_memory_removes_edges() {
        let (store, _dir) = test_store();
        let a = store.upsert_memory(&sample_upsert("a.md", "a")).unwrap();
        let b = store.upsert_memory(&sample_upsert("b.md", "b")).unwrap();
        store
            .insert_edge(&NewEdge {
                source_id: a.id,
                target_id: b.id,
                relation: CausalRelation::Caused,
                strength: 0.5,
                evidence: None,
            })
            .unwrap();

        store.delete_memory(a.id).unwrap();
        assert_eq!(store.get_all_edges(b.id).unwrap().total, 0);
    }

    #[test]
    fn test_session_and_working_memory() {
        let (store, _dir) = test_store();
        let m = store.upsert_memory(&sample_upsert("a.md", "a")).unwrap();

        store.get_or_create_session("s1").unwrap();
        store
            .upsert_working_memory("s1", m.id, 0.9, "HOT", 3)
            .unwrap();

        let entry = store.get_working_memory("s1", m.id).unwrap().unwrap();
        assert_eq!(entry.attention_score, 0.9);
        assert_eq!(entry.last_turn, 3);

        let (total, hot, _warm, _cold) = store.session_tier_counts("s1").unwrap();
        assert_eq!((total, hot), (1, 1));

        assert!(store.clear_session("s1").unwrap());
        assert!(store.get_working_memory("s1", m.id).unwrap().is_none());
    }

    #[test]
    fn test_conflict_log_round_trip() {
        let (store, _dir) = test_store();
        let record = ConflictRecord {
            timestamp: Utc::now(),
            spec_folder: "auth-flow".to_string(),
            action: "SUPERSEDE".to_string(),
            similarity: 0.92,
            candidate_id: Some(3),
            candidate_content_preview: Some("Always use var".to_string()),
            new_content_preview: "Never use var".to_string(),
            contradiction_pattern: Some("always<->never".to_string()),
        };
        store.insert_conflict(&record).unwrap();

        let all = store.list_conflicts(None, 10).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].action, "SUPERSEDE");

        let filtered = store.list_conflicts(Some("UPDATE"), 10).unwrap();
        assert!(filtered.is_empty());
    }
}
