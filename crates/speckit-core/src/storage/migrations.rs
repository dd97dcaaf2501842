//! Database Migrations
//!
//! Schema migration definitions for the memory store.

/// Migration definitions
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema: memory index, embeddings, FTS5",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "Causal edge graph",
        up: MIGRATION_V2_UP,
    },
    Migration {
        version: 3,
        description: "Sessions and working memory",
        up: MIGRATION_V3_UP,
    },
    Migration {
        version: 4,
        description: "Archival lifecycle columns and conflict log",
        up: MIGRATION_V4_UP,
    },
];

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Version number
    pub version: u32,
    /// Description
    pub description: &'static str,
    /// SQL to apply
    pub up: &'static str,
}

/// V1: memory index, embedding column, FTS5 with sync triggers
const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS memory_index (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    spec_folder TEXT NOT NULL,
    file_path TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL DEFAULT '',
    importance_tier TEXT NOT NULL DEFAULT 'normal',
    importance_weight REAL NOT NULL DEFAULT 0.5,
    content TEXT NOT NULL DEFAULT '',
    content_hash TEXT NOT NULL,
    file_mtime_ms INTEGER,
    embedding_status TEXT NOT NULL DEFAULT 'pending',
    trigger_phrases TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    last_accessed TEXT NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_memory_spec_folder ON memory_index(spec_folder);
CREATE INDEX IF NOT EXISTS idx_memory_embedding_status ON memory_index(embedding_status);
CREATE INDEX IF NOT EXISTS idx_memory_last_accessed ON memory_index(last_accessed);

-- Embedding vectors as little-endian f32 blobs; the store owns this column
CREATE TABLE IF NOT EXISTS memory_embeddings (
    memory_id INTEGER PRIMARY KEY REFERENCES memory_index(id) ON DELETE CASCADE,
    embedding BLOB NOT NULL,
    provider TEXT NOT NULL,
    model TEXT NOT NULL,
    dimensions INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

-- FTS5 virtual table for BM25 keyword search
CREATE VIRTUAL TABLE IF NOT EXISTS memory_fts USING fts5(
    title,
    content,
    content='memory_index',
    content_rowid='id',
    tokenize='porter ascii'
);

-- Triggers to keep FTS in sync
CREATE TRIGGER IF NOT EXISTS memory_fts_ai AFTER INSERT ON memory_index BEGIN
    INSERT INTO memory_fts(rowid, title, content)
    VALUES (NEW.id, NEW.title, NEW.content);
END;

CREATE TRIGGER IF NOT EXISTS memory_fts_ad AFTER DELETE ON memory_index BEGIN
    INSERT INTO memory_fts(memory_fts, rowid, title, content)
    VALUES ('delete', OLD.id, OLD.title, OLD.content);
END;

CREATE TRIGGER IF NOT EXISTS memory_fts_au AFTER UPDATE ON memory_index BEGIN
    INSERT INTO memory_fts(memory_fts, rowid, title, content)
    VALUES ('delete', OLD.id, OLD.title, OLD.content);
    INSERT INTO memory_fts(rowid, title, content)
    VALUES (NEW.id, NEW.title, NEW.content);
END;

-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, datetime('now'));
"#;

/// V2: causal edges with a closed relation set and pair uniqueness
const MIGRATION_V2_UP: &str = r#"
CREATE TABLE IF NOT EXISTS causal_edges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER NOT NULL,
    target_id INTEGER NOT NULL,
    relation TEXT NOT NULL CHECK (relation IN
        ('caused','enabled','supersedes','contradicts','derived_from','supports')),
    strength REAL NOT NULL DEFAULT 0.5 CHECK (strength >= 0.0 AND strength <= 1.0),
    evidence TEXT,
    extracted_at TEXT NOT NULL,
    UNIQUE (source_id, target_id, relation)
);

CREATE INDEX IF NOT EXISTS idx_edges_source ON causal_edges(source_id);
CREATE INDEX IF NOT EXISTS idx_edges_target ON causal_edges(target_id);

UPDATE schema_version SET version = 2, applied_at = datetime('now');
"#;

/// V3: session-scoped working memory with attention scores
const MIGRATION_V3_UP: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    session_id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    last_activity TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_activity ON sessions(last_activity);

CREATE TABLE IF NOT EXISTS working_memory (
    session_id TEXT NOT NULL REFERENCES sessions(session_id) ON DELETE CASCADE,
    memory_id INTEGER NOT NULL,
    attention_score REAL NOT NULL CHECK (attention_score >= 0.0 AND attention_score <= 1.0),
    tier TEXT NOT NULL,
    last_turn INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (session_id, memory_id)
);

CREATE INDEX IF NOT EXISTS idx_working_memory_session ON working_memory(session_id);

UPDATE schema_version SET version = 3, applied_at = datetime('now');
"#;

/// V4: archival lifecycle and gate conflict log
const MIGRATION_V4_UP: &str = r#"
ALTER TABLE memory_index ADD COLUMN is_archived INTEGER NOT NULL DEFAULT 0
    CHECK (is_archived IN (0, 1, 2));
ALTER TABLE memory_index ADD COLUMN archived_at TEXT;

CREATE INDEX IF NOT EXISTS idx_memory_is_archived ON memory_index(is_archived);

CREATE TABLE IF NOT EXISTS conflict_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    spec_folder TEXT NOT NULL,
    action TEXT NOT NULL,
    similarity REAL NOT NULL,
    candidate_id INTEGER,
    candidate_content_preview TEXT,
    new_content_preview TEXT NOT NULL,
    contradiction_pattern TEXT
);

CREATE INDEX IF NOT EXISTS idx_conflict_log_timestamp ON conflict_log(timestamp);
CREATE INDEX IF NOT EXISTS idx_conflict_log_action ON conflict_log(action);

UPDATE schema_version SET version = 4, applied_at = datetime('now');
"#;

/// Get current schema version from database
pub fn get_current_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .or(Ok(0))
}

/// Apply pending migrations
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    let current_version = get_current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                "Applying migration v{}: {}",
                migration.version,
                migration.description
            );

            // execute_batch handles multi-statement SQL including triggers
            conn.execute_batch(migration.up)?;
            applied += 1;
        }
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_apply_cleanly() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let applied = apply_migrations(&conn).unwrap();
        assert_eq!(applied as usize, MIGRATIONS.len());
        assert_eq!(get_current_version(&conn).unwrap(), 4);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        apply_migrations(&conn).unwrap();
        let applied_again = apply_migrations(&conn).unwrap();
        assert_eq!(applied_again, 0);
    }

    #[test]
    fn test_relation_check_constraint() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        apply_migrations(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO causal_edges (source_id, target_id, relation, strength, extracted_at)
             VALUES (1, 2, 'inspired_by', 0.5, datetime('now'))",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_edge_uniqueness_constraint() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        apply_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO causal_edges (source_id, target_id, relation, strength, extracted_at)
             VALUES (1, 2, 'caused', 0.5, datetime('now'))",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO causal_edges (source_id, target_id, relation, strength, extracted_at)
             VALUES (1, 2, 'caused', 0.8, datetime('now'))",
            [],
        );
        assert!(dup.is_err());
    }

    #[test]
    fn test_archived_state_constraint() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        apply_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO memory_index (spec_folder, file_path, content_hash, created_at, updated_at, last_accessed)
             VALUES ('f', 'f/a.md', 'h', datetime('now'), datetime('now'), datetime('now'))",
            [],
        )
        .unwrap();

        let bad = conn.execute("UPDATE memory_index SET is_archived = 3 WHERE id = 1", []);
        assert!(bad.is_err());
    }
}
