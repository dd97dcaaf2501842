//! Storage Layer
//!
//! SQLite persistence: memory index, embedding column, FTS5 keyword index,
//! causal edges, sessions, working memory, conflict log, and checkpoints.

pub mod checkpoint;
pub mod migrations;
pub mod queries;
mod sqlite;
mod types;

pub use checkpoint::{CheckpointInfo, CheckpointManager};
pub use sqlite::MemoryStore;
pub use types::{
    ArchivalState, EmbeddingRecord, EmbeddingStatus, ImportanceTier, IndexStats, MemoryRecord,
    MemoryUpsert,
};
