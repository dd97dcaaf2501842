//! Lifecycle scenarios: archival exclusion, round-trips, depth clamping,
//! and working-memory tiers.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rusqlite::params;
use speckit_core::{
    calculate_tier, content_hash_str, ArchivalAction, ArchivalConfig, ArchivalManager,
    ArchivalState, AttentionTier, CausalGraph, CausalRelation, ImportanceTier, MemoryStore,
    MemoryUpsert, NewEdge, TraversalDirection,
};
use tempfile::TempDir;

fn store() -> (Arc<MemoryStore>, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new(Some(dir.path().join("e2e.db"))).unwrap());
    (store, dir)
}

fn add_memory(store: &MemoryStore, path: &str, tier: ImportanceTier) -> i64 {
    store
        .upsert_memory(&MemoryUpsert {
            spec_folder: "spec".to_string(),
            file_path: path.to_string(),
            title: "t".to_string(),
            content: format!("content of {path}"),
            content_hash: content_hash_str(path),
            importance_tier: Some(tier),
            ..MemoryUpsert::default()
        })
        .unwrap()
        .id
}

fn backdate(dir: &TempDir, id: i64, days: i64) {
    let conn = rusqlite::Connection::open(dir.path().join("e2e.db")).unwrap();
    conn.execute(
        "UPDATE memory_index SET last_accessed = ?1 WHERE id = ?2",
        params![Utc::now() - Duration::days(days), id],
    )
    .unwrap();
}

#[test]
fn constitutional_memory_never_archives() {
    // A year-old constitutional memory stays out of the candidate list
    let (store, dir) = store();
    let manager = ArchivalManager::init(store.clone(), ArchivalConfig::default()).unwrap();

    let protected = add_memory(&store, "laws.md", ImportanceTier::Constitutional);
    backdate(&dir, protected, 365);

    let status = manager.check_memory_archival_status(protected).unwrap();
    assert!(!status.should_archive);
    assert_eq!(status.reason, "Protected tier");
    assert!(manager.get_archival_candidates(100).unwrap().is_empty());
}

#[test]
fn archive_then_unarchive_round_trip() {
    let (store, dir) = store();
    let manager = ArchivalManager::init(store.clone(), ArchivalConfig::default()).unwrap();

    let id = add_memory(&store, "old.md", ImportanceTier::Normal);
    backdate(&dir, id, 100);
    let before = store.get_memory(id).unwrap().unwrap();

    manager.archive_memory(id, ArchivalAction::Mark).unwrap();
    assert_eq!(
        store.get_memory(id).unwrap().unwrap().is_archived,
        ArchivalState::Archived
    );

    manager.unarchive_memory(id).unwrap();
    let after = store.get_memory(id).unwrap().unwrap();
    assert_eq!(after.is_archived, ArchivalState::Active);
    assert!(after.archived_at.is_none());
    assert_eq!(after.content, before.content);
    assert_eq!(after.importance_tier, before.importance_tier);
    assert_eq!(after.created_at, before.created_at);
}

#[test]
fn depth_clamp_on_long_chain() {
    // 14-edge chain, requested depth 15: the clamp holds at 10
    let (store, _dir) = store();
    let graph = CausalGraph::new(store.clone());

    let ids: Vec<i64> = (0..15)
        .map(|i| add_memory(&store, &format!("chain-{i}.md"), ImportanceTier::Normal))
        .collect();
    for pair in ids.windows(2) {
        store
            .insert_edge(&NewEdge {
                source_id: pair[0],
                target_id: pair[1],
                relation: CausalRelation::Caused,
                strength: 0.8,
                evidence: None,
            })
            .unwrap();
    }

    let chain = graph
        .get_causal_chain(ids[0], TraversalDirection::Outgoing, None, 15)
        .unwrap();

    assert_eq!(chain.traversal_options.max_depth, 10);
    assert!(chain.edges.iter().all(|e| e.depth <= 10));
    assert_eq!(chain.edges.len(), 10);
}

#[test]
fn three_cycle_terminates_quickly() {
    let (store, _dir) = store();
    let graph = CausalGraph::new(store.clone());

    let a = add_memory(&store, "a.md", ImportanceTier::Normal);
    let b = add_memory(&store, "b.md", ImportanceTier::Normal);
    let c = add_memory(&store, "c.md", ImportanceTier::Normal);
    for (s, t) in [(a, b), (b, c), (c, a)] {
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

    let chain = graph
        .get_causal_chain(a, TraversalDirection::Outgoing, None, 10)
        .unwrap();
    assert!(chain.edges.len() < 100);
}

#[test]
fn tier_function_boundaries() {
    assert_eq!(calculate_tier(0.80), AttentionTier::Hot);
    assert_eq!(calculate_tier(0.799), AttentionTier::Warm);
    assert_eq!(calculate_tier(0.25), AttentionTier::Warm);
    assert_eq!(calculate_tier(0.249), AttentionTier::Cold);
}

#[test]
fn content_hash_properties() {
    const EMPTY: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
    assert_eq!(content_hash_str(""), EMPTY);
    assert_eq!(content_hash_str("x"), content_hash_str("x"));
    assert_ne!(content_hash_str("x"), content_hash_str("y"));
}
