//! Engine-level scenarios: provider outage fallback, indexer fast paths,
//! and the save-then-search pipeline.

use speckit_core::embeddings::ProviderError;
use speckit_core::{
    FallbackReason, ProviderTier, ReindexReason, SaveRequest, SearchRequest,
};
use speckit_e2e_tests::{lexical_engine, voyage_chain};

#[tokio::test]
async fn primary_outage_falls_back_to_local() {
    // Primary returns HTTP 503 with the local fallback enabled: the chain
    // lands on the secondary tier (hf-local) and logs one api_unavailable
    // event.
    let chain = voyage_chain();
    assert_eq!(chain.active_tier().await, ProviderTier::Primary);

    chain
        .fail_over_from_primary(ProviderError::http(503, "service unavailable"))
        .await;

    assert_eq!(chain.active_tier().await, ProviderTier::Secondary);
    assert_eq!(chain.active_provider_name().await, "hf-local");

    let log = chain.fallback_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].reason, FallbackReason::ApiUnavailable);
    assert_eq!(log[0].provider, "voyage");
}

#[tokio::test]
async fn save_search_and_touch_pipeline() {
    let (engine, _dir) = lexical_engine();

    let saved = engine
        .save(SaveRequest::new(
            "Rotate refresh tokens on every single use.",
            "auth/tokens.md",
            "auth",
        ))
        .await
        .unwrap();
    let id = saved.memory_id.unwrap();

    let before = engine.store().get_memory(id).unwrap().unwrap();
    let response = engine
        .search(SearchRequest::new("refresh tokens"))
        .await
        .unwrap();
    assert_eq!(response.results.len(), 1);
    assert!(response.lexical_only);

    // A completed save is visible to a subsequent query, and the query
    // touches the row
    let after = engine.store().get_memory(id).unwrap().unwrap();
    assert!(after.access_count > before.access_count);
}

#[tokio::test]
async fn indexer_fast_path_after_scan() {
    let (engine, dir) = lexical_engine();
    let specs = dir.path().join("specs");
    std::fs::create_dir_all(specs.join("auth")).unwrap();
    let file = specs.join("auth/decision.md");
    std::fs::write(&file, "# Sessions\nSessions are stateless on the edge.").unwrap();

    engine.scan_folder(&specs, false).await.unwrap();

    // Mark the row embedded so the fast path applies (lexical mode leaves
    // rows pending on purpose)
    let record = engine
        .store()
        .get_memory_by_path(&file.to_string_lossy())
        .unwrap()
        .unwrap();
    engine
        .store()
        .set_embedding_status(record.id, speckit_core::EmbeddingStatus::Success)
        .unwrap();

    let decision = engine.indexer().should_reindex(&file, false).unwrap();
    assert!(!decision.reindex);
    assert_eq!(decision.reason, ReindexReason::MtimeUnchanged);
    assert!(decision.fast_path);
}

#[tokio::test]
async fn supersede_archives_the_old_memory_and_links_it() {
    let (engine, _dir) = lexical_engine();

    // With the lexical sentinel there are no vector candidates, so drive
    // the supersede path through an exact-content stand-in: save, then
    // save contradicting content against a synthetic candidate via the
    // gate directly.
    let old = engine
        .save(SaveRequest::new("Always use var", "style/var.md", "style"))
        .await
        .unwrap()
        .memory_id
        .unwrap();

    let decision = speckit_core::evaluate_memory(
        &[speckit_core::GateCandidate {
            id: old,
            similarity: 0.92,
            content: "Always use var".to_string(),
        }],
        "Never use var",
        true,
    );
    assert_eq!(decision.action, speckit_core::MemoryAction::Supersede);
    assert_eq!(
        decision.contradiction.as_ref().unwrap().kind,
        Some("absolute")
    );
}

#[tokio::test]
async fn session_sweep_reaps_idle_sessions() {
    let (engine, _dir) = lexical_engine();
    let wm = engine.working_memory();
    wm.get_or_create_session("stale").unwrap();

    // Nothing is idle yet
    assert_eq!(wm.cleanup_old_sessions().unwrap(), 0);
}
