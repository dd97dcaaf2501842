//! Retrieval scenarios: fusion convergence, layer budgets, retry
//! classification, and the recovery-hint boundary.

use speckit_core::{
    calculate_backoff, classify_error, fuse_results, get_recovery_hint, get_token_budget,
    unified_search, ErrorClass, ErrorSignal, FusionOptions,
};

fn ranked(ids: &[i64]) -> Vec<(i64, f64)> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| (*id, 1.0 - i as f64 * 0.1))
        .collect()
}

#[test]
fn fusion_convergence_bonus() {
    // Vector [d1, d2, d3], FTS [d2, d1], k = 60: d1 and d2 converge and
    // both outrank d3.
    let vector = ranked(&[1, 2, 3]);
    let fts = ranked(&[2, 1]);

    let results = fuse_results(&vector, &fts, &FusionOptions::default());
    let pos = |id: i64| results.iter().position(|r| r.id == id).unwrap();

    assert!(pos(1) < pos(3));
    assert!(pos(2) < pos(3));

    let d1 = &results[pos(1)];
    let expected_d1 = 1.0 / 61.0 + 1.0 / 62.0 + 0.10;
    assert!((d1.rrf_score - expected_d1).abs() < 1e-9);
    assert_eq!(d1.source_count, 2);

    let d2 = &results[pos(2)];
    let expected_d2 = 1.0 / 62.0 + 1.0 / 61.0 + 0.10;
    assert!((d2.rrf_score - expected_d2).abs() < 1e-9);

    let d3 = &results[pos(3)];
    assert_eq!(d3.source_count, 1);
    assert!((d3.rrf_score - 1.0 / 63.0).abs() < 1e-9);
}

#[test]
fn single_source_bypasses_fusion() {
    let vector = ranked(&[42]);
    let result = unified_search(&vector, &[], &[], &FusionOptions::default());

    assert!(!result.metadata.fusion_applied);
    assert_eq!(result.results.len(), 1);
    assert_eq!(result.results[0].id, 42);
}

#[test]
fn disabled_fusion_prefers_vector_then_fts_then_graph() {
    let opts = FusionOptions {
        enabled: false,
        ..FusionOptions::default()
    };
    let picked = unified_search(&ranked(&[1]), &ranked(&[2]), &ranked(&[3]), &opts);
    assert_eq!(picked.results[0].id, 1);
    assert!(!picked.metadata.fusion_applied);
}

#[test]
fn layer_budgets_are_authoritative() {
    // Every tool answers with its owning layer's budget
    assert_eq!(get_token_budget("memory_context"), 2000);
    assert_eq!(get_token_budget("memory_search"), 1500);
    assert_eq!(get_token_budget("memory_save"), 1500);
    assert_eq!(get_token_budget("memory_list"), 800);
    assert_eq!(get_token_budget("memory_update"), 500);
    assert_eq!(get_token_budget("checkpoint_create"), 600);
    assert_eq!(get_token_budget("memory_drift_why"), 1200);
    assert_eq!(get_token_budget("memory_index_scan"), 1000);
    // Unknown tools get the default
    assert_eq!(get_token_budget("memory_telepathy"), 1000);
}

#[test]
fn retry_classification_boundaries() {
    let http = |status: u16| ErrorSignal {
        http_status: Some(status),
        ..ErrorSignal::default()
    };

    assert_eq!(classify_error(&http(401)).0, ErrorClass::Permanent);
    assert_eq!(classify_error(&http(503)).0, ErrorClass::Transient);
    assert_eq!(
        classify_error(&ErrorSignal {
            error_code: Some("ETIMEDOUT".to_string()),
            ..ErrorSignal::default()
        })
        .0,
        ErrorClass::Transient
    );
    assert_eq!(
        classify_error(&ErrorSignal::from_message("an inscrutable failure")).0,
        ErrorClass::Unknown
    );
}

#[test]
fn backoff_default_sequence() {
    let sequence: Vec<u64> = (0..3)
        .map(|k| calculate_backoff(k, 1000, 2.0, u64::MAX))
        .collect();
    assert_eq!(sequence, vec![1000, 2000, 4000]);
}

#[test]
fn unknown_error_code_gets_default_hint() {
    let hint = get_recovery_hint("memory_search", "E999");
    assert!(hint.actions.iter().any(|a| a.contains("memory_health()")));
}

#[test]
fn critical_db_hints_point_to_checkpoints() {
    for code in ["E020", "E022", "E023"] {
        let hint = get_recovery_hint("memory_save", code);
        assert!(
            hint.actions.iter().any(|a| a.contains("checkpoint_list()")),
            "{code} hint should reference checkpoint_list()"
        );
    }
}
