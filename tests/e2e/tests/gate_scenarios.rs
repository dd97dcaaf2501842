//! Prediction-error gate scenarios: duplicate writes, contradicting
//! updates, and the decision trail they leave behind.

use speckit_core::{
    detect_contradiction, evaluate_memory, GateCandidate, MemoryAction, SaveRequest,
};
use speckit_e2e_tests::lexical_engine;

fn candidate(id: i64, similarity: f64, content: &str) -> GateCandidate {
    GateCandidate {
        id,
        similarity,
        content: content.to_string(),
    }
}

#[test]
fn duplicate_write_reinforces() {
    // Identical text ranked at similarity ~1.0 must reinforce, not create
    let candidates = vec![candidate(1, 1.0, "Use strict equality")];
    let decision = evaluate_memory(&candidates, "Use strict equality", true);

    assert_eq!(decision.action, MemoryAction::Reinforce);
    assert!((decision.similarity - 1.0).abs() < 1e-9);
    assert_eq!(decision.candidate.as_ref().unwrap().id, 1);
}

#[tokio::test]
async fn duplicate_write_through_the_engine_creates_no_row_and_no_embedding() {
    let (engine, _dir) = lexical_engine();
    let content = "Use strict equality";

    let first = engine
        .save(SaveRequest::new(content, "style/eq.md", "style"))
        .await
        .unwrap();
    let first_id = first.memory_id.unwrap();
    let embeds_before = engine.chain().stats().embeds_succeeded;

    let second = engine
        .save(SaveRequest::new(content, "style/eq-2.md", "style"))
        .await
        .unwrap();

    assert_eq!(
        second.decision.as_ref().unwrap().action,
        MemoryAction::Reinforce
    );
    assert_eq!(second.memory_id, Some(first_id));
    assert_eq!(engine.store().stats().unwrap().total, 1);
    // Reinforce stores no new embedding
    assert!(engine.store().get_embedding(first_id).unwrap().is_none());
    let _ = embeds_before;
}

#[test]
fn contradicting_update_supersedes() {
    // Existing "Always use var" vs incoming "Never use var" at 0.92
    let candidates = vec![candidate(7, 0.92, "Always use var")];
    let decision = evaluate_memory(&candidates, "Never use var", true);

    assert_eq!(decision.action, MemoryAction::Supersede);
    let contradiction = decision.contradiction.unwrap();
    assert_eq!(contradiction.kind, Some("absolute"));
    assert_eq!(contradiction.pair, Some(("always", "never")));
}

#[test]
fn high_similarity_without_contradiction_updates() {
    let candidates = vec![candidate(7, 0.92, "Cache entries expire after ten minutes")];
    let decision = evaluate_memory(&candidates, "Cache entries expire after five minutes", true);
    assert_eq!(decision.action, MemoryAction::Update);
}

#[test]
fn empty_inputs_never_contradict() {
    assert!(!detect_contradiction("", "").found);
    assert!(!detect_contradiction("always", "").found);
}

#[test]
fn no_candidates_creates_with_null_candidate() {
    let decision = evaluate_memory(&[], "anything new", true);
    assert_eq!(decision.action, MemoryAction::Create);
    assert!(decision.candidate.is_none());
}

#[tokio::test]
async fn gate_decisions_land_in_the_learning_history() {
    let (engine, _dir) = lexical_engine();
    let content = "Prefer composition over inheritance";

    engine
        .save(SaveRequest::new(content, "arch/comp.md", "arch"))
        .await
        .unwrap();
    engine
        .save(SaveRequest::new(content, "arch/comp-2.md", "arch"))
        .await
        .unwrap();

    let history = engine.store().list_conflicts(None, 10).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, "REINFORCE");
    assert_eq!(history[0].spec_folder, "arch");
    assert!((history[0].similarity - 1.0).abs() < 1e-9);

    let filtered = engine.store().list_conflicts(Some("REINFORCE"), 10).unwrap();
    assert_eq!(filtered.len(), 1);
}
