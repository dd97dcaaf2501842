//! Shared harness for the end-to-end scenario tests.

use std::sync::Arc;

use speckit_core::embeddings::{EmbeddingProvider, ProviderTier};
use speckit_core::{EngineConfig, MemoryEngine, ProviderChain};
use tempfile::TempDir;

/// Engine pinned to the lexical sentinel: deterministic, no network, no
/// model downloads. Scenarios that need vectors drive the components
/// directly instead.
pub fn lexical_engine() -> (Arc<MemoryEngine>, TempDir) {
    let dir = TempDir::new().expect("temp dir");
    let config = EngineConfig::default();
    let chain = Arc::new(ProviderChain::with_provider(
        config.clone(),
        EmbeddingProvider::Lexical,
        ProviderTier::Tertiary,
    ));
    let engine = MemoryEngine::with_chain(config, Some(dir.path().join("e2e.db")), chain)
        .expect("engine");
    (Arc::new(engine), dir)
}

/// A chain configured with a voyage primary and local fallback enabled,
/// never actually probed over the network.
pub fn voyage_chain() -> ProviderChain {
    let config = EngineConfig {
        provider: speckit_core::ProviderKind::Voyage,
        voyage_api_key: Some("test-key".to_string()),
        enable_local_fallback: true,
        ..EngineConfig::default()
    };
    ProviderChain::new(config)
}
