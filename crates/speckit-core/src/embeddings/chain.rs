//! Fallback Chain
//!
//! Strict tier order: primary (configured provider) -> local (when enabled)
//! -> lexical-only sentinel. Every fallback is classified into a closed
//! reason set and appended to a bounded log. Initialization never throws;
//! it degrades.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::{timeout, Duration};

use super::provider::{EmbeddingProvider, ProviderError};
use super::remote::{OllamaClient, OpenAiClient, VoyageClient};
use super::ProviderProfile;
use crate::config::{EngineConfig, ProviderKind};
use crate::errors::{ErrorCode, MemoryError, Result};
use crate::retry::{retry_with_backoff, RetryOptions};

/// Bounded fallback-log capacity
const FALLBACK_LOG_CAP: usize = 100;

// ============================================================================
// TIERS AND REASONS
// ============================================================================

/// Which tier of the chain is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTier {
    Primary,
    Secondary,
    Tertiary,
}

impl ProviderTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderTier::Primary => "primary",
            ProviderTier::Secondary => "secondary",
            ProviderTier::Tertiary => "tertiary",
        }
    }
}

/// Closed reason set for fallback events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    ApiKeyInvalid,
    ApiRateLimited,
    ApiTimeout,
    ApiUnavailable,
    NetworkError,
    LocalError,
    ApiError,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::ApiKeyInvalid => "api_key_invalid",
            FallbackReason::ApiRateLimited => "api_rate_limited",
            FallbackReason::ApiTimeout => "api_timeout",
            FallbackReason::ApiUnavailable => "api_unavailable",
            FallbackReason::NetworkError => "network_error",
            FallbackReason::LocalError => "local_error",
            FallbackReason::ApiError => "api_error",
        }
    }
}

const NETWORK_CODES: &[&str] = &[
    "ECONNREFUSED",
    "ECONNRESET",
    "ENOTFOUND",
    "ENETUNREACH",
    "EHOSTUNREACH",
];

/// Classify a provider failure into the closed reason set
pub fn classify_fallback_reason(provider_is_local: bool, err: &ProviderError) -> FallbackReason {
    let message = err.message.to_lowercase();

    if matches!(err.http_status, Some(401 | 403))
        || message.contains("api key")
        || message.contains("authentication")
    {
        return FallbackReason::ApiKeyInvalid;
    }
    if err.http_status == Some(429) || message.contains("rate limit") {
        return FallbackReason::ApiRateLimited;
    }
    if err
        .error_code
        .as_deref()
        .map(|c| matches!(c.to_uppercase().as_str(), "ETIMEDOUT" | "TIMEOUT"))
        .unwrap_or(false)
        || message.contains("timeout")
    {
        return FallbackReason::ApiTimeout;
    }
    if matches!(err.http_status, Some(s) if (500..600).contains(&s)) {
        return FallbackReason::ApiUnavailable;
    }
    if err
        .error_code
        .as_deref()
        .map(|c| NETWORK_CODES.contains(&c.to_uppercase().as_str()))
        .unwrap_or(false)
    {
        return FallbackReason::NetworkError;
    }
    if provider_is_local && message.contains("local") {
        return FallbackReason::LocalError;
    }
    FallbackReason::ApiError
}

/// One fallback event
#[derive(Debug, Clone, Serialize)]
pub struct FallbackEvent {
    pub timestamp: DateTime<Utc>,
    /// Tier that failed
    pub tier: ProviderTier,
    pub provider: String,
    pub reason: FallbackReason,
    pub error_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

/// Chain-level counters
#[derive(Debug, Default, Serialize)]
pub struct ChainStats {
    pub embeds_succeeded: u64,
    pub embeds_failed: u64,
    pub fallbacks: u64,
}

// ============================================================================
// CHAIN
// ============================================================================

struct ActiveProvider {
    provider: EmbeddingProvider,
    tier: ProviderTier,
}

/// The embedding provider chain
pub struct ProviderChain {
    config: EngineConfig,
    active: RwLock<ActiveProvider>,
    fallback_log: Mutex<Vec<FallbackEvent>>,
    embeds_succeeded: AtomicU64,
    embeds_failed: AtomicU64,
    fallbacks: AtomicU64,
}

impl ProviderChain {
    /// Build the chain with the configured primary, unprobed.
    /// Call `initialize` to verify tiers; embed calls degrade on their own
    /// either way.
    pub fn new(config: EngineConfig) -> Self {
        let provider = Self::build_primary(&config);
        // A missing API key degrades to the sentinel before the first call
        let tier = if matches!(provider, EmbeddingProvider::Lexical) {
            ProviderTier::Tertiary
        } else {
            ProviderTier::Primary
        };
        Self {
            config,
            active: RwLock::new(ActiveProvider { provider, tier }),
            fallback_log: Mutex::new(Vec::new()),
            embeds_succeeded: AtomicU64::new(0),
            embeds_failed: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
        }
    }

    /// Build a chain pinned to a specific provider and tier
    pub fn with_provider(
        config: EngineConfig,
        provider: EmbeddingProvider,
        tier: ProviderTier,
    ) -> Self {
        Self {
            config,
            active: RwLock::new(ActiveProvider { provider, tier }),
            fallback_log: Mutex::new(Vec::new()),
            embeds_succeeded: AtomicU64::new(0),
            embeds_failed: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
        }
    }

    fn build_primary(config: &EngineConfig) -> EmbeddingProvider {
        match config.provider {
            ProviderKind::Voyage => match &config.voyage_api_key {
                Some(key) => EmbeddingProvider::Voyage(VoyageClient::new(key)),
                None => EmbeddingProvider::Lexical,
            },
            ProviderKind::Openai => match &config.openai_api_key {
                Some(key) => EmbeddingProvider::OpenAi(OpenAiClient::new(key)),
                None => EmbeddingProvider::Lexical,
            },
            ProviderKind::Ollama => EmbeddingProvider::Ollama(OllamaClient::new()),
            ProviderKind::HfLocal => Self::build_local().unwrap_or(EmbeddingProvider::Lexical),
        }
    }

    #[cfg(feature = "local-embeddings")]
    fn build_local() -> Option<EmbeddingProvider> {
        Some(EmbeddingProvider::HfLocal(super::local::LocalEmbedder::new()))
    }

    #[cfg(not(feature = "local-embeddings"))]
    fn build_local() -> Option<EmbeddingProvider> {
        None
    }

    // ========================================================================
    // Initialization
    // ========================================================================

    /// Probe the active tier and degrade until a working one is found.
    /// Never returns an error; the tertiary sentinel always succeeds.
    pub async fn initialize(&self) {
        let tier_timeout = Duration::from_millis(self.config.fallback_timeout_ms);

        loop {
            let (tier, name) = {
                let guard = self.active.read().await;
                (guard.tier, guard.provider.name())
            };
            if tier == ProviderTier::Tertiary {
                tracing::warn!("embedding chain degraded to lexical-only mode");
                return;
            }

            let probe_result = {
                let guard = self.active.read().await;
                match timeout(tier_timeout, Self::probe(&guard.provider)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::coded(
                        "ETIMEDOUT",
                        format!("{name} initialization exceeded the tier timeout"),
                    )),
                }
            };

            match probe_result {
                Ok(()) => {
                    tracing::info!(provider = name, tier = tier.as_str(), "embedding provider ready");
                    return;
                }
                Err(err) => {
                    self.record_and_demote(err).await;
                }
            }
        }
    }

    async fn probe(provider: &EmbeddingProvider) -> std::result::Result<(), ProviderError> {
        match provider {
            EmbeddingProvider::Voyage(c) => {
                let status = c.probe().await?;
                if (200..300).contains(&status) {
                    Ok(())
                } else {
                    Err(ProviderError::http(status, format!("probe returned {status}")))
                }
            }
            EmbeddingProvider::OpenAi(c) => {
                let status = c.probe().await?;
                if (200..300).contains(&status) {
                    Ok(())
                } else {
                    Err(ProviderError::http(status, format!("probe returned {status}")))
                }
            }
            EmbeddingProvider::Ollama(c) => c.embed("ping").await.map(|_| ()),
            #[cfg(feature = "local-embeddings")]
            EmbeddingProvider::HfLocal(c) => c.init(),
            EmbeddingProvider::Lexical => Ok(()),
        }
    }

    /// Record the failure of the current tier and switch to the next one.
    /// Public so callers that detect a dead primary out-of-band can force
    /// the degradation.
    pub async fn fail_over_from_primary(&self, err: ProviderError) {
        self.record_and_demote(err).await;
    }

    async fn record_and_demote(&self, err: ProviderError) {
        let mut guard = self.active.write().await;
        let failed_tier = guard.tier;
        let failed_name = guard.provider.name().to_string();
        let reason = classify_fallback_reason(guard.provider.is_local(), &err);

        let event = FallbackEvent {
            timestamp: Utc::now(),
            tier: failed_tier,
            provider: failed_name.clone(),
            reason,
            error_message: err.message.clone(),
            error_code: err.error_code.clone(),
        };
        {
            let mut log = self.fallback_log.lock().expect("fallback log lock");
            log.push(event);
            let overflow = log.len().saturating_sub(FALLBACK_LOG_CAP);
            if overflow > 0 {
                log.drain(..overflow);
            }
        }
        self.fallbacks.fetch_add(1, Ordering::Relaxed);

        tracing::warn!(
            provider = %failed_name,
            tier = failed_tier.as_str(),
            reason = reason.as_str(),
            "embedding provider failed, falling back"
        );

        match failed_tier {
            ProviderTier::Primary => {
                if self.config.enable_local_fallback {
                    match Self::build_local() {
                        Some(local) => {
                            guard.provider = local;
                            guard.tier = ProviderTier::Secondary;
                        }
                        None => {
                            guard.provider = EmbeddingProvider::Lexical;
                            guard.tier = ProviderTier::Tertiary;
                        }
                    }
                } else {
                    guard.provider = EmbeddingProvider::Lexical;
                    guard.tier = ProviderTier::Tertiary;
                }
            }
            ProviderTier::Secondary | ProviderTier::Tertiary => {
                guard.provider = EmbeddingProvider::Lexical;
                guard.tier = ProviderTier::Tertiary;
            }
        }
    }

    // ========================================================================
    // Embedding
    // ========================================================================

    async fn try_active(
        &self,
        text: &str,
        query_side: bool,
    ) -> std::result::Result<Option<Vec<f32>>, ProviderError> {
        let guard = self.active.read().await;
        let provider = &guard.provider;
        let result = retry_with_backoff(
            || async move {
                if query_side {
                    provider.embed_query(text).await
                } else {
                    provider.embed(text).await
                }
            },
            RetryOptions::named("embed").with_max_delay_ms(8_000),
        )
        .await;
        result.map_err(|retry_err| retry_err.error)
    }

    async fn embed_inner(&self, text: &str, query_side: bool) -> Result<Option<Vec<f32>>> {
        if text.trim().is_empty() {
            return Err(MemoryError::new(
                ErrorCode::EmptyQuery,
                "cannot embed empty text",
            ));
        }

        loop {
            match self.try_active(text, query_side).await {
                Ok(vector) => {
                    self.embeds_succeeded.fetch_add(1, Ordering::Relaxed);
                    return Ok(vector);
                }
                Err(err) => {
                    self.embeds_failed.fetch_add(1, Ordering::Relaxed);
                    let at_bottom = {
                        let guard = self.active.read().await;
                        guard.tier == ProviderTier::Tertiary
                    };
                    if at_bottom {
                        return Ok(None);
                    }
                    self.record_and_demote(err).await;
                }
            }
        }
    }

    /// Embed a document; `None` means lexical-only
    pub async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>> {
        self.embed_inner(text, false).await
    }

    /// Query-side embedding
    pub async fn embed_query(&self, text: &str) -> Result<Option<Vec<f32>>> {
        self.embed_inner(text, true).await
    }

    /// Document-side embedding; same as `embed`
    pub async fn embed_document(&self, text: &str) -> Result<Option<Vec<f32>>> {
        self.embed_inner(text, false).await
    }

    /// Embed many texts; one entry per input, in order
    pub async fn batch_embed(&self, texts: &[&str]) -> Result<Vec<Option<Vec<f32>>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    pub async fn profile(&self) -> ProviderProfile {
        self.active.read().await.provider.profile()
    }

    pub async fn active_tier(&self) -> ProviderTier {
        self.active.read().await.tier
    }

    pub async fn active_provider_name(&self) -> &'static str {
        self.active.read().await.provider.name()
    }

    pub async fn is_ready(&self) -> bool {
        self.active.read().await.provider.is_ready()
    }

    /// True when the chain has degraded to keyword-only retrieval
    pub async fn is_bm25_only(&self) -> bool {
        self.active.read().await.tier == ProviderTier::Tertiary
    }

    /// Ordered copy of the fallback log
    pub fn fallback_log(&self) -> Vec<FallbackEvent> {
        self.fallback_log.lock().expect("fallback log lock").clone()
    }

    pub fn stats(&self) -> ChainStats {
        ChainStats {
            embeds_succeeded: self.embeds_succeeded.load(Ordering::Relaxed),
            embeds_failed: self.embeds_failed.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn voyage_config() -> EngineConfig {
        EngineConfig {
            provider: ProviderKind::Voyage,
            voyage_api_key: Some("test-key".to_string()),
            enable_local_fallback: true,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_reason_classification() {
        let local = false;
        assert_eq!(
            classify_fallback_reason(local, &ProviderError::http(401, "unauthorized")),
            FallbackReason::ApiKeyInvalid
        );
        assert_eq!(
            classify_fallback_reason(local, &ProviderError::message("bad api key supplied")),
            FallbackReason::ApiKeyInvalid
        );
        assert_eq!(
            classify_fallback_reason(local, &ProviderError::http(429, "slow down")),
            FallbackReason::ApiRateLimited
        );
        assert_eq!(
            classify_fallback_reason(local, &ProviderError::coded("ETIMEDOUT", "deadline")),
            FallbackReason::ApiTimeout
        );
        assert_eq!(
            classify_fallback_reason(local, &ProviderError::message("request timeout")),
            FallbackReason::ApiTimeout
        );
        assert_eq!(
            classify_fallback_reason(local, &ProviderError::http(503, "unavailable")),
            FallbackReason::ApiUnavailable
        );
        assert_eq!(
            classify_fallback_reason(local, &ProviderError::coded("ECONNREFUSED", "refused")),
            FallbackReason::NetworkError
        );
        assert_eq!(
            classify_fallback_reason(true, &ProviderError::message("local model missing")),
            FallbackReason::LocalError
        );
        assert_eq!(
            classify_fallback_reason(local, &ProviderError::message("odd failure")),
            FallbackReason::ApiError
        );
    }

    #[tokio::test]
    async fn test_primary_outage_falls_back_to_local() {
        let chain = ProviderChain::new(voyage_config());
        assert_eq!(chain.active_tier().await, ProviderTier::Primary);

        chain
            .fail_over_from_primary(ProviderError::http(503, "service unavailable"))
            .await;

        assert_eq!(chain.active_tier().await, ProviderTier::Secondary);
        assert_eq!(chain.active_provider_name().await, "hf-local");

        let log = chain.fallback_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].reason, FallbackReason::ApiUnavailable);
        assert_eq!(log[0].tier, ProviderTier::Primary);
        assert_eq!(log[0].provider, "voyage");
    }

    #[tokio::test]
    async fn test_local_fallback_disabled_goes_straight_to_lexical() {
        let config = EngineConfig {
            enable_local_fallback: false,
            ..voyage_config()
        };
        let chain = ProviderChain::new(config);

        chain
            .fail_over_from_primary(ProviderError::http(500, "boom"))
            .await;

        assert_eq!(chain.active_tier().await, ProviderTier::Tertiary);
        assert!(chain.is_bm25_only().await);
    }

    #[tokio::test]
    async fn test_secondary_failure_reaches_tertiary() {
        let chain = ProviderChain::new(voyage_config());
        chain
            .fail_over_from_primary(ProviderError::http(503, "down"))
            .await;
        chain
            .fail_over_from_primary(ProviderError::message("local model corrupt"))
            .await;

        assert_eq!(chain.active_tier().await, ProviderTier::Tertiary);
        let log = chain.fallback_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].reason, FallbackReason::LocalError);
    }

    #[tokio::test]
    async fn test_tertiary_embeds_to_none() {
        let chain = ProviderChain::with_provider(
            EngineConfig::default(),
            EmbeddingProvider::Lexical,
            ProviderTier::Tertiary,
        );

        assert!(chain.is_bm25_only().await);
        assert_eq!(chain.embed("some text").await.unwrap(), None);
        assert_eq!(chain.embed_query("some text").await.unwrap(), None);

        let batch = chain.batch_embed(&["a", "b", "c"]).await.unwrap();
        assert_eq!(batch, vec![None, None, None]);

        let profile = chain.profile().await;
        assert_eq!(profile.name, "lexical");
    }

    #[tokio::test]
    async fn test_empty_text_is_rejected() {
        let chain = ProviderChain::with_provider(
            EngineConfig::default(),
            EmbeddingProvider::Lexical,
            ProviderTier::Tertiary,
        );
        let err = chain.embed("   ").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::EmptyQuery);
    }

    #[tokio::test]
    async fn test_fallback_log_is_bounded() {
        let chain = ProviderChain::new(voyage_config());
        for _ in 0..(FALLBACK_LOG_CAP + 20) {
            chain
                .fail_over_from_primary(ProviderError::http(503, "down"))
                .await;
        }
        assert_eq!(chain.fallback_log().len(), FALLBACK_LOG_CAP);
    }

    #[tokio::test]
    async fn test_initialize_with_lexical_sentinel() {
        let chain = ProviderChain::with_provider(
            EngineConfig::default(),
            EmbeddingProvider::Lexical,
            ProviderTier::Tertiary,
        );
        chain.initialize().await;
        assert_eq!(chain.active_tier().await, ProviderTier::Tertiary);
    }
}
