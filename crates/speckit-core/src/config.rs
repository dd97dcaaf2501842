//! Engine Configuration
//!
//! All recognized options come from the environment with sensible defaults.
//! Unknown variables are ignored; invalid values fall back to the default
//! with a warning rather than failing startup.

use serde::{Deserialize, Serialize};

// ============================================================================
// PROVIDER SELECTION
// ============================================================================

/// Which embedding provider serves as the primary tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// Voyage AI remote API
    Voyage,
    /// OpenAI remote API
    Openai,
    /// On-device ONNX inference (no network)
    HfLocal,
    /// On-host inference server (local HTTP)
    Ollama,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Voyage => "voyage",
            ProviderKind::Openai => "openai",
            ProviderKind::HfLocal => "hf-local",
            ProviderKind::Ollama => "ollama",
        }
    }

    /// Local providers skip network credential validation
    pub fn is_local(&self) -> bool {
        matches!(self, ProviderKind::HfLocal | ProviderKind::Ollama)
    }

    fn parse(s: &str) -> Option<ProviderKind> {
        match s.trim().to_lowercase().as_str() {
            "voyage" => Some(ProviderKind::Voyage),
            "openai" => Some(ProviderKind::Openai),
            "hf-local" | "hf_local" | "local" => Some(ProviderKind::HfLocal),
            "ollama" => Some(ProviderKind::Ollama),
            _ => None,
        }
    }
}

// ============================================================================
// ENGINE CONFIG
// ============================================================================

/// Runtime configuration resolved from the environment
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Primary embedding provider (EMBEDDINGS_PROVIDER)
    pub provider: ProviderKind,
    /// Voyage API key (VOYAGE_API_KEY)
    pub voyage_api_key: Option<String>,
    /// OpenAI API key (OPENAI_API_KEY)
    pub openai_api_key: Option<String>,
    /// Whether the local secondary tier is consulted (ENABLE_LOCAL_FALLBACK)
    pub enable_local_fallback: bool,
    /// Credential pre-flight probe timeout in ms (VALIDATION_TIMEOUT_MS)
    pub validation_timeout_ms: u64,
    /// Per-tier initialization timeout in ms
    pub fallback_timeout_ms: u64,
    /// Background archival scan period in ms (ARCHIVAL_SCAN_INTERVAL_MS)
    pub archival_scan_interval_ms: u64,
    /// Days of inactivity before a memory becomes an archival candidate
    pub archival_days_threshold: i64,
    /// Feature flag for reciprocal rank fusion (ENABLE_RRF_FUSION)
    pub enable_rrf_fusion: bool,
    /// Bypass the credential pre-flight entirely (SPECKIT_SKIP_API_VALIDATION)
    pub skip_api_validation: bool,
    /// Idle timeout before a session is reaped, in minutes
    pub session_idle_minutes: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::HfLocal,
            voyage_api_key: None,
            openai_api_key: None,
            enable_local_fallback: true,
            validation_timeout_ms: 5_000,
            fallback_timeout_ms: 5_000,
            archival_scan_interval_ms: 3_600_000,
            archival_days_threshold: 90,
            enable_rrf_fusion: true,
            skip_api_validation: false,
            session_idle_minutes: 30,
        }
    }
}

impl EngineConfig {
    /// Resolve configuration from the environment
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let provider = std::env::var("EMBEDDINGS_PROVIDER")
            .ok()
            .and_then(|v| {
                let parsed = ProviderKind::parse(&v);
                if parsed.is_none() {
                    tracing::warn!("Unrecognized EMBEDDINGS_PROVIDER '{}', using hf-local", v);
                }
                parsed
            })
            .unwrap_or(defaults.provider);

        Self {
            provider,
            voyage_api_key: env_nonempty("VOYAGE_API_KEY"),
            openai_api_key: env_nonempty("OPENAI_API_KEY"),
            enable_local_fallback: env_bool("ENABLE_LOCAL_FALLBACK", defaults.enable_local_fallback),
            validation_timeout_ms: env_u64("VALIDATION_TIMEOUT_MS", defaults.validation_timeout_ms),
            fallback_timeout_ms: env_u64("FALLBACK_TIMEOUT_MS", defaults.fallback_timeout_ms),
            archival_scan_interval_ms: env_u64(
                "ARCHIVAL_SCAN_INTERVAL_MS",
                defaults.archival_scan_interval_ms,
            ),
            archival_days_threshold: env_u64("ARCHIVAL_DAYS_THRESHOLD", 90) as i64,
            enable_rrf_fusion: env_bool("ENABLE_RRF_FUSION", defaults.enable_rrf_fusion),
            skip_api_validation: env_bool("SPECKIT_SKIP_API_VALIDATION", false),
            session_idle_minutes: env_u64("SESSION_IDLE_MINUTES", 30) as i64,
        }
    }

    /// The API key for the configured primary provider, if it needs one
    pub fn primary_api_key(&self) -> Option<&str> {
        match self.provider {
            ProviderKind::Voyage => self.voyage_api_key.as_deref(),
            ProviderKind::Openai => self.openai_api_key.as_deref(),
            ProviderKind::HfLocal | ProviderKind::Ollama => None,
        }
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.provider, ProviderKind::HfLocal);
        assert!(cfg.enable_local_fallback);
        assert_eq!(cfg.validation_timeout_ms, 5_000);
        assert_eq!(cfg.archival_scan_interval_ms, 3_600_000);
        assert_eq!(cfg.archival_days_threshold, 90);
        assert!(cfg.enable_rrf_fusion);
        assert!(!cfg.skip_api_validation);
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(ProviderKind::parse("voyage"), Some(ProviderKind::Voyage));
        assert_eq!(ProviderKind::parse("OpenAI"), Some(ProviderKind::Openai));
        assert_eq!(ProviderKind::parse("hf-local"), Some(ProviderKind::HfLocal));
        assert_eq!(ProviderKind::parse("ollama"), Some(ProviderKind::Ollama));
        assert_eq!(ProviderKind::parse("bedrock"), None);
    }

    #[test]
    fn test_local_providers_skip_validation() {
        assert!(ProviderKind::HfLocal.is_local());
        assert!(ProviderKind::Ollama.is_local());
        assert!(!ProviderKind::Voyage.is_local());
        assert!(!ProviderKind::Openai.is_local());
    }

    #[test]
    fn test_primary_api_key_selection() {
        let cfg = EngineConfig {
            provider: ProviderKind::Voyage,
            voyage_api_key: Some("vk".into()),
            openai_api_key: Some("ok".into()),
            ..EngineConfig::default()
        };
        assert_eq!(cfg.primary_api_key(), Some("vk"));

        let cfg = EngineConfig {
            provider: ProviderKind::Ollama,
            ..cfg
        };
        assert_eq!(cfg.primary_api_key(), None);
    }
}
