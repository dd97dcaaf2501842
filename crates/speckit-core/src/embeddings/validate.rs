//! Credential Pre-Flight
//!
//! Probes the configured remote provider with a minimal authenticated call
//! before the engine starts embedding. Local providers pass without touching
//! the network, and the whole check can be bypassed by configuration.

use serde::Serialize;
use tokio::time::{timeout, Duration};

use super::remote::{OpenAiClient, VoyageClient};
use crate::config::{EngineConfig, ProviderKind};

// ============================================================================
// RESULT
// ============================================================================

/// Outcome of the pre-flight probe
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub valid: bool,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl ValidationResult {
    fn ok(provider: &str, reason: &str) -> Self {
        Self {
            valid: true,
            provider: provider.to_string(),
            reason: Some(reason.to_string()),
            error: None,
            error_code: None,
            http_status: None,
            warning: None,
        }
    }
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

/// Map a probe outcome to a validation verdict.
///
/// 200 valid; 401/403 invalid (E050); 429 valid but rate-limited (warning);
/// 5xx valid but service issue (warning); timeout E053.
pub fn classify_validation(
    provider: &str,
    http_status: Option<u16>,
    timed_out: bool,
) -> ValidationResult {
    if timed_out {
        return ValidationResult {
            valid: false,
            provider: provider.to_string(),
            reason: None,
            error: Some("credential probe timed out".to_string()),
            error_code: Some("E053"),
            http_status: None,
            warning: None,
        };
    }

    match http_status {
        Some(200) => ValidationResult {
            valid: true,
            provider: provider.to_string(),
            reason: Some("API key accepted".to_string()),
            error: None,
            error_code: None,
            http_status: Some(200),
            warning: None,
        },
        Some(status @ (401 | 403)) => ValidationResult {
            valid: false,
            provider: provider.to_string(),
            reason: None,
            error: Some(format!("provider rejected the API key ({status})")),
            error_code: Some("E050"),
            http_status: Some(status),
            warning: None,
        },
        Some(429) => ValidationResult {
            valid: true,
            provider: provider.to_string(),
            reason: Some("API key accepted".to_string()),
            error: None,
            error_code: None,
            http_status: Some(429),
            warning: Some("provider is rate limiting; embedding may be slow".to_string()),
        },
        Some(status) if (500..600).contains(&status) => ValidationResult {
            valid: true,
            provider: provider.to_string(),
            reason: Some("key could not be disproven".to_string()),
            error: None,
            error_code: None,
            http_status: Some(status),
            warning: Some(format!("provider reports a service issue ({status})")),
        },
        Some(status) => ValidationResult {
            valid: false,
            provider: provider.to_string(),
            reason: None,
            error: Some(format!("unexpected probe status {status}")),
            error_code: Some("E052"),
            http_status: Some(status),
            warning: None,
        },
        None => ValidationResult {
            valid: false,
            provider: provider.to_string(),
            reason: None,
            error: Some("probe failed before receiving a status".to_string()),
            error_code: Some("E052"),
            http_status: None,
            warning: None,
        },
    }
}

// ============================================================================
// PROBE
// ============================================================================

/// Validate the configured provider's credentials.
///
/// Local providers (hf-local, ollama) skip the network entirely, as does
/// `SPECKIT_SKIP_API_VALIDATION`.
pub async fn validate_api_key(config: &EngineConfig) -> ValidationResult {
    let provider = config.provider.as_str();

    if config.skip_api_validation {
        return ValidationResult::ok(provider, "Validation bypassed by configuration");
    }

    if config.provider.is_local() {
        return ValidationResult::ok(provider, "Local provider, no API key required");
    }

    let Some(api_key) = config.primary_api_key() else {
        return ValidationResult {
            valid: false,
            provider: provider.to_string(),
            reason: None,
            error: Some(format!("no API key configured for {provider}")),
            error_code: Some("E051"),
            http_status: None,
            warning: None,
        };
    };

    let probe_timeout = Duration::from_millis(config.validation_timeout_ms);
    let probe = async {
        match config.provider {
            ProviderKind::Voyage => VoyageClient::new(api_key).probe().await,
            ProviderKind::Openai => OpenAiClient::new(api_key).probe().await,
            ProviderKind::HfLocal | ProviderKind::Ollama => unreachable!("local handled above"),
        }
    };

    match timeout(probe_timeout, probe).await {
        Err(_) => classify_validation(provider, None, true),
        Ok(Ok(status)) => classify_validation(provider, Some(status), false),
        Ok(Err(e)) => {
            if e.error_code.as_deref() == Some("ETIMEDOUT") {
                classify_validation(provider, None, true)
            } else {
                classify_validation(provider, e.http_status, false)
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_200_is_valid() {
        let result = classify_validation("voyage", Some(200), false);
        assert!(result.valid);
        assert!(result.warning.is_none());
    }

    #[test]
    fn test_auth_failures_are_invalid_e050() {
        for status in [401, 403] {
            let result = classify_validation("voyage", Some(status), false);
            assert!(!result.valid);
            assert_eq!(result.error_code, Some("E050"));
            assert_eq!(result.http_status, Some(status));
        }
    }

    #[test]
    fn test_429_is_valid_with_warning() {
        let result = classify_validation("openai", Some(429), false);
        assert!(result.valid);
        assert!(result.warning.is_some());
    }

    #[test]
    fn test_5xx_is_valid_with_warning() {
        let result = classify_validation("voyage", Some(503), false);
        assert!(result.valid);
        assert!(result.warning.unwrap().contains("503"));
    }

    #[test]
    fn test_timeout_is_e053() {
        let result = classify_validation("voyage", None, true);
        assert!(!result.valid);
        assert_eq!(result.error_code, Some("E053"));
    }

    #[tokio::test]
    async fn test_local_provider_skips_network() {
        let config = EngineConfig {
            provider: ProviderKind::Ollama,
            ..EngineConfig::default()
        };
        let result = validate_api_key(&config).await;
        assert!(result.valid);
        assert_eq!(
            result.reason.as_deref(),
            Some("Local provider, no API key required")
        );
    }

    #[tokio::test]
    async fn test_skip_flag_bypasses() {
        let config = EngineConfig {
            provider: ProviderKind::Voyage,
            skip_api_validation: true,
            ..EngineConfig::default()
        };
        let result = validate_api_key(&config).await;
        assert!(result.valid);
    }

    #[tokio::test]
    async fn test_missing_key_is_e051() {
        let config = EngineConfig {
            provider: ProviderKind::Voyage,
            voyage_api_key: None,
            ..EngineConfig::default()
        };
        let result = validate_api_key(&config).await;
        assert!(!result.valid);
        assert_eq!(result.error_code, Some("E051"));
    }
}
