//! Provider Dispatch
//!
//! The provider set is a closed enumeration, not an open plug-in registry:
//! two remote APIs, an on-host HTTP server, an on-device model, and the
//! lexical sentinel. Every variant satisfies the same narrow surface; the
//! sentinel answers `None` from every embed call.

use serde::Serialize;

use super::remote::{OllamaClient, OpenAiClient, VoyageClient};
use super::ProviderProfile;
use crate::retry::{ErrorSignal, RetrySignal};

#[cfg(feature = "local-embeddings")]
use super::local::LocalEmbedder;

// ============================================================================
// PROVIDER ERROR
// ============================================================================

/// Error from one provider call, carrying enough signal for both retry
/// classification and fallback-reason classification.
#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct ProviderError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    /// Platform-style code (ETIMEDOUT, ECONNREFUSED, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub message: String,
}

impl ProviderError {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            http_status: None,
            error_code: None,
            message: message.into(),
        }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            http_status: Some(status),
            error_code: None,
            message: message.into(),
        }
    }

    pub fn coded(code: &str, message: impl Into<String>) -> Self {
        Self {
            http_status: None,
            error_code: Some(code.to_string()),
            message: message.into(),
        }
    }

    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            Some("ETIMEDOUT".to_string())
        } else if err.is_connect() {
            Some("ECONNREFUSED".to_string())
        } else {
            None
        };
        Self {
            http_status: err.status().map(|s| s.as_u16()),
            error_code: code,
            message: err.to_string(),
        }
    }
}

impl RetrySignal for ProviderError {
    fn signal(&self) -> ErrorSignal {
        ErrorSignal {
            http_status: self.http_status,
            error_code: self.error_code.clone(),
            message: self.message.clone(),
        }
    }
}

// ============================================================================
// PROVIDER ENUM
// ============================================================================

/// One concrete embedding provider
pub enum EmbeddingProvider {
    Voyage(VoyageClient),
    OpenAi(OpenAiClient),
    Ollama(OllamaClient),
    #[cfg(feature = "local-embeddings")]
    HfLocal(LocalEmbedder),
    /// Sentinel: no vectors, lexical-only retrieval
    Lexical,
}

impl EmbeddingProvider {
    /// Provider name as it appears in profiles and the fallback log
    pub fn name(&self) -> &'static str {
        match self {
            EmbeddingProvider::Voyage(_) => "voyage",
            EmbeddingProvider::OpenAi(_) => "openai",
            EmbeddingProvider::Ollama(_) => "ollama",
            #[cfg(feature = "local-embeddings")]
            EmbeddingProvider::HfLocal(_) => "hf-local",
            EmbeddingProvider::Lexical => "lexical",
        }
    }

    /// Local providers never hit the network for credential validation
    pub fn is_local(&self) -> bool {
        match self {
            EmbeddingProvider::Voyage(_) | EmbeddingProvider::OpenAi(_) => false,
            _ => true,
        }
    }

    pub fn profile(&self) -> ProviderProfile {
        match self {
            EmbeddingProvider::Voyage(c) => c.profile(),
            EmbeddingProvider::OpenAi(c) => c.profile(),
            EmbeddingProvider::Ollama(c) => c.profile(),
            #[cfg(feature = "local-embeddings")]
            EmbeddingProvider::HfLocal(c) => c.profile(),
            EmbeddingProvider::Lexical => ProviderProfile {
                name: "lexical".to_string(),
                model: "bm25-only".to_string(),
                dim: 0,
            },
        }
    }

    /// Embed one text; `Ok(None)` means "no vector available"
    pub async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, ProviderError> {
        match self {
            EmbeddingProvider::Voyage(c) => c.embed(text, "document").await.map(Some),
            EmbeddingProvider::OpenAi(c) => c.embed(text).await.map(Some),
            EmbeddingProvider::Ollama(c) => c.embed(text).await.map(Some),
            #[cfg(feature = "local-embeddings")]
            EmbeddingProvider::HfLocal(c) => c.embed(text).map(Some),
            EmbeddingProvider::Lexical => Ok(None),
        }
    }

    /// Query-side embedding for providers that distinguish query/document
    pub async fn embed_query(&self, text: &str) -> Result<Option<Vec<f32>>, ProviderError> {
        match self {
            EmbeddingProvider::Voyage(c) => c.embed(text, "query").await.map(Some),
            _ => self.embed(text).await,
        }
    }

    /// Document-side embedding; defaults to `embed`
    pub async fn embed_document(&self, text: &str) -> Result<Option<Vec<f32>>, ProviderError> {
        self.embed(text).await
    }

    /// Embed a batch, one result per input
    pub async fn batch_embed(
        &self,
        texts: &[&str],
    ) -> Result<Vec<Option<Vec<f32>>>, ProviderError> {
        match self {
            EmbeddingProvider::Lexical => Ok(texts.iter().map(|_| None).collect()),
            #[cfg(feature = "local-embeddings")]
            EmbeddingProvider::HfLocal(c) => {
                Ok(c.embed_batch(texts)?.into_iter().map(Some).collect())
            }
            _ => {
                let mut out = Vec::with_capacity(texts.len());
                for text in texts {
                    out.push(self.embed(text).await?);
                }
                Ok(out)
            }
        }
    }

    /// Cheap readiness check; remote providers are assumed ready once built
    pub fn is_ready(&self) -> bool {
        match self {
            #[cfg(feature = "local-embeddings")]
            EmbeddingProvider::HfLocal(c) => c.is_ready(),
            _ => true,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
