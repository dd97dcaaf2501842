//! Remote Embedding Clients
//!
//! HTTP clients for the Voyage and OpenAI embedding APIs, plus the on-host
//! Ollama server. All three return raw provider errors carrying HTTP status
//! and network codes; retry and fallback policy live in the chain, not here.

use serde::Deserialize;
use serde_json::json;

use super::provider::ProviderError;
use super::{normalize, ProviderProfile};

const REQUEST_TIMEOUT_SECS: u64 = 30;

fn http_client() -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| ProviderError::message(format!("http client build failed: {e}")))
}

async fn error_from_response(response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(300).collect();
    ProviderError::http(status, format!("provider returned {status}: {snippet}"))
}

fn check_dimensions(vector: &[f32], expected: usize) -> Result<(), ProviderError> {
    if vector.len() != expected {
        return Err(ProviderError::message(format!(
            "provider returned {} dimensions, expected {expected}",
            vector.len()
        )));
    }
    Ok(())
}

// ============================================================================
// VOYAGE
// ============================================================================

const VOYAGE_BASE_URL: &str = "https://api.voyageai.com/v1";
const VOYAGE_MODEL: &str = "voyage-3";
const VOYAGE_DIMENSIONS: usize = 1024;

#[derive(Debug, Deserialize)]
struct VoyageResponse {
    data: Vec<VoyageEmbedding>,
}

#[derive(Debug, Deserialize)]
struct VoyageEmbedding {
    embedding: Vec<f32>,
}

/// Voyage AI embeddings client
pub struct VoyageClient {
    api_key: String,
    base_url: String,
}

impl VoyageClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: VOYAGE_BASE_URL.to_string(),
        }
    }

    /// Override the endpoint (tests, proxies)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            name: "voyage".to_string(),
            model: VOYAGE_MODEL.to_string(),
            dim: VOYAGE_DIMENSIONS,
        }
    }

    /// `input_type` is "query" or "document"; Voyage embeds them differently
    pub async fn embed(&self, text: &str, input_type: &str) -> Result<Vec<f32>, ProviderError> {
        let response = http_client()?
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "input": [text],
                "model": VOYAGE_MODEL,
                "input_type": input_type,
            }))
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(&e))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let parsed: VoyageResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::message(format!("voyage response parse failed: {e}")))?;
        let mut vector = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ProviderError::message("voyage returned no embeddings"))?;

        check_dimensions(&vector, VOYAGE_DIMENSIONS)?;
        normalize(&mut vector);
        Ok(vector)
    }

    /// Minimal authenticated call for the credential pre-flight; returns the
    /// HTTP status without parsing the body.
    pub async fn probe(&self) -> Result<u16, ProviderError> {
        let response = http_client()?
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({"input": ["ping"], "model": VOYAGE_MODEL}))
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(&e))?;
        Ok(response.status().as_u16())
    }
}

// ============================================================================
// OPENAI
// ============================================================================

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_MODEL: &str = "text-embedding-3-small";
const OPENAI_DIMENSIONS: usize = 1536;

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbedding {
    embedding: Vec<f32>,
}

/// OpenAI embeddings client
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            name: "openai".to_string(),
            model: OPENAI_MODEL.to_string(),
            dim: OPENAI_DIMENSIONS,
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let response = http_client()?
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({"input": text, "model": OPENAI_MODEL}))
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(&e))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let parsed: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::message(format!("openai response parse failed: {e}")))?;
        let mut vector = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ProviderError::message("openai returned no embeddings"))?;

        check_dimensions(&vector, OPENAI_DIMENSIONS)?;
        normalize(&mut vector);
        Ok(vector)
    }

    pub async fn probe(&self) -> Result<u16, ProviderError> {
        let response = http_client()?
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({"input": "ping", "model": OPENAI_MODEL}))
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(&e))?;
        Ok(response.status().as_u16())
    }
}

// ============================================================================
// OLLAMA
// ============================================================================

const OLLAMA_BASE_URL: &str = "http://localhost:11434";
const OLLAMA_MODEL: &str = "nomic-embed-text";
const OLLAMA_DIMENSIONS: usize = 768;

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    embedding: Vec<f32>,
}

/// On-host Ollama embeddings client. Local: no API key, no credential probe.
pub struct OllamaClient {
    base_url: String,
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl OllamaClient {
    pub fn new() -> Self {
        let base_url = std::env::var("OLLAMA_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| OLLAMA_BASE_URL.to_string());
        Self { base_url }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            name: "ollama".to_string(),
            model: OLLAMA_MODEL.to_string(),
            dim: OLLAMA_DIMENSIONS,
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let response = http_client()?
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&json!({"model": OLLAMA_MODEL, "prompt": text}))
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(&e))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let parsed: OllamaResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::message(format!("ollama response parse failed: {e}")))?;
        let mut vector = parsed.embedding;

        check_dimensions(&vector, OLLAMA_DIMENSIONS)?;
        normalize(&mut vector);
        Ok(vector)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles() {
        let voyage = VoyageClient::new("key");
        assert_eq!(voyage.profile().name, "voyage");
        assert_eq!(voyage.profile().dim, 1024);

        let openai = OpenAiClient::new("key");
        assert_eq!(openai.profile().model, "text-embedding-3-small");
        assert_eq!(openai.profile().dim, 1536);

        let ollama = OllamaClient::new();
        assert_eq!(ollama.profile().name, "ollama");
        assert_eq!(ollama.profile().dim, 768);
    }

    #[test]
    fn test_dimension_check() {
        assert!(check_dimensions(&[0.0; 4], 4).is_ok());
        let err = check_dimensions(&[0.0; 3], 4).unwrap_err();
        assert!(err.message.contains("expected 4"));
    }
}
