//! On-Device Embeddings
//!
//! The hf-local tier: fastembed ONNX inference, no network. Output is
//! Matryoshka-truncated to 256 dimensions and L2-normalized, so the first
//! N dimensions remain a valid N-dim representation.

use std::sync::{Mutex, OnceLock};

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use super::provider::ProviderError;
use super::ProviderProfile;

/// Dimensions after Matryoshka truncation (768 -> 256)
pub const LOCAL_EMBEDDING_DIMENSIONS: usize = 256;

/// Maximum text length; longer inputs are truncated
const MAX_TEXT_LENGTH: usize = 8192;

/// Batch size for embed_batch
const BATCH_SIZE: usize = 32;

const LOCAL_MODEL: &str = "nomic-ai/nomic-embed-text-v1.5";

// ============================================================================
// GLOBAL MODEL
// ============================================================================

static MODEL: OnceLock<Result<Mutex<TextEmbedding>, String>> = OnceLock::new();

fn cache_dir() -> std::path::PathBuf {
    if let Ok(path) = std::env::var("FASTEMBED_CACHE_PATH") {
        return std::path::PathBuf::from(path);
    }
    if let Some(proj_dirs) = directories::ProjectDirs::from("dev", "speckit", "memory") {
        return proj_dirs.cache_dir().join("fastembed");
    }
    std::path::PathBuf::from(".fastembed_cache")
}

fn model() -> Result<std::sync::MutexGuard<'static, TextEmbedding>, ProviderError> {
    let result = MODEL.get_or_init(|| {
        let cache = cache_dir();
        if let Err(e) = std::fs::create_dir_all(&cache) {
            tracing::warn!("failed to create model cache dir {:?}: {}", cache, e);
        }

        let options = InitOptions::new(EmbeddingModel::NomicEmbedTextV15)
            .with_show_download_progress(false)
            .with_cache_dir(cache);

        TextEmbedding::try_new(options)
            .map(Mutex::new)
            .map_err(|e| format!("local embedding model init failed: {e}"))
    });

    match result {
        Ok(model) => model
            .lock()
            .map_err(|_| ProviderError::message("local model lock poisoned")),
        Err(err) => Err(ProviderError::message(err.clone())),
    }
}

/// Truncate to the local dimension count and L2-normalize
fn matryoshka_truncate(mut vector: Vec<f32>) -> Vec<f32> {
    if vector.len() > LOCAL_EMBEDDING_DIMENSIONS {
        vector.truncate(LOCAL_EMBEDDING_DIMENSIONS);
    }
    super::normalize(&mut vector);
    vector
}

fn clip(text: &str) -> &str {
    if text.len() > MAX_TEXT_LENGTH {
        let mut end = MAX_TEXT_LENGTH;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        &text[..end]
    } else {
        text
    }
}

// ============================================================================
// EMBEDDER
// ============================================================================

/// Local embedding tier
pub struct LocalEmbedder {
    _unused: (),
}

impl Default for LocalEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalEmbedder {
    pub fn new() -> Self {
        Self { _unused: () }
    }

    pub fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            name: "hf-local".to_string(),
            model: LOCAL_MODEL.to_string(),
            dim: LOCAL_EMBEDDING_DIMENSIONS,
        }
    }

    /// Whether the model initialized (or can initialize) successfully
    pub fn is_ready(&self) -> bool {
        match model() {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("local embedding model not ready: {}", e);
                false
            }
        }
    }

    /// Force model initialization (downloads on first run)
    pub fn init(&self) -> Result<(), ProviderError> {
        model().map(|_| ())
    }

    pub fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        if text.is_empty() {
            return Err(ProviderError::message("local provider: text cannot be empty"));
        }

        let mut model = model()?;
        let embeddings = model
            .embed(vec![clip(text)], None)
            .map_err(|e| ProviderError::message(format!("local embedding failed: {e}")))?;

        embeddings
            .into_iter()
            .next()
            .map(matryoshka_truncate)
            .ok_or_else(|| ProviderError::message("local provider returned no embedding"))
    }

    pub fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let mut model = model()?;
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(BATCH_SIZE) {
            let clipped: Vec<&str> = chunk.iter().map(|t| clip(t)).collect();
            let embeddings = model
                .embed(clipped, None)
                .map_err(|e| ProviderError::message(format!("local batch embedding failed: {e}")))?;
            out.extend(embeddings.into_iter().map(matryoshka_truncate));
        }
        Ok(out)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matryoshka_truncate_normalizes() {
        let long: Vec<f32> = (0..768).map(|i| i as f32).collect();
        let truncated = matryoshka_truncate(long);
        assert_eq!(truncated.len(), LOCAL_EMBEDDING_DIMENSIONS);
        assert!(super::super::is_normalized(&truncated));
    }

    #[test]
    fn test_short_vectors_pass_through() {
        let short = vec![3.0, 4.0];
        let result = matryoshka_truncate(short);
        assert_eq!(result.len(), 2);
        assert!(super::super::is_normalized(&result));
    }

    #[test]
    fn test_clip_respects_char_boundaries() {
        let text = "é".repeat(MAX_TEXT_LENGTH);
        let clipped = clip(&text);
        assert!(clipped.len() <= MAX_TEXT_LENGTH);
        assert!(text.is_char_boundary(clipped.len()));
    }

    #[test]
    fn test_profile() {
        let embedder = LocalEmbedder::new();
        let profile = embedder.profile();
        assert_eq!(profile.name, "hf-local");
        assert_eq!(profile.dim, LOCAL_EMBEDDING_DIMENSIONS);
    }
}
