//! FastEmbed embedding provider implementation.
//!
//! This module provides an implementation of the `EmbeddingProvider` trait
//! using the fastembed library, which runs the sentence-embedding model
//! locally. The default model is all-MiniLM-L6-v2 (384 dimensions).
//!
//! Loading the model is expensive, so long-lived processes go through
//! [`shared_model`]: the model is loaded on first use, exactly once, and
//! reused for the lifetime of the process.

use std::path::PathBuf;
use std::sync::Arc;

use super::{EmbeddingError, EmbeddingProvider, EmbeddingResult};
use crate::{DEFAULT_EMBEDDING_DIMENSION, DEFAULT_EMBEDDING_MODEL};
use async_trait::async_trait;
use ::fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

static SHARED_MODEL: OnceCell<FastEmbedProvider> = OnceCell::const_new();

/// FastEmbed embedding provider.
///
/// Holds a loaded model instance; cloning shares the same model.
#[derive(Clone)]
pub struct FastEmbedProvider {
    /// The embedding model instance (wrapped in Arc<Mutex> for thread-safety)
    model: Arc<Mutex<TextEmbedding>>,

    /// Model identifier
    model_name: String,

    /// Expected dimension of the embedding vectors
    embedding_dimension: usize,
}

impl FastEmbedProvider {
    /// Load a FastEmbed model.
    ///
    /// # Arguments
    /// * `model` - Optional model to use (defaults to AllMiniLML6V2)
    /// * `cache_dir` - Optional cache directory for model files
    ///
    /// # Errors
    /// Returns `EmbeddingError::Unavailable` if the model cannot be loaded
    pub fn new(model: Option<EmbeddingModel>, cache_dir: Option<PathBuf>) -> EmbeddingResult<Self> {
        let model_type = model.unwrap_or(EmbeddingModel::AllMiniLML6V2);
        let model_name = format!("{:?}", model_type);

        let embedding_dimension = match model_type {
            EmbeddingModel::AllMiniLML6V2 => 384,
            EmbeddingModel::BGESmallENV15 => 384,
            EmbeddingModel::BGEBaseENV15 => 768,
            EmbeddingModel::BGELargeENV15 => 1024,
            EmbeddingModel::ParaphraseMLMiniLML12V2 => 384,
            _ => DEFAULT_EMBEDDING_DIMENSION,
        };

        let mut init_options = InitOptions::new(model_type);
        if let Some(dir) = cache_dir {
            debug!("Using model cache directory: {}", dir.display());
            init_options = init_options.with_cache_dir(dir);
        }

        let text_embedding = TextEmbedding::try_new(init_options).map_err(|e| {
            EmbeddingError::Unavailable(format!("Failed to initialize FastEmbed model: {}", e))
        })?;

        Ok(Self {
            model: Arc::new(Mutex::new(text_embedding)),
            model_name,
            embedding_dimension,
        })
    }

    /// Run the model on the blocking pool so inference never stalls an
    /// async worker.
    async fn run_inference(&self, texts: Vec<String>) -> EmbeddingResult<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        tokio::task::spawn_blocking(move || {
            let mut model = model.blocking_lock();
            model
                .embed(texts, None)
                .map_err(|e| EmbeddingError::Unavailable(format!("Embedding generation failed: {}", e)))
        })
        .await
        .map_err(|e| EmbeddingError::Other(format!("embedding task failed: {}", e)))?
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("Text cannot be empty".to_string()));
        }

        let embeddings = self.run_inference(vec![text.to_string()]).await?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Other("No embedding generated".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        if texts.iter().any(|text| text.trim().is_empty()) {
            return Err(EmbeddingError::InvalidInput("All texts must be non-empty".to_string()));
        }

        let text_strings: Vec<String> = texts.iter().map(|&s| s.to_string()).collect();
        let embeddings = self.run_inference(text_strings).await?;

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::Other(format!(
                "Expected {} embeddings, model returned {}",
                texts.len(),
                embeddings.len()
            )));
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.embedding_dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

// TextEmbedding does not implement Debug
impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("model_name", &self.model_name)
            .field("embedding_dimension", &self.embedding_dimension)
            .finish()
    }
}

/// Default location for downloaded model files.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("fastembed"))
        .unwrap_or_else(|| PathBuf::from(".cache/fastembed"))
}

fn resolve_cache_dir(cache_dir: Option<PathBuf>) -> PathBuf {
    cache_dir.unwrap_or_else(default_cache_dir)
}

/// Process-wide default model, loaded on first call.
///
/// Concurrent first callers wait on a single load. A failed load is not
/// remembered, so a later call tries again. `cache_dir` only matters for the
/// call that actually performs the load; without one the model goes to
/// [`default_cache_dir`].
pub async fn shared_model(cache_dir: Option<PathBuf>) -> EmbeddingResult<&'static FastEmbedProvider> {
    SHARED_MODEL
        .get_or_try_init(|| async move {
            info!("Loading embedding model {}", DEFAULT_EMBEDDING_MODEL);
            let cache_dir = resolve_cache_dir(cache_dir);
            tokio::task::spawn_blocking(move || FastEmbedProvider::new(None, Some(cache_dir)))
                .await
                .map_err(|e| EmbeddingError::Unavailable(format!("model loading task failed: {}", e)))?
        })
        .await
}

/// Embedding provider backed by [`shared_model`].
///
/// Constructing it is free; the model is only loaded by the first
/// `embed`/`embed_batch` call.
#[derive(Debug, Clone, Default)]
pub struct LazyFastEmbed {
    cache_dir: Option<PathBuf>,
}

impl LazyFastEmbed {
    pub fn new(cache_dir: Option<PathBuf>) -> Self {
        Self { cache_dir }
    }
}

#[async_trait]
impl EmbeddingProvider for LazyFastEmbed {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        shared_model(self.cache_dir.clone()).await?.embed(text).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        shared_model(self.cache_dir.clone())
            .await?
            .embed_batch(texts)
            .await
    }

    fn dimension(&self) -> usize {
        DEFAULT_EMBEDDING_DIMENSION
    }

    fn model_name(&self) -> &str {
        DEFAULT_EMBEDDING_MODEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cache_dir_ends_with_fastembed() {
        assert!(default_cache_dir().ends_with("fastembed"));
    }

    #[test]
    fn test_cache_dir_falls_back_to_user_cache() {
        assert_eq!(resolve_cache_dir(None), default_cache_dir());
        if let Some(user_cache) = dirs::cache_dir() {
            assert!(resolve_cache_dir(None).starts_with(user_cache));
        }
        assert_eq!(
            resolve_cache_dir(Some(PathBuf::from("/tmp/models"))),
            PathBuf::from("/tmp/models")
        );
    }

    #[test]
    fn test_lazy_provider_reports_default_model_without_loading() {
        let provider = LazyFastEmbed::new(None);
        assert_eq!(provider.dimension(), 384);
        assert_eq!(provider.model_name(), "AllMiniLML6V2");
    }

    // The tests below download the model on first run.

    #[tokio::test]
    #[ignore = "downloads the embedding model"]
    async fn test_embed_single_text() {
        let provider = FastEmbedProvider::new(None, None).unwrap();
        let embedding = provider.embed("Information Retrieval").await.unwrap();

        assert_eq!(embedding.len(), provider.dimension());
        assert!(embedding.iter().all(|x| x.is_finite()));
    }

    #[tokio::test]
    #[ignore = "downloads the embedding model"]
    async fn test_embed_empty_text_is_rejected() {
        let provider = FastEmbedProvider::new(None, None).unwrap();
        assert!(matches!(
            provider.embed("   ").await,
            Err(EmbeddingError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    #[ignore = "downloads the embedding model"]
    async fn test_batch_matches_single_embed() {
        let provider = FastEmbedProvider::new(None, None).unwrap();
        let single = provider.embed("Arpit Rana").await.unwrap();
        let batch = provider
            .embed_batch(&["Arpit Rana", "VLSI design"])
            .await
            .unwrap();

        assert_eq!(batch.len(), 2);
        for (a, b) in single.iter().zip(batch[0].iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[tokio::test]
    #[ignore = "downloads the embedding model"]
    async fn test_shared_model_loads_once() {
        let first = shared_model(None).await.unwrap();
        let second = shared_model(None).await.unwrap();
        assert!(std::ptr::eq(first, second));
        assert!(SHARED_MODEL.initialized());
    }
}
