//! Local embedding generation via fastembed
//!
//! Uses the multilingual-e5-base model (768 dimensions), matching the
//! long-term-memory vector schema. Model auto-downloads on first use.

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Embedding width expected by the long-term-memory store
pub const EMBEDDING_DIMENSIONS: usize = 768;

/// Text-to-vector contract
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn dimensions(&self) -> usize {
        EMBEDDING_DIMENSIONS
    }
}

/// Local embedding service wrapping fastembed
#[derive(Clone)]
pub struct EmbeddingService {
    model: Arc<TextEmbedding>,
}

impl EmbeddingService {
    /// Create a new embedding service with multilingual-e5-base
    pub fn new() -> Result<Self> {
        let model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::MultilingualE5Base).with_show_download_progress(true),
        )
        .map_err(|e| Error::Internal(format!("Failed to init embedding model: {}", e)))?;

        Ok(EmbeddingService {
            model: Arc::new(model),
        })
    }
}

#[async_trait]
impl Embedder for EmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = self.model.clone();
        let text = text.to_string();

        tokio::task::spawn_blocking(move || {
            let embeddings = model
                .embed(vec![text], None)
                .map_err(|e| Error::Internal(format!("Embedding error: {}", e)))?;
            embeddings
                .into_iter()
                .next()
                .ok_or_else(|| Error::Internal("No embedding returned".into()))
        })
        .await
        .map_err(|e| Error::Internal(format!("Embedding task join error: {}", e)))?
    }
}
