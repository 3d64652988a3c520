//! Local ONNX sentence-transformer models via `fastembed`.

use std::sync::Arc;

use fastembed::{EmbeddingModel as FastModel, InitOptions, TextEmbedding};
use reposcope_core::ScopeError;

use super::EmbeddingModel;

/// A loaded fastembed model.
pub struct FastEmbedder {
    model: Arc<TextEmbedding>,
    model_id: String,
    dimension: usize,
}

impl std::fmt::Debug for FastEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedder")
            .field("model_id", &self.model_id)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

impl FastEmbedder {
    /// Load `model_name`, downloading weights on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::ModelUnavailable`] for unknown model names or
    /// when the ONNX runtime or weights cannot be loaded.
    pub async fn load(model_name: &str) -> Result<Self, ScopeError> {
        let (variant, dimension) = match model_name {
            "all-MiniLM-L6-v2" => (FastModel::AllMiniLML6V2, 384),
            "bge-small-en-v1.5" => (FastModel::BGESmallENV15, 384),
            other => {
                return Err(ScopeError::ModelUnavailable(format!(
                    "unsupported fastembed model: {other}"
                )))
            }
        };

        tracing::info!(model = model_name, "loading local embedding model");
        let model = tokio::task::spawn_blocking(move || TextEmbedding::try_new(InitOptions::new(variant)))
            .await
            .map_err(|e| ScopeError::ModelUnavailable(format!("model loader panicked: {e}")))?
            .map_err(|e| ScopeError::ModelUnavailable(format!("failed to load {model_name}: {e}")))?;

        Ok(Self {
            model: Arc::new(model),
            model_id: model_name.to_string(),
            dimension,
        })
    }

    async fn run(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, ScopeError> {
        let model = Arc::clone(&self.model);
        tokio::task::spawn_blocking(move || model.embed(texts, None))
            .await
            .map_err(|e| ScopeError::Embedding(format!("embedding task failed: {e}")))?
            .map_err(|e| ScopeError::Embedding(format!("fastembed error: {e}")))
    }
}

impl EmbeddingModel for FastEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ScopeError> {
        self.run(texts.to_vec()).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ScopeError> {
        self.run(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ScopeError::Embedding("fastembed returned no vectors".into()))
    }
}
