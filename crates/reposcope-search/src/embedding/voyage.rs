//! Voyage AI embedding client.
//!
//! Uses `input_type: "document"` for indexing and `input_type: "query"` for
//! searching.

use reposcope_core::{EmbeddingConfig, ScopeError};
use serde::{Deserialize, Serialize};

use super::EmbeddingModel;

const DEFAULT_BASE_URL: &str = "https://api.voyageai.com/v1";
const BATCH_SIZE: usize = 64;
const BATCH_DELAY_MS: u64 = 200;

/// Client for the Voyage embeddings API.
///
/// # Examples
///
/// ```
/// use reposcope_search::embedding::VoyageEmbedder;
///
/// let client = VoyageEmbedder::new("test-key", "voyage-code-3", 1024);
/// assert_eq!(client.model(), "voyage-code-3");
/// ```
pub struct VoyageEmbedder {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimension: usize,
}

impl std::fmt::Debug for VoyageEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoyageEmbedder")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    input_type: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDataItem>,
}

#[derive(Deserialize)]
struct EmbedDataItem {
    embedding: Vec<f32>,
}

impl VoyageEmbedder {
    /// Create a client with an explicit key, model and dimension.
    pub fn new(api_key: &str, model: &str, dimension: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.to_string(),
            dimension,
        }
    }

    /// Create a client from an [`EmbeddingConfig`].
    ///
    /// Falls back to `VOYAGE_API_KEY` if no key is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::ModelUnavailable`] if no API key is available.
    pub fn with_config(config: &EmbeddingConfig) -> Result<Self, ScopeError> {
        let api_key = config.resolved_api_key().ok_or_else(|| {
            ScopeError::ModelUnavailable(
                "Voyage API key not found: set embedding.api_key in .reposcope.toml or VOYAGE_API_KEY".into(),
            )
        })?;
        Ok(Self::new(&api_key, config.model_name(), config.dimension()))
    }

    /// Point the client at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn request(&self, input: &[String], input_type: &str) -> Result<Vec<Vec<f32>>, ScopeError> {
        let request = EmbedRequest {
            model: &self.model,
            input,
            input_type,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| ScopeError::Embedding(format!("HTTP request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".into());
            return Err(ScopeError::Embedding(format!(
                "Voyage API returned {status}: {body}"
            )));
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| ScopeError::Embedding(format!("failed to parse response: {e}")))?;

        Ok(embed_response
            .data
            .into_iter()
            .map(|item| item.embedding)
            .collect())
    }
}

impl EmbeddingModel for VoyageEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    /// Splits into sub-batches of 64 with 200ms pauses for rate limiting.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ScopeError> {
        let mut all_embeddings = Vec::with_capacity(texts.len());
        for (i, batch) in texts.chunks(BATCH_SIZE).enumerate() {
            if i > 0 {
                tokio::time::sleep(tokio::time::Duration::from_millis(BATCH_DELAY_MS)).await;
            }
            all_embeddings.extend(self.request(batch, "document").await?);
        }
        Ok(all_embeddings)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ScopeError> {
        self.request(&[text.to_string()], "query")
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ScopeError::Embedding("empty response from Voyage API".into()))
    }
}
