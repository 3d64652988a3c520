//! Embedding provider: turns text and code chunks into unit vectors.
//!
//! The concrete model is chosen from [`EmbeddingConfig::provider`] and loaded
//! lazily on first use. Every vector handed out by [`EmbeddingProvider`] is
//! L2-normalized, so the dot product of two of them is their cosine
//! similarity.

#[cfg(feature = "fastembed")]
mod fastembed;
mod hash;
mod voyage;

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reposcope_core::{CodeChunk, EmbeddingConfig, ScopeError};
use tokio::sync::OnceCell;

use crate::index::IndexEntry;

#[cfg(feature = "fastembed")]
pub use self::fastembed::FastEmbedder;
pub use hash::{HashEmbedder, HASH_MODEL};
pub use voyage::VoyageEmbedder;

/// Provider names accepted in `embedding.provider`.
pub const PROVIDERS: &[&str] = &["hash", "voyage", "fastembed"];

/// A model that maps text to fixed-size vectors.
///
/// Implementations return raw vectors; normalization and validation happen
/// in [`EmbeddingProvider`].
pub trait EmbeddingModel: Send + Sync {
    /// Model identifier, e.g. `"voyage-code-3"`.
    fn model_id(&self) -> &str;

    /// Length of every vector this model produces.
    fn dimension(&self) -> usize;

    /// Embed document texts, one vector per input in input order.
    fn embed_documents(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, ScopeError>> + Send;

    /// Embed a search query.
    fn embed_query(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, ScopeError>> + Send;
}

/// Generates a match over all `AnyEmbedder` variants, binding the inner model
/// and evaluating the given expression for each arm.
macro_rules! delegate_embedder {
    ($self:expr, |$m:ident| $expr:expr) => {
        match $self {
            AnyEmbedder::Hash($m) => $expr,
            AnyEmbedder::Voyage($m) => $expr,
            #[cfg(feature = "fastembed")]
            AnyEmbedder::FastEmbed($m) => $expr,
        }
    };
}

/// Every model this build knows about.
#[derive(Debug)]
pub enum AnyEmbedder {
    Hash(HashEmbedder),
    Voyage(VoyageEmbedder),
    #[cfg(feature = "fastembed")]
    FastEmbed(FastEmbedder),
}

impl AnyEmbedder {
    /// The `embedding.provider` name of this model.
    pub fn provider(&self) -> &'static str {
        match self {
            AnyEmbedder::Hash(_) => "hash",
            AnyEmbedder::Voyage(_) => "voyage",
            #[cfg(feature = "fastembed")]
            AnyEmbedder::FastEmbed(_) => "fastembed",
        }
    }
}

impl EmbeddingModel for AnyEmbedder {
    fn model_id(&self) -> &str {
        delegate_embedder!(self, |m| m.model_id())
    }

    fn dimension(&self) -> usize {
        delegate_embedder!(self, |m| m.dimension())
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ScopeError> {
        delegate_embedder!(self, |m| m.embed_documents(texts).await)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ScopeError> {
        delegate_embedder!(self, |m| m.embed_query(text).await)
    }
}

/// Load the model described by `config`.
///
/// # Errors
///
/// Returns [`ScopeError::ModelUnavailable`] if the model cannot be loaded:
/// no API key for Voyage, a build without the `fastembed` feature, missing
/// weights, an unknown model name, or a model whose native size differs from
/// `embedding.dimensions`.
pub async fn load_model(config: &EmbeddingConfig) -> Result<AnyEmbedder, ScopeError> {
    let model = match config.provider.as_str() {
        "hash" => {
            if config.model_name() != HASH_MODEL {
                return Err(ScopeError::ModelUnavailable(format!(
                    "unsupported hash model: {} (expected {HASH_MODEL})",
                    config.model_name()
                )));
            }
            AnyEmbedder::Hash(HashEmbedder::new(config.dimension()))
        }
        "voyage" => AnyEmbedder::Voyage(VoyageEmbedder::with_config(config)?),
        #[cfg(feature = "fastembed")]
        "fastembed" => AnyEmbedder::FastEmbed(FastEmbedder::load(config.model_name()).await?),
        #[cfg(not(feature = "fastembed"))]
        "fastembed" => {
            return Err(ScopeError::ModelUnavailable(
                "this build does not include local models; rebuild with `--features fastembed`"
                    .into(),
            ))
        }
        other => {
            return Err(ScopeError::Config(format!(
                "unknown embedding provider: {other}"
            )))
        }
    };

    if model.dimension() != config.dimension() {
        return Err(ScopeError::ModelUnavailable(format!(
            "{} produces {}-dimensional vectors but embedding.dimensions is {}",
            model.model_id(),
            model.dimension(),
            config.dimension()
        )));
    }
    Ok(model)
}

/// Lazily loaded, normalized embeddings.
///
/// Concurrent first callers wait on a single load. A failed load is
/// remembered, so later calls fail fast with the same
/// [`ScopeError::ModelUnavailable`].
///
/// # Examples
///
/// ```
/// use reposcope_core::EmbeddingConfig;
/// use reposcope_search::EmbeddingProvider;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let provider = EmbeddingProvider::new(EmbeddingConfig::default()).unwrap();
/// let v = provider.embed("parse the config file").await.unwrap();
/// let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
/// assert!((norm - 1.0).abs() < 1e-5);
/// # });
/// ```
pub struct EmbeddingProvider {
    config: EmbeddingConfig,
    model_id: String,
    dimension: usize,
    timeout: Duration,
    model: OnceCell<Result<Arc<AnyEmbedder>, String>>,
    loads: AtomicUsize,
}

impl std::fmt::Debug for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingProvider")
            .field("model_id", &self.model_id)
            .field("dimension", &self.dimension)
            .field("loaded", &self.model.initialized())
            .finish_non_exhaustive()
    }
}

impl EmbeddingProvider {
    /// Create a provider for `config`. Does not load the model.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::Config`] for an unknown provider name or a zero
    /// dimension.
    pub fn new(config: EmbeddingConfig) -> Result<Self, ScopeError> {
        if !PROVIDERS.contains(&config.provider.as_str()) {
            return Err(ScopeError::Config(format!(
                "unknown embedding provider '{}', expected one of: {}",
                config.provider,
                PROVIDERS.join(", ")
            )));
        }
        if config.dimension() == 0 {
            return Err(ScopeError::Config(
                "embedding.dimensions must be greater than 0".into(),
            ));
        }
        Ok(Self {
            model_id: format!("{}:{}", config.provider, config.model_name()),
            dimension: config.dimension(),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            model: OnceCell::new(),
            loads: AtomicUsize::new(0),
            config,
        })
    }

    /// Wrap an already-loaded model.
    pub fn from_model(model: AnyEmbedder, config: EmbeddingConfig) -> Self {
        Self {
            model_id: format!("{}:{}", model.provider(), model.model_id()),
            dimension: model.dimension(),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            model: OnceCell::from(Ok(Arc::new(model))),
            loads: AtomicUsize::new(0),
            config,
        }
    }

    /// Override the per-call time limit.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Identifier stored alongside cached indexes, e.g. `"hash:feature-hash-v1"`.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Vector length.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// How many times a model load has been attempted.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Load the model now instead of on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::ModelUnavailable`] if loading fails, now or on
    /// any earlier attempt.
    pub async fn ensure_loaded(&self) -> Result<(), ScopeError> {
        self.model().await.map(|_| ())
    }

    async fn model(&self) -> Result<Arc<AnyEmbedder>, ScopeError> {
        self.model_from(load_model(&self.config)).await
    }

    /// Initialize the model cell from `load`, bounded by the call timeout.
    async fn model_from(
        &self,
        load: impl Future<Output = Result<AnyEmbedder, ScopeError>>,
    ) -> Result<Arc<AnyEmbedder>, ScopeError> {
        let slot = self
            .model
            .get_or_init(|| async move {
                self.loads.fetch_add(1, Ordering::SeqCst);
                match self.bounded(load).await {
                    Ok(model) => {
                        tracing::debug!(model = %self.model_id, "embedding model loaded");
                        Ok(Arc::new(model))
                    }
                    Err(e) => {
                        tracing::warn!(model = %self.model_id, error = %e, "embedding model failed to load");
                        Err(e.to_string())
                    }
                }
            })
            .await;
        slot.clone().map_err(ScopeError::ModelUnavailable)
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, ScopeError>>,
    ) -> Result<T, ScopeError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| ScopeError::EmbeddingTimeout(self.timeout.as_secs()))?
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), ScopeError> {
        if vector.len() != self.dimension {
            return Err(ScopeError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Embed a single query text.
    ///
    /// # Errors
    ///
    /// - [`ScopeError::EmptyInput`] if `text` is blank
    /// - [`ScopeError::ModelUnavailable`] if the model cannot be loaded
    /// - [`ScopeError::EmbeddingTimeout`] if the call exceeds the time limit
    /// - [`ScopeError::DimensionMismatch`] if the model returns a wrongly sized vector
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, ScopeError> {
        if text.trim().is_empty() {
            return Err(ScopeError::EmptyInput);
        }
        let model = self.model().await?;
        let vector = self.bounded(model.embed_query(text)).await?;
        self.check_dimension(&vector)?;
        Ok(l2_normalize(vector))
    }

    /// Embed chunks, pairing each with its vector.
    ///
    /// Chunks with blank content are skipped. Texts are sent in sub-batches
    /// of `embedding.batch_size`.
    ///
    /// # Errors
    ///
    /// As [`embed`](Self::embed), plus [`ScopeError::Embedding`] if the model
    /// returns the wrong number of vectors.
    pub async fn embed_batch(&self, chunks: &[Arc<CodeChunk>]) -> Result<Vec<IndexEntry>, ScopeError> {
        let live: Vec<&Arc<CodeChunk>> = chunks
            .iter()
            .filter(|chunk| {
                let blank = chunk.is_blank();
                if blank {
                    tracing::debug!(
                        file = %chunk.file.display(),
                        line = chunk.start_line,
                        "skipping blank chunk"
                    );
                }
                !blank
            })
            .collect();
        if live.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.model().await?;
        let mut entries = Vec::with_capacity(live.len());
        for batch in live.chunks(self.config.batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|c| c.embedding_text()).collect();
            let vectors = self.bounded(model.embed_documents(&texts)).await?;
            if vectors.len() != batch.len() {
                return Err(ScopeError::Embedding(format!(
                    "expected {} vectors, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }
            for (chunk, vector) in batch.iter().zip(vectors) {
                self.check_dimension(&vector)?;
                entries.push(IndexEntry {
                    chunk: Arc::clone(chunk),
                    embedding: l2_normalize(vector),
                });
            }
        }
        tracing::debug!(chunks = entries.len(), model = %self.model_id, "embedded chunks");
        Ok(entries)
    }
}

/// Scale `vector` to unit length. The zero vector is returned unchanged.
pub fn l2_normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector
        .iter()
        .map(|v| f64::from(*v) * f64::from(*v))
        .sum::<f64>()
        .sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v = (f64::from(*v) / norm) as f32;
        }
    }
    vector
}
