use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ScopeError;

/// Top-level configuration loaded from `.reposcope.toml`.
///
/// Supports layered resolution: CLI flags > env vars > local config > defaults.
///
/// # Examples
///
/// ```
/// use reposcope_core::ScopeConfig;
///
/// let config = ScopeConfig::default();
/// assert_eq!(config.search.default_top_k, 10);
/// assert_eq!(config.embedding.provider, "hash");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScopeConfig {
    /// Embedding provider settings for semantic search.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Index cache location.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Query defaults.
    #[serde(default)]
    pub search: SearchConfig,
    /// Repository walking and chunking.
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl ScopeConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::Io`] if the file cannot be read, or
    /// [`ScopeError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use reposcope_core::ScopeConfig;
    /// use std::path::Path;
    ///
    /// let config = ScopeConfig::from_file(Path::new(".reposcope.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, ScopeError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use reposcope_core::ScopeConfig;
    ///
    /// let toml = r#"
    /// [search]
    /// default_top_k = 3
    /// "#;
    /// let config = ScopeConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.search.default_top_k, 3);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, ScopeError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }
}

/// Configuration for the embedding model used by semantic search.
///
/// # Examples
///
/// ```
/// use reposcope_core::EmbeddingConfig;
///
/// let config = EmbeddingConfig::default();
/// assert_eq!(config.provider, "hash");
/// assert_eq!(config.model_name(), "feature-hash-v1");
/// assert_eq!(config.dimension(), 384);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: `"hash"`, `"voyage"` or `"fastembed"` (default: `"hash"`).
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    /// Model name; each provider has its own default.
    pub model: Option<String>,
    /// API key for remote providers. Falls back to `VOYAGE_API_KEY`.
    pub api_key: Option<String>,
    /// Embedding dimensions; each provider has its own default.
    pub dimensions: Option<usize>,
    /// Number of texts per embedding request (default: 64).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Upper bound on a single embedding call, in seconds (default: 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_embedding_provider() -> String {
    "hash".into()
}

fn default_batch_size() -> usize {
    64
}

fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    /// The configured model, or the provider's default model.
    pub fn model_name(&self) -> &str {
        if let Some(model) = &self.model {
            return model;
        }
        match self.provider.as_str() {
            "voyage" => "voyage-code-3",
            "fastembed" => "all-MiniLM-L6-v2",
            _ => "feature-hash-v1",
        }
    }

    /// The configured dimensions, or the provider model's native size.
    pub fn dimension(&self) -> usize {
        self.dimensions.unwrap_or(match self.provider.as_str() {
            "voyage" => 1024,
            _ => 384,
        })
    }

    /// The API key from the config file or the environment.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("VOYAGE_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            api_key: None,
            dimensions: None,
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Where computed indexes are persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether indexes are read from and written to disk (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cache directory (default: `.reposcope/cache`).
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
}

fn default_true() -> bool {
    true
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".reposcope/cache")
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_cache_dir(),
        }
    }
}

/// Query defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Results returned when no `--top-k` is given (default: 10).
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    /// Characters of chunk content kept in a result summary (default: 200).
    #[serde(default = "default_summary_chars")]
    pub summary_chars: usize,
}

fn default_top_k() -> usize {
    10
}

fn default_summary_chars() -> usize {
    200
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            summary_chars: default_summary_chars(),
        }
    }
}

/// Repository walking and chunking configuration.
///
/// # Examples
///
/// ```
/// use reposcope_core::AnalysisConfig;
///
/// let config = AnalysisConfig::default();
/// assert_eq!(config.max_file_size, 1_048_576);
/// assert!(config.exclude.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Files larger than this many bytes are skipped (default: 1 MiB).
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Glob patterns of paths that are never analyzed.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Lines covered by the whole-file chunk of a file without entities (default: 60).
    #[serde(default = "default_fallback_chunk_lines")]
    pub fallback_chunk_lines: usize,
}

fn default_max_file_size() -> u64 {
    1_048_576
}

fn default_fallback_chunk_lines() -> usize {
    60
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            exclude: Vec::new(),
            fallback_chunk_lines: default_fallback_chunk_lines(),
        }
    }
}
