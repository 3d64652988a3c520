use std::path::PathBuf;

/// Errors that can occur across reposcope.
///
/// Each variant wraps a specific error domain. Library crates use this type
/// directly; the binary reports it through `miette` at the boundary.
///
/// # Examples
///
/// ```
/// use reposcope_core::ScopeError;
///
/// let err = ScopeError::Config("missing API key".into());
/// assert!(err.to_string().contains("missing API key"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ScopeError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    #[diagnostic(code(reposcope::io))]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(code(reposcope::config))]
    Config(String),

    /// Source code parsing failure.
    #[error("parse error: {0}")]
    #[diagnostic(code(reposcope::parse))]
    Parse(String),

    /// Embedding API or response error.
    #[error("embedding error: {0}")]
    #[diagnostic(code(reposcope::embedding))]
    Embedding(String),

    /// The embedding model could not be loaded.
    ///
    /// Callers treat this as "semantic search unavailable" rather than a
    /// fatal error.
    #[error("embedding model unavailable: {0}")]
    #[diagnostic(
        code(reposcope::model_unavailable),
        help("use `provider = \"hash\"` for offline embeddings, or build with `--features fastembed`")
    )]
    ModelUnavailable(String),

    /// An embedding call did not finish in time.
    #[error("embedding request timed out after {0}s")]
    #[diagnostic(code(reposcope::embedding_timeout), help("the request can be retried"))]
    EmbeddingTimeout(u64),

    /// Empty or whitespace-only text was passed to the embedder.
    #[error("cannot embed empty text")]
    #[diagnostic(code(reposcope::empty_input))]
    EmptyInput,

    /// A vector does not have the dimensionality of the index it belongs to.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    #[diagnostic(code(reposcope::dimension_mismatch))]
    DimensionMismatch { expected: usize, actual: usize },

    /// Index cache failure.
    #[error("cache error: {0}")]
    #[diagnostic(code(reposcope::cache))]
    Cache(String),

    /// Semantic search was disabled for this session.
    #[error("semantic search is disabled")]
    #[diagnostic(
        code(reposcope::semantic_disabled),
        help("the embedding model failed to load or --no-semantic was given")
    )]
    SemanticSearchDisabled,

    /// No repository with this name has been added.
    #[error("unknown repository: {0}")]
    #[diagnostic(code(reposcope::unknown_repository))]
    UnknownRepository(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    #[diagnostic(code(reposcope::serialization))]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    #[diagnostic(code(reposcope::toml))]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    #[diagnostic(code(reposcope::file_not_found))]
    FileNotFound(PathBuf),
}

impl ScopeError {
    /// Whether the failed operation may succeed if attempted again.
    ///
    /// # Examples
    ///
    /// ```
    /// use reposcope_core::ScopeError;
    ///
    /// assert!(ScopeError::EmbeddingTimeout(30).is_retryable());
    /// assert!(!ScopeError::EmptyInput.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, ScopeError::EmbeddingTimeout(_))
    }

    /// Whether this error means semantic search cannot work in this session.
    pub fn disables_semantic_search(&self) -> bool {
        matches!(
            self,
            ScopeError::ModelUnavailable(_) | ScopeError::SemanticSearchDisabled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ScopeError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn config_error_displays_message() {
        let err = ScopeError::Config("bad value".into());
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn file_not_found_shows_path() {
        let err = ScopeError::FileNotFound(PathBuf::from("/tmp/missing.rs"));
        assert!(err.to_string().contains("/tmp/missing.rs"));
    }

    #[test]
    fn dimension_mismatch_shows_both_sizes() {
        let err = ScopeError::DimensionMismatch {
            expected: 384,
            actual: 1024,
        };
        assert_eq!(err.to_string(), "dimension mismatch: expected 384, got 1024");
    }

    #[test]
    fn only_timeouts_are_retryable() {
        assert!(ScopeError::EmbeddingTimeout(5).is_retryable());
        assert!(!ScopeError::ModelUnavailable("x".into()).is_retryable());
        assert!(!ScopeError::Embedding("x".into()).is_retryable());
    }

    #[test]
    fn model_unavailable_disables_semantic_search() {
        assert!(ScopeError::ModelUnavailable("no onnx".into()).disables_semantic_search());
        assert!(ScopeError::SemanticSearchDisabled.disables_semantic_search());
        assert!(!ScopeError::EmbeddingTimeout(5).disables_semantic_search());
    }
}
