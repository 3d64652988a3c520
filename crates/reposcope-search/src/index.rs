//! In-memory index records shared by the cache and the search engine.

use std::sync::Arc;

use reposcope_core::{CodeChunk, Fingerprint};

/// A chunk paired with its unit-length embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub chunk: Arc<CodeChunk>,
    pub embedding: Vec<f32>,
}

/// The embedded chunks of one repository at one fingerprint.
///
/// # Examples
///
/// ```
/// use reposcope_core::Fingerprint;
/// use reposcope_search::RepositoryIndex;
///
/// let index = RepositoryIndex::new(Fingerprint::new("ab12").unwrap(), "hash:feature-hash-v1", 384);
/// assert!(index.is_empty());
/// assert!(index.is_compatible("hash:feature-hash-v1", 384));
/// assert!(!index.is_compatible("voyage:voyage-code-3", 1024));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryIndex {
    /// Fingerprint of the repository contents this index was built from.
    pub fingerprint: Fingerprint,
    /// Embedding model that produced the vectors.
    pub model_id: String,
    /// Length of every vector in `entries`.
    pub dimensions: usize,
    /// Entries in chunk order.
    pub entries: Vec<IndexEntry>,
}

impl RepositoryIndex {
    pub fn new(fingerprint: Fingerprint, model_id: impl Into<String>, dimensions: usize) -> Self {
        Self {
            fingerprint,
            model_id: model_id.into(),
            dimensions,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether vectors in this index can be compared with vectors from `model_id`.
    pub fn is_compatible(&self, model_id: &str, dimensions: usize) -> bool {
        self.model_id == model_id && self.dimensions == dimensions
    }
}

/// Dot product accumulated in `f64`. For unit vectors this is the cosine
/// similarity; mismatched lengths score 0.0.
pub(crate) fn dot(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter()
        .zip(b)
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum()
}
