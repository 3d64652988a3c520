//! Embeddings, the on-disk index cache, and semantic search.
//!
//! - [`embedding`]: pluggable embedding models behind a lazily loaded
//!   [`EmbeddingProvider`]
//! - [`cache`]: one SQLite file per repository fingerprint
//! - [`engine`]: cosine-similarity ranking over every indexed repository

pub mod cache;
pub mod embedding;
pub mod engine;
pub mod index;

pub use cache::IndexCache;
pub use embedding::{EmbeddingModel, EmbeddingProvider};
pub use engine::{EngineState, IndexOutcome, RepositoryRef, SearchFilter, SemanticSearchEngine};
pub use index::{IndexEntry, RepositoryIndex};
