//! Semantic search over the indexed chunks of one or more repositories.
//!
//! The engine owns a read-mostly snapshot of every repository index. Queries
//! clone the snapshot `Arc` under a short read lock and rank without holding
//! any lock; indexing installs a new snapshot under the write lock, so a
//! query sees either the old set of indexes or the new one.

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};

use reposcope_core::{summarize, CodeChunk, EntityKind, Fingerprint, QueryResult, ScopeError};
use serde::{Deserialize, Serialize};

use crate::cache::IndexCache;
use crate::embedding::EmbeddingProvider;
use crate::index::{dot, IndexEntry, RepositoryIndex};

/// Lifecycle of a [`SemanticSearchEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// Nothing has been indexed yet; every query returns no results.
    Empty,
    /// At least one repository has been indexed.
    Indexed,
}

/// Identifies the repository whose chunks are being indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    /// Repository name, unique within an engine.
    pub id: String,
    /// Fingerprint of the current repository contents.
    pub fingerprint: Fingerprint,
}

/// Restricts which entries a query may return. Applied before ranking.
///
/// # Examples
///
/// ```
/// use reposcope_core::EntityKind;
/// use reposcope_search::SearchFilter;
///
/// let filter = SearchFilter::default()
///     .with_kinds([EntityKind::ApiEndpoint])
///     .with_repository("shop");
/// assert_eq!(filter.repository.as_deref(), Some("shop"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    /// Only entries of these kinds; `None` allows every kind.
    pub kinds: Option<BTreeSet<EntityKind>>,
    /// Only entries of this repository.
    pub repository: Option<String>,
}

impl SearchFilter {
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = EntityKind>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    fn allows_repository(&self, id: &str) -> bool {
        self.repository.as_deref().map_or(true, |r| r == id)
    }

    fn allows_chunk(&self, chunk: &CodeChunk) -> bool {
        self.kinds.as_ref().map_or(true, |k| k.contains(&chunk.kind))
    }
}

/// What an [`index`](SemanticSearchEngine::index) call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexOutcome {
    pub repository: String,
    /// Entries now searchable for the repository.
    pub entries: usize,
    /// Whether the entries came from the on-disk cache.
    pub from_cache: bool,
}

#[derive(Debug, Default, Clone)]
struct Snapshot {
    repositories: Vec<(String, Arc<RepositoryIndex>)>,
}

/// Embedding-backed code search.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use std::sync::Arc;
/// use reposcope_core::{CodeChunk, EmbeddingConfig, Fingerprint};
/// use reposcope_search::{EmbeddingProvider, RepositoryRef, SemanticSearchEngine};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let provider = EmbeddingProvider::new(EmbeddingConfig::default()).unwrap();
/// let engine = SemanticSearchEngine::new(Arc::new(provider), None, 200);
///
/// let chunk = CodeChunk::new(PathBuf::from("shop/auth.py"), 1, 2, "def login():\n    pass").unwrap();
/// let repo = RepositoryRef { id: "shop".into(), fingerprint: Fingerprint::new("ab").unwrap() };
/// engine.index(&repo, &[Arc::new(chunk)]).await.unwrap();
///
/// let results = engine.search("login", 5, None).await.unwrap();
/// assert_eq!(results[0].file, PathBuf::from("shop/auth.py"));
/// # });
/// ```
pub struct SemanticSearchEngine {
    provider: Arc<EmbeddingProvider>,
    cache: Option<IndexCache>,
    summary_chars: usize,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl std::fmt::Debug for SemanticSearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticSearchEngine")
            .field("provider", &self.provider)
            .field("cache", &self.cache)
            .field("repositories", &self.repositories())
            .finish_non_exhaustive()
    }
}

impl SemanticSearchEngine {
    /// Create an empty engine. `summary_chars` bounds result summaries.
    pub fn new(
        provider: Arc<EmbeddingProvider>,
        cache: Option<IndexCache>,
        summary_chars: usize,
    ) -> Self {
        Self {
            provider,
            cache,
            summary_chars,
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    pub fn provider(&self) -> &EmbeddingProvider {
        &self.provider
    }

    fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn state(&self) -> EngineState {
        if self.current().repositories.is_empty() {
            EngineState::Empty
        } else {
            EngineState::Indexed
        }
    }

    /// Total number of searchable entries.
    pub fn len(&self) -> usize {
        self.current()
            .repositories
            .iter()
            .map(|(_, index)| index.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indexed repository ids, in first-indexed order.
    pub fn repositories(&self) -> Vec<String> {
        self.current()
            .repositories
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Make `chunks` searchable as the contents of `repository`.
    ///
    /// A cached index for the same fingerprint and model is reused as is.
    /// Otherwise the chunks are embedded and the result is cached; a failed
    /// cache write is logged and does not fail indexing. Earlier entries of
    /// the same repository are replaced.
    ///
    /// # Errors
    ///
    /// Returns the embedding error if the chunks cannot be embedded.
    pub async fn index(
        &self,
        repository: &RepositoryRef,
        chunks: &[Arc<CodeChunk>],
    ) -> Result<IndexOutcome, ScopeError> {
        let model_id = self.provider.model_id();
        let dimensions = self.provider.dimension();

        if let Some(cached) = self
            .cache
            .as_ref()
            .and_then(|cache| cache.load(&repository.fingerprint))
        {
            if cached.is_compatible(model_id, dimensions) {
                let entries = cached.len();
                self.install(&repository.id, cached);
                tracing::info!(repository = %repository.id, entries, "loaded index from cache");
                return Ok(IndexOutcome {
                    repository: repository.id.clone(),
                    entries,
                    from_cache: true,
                });
            }
            tracing::debug!(
                repository = %repository.id,
                cached_model = %cached.model_id,
                model = model_id,
                "cached index was built by another model, rebuilding"
            );
        }

        let mut index = RepositoryIndex::new(repository.fingerprint.clone(), model_id, dimensions);
        index.entries = self.provider.embed_batch(chunks).await?;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.save(&index) {
                tracing::warn!(repository = %repository.id, error = %e, "failed to write index cache");
            }
        }

        let entries = index.len();
        self.install(&repository.id, index);
        tracing::info!(repository = %repository.id, entries, "indexed repository");
        Ok(IndexOutcome {
            repository: repository.id.clone(),
            entries,
            from_cache: false,
        })
    }

    fn install(&self, id: &str, index: RepositoryIndex) {
        let index = Arc::new(index);
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = Snapshot::clone(&guard);
        match next.repositories.iter_mut().find(|(existing, _)| existing == id) {
            Some(slot) => slot.1 = index,
            None => next.repositories.push((id.to_string(), index)),
        }
        *guard = Arc::new(next);
    }

    /// Rank indexed chunks against `query`.
    ///
    /// Returns at most `top_k` results by descending score; equal scores keep
    /// index order. An empty engine, a blank query, `top_k == 0` or a filter
    /// that matches nothing all give an empty result without embedding. A
    /// query made only of stopwords or punctuation gives an empty result too.
    ///
    /// # Errors
    ///
    /// Returns the embedding error if the query cannot be embedded.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<QueryResult>, ScopeError> {
        if top_k == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let snapshot = self.current();
        let default_filter = SearchFilter::default();
        let filter = filter.unwrap_or(&default_filter);
        let candidates = candidates(&snapshot, filter, None);
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.provider.embed(query).await?;
        // Nothing to rank by when the query has no usable tokens.
        if query_vector.iter().all(|x| *x == 0.0) {
            tracing::debug!(query, "query embeds to the zero vector");
            return Ok(Vec::new());
        }
        Ok(self.rank(candidates, &query_vector, top_k))
    }

    /// Chunks most similar to an already indexed `chunk`, excluding itself.
    ///
    /// The chunk is looked up by file and line range; an unknown chunk gives
    /// an empty result.
    pub fn find_similar(&self, chunk: &CodeChunk, top_k: usize) -> Vec<QueryResult> {
        if top_k == 0 {
            return Vec::new();
        }
        let snapshot = self.current();
        let Some(target) = snapshot
            .repositories
            .iter()
            .flat_map(|(_, index)| index.entries.iter())
            .find(|entry| same_span(&entry.chunk, chunk))
        else {
            return Vec::new();
        };
        let candidates = candidates(&snapshot, &SearchFilter::default(), Some(target));
        self.rank(candidates, &target.embedding, top_k)
    }

    fn rank(&self, candidates: Vec<&IndexEntry>, vector: &[f32], top_k: usize) -> Vec<QueryResult> {
        let mut scored: Vec<(f64, &IndexEntry)> = candidates
            .into_iter()
            .map(|entry| (dot(vector, &entry.embedding), entry))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(top_k);
        scored
            .into_iter()
            .map(|(score, entry)| QueryResult {
                file: entry.chunk.file.clone(),
                start_line: entry.chunk.start_line,
                end_line: entry.chunk.end_line,
                summary: summarize(&entry.chunk.content, self.summary_chars),
                score,
            })
            .collect()
    }
}

fn same_span(a: &CodeChunk, b: &CodeChunk) -> bool {
    a.file == b.file && a.start_line == b.start_line && a.end_line == b.end_line
}

fn candidates<'a>(
    snapshot: &'a Snapshot,
    filter: &SearchFilter,
    exclude: Option<&IndexEntry>,
) -> Vec<&'a IndexEntry> {
    snapshot
        .repositories
        .iter()
        .filter(|(id, _)| filter.allows_repository(id))
        .flat_map(|(_, index)| index.entries.iter())
        .filter(|entry| filter.allows_chunk(&entry.chunk))
        .filter(|entry| exclude.map_or(true, |ex| !std::ptr::eq(*entry, ex)))
        .collect()
}
