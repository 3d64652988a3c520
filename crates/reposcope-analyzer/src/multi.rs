//! Analysis and search across several repositories.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use reposcope_core::{CodeChunk, CodeEntity, EntityKind, QueryResult, ScopeConfig, ScopeError};
use reposcope_lang::{
    detect_languages, fingerprint_repo, read_source, walk_repo, Analyzer, AnalyzerRegistry,
    Language, SourceFile, WalkOptions,
};
use reposcope_nlq::{Answer, NlqEngine};
use reposcope_search::{
    EmbeddingProvider, IndexCache, IndexOutcome, RepositoryRef, SearchFilter, SemanticSearchEngine,
};

use crate::cache::AnalysisCache;
use crate::chunks::{build_chunks, fallback_chunk};
use crate::record::{LanguageCount, LanguageStatistics, RepositoryInfo, RepositorySummary};

/// Switches for optional work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyzerOptions {
    /// Build semantic indexes.
    pub semantic: bool,
    /// Read and write the analysis and index caches.
    pub cache: bool,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            semantic: true,
            cache: true,
        }
    }
}

/// What the last [`add_repository`](MultiRepoAnalyzer::add_repository) did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryStatus {
    /// The analysis came from the analysis cache.
    pub analysis_cached: bool,
    /// Chunks handed to the search engine.
    pub chunks: usize,
    /// Indexing result; `None` when semantic search is off or indexing failed.
    pub index: Option<IndexOutcome>,
}

/// Analyzes repositories and answers questions across all of them.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use reposcope_analyzer::{AnalyzerOptions, MultiRepoAnalyzer};
/// use reposcope_core::ScopeConfig;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let mut analyzer = MultiRepoAnalyzer::new(ScopeConfig::default(), AnalyzerOptions::default()).unwrap();
/// analyzer.add_repository(Path::new("../shop")).await.unwrap();
/// let answer = analyzer.answer("How does login work?", false).await.unwrap();
/// println!("{}", answer.render().unwrap());
/// # });
/// ```
pub struct MultiRepoAnalyzer {
    config: ScopeConfig,
    options: AnalyzerOptions,
    registry: AnalyzerRegistry,
    walk: WalkOptions,
    analysis_cache: Option<AnalysisCache>,
    search: Option<SemanticSearchEngine>,
    nlq: NlqEngine,
    repositories: BTreeMap<String, RepositoryInfo>,
    statuses: BTreeMap<String, RepositoryStatus>,
}

impl std::fmt::Debug for MultiRepoAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiRepoAnalyzer")
            .field("options", &self.options)
            .field("registry", &self.registry)
            .field("semantic", &self.search.is_some())
            .field("repositories", &self.repositories.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl MultiRepoAnalyzer {
    /// Create an analyzer with the default language analyzers.
    ///
    /// Nothing is read from disk and no model is loaded until a repository
    /// is added.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::Config`] for invalid exclude globs or an unknown
    /// embedding provider.
    pub fn new(config: ScopeConfig, options: AnalyzerOptions) -> Result<Self, ScopeError> {
        let walk = WalkOptions::from_config(&config.analysis)?;
        let use_cache = options.cache && config.cache.enabled;

        let search = if options.semantic {
            let provider = EmbeddingProvider::new(config.embedding.clone())?;
            let index_cache = use_cache.then(|| IndexCache::new(config.cache.dir.join("index")));
            Some(SemanticSearchEngine::new(
                Arc::new(provider),
                index_cache,
                config.search.summary_chars,
            ))
        } else {
            None
        };

        Ok(Self {
            analysis_cache: use_cache.then(|| AnalysisCache::new(config.cache.dir.join("analysis"))),
            registry: AnalyzerRegistry::with_defaults(),
            nlq: NlqEngine::new(),
            repositories: BTreeMap::new(),
            statuses: BTreeMap::new(),
            search,
            walk,
            options,
            config,
        })
    }

    /// Replace the analyzer registry.
    pub fn with_registry(mut self, registry: AnalyzerRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Whether semantic queries can be answered in this session.
    pub fn semantic_enabled(&self) -> bool {
        self.search.is_some()
    }

    pub fn search_engine(&self) -> Option<&SemanticSearchEngine> {
        self.search.as_ref()
    }

    pub fn repository(&self, name: &str) -> Option<&RepositoryInfo> {
        self.repositories.get(name)
    }

    /// Added repositories, by name.
    pub fn repositories(&self) -> impl Iterator<Item = &RepositoryInfo> {
        self.repositories.values()
    }

    pub fn status(&self, name: &str) -> Option<&RepositoryStatus> {
        self.statuses.get(name)
    }

    /// Analyze the repository at `path` and index it for search.
    ///
    /// Re-adding a repository, or adding another directory with the same
    /// name, replaces its record. A missing embedding model
    /// disables semantic search for the session; other indexing failures
    /// leave this repository unindexed. Neither fails the call.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::FileNotFound`] if `path` is not a directory, or
    /// the error from walking or fingerprinting it.
    pub async fn add_repository(&mut self, path: &Path) -> Result<String, ScopeError> {
        let root = path
            .canonicalize()
            .map_err(|_| ScopeError::FileNotFound(path.to_path_buf()))?;
        if !root.is_dir() {
            return Err(ScopeError::FileNotFound(path.to_path_buf()));
        }
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "repository".to_string());

        let files = walk_repo(&root, &self.walk)?;
        let languages: Vec<LanguageCount> = detect_languages(&files)
            .into_iter()
            .map(|(language, files)| LanguageCount { language, files })
            .collect();
        // Analysis settings are part of the key, so changing them misses both caches.
        let settings = serde_json::to_string(&self.config.analysis)?;
        let fingerprint = fingerprint_repo(&root, &format!("{name}\n{settings}"))?;

        let cached = self
            .analysis_cache
            .as_ref()
            .and_then(|cache| cache.load(&fingerprint));
        let analysis_cached = cached.is_some();
        let mut info = match cached {
            Some(info) => {
                tracing::info!(repository = %name, "loaded analysis from cache");
                info
            }
            None => {
                let info = self.analyze(&root, &name, &files, languages, fingerprint);
                if let Some(cache) = &self.analysis_cache {
                    if let Err(e) = cache.save(&info) {
                        tracing::warn!(repository = %name, error = %e, "failed to write analysis cache");
                    }
                }
                info
            }
        };
        info.path = root;
        if let Some(previous) = self.repositories.get(&name) {
            if previous.path != info.path {
                tracing::warn!(
                    repository = %name,
                    previous = %previous.path.display(),
                    path = %info.path.display(),
                    "replacing a different repository with the same name"
                );
            }
        }

        let chunks = build_chunks(&info);
        let index = self.index(&info, &chunks).await;

        self.statuses.insert(
            name.clone(),
            RepositoryStatus {
                analysis_cached,
                chunks: chunks.len(),
                index,
            },
        );
        self.repositories.insert(name.clone(), info);
        Ok(name)
    }

    fn analyze(
        &self,
        root: &Path,
        name: &str,
        files: &[SourceFile],
        languages: Vec<LanguageCount>,
        fingerprint: reposcope_core::Fingerprint,
    ) -> RepositoryInfo {
        tracing::info!(repository = %name, files = files.len(), "analyzing repository");

        let mut used: Vec<Arc<dyn Analyzer>> = Vec::new();
        for count in &languages {
            match self.registry.get(count.language) {
                Some(analyzer) if !used.iter().any(|u| Arc::ptr_eq(u, &analyzer)) => {
                    used.push(analyzer);
                }
                Some(_) => {}
                None => tracing::debug!(
                    repository = %name,
                    language = %count.language,
                    "no analyzer for language"
                ),
            }
        }
        if used.is_empty() {
            tracing::warn!(repository = %name, "no supported language detected, recording without entities");
        }

        let mut dependencies = BTreeSet::new();
        for analyzer in &used {
            match analyzer.detect_dependencies(root) {
                Ok(deps) => dependencies.extend(deps),
                Err(e) => tracing::warn!(
                    repository = %name,
                    language = %analyzer.language(),
                    error = %e,
                    "dependency detection failed"
                ),
            }
        }

        let mut entities = Vec::new();
        let mut fallback_chunks = Vec::new();
        for file in files {
            let Some(analyzer) = self.registry.get(file.language) else {
                continue;
            };
            if !analyzer.should_analyze_file(&file.path) {
                continue;
            }
            let absolute = root.join(&file.path);
            let mut found = match analyzer.analyze_file(&absolute) {
                Ok(found) => found,
                Err(e) => {
                    tracing::warn!(path = %file.path.display(), error = %e, "skipping file");
                    continue;
                }
            };
            for entity in &mut found {
                entity.file = file.path.clone();
            }

            if found.iter().all(|e| e.kind == EntityKind::Import) {
                let chunk = read_source(&absolute).and_then(|source| {
                    fallback_chunk(
                        name,
                        &file.path,
                        file.language.name(),
                        &source,
                        self.config.analysis.fallback_chunk_lines,
                    )
                });
                match chunk {
                    Ok(Some(chunk)) => fallback_chunks.push(chunk),
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(path = %file.path.display(), error = %e, "no fallback chunk")
                    }
                }
            }
            entities.extend(found);
        }

        tracing::info!(
            repository = %name,
            entities = entities.len(),
            dependencies = dependencies.len(),
            "analysis complete"
        );

        RepositoryInfo {
            name: name.to_string(),
            path: root.to_path_buf(),
            language: languages.first().map_or(Language::Unknown, |l| l.language),
            languages,
            dependencies: dependencies.into_iter().collect(),
            entities,
            fallback_chunks,
            fingerprint,
            analyzed_at: Utc::now(),
        }
    }

    async fn index(&mut self, info: &RepositoryInfo, chunks: &[Arc<CodeChunk>]) -> Option<IndexOutcome> {
        let engine = self.search.as_ref()?;
        let repository = RepositoryRef {
            id: info.name.clone(),
            fingerprint: info.fingerprint.clone(),
        };
        match engine.index(&repository, chunks).await {
            Ok(outcome) => Some(outcome),
            Err(e) if e.disables_semantic_search() => {
                tracing::warn!(error = %e, "semantic search disabled for this session");
                self.search = None;
                None
            }
            Err(e) => {
                tracing::warn!(
                    repository = %info.name,
                    error = %e,
                    retryable = e.is_retryable(),
                    "repository left unindexed"
                );
                None
            }
        }
    }

    fn engine(&self) -> Result<&SemanticSearchEngine, ScopeError> {
        self.search.as_ref().ok_or(ScopeError::SemanticSearchDisabled)
    }

    /// Semantic search across every indexed repository.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::SemanticSearchDisabled`] when semantic search is
    /// off, or the embedding error for the query.
    pub async fn semantic_query(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<QueryResult>, ScopeError> {
        self.engine()?.search(query, top_k, filter).await
    }

    /// Chunks similar to `chunk`, which must already be indexed.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::SemanticSearchDisabled`] when semantic search is off.
    pub fn find_similar(&self, chunk: &CodeChunk, top_k: usize) -> Result<Vec<QueryResult>, ScopeError> {
        Ok(self.engine()?.find_similar(chunk, top_k))
    }

    /// Answer a natural-language question.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::SemanticSearchDisabled`] when semantic search is
    /// off, or the embedding error for the query.
    pub async fn answer(&self, query: &str, json_output: bool) -> Result<Answer, ScopeError> {
        self.nlq.answer(query, self.engine()?, json_output).await
    }

    fn selected(&self, repository: Option<&str>) -> Result<Vec<&RepositoryInfo>, ScopeError> {
        match repository {
            Some(name) => self
                .repositories
                .get(name)
                .map(|r| vec![r])
                .ok_or_else(|| ScopeError::UnknownRepository(name.to_string())),
            None => Ok(self.repositories.values().collect()),
        }
    }

    /// Entities whose name contains `name`, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::UnknownRepository`] if `repository` was not added.
    pub fn find_entities_by_name(
        &self,
        name: &str,
        repository: Option<&str>,
        kind: Option<EntityKind>,
    ) -> Result<Vec<&CodeEntity>, ScopeError> {
        let needle = name.to_lowercase();
        Ok(self
            .selected(repository)?
            .into_iter()
            .flat_map(|repo| repo.entities.iter())
            .filter(|e| e.name.to_lowercase().contains(&needle))
            .filter(|e| kind.map_or(true, |k| e.kind == k))
            .collect())
    }

    /// API endpoint entities.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::UnknownRepository`] if `repository` was not added.
    pub fn api_endpoints(&self, repository: Option<&str>) -> Result<Vec<&CodeEntity>, ScopeError> {
        Ok(self
            .selected(repository)?
            .into_iter()
            .flat_map(|repo| repo.entities.iter())
            .filter(|e| e.kind == EntityKind::ApiEndpoint)
            .collect())
    }

    /// # Errors
    ///
    /// Returns [`ScopeError::UnknownRepository`] if `name` was not added.
    pub fn repository_summary(&self, name: &str) -> Result<RepositorySummary, ScopeError> {
        let repo = self
            .repositories
            .get(name)
            .ok_or_else(|| ScopeError::UnknownRepository(name.to_string()))?;
        let semantic_indexed = self.search.as_ref().is_some_and(|engine| {
            engine.repositories().iter().any(|r| r == name)
        });
        Ok(RepositorySummary {
            name: repo.name.clone(),
            path: repo.path.clone(),
            language: repo.language,
            languages: repo.languages.clone(),
            dependencies: repo.dependencies.clone(),
            entity_counts: repo.entity_counts(),
            total_entities: repo.entities.len(),
            semantic_indexed,
            analyzed_at: repo.analyzed_at,
        })
    }

    pub fn language_statistics(&self) -> LanguageStatistics {
        let mut stats = LanguageStatistics::default();
        for repo in self.repositories.values() {
            stats.add(repo);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use reposcope_core::EmbeddingConfig;

    use super::*;

    fn config(cache_dir: &Path) -> ScopeConfig {
        let mut config = ScopeConfig::default();
        config.cache.dir = cache_dir.to_path_buf();
        config
    }

    fn shop_repo(parent: &Path) -> std::path::PathBuf {
        let root = parent.join("shop");
        fs::create_dir_all(root.join("api")).unwrap();
        fs::write(
            root.join("api/auth.py"),
            "import hashlib\n\n\ndef login(user, password):\n    \"\"\"Check credentials.\"\"\"\n    return hashlib.sha256(password.encode()).hexdigest() == user.hash\n",
        )
        .unwrap();
        fs::write(
            root.join("api/routes.py"),
            "from flask import Flask\napp = Flask(__name__)\n\n@app.route('/products', methods=['GET', 'POST'])\ndef products():\n    return []\n",
        )
        .unwrap();
        fs::write(root.join("settings.py"), "DEBUG = True\nDATABASE_URL = 'sqlite://'\n").unwrap();
        fs::write(root.join("requirements.txt"), "flask>=2\nrequests\n").unwrap();
        fs::write(root.join("README.md"), "# Shop\n").unwrap();
        root
    }

    #[tokio::test]
    async fn missing_path_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut analyzer =
            MultiRepoAnalyzer::new(config(dir.path()), AnalyzerOptions::default()).unwrap();
        let err = analyzer
            .add_repository(&dir.path().join("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScopeError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn analyzes_entities_dependencies_and_fallbacks() {
        let dir = tempfile::tempdir().unwrap();
        let root = shop_repo(dir.path());
        let mut analyzer =
            MultiRepoAnalyzer::new(config(&dir.path().join("cache")), AnalyzerOptions::default())
                .unwrap();
        let name = analyzer.add_repository(&root).await.unwrap();
        assert_eq!(name, "shop");

        let info = analyzer.repository("shop").unwrap();
        assert_eq!(info.language, Language::Python);
        assert_eq!(info.dependencies, vec!["flask", "requests"]);
        assert!(info.entities.iter().any(|e| e.name == "login"));
        assert_eq!(info.fallback_chunks.len(), 1);
        assert_eq!(
            info.fallback_chunks[0].file,
            std::path::PathBuf::from("shop/settings.py")
        );

        let endpoints = analyzer.api_endpoints(Some("shop")).unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].name, "GET|POST /products");

        let status = analyzer.status("shop").unwrap();
        assert!(!status.analysis_cached);
        assert!(status.index.as_ref().is_some_and(|o| !o.from_cache));
    }

    #[tokio::test]
    async fn entity_lookup_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let root = shop_repo(dir.path());
        let mut analyzer =
            MultiRepoAnalyzer::new(config(&dir.path().join("cache")), AnalyzerOptions::default())
                .unwrap();
        analyzer.add_repository(&root).await.unwrap();

        let found = analyzer.find_entities_by_name("LOG", None, None).unwrap();
        assert!(found.iter().any(|e| e.name == "login"));
        let only_classes = analyzer
            .find_entities_by_name("login", None, Some(EntityKind::Class))
            .unwrap();
        assert!(only_classes.is_empty());
        assert!(matches!(
            analyzer.find_entities_by_name("x", Some("other"), None),
            Err(ScopeError::UnknownRepository(_))
        ));
    }

    #[tokio::test]
    async fn second_add_uses_both_caches() {
        let dir = tempfile::tempdir().unwrap();
        let root = shop_repo(dir.path());
        let cache_dir = dir.path().join("cache");

        let mut first = MultiRepoAnalyzer::new(config(&cache_dir), AnalyzerOptions::default()).unwrap();
        first.add_repository(&root).await.unwrap();

        let mut second = MultiRepoAnalyzer::new(config(&cache_dir), AnalyzerOptions::default()).unwrap();
        second.add_repository(&root).await.unwrap();
        let status = second.status("shop").unwrap();
        assert!(status.analysis_cached);
        assert!(status.index.as_ref().is_some_and(|o| o.from_cache));
        assert_eq!(
            first.repository("shop").unwrap().entities,
            second.repository("shop").unwrap().entities
        );
    }

    #[tokio::test]
    async fn no_cache_option_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let root = shop_repo(dir.path());
        let cache_dir = dir.path().join("cache");
        let options = AnalyzerOptions {
            semantic: true,
            cache: false,
        };
        let mut analyzer = MultiRepoAnalyzer::new(config(&cache_dir), options).unwrap();
        analyzer.add_repository(&root).await.unwrap();
        assert!(!cache_dir.exists());
        assert!(analyzer.status("shop").unwrap().index.is_some());
    }

    #[tokio::test]
    async fn unavailable_model_disables_semantic_search_only() {
        std::env::remove_var("VOYAGE_API_KEY");
        let dir = tempfile::tempdir().unwrap();
        let root = shop_repo(dir.path());
        let mut config = config(&dir.path().join("cache"));
        config.embedding = EmbeddingConfig {
            provider: "voyage".into(),
            ..EmbeddingConfig::default()
        };
        let mut analyzer = MultiRepoAnalyzer::new(config, AnalyzerOptions::default()).unwrap();
        analyzer.add_repository(&root).await.unwrap();

        assert!(!analyzer.semantic_enabled());
        assert!(analyzer.repository("shop").is_some());
        assert!(!analyzer.repository_summary("shop").unwrap().semantic_indexed);
        assert!(matches!(
            analyzer.semantic_query("login", 5, None).await,
            Err(ScopeError::SemanticSearchDisabled)
        ));
        assert!(matches!(
            analyzer.answer("How does login work?", false).await,
            Err(ScopeError::SemanticSearchDisabled)
        ));
    }

    #[tokio::test]
    async fn summary_and_statistics() {
        let dir = tempfile::tempdir().unwrap();
        let root = shop_repo(dir.path());
        let mut analyzer =
            MultiRepoAnalyzer::new(config(&dir.path().join("cache")), AnalyzerOptions::default())
                .unwrap();
        analyzer.add_repository(&root).await.unwrap();

        let summary = analyzer.repository_summary("shop").unwrap();
        assert!(summary.semantic_indexed);
        assert_eq!(summary.total_entities, summary.entity_counts.values().sum::<usize>());
        assert_eq!(summary.entity_counts[&EntityKind::ApiEndpoint], 1);

        let stats = analyzer.language_statistics();
        assert_eq!(stats.repositories_by_language[&Language::Python], vec!["shop".to_string()]);
        assert!(matches!(
            analyzer.repository_summary("blog"),
            Err(ScopeError::UnknownRepository(_))
        ));
    }

    #[tokio::test]
    async fn empty_registry_records_languages_only() {
        let dir = tempfile::tempdir().unwrap();
        let root = shop_repo(dir.path());
        let mut analyzer =
            MultiRepoAnalyzer::new(config(&dir.path().join("cache")), AnalyzerOptions::default())
                .unwrap()
                .with_registry(AnalyzerRegistry::new());
        analyzer.add_repository(&root).await.unwrap();

        let info = analyzer.repository("shop").unwrap();
        assert_eq!(info.language, Language::Python);
        assert!(info.entities.is_empty());
        assert!(info.dependencies.is_empty());
        assert_eq!(analyzer.status("shop").unwrap().chunks, 0);
    }

    #[tokio::test]
    async fn repository_without_supported_language_has_no_entities() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("svc");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("main.go"), "package main\n\nfunc main() {}\n").unwrap();

        let mut analyzer =
            MultiRepoAnalyzer::new(config(&dir.path().join("cache")), AnalyzerOptions::default())
                .unwrap();
        analyzer.add_repository(&root).await.unwrap();
        let info = analyzer.repository("svc").unwrap();
        assert_eq!(info.language, Language::Go);
        assert!(info.entities.is_empty());
        assert_eq!(analyzer.status("svc").unwrap().chunks, 0);
    }

    #[tokio::test]
    async fn changed_excludes_miss_both_caches() {
        let dir = tempfile::tempdir().unwrap();
        let root = shop_repo(dir.path());
        fs::create_dir_all(root.join("legacy")).unwrap();
        fs::write(root.join("legacy/old.py"), "def old_login(user):\n    return True\n").unwrap();
        let cache_dir = dir.path().join("cache");

        let mut first = MultiRepoAnalyzer::new(config(&cache_dir), AnalyzerOptions::default()).unwrap();
        first.add_repository(&root).await.unwrap();
        assert!(first
            .repository("shop")
            .unwrap()
            .entities
            .iter()
            .any(|e| e.name == "old_login"));

        let mut narrowed = config(&cache_dir);
        narrowed.analysis.exclude = vec!["legacy/**".into()];
        let mut second = MultiRepoAnalyzer::new(narrowed, AnalyzerOptions::default()).unwrap();
        second.add_repository(&root).await.unwrap();

        let status = second.status("shop").unwrap();
        assert!(!status.analysis_cached);
        assert!(status.index.as_ref().is_some_and(|o| !o.from_cache));
        let info = second.repository("shop").unwrap();
        assert_ne!(info.fingerprint, first.repository("shop").unwrap().fingerprint);
        assert!(info.entities.iter().all(|e| e.name != "old_login"));
        let results = second.semantic_query("old login", 50, None).await.unwrap();
        assert!(results.iter().all(|r| !r.file.starts_with("shop/legacy")));
    }

    #[tokio::test]
    async fn same_named_repository_replaces_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("one/api");
        let second = dir.path().join("two/api");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(&second).unwrap();
        fs::write(first.join("a.py"), "def alpha():\n    return 1\n").unwrap();
        fs::write(second.join("b.py"), "def beta():\n    return 2\n").unwrap();

        let mut analyzer =
            MultiRepoAnalyzer::new(config(&dir.path().join("cache")), AnalyzerOptions::default())
                .unwrap();
        assert_eq!(analyzer.add_repository(&first).await.unwrap(), "api");
        assert_eq!(analyzer.add_repository(&second).await.unwrap(), "api");

        assert_eq!(analyzer.repositories().count(), 1);
        let info = analyzer.repository("api").unwrap();
        assert_eq!(info.path, second.canonicalize().unwrap());
        assert!(info.entities.iter().any(|e| e.name == "beta"));
        assert!(info.entities.iter().all(|e| e.name != "alpha"));
    }
}
