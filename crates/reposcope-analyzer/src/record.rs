//! Per-repository analysis records and the reports derived from them.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use reposcope_core::{CodeChunk, CodeEntity, EntityKind, Fingerprint};
use reposcope_lang::Language;
use serde::{Deserialize, Serialize};

/// Number of files of one language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageCount {
    pub language: Language,
    pub files: usize,
}

/// Everything learned about one repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    /// Directory name; also the prefix of every chunk path.
    pub name: String,
    /// Absolute repository root.
    pub path: PathBuf,
    /// Most common language, [`Language::Unknown`] if none was detected.
    pub language: Language,
    /// Detected languages, most files first.
    pub languages: Vec<LanguageCount>,
    /// Declared third-party dependencies, sorted and deduplicated.
    pub dependencies: Vec<String>,
    /// Entities extracted by the analyzers, with repository-relative paths.
    pub entities: Vec<CodeEntity>,
    /// Whole-file chunks for analyzed files that yielded no entities.
    #[serde(default)]
    pub fallback_chunks: Vec<CodeChunk>,
    pub fingerprint: Fingerprint,
    pub analyzed_at: DateTime<Utc>,
}

impl RepositoryInfo {
    pub fn entity_counts(&self) -> BTreeMap<EntityKind, usize> {
        let mut counts = BTreeMap::new();
        for entity in &self.entities {
            *counts.entry(entity.kind).or_default() += 1;
        }
        counts
    }
}

/// Overview of one repository.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepositorySummary {
    pub name: String,
    pub path: PathBuf,
    pub language: Language,
    pub languages: Vec<LanguageCount>,
    pub dependencies: Vec<String>,
    pub entity_counts: BTreeMap<EntityKind, usize>,
    pub total_entities: usize,
    /// Whether the repository is searchable semantically.
    pub semantic_indexed: bool,
    pub analyzed_at: DateTime<Utc>,
}

/// Language usage across every added repository, keyed by primary language.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LanguageStatistics {
    pub repositories_by_language: BTreeMap<Language, Vec<String>>,
    pub entities_by_language: BTreeMap<Language, usize>,
    pub kinds_by_language: BTreeMap<Language, BTreeMap<EntityKind, usize>>,
}

impl LanguageStatistics {
    pub(crate) fn add(&mut self, repo: &RepositoryInfo) {
        self.repositories_by_language
            .entry(repo.language)
            .or_default()
            .push(repo.name.clone());
        *self.entities_by_language.entry(repo.language).or_default() += repo.entities.len();
        let kinds = self.kinds_by_language.entry(repo.language).or_default();
        for (kind, count) in repo.entity_counts() {
            *kinds.entry(kind).or_default() += count;
        }
    }
}
