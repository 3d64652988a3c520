//! JSON cache of repository analyses, keyed by fingerprint.

use std::path::{Path, PathBuf};

use reposcope_core::{Fingerprint, ScopeError};

use crate::record::RepositoryInfo;

/// Stores one `<fingerprint>.json` per analyzed repository state.
#[derive(Debug, Clone)]
pub struct AnalysisCache {
    root: PathBuf,
}

impl AnalysisCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.root.join(format!("{fingerprint}.json"))
    }

    /// The cached analysis for `fingerprint`. Unreadable or corrupt files are
    /// logged and treated as absent.
    pub fn load(&self, fingerprint: &Fingerprint) -> Option<RepositoryInfo> {
        let path = self.path_for(fingerprint);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read analysis cache");
                return None;
            }
        };
        match serde_json::from_slice::<RepositoryInfo>(&bytes) {
            Ok(info) if info.fingerprint == *fingerprint => Some(info),
            Ok(_) => {
                tracing::warn!(path = %path.display(), "analysis cache holds another fingerprint");
                None
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt analysis cache");
                None
            }
        }
    }

    /// Write `info` via a temporary file and rename.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::Cache`] if the file cannot be written.
    pub fn save(&self, info: &RepositoryInfo) -> Result<(), ScopeError> {
        std::fs::create_dir_all(&self.root)
            .map_err(|e| ScopeError::Cache(format!("failed to create analysis cache directory: {e}")))?;
        let target = self.path_for(&info.fingerprint);
        let tmp = temp_sibling(&target);
        let json = serde_json::to_vec(info)?;
        let written = std::fs::write(&tmp, json)
            .and_then(|()| std::fs::rename(&tmp, &target))
            .map_err(|e| ScopeError::Cache(format!("failed to write analysis cache: {e}")));
        if written.is_err() {
            let _ = std::fs::remove_file(&tmp);
        }
        written
    }
}

fn temp_sibling(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(format!(".tmp-{}", std::process::id()));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use reposcope_lang::Language;

    use super::*;

    fn info(fp: &str) -> RepositoryInfo {
        RepositoryInfo {
            name: "shop".into(),
            path: PathBuf::from("/src/shop"),
            language: Language::Python,
            languages: Vec::new(),
            dependencies: vec!["flask".into()],
            entities: Vec::new(),
            fallback_chunks: Vec::new(),
            fingerprint: Fingerprint::new(fp).unwrap(),
            analyzed_at: Utc::now(),
        }
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AnalysisCache::new(dir.path().join("analysis"));
        let record = info("0f");
        cache.save(&record).unwrap();
        assert_eq!(cache.load(&record.fingerprint), Some(record));
    }

    #[test]
    fn corrupt_or_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AnalysisCache::new(dir.path());
        let fp = Fingerprint::new("0f").unwrap();
        assert!(cache.load(&fp).is_none());
        std::fs::write(cache.path_for(&fp), "{ not json").unwrap();
        assert!(cache.load(&fp).is_none());
    }

    #[test]
    fn mismatched_fingerprint_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AnalysisCache::new(dir.path());
        cache.save(&info("0f")).unwrap();
        let other = Fingerprint::new("aa").unwrap();
        std::fs::copy(cache.path_for(&Fingerprint::new("0f").unwrap()), cache.path_for(&other))
            .unwrap();
        assert!(cache.load(&other).is_none());
    }
}
