//! Turning analyzer output into searchable chunks.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reposcope_core::{context_header, CodeChunk, EntityKind, ScopeError};

use crate::record::RepositoryInfo;

/// Chunk paths are `<repository>/<relative path>`.
pub(crate) fn display_path(repository: &str, relative: &Path) -> PathBuf {
    Path::new(repository).join(relative)
}

/// Every non-import entity plus the fallback chunks, in that order.
pub fn build_chunks(repo: &RepositoryInfo) -> Vec<Arc<CodeChunk>> {
    let mut chunks = Vec::with_capacity(repo.entities.len() + repo.fallback_chunks.len());
    for entity in repo
        .entities
        .iter()
        .filter(|e| e.kind != EntityKind::Import)
    {
        match CodeChunk::from_entity(entity, &display_path(&repo.name, &entity.file)) {
            Ok(chunk) => chunks.push(Arc::new(chunk)),
            Err(e) => tracing::warn!(entity = %entity.name, error = %e, "skipping entity"),
        }
    }
    chunks.extend(repo.fallback_chunks.iter().cloned().map(Arc::new));
    chunks
}

/// Module chunk covering the first `max_lines` lines of `source`.
///
/// Returns `Ok(None)` for files with no non-blank content.
pub(crate) fn fallback_chunk(
    repository: &str,
    relative: &Path,
    language: &str,
    source: &str,
    max_lines: usize,
) -> Result<Option<CodeChunk>, ScopeError> {
    if source.trim().is_empty() {
        return Ok(None);
    }
    let lines: Vec<&str> = source.lines().take(max_lines.max(1)).collect();
    let display = display_path(repository, relative);
    let name = relative
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut chunk = CodeChunk::new(display.clone(), 1, lines.len() as u32, lines.join("\n"))?;
    chunk.entity_name = name.clone();
    chunk.language = language.to_string();
    chunk.context_header = context_header(&display, EntityKind::Module, &name, "", None);
    Ok(Some(chunk))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use reposcope_core::{CodeEntity, Fingerprint};
    use reposcope_lang::Language;

    use super::*;

    fn entity(name: &str, kind: EntityKind) -> CodeEntity {
        CodeEntity {
            name: name.into(),
            kind,
            file: PathBuf::from("api/auth.py"),
            start_line: 3,
            end_line: 4,
            language: "python".into(),
            signature: format!("def {name}():"),
            docstring: None,
            content: format!("def {name}():\n    pass"),
        }
    }

    #[test]
    fn imports_are_not_chunked_and_paths_are_prefixed() {
        let repo = RepositoryInfo {
            name: "shop".into(),
            path: PathBuf::from("/src/shop"),
            language: Language::Python,
            languages: Vec::new(),
            dependencies: Vec::new(),
            entities: vec![entity("login", EntityKind::Function), entity("os", EntityKind::Import)],
            fallback_chunks: Vec::new(),
            fingerprint: Fingerprint::new("ab").unwrap(),
            analyzed_at: Utc::now(),
        };
        let chunks = build_chunks(&repo);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].file, PathBuf::from("shop/api/auth.py"));
        assert_eq!(chunks[0].kind, EntityKind::Function);
        assert!(chunks[0].context_header.contains("# Name: login"));
    }

    #[test]
    fn fallback_covers_leading_lines() {
        let source = "X = 1\nY = 2\nZ = 3\n";
        let chunk = fallback_chunk("shop", Path::new("settings.py"), "python", source, 2)
            .unwrap()
            .unwrap();
        assert_eq!(chunk.start_line, 1);
        assert_eq!(chunk.end_line, 2);
        assert_eq!(chunk.content, "X = 1\nY = 2");
        assert_eq!(chunk.kind, EntityKind::Module);
        assert_eq!(chunk.file, PathBuf::from("shop/settings.py"));
    }

    #[test]
    fn blank_file_has_no_fallback() {
        let chunk = fallback_chunk("shop", Path::new("empty.py"), "python", "\n  \n", 60).unwrap();
        assert!(chunk.is_none());
    }
}
