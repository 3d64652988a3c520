use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use reposcope_core::{CodeEntity, EntityKind, ScopeError};
use tree_sitter::{Node, Parser, Tree};

use crate::walker::Language;

/// Number of bytes to check for binary detection.
const BINARY_CHECK_SIZE: usize = 8192;

/// Directories that never contain first-party source.
const SKIPPED_DIRS: &[&str] = &[
    "node_modules",
    "__pycache__",
    "target",
    "dist",
    "build",
    "venv",
    ".venv",
    "site-packages",
];

/// Per-language entity extractor.
///
/// Implementations are registered in an [`AnalyzerRegistry`] and selected by
/// the languages detected in a repository.
pub trait Analyzer: Send + Sync {
    /// Primary language handled by this analyzer.
    fn language(&self) -> Language;

    /// Languages this analyzer accepts; defaults to [`Analyzer::language`].
    fn languages(&self) -> Vec<Language> {
        vec![self.language()]
    }

    /// File extensions (without the dot) this analyzer reads.
    fn supported_extensions(&self) -> &'static [&'static str];

    /// Whether `path` should be handed to [`Analyzer::analyze_file`].
    fn should_analyze_file(&self, path: &Path) -> bool {
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.supported_extensions().contains(&ext));
        supported && !in_skipped_dir(path)
    }

    /// Extract entities from already-loaded source text.
    ///
    /// `path` is recorded on every entity as-is.
    fn analyze_source(&self, path: &Path, source: &str) -> Result<Vec<CodeEntity>, ScopeError>;

    /// Read `path` and extract its entities.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::Io`] if the file cannot be read and
    /// [`ScopeError::Parse`] if it is binary or not UTF-8.
    fn analyze_file(&self, path: &Path) -> Result<Vec<CodeEntity>, ScopeError> {
        let source = read_source(path)?;
        self.analyze_source(path, &source)
    }

    /// Third-party dependencies declared in the repository's manifests.
    fn detect_dependencies(&self, repo_root: &Path) -> Result<Vec<String>, ScopeError>;
}

/// Explicit set of analyzers, looked up by language.
///
/// # Examples
///
/// ```
/// use reposcope_lang::{AnalyzerRegistry, Language};
///
/// let registry = AnalyzerRegistry::with_defaults();
/// assert!(registry.get(Language::Python).is_some());
/// assert!(registry.get(Language::TypeScript).is_some());
/// assert!(registry.get(Language::Go).is_none());
/// ```
#[derive(Clone, Default)]
pub struct AnalyzerRegistry {
    analyzers: Vec<Arc<dyn Analyzer>>,
}

impl AnalyzerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the Python, JavaScript/TypeScript and Rust analyzers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(crate::python::PythonAnalyzer));
        registry.register(Arc::new(crate::javascript::JavaScriptAnalyzer));
        registry.register(Arc::new(crate::rust::RustAnalyzer));
        registry
    }

    /// Add an analyzer. A later registration for the same language wins.
    pub fn register(&mut self, analyzer: Arc<dyn Analyzer>) {
        self.analyzers.insert(0, analyzer);
    }

    /// The analyzer handling `language`, if any.
    pub fn get(&self, language: Language) -> Option<Arc<dyn Analyzer>> {
        self.analyzers
            .iter()
            .find(|a| a.languages().contains(&language))
            .cloned()
    }

    /// Languages with a registered analyzer, sorted.
    pub fn supported_languages(&self) -> Vec<Language> {
        let set: BTreeSet<Language> = self.analyzers.iter().flat_map(|a| a.languages()).collect();
        set.into_iter().collect()
    }
}

impl std::fmt::Debug for AnalyzerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyzerRegistry")
            .field("languages", &self.supported_languages())
            .finish()
    }
}

/// Read a text source file, rejecting binary and non-UTF-8 content.
pub fn read_source(path: &Path) -> Result<String, ScopeError> {
    let bytes = std::fs::read(path)?;
    let check_len = bytes.len().min(BINARY_CHECK_SIZE);
    if bytes[..check_len].contains(&0) {
        return Err(ScopeError::Parse(format!(
            "{} looks like a binary file",
            path.display()
        )));
    }
    String::from_utf8(bytes)
        .map_err(|_| ScopeError::Parse(format!("{} is not valid UTF-8", path.display())))
}

fn in_skipped_dir(path: &Path) -> bool {
    path.components()
        .any(|c| SKIPPED_DIRS.contains(&c.as_os_str().to_string_lossy().as_ref()))
}

pub(crate) fn parse(grammar: tree_sitter::Language, source: &str) -> Result<Option<Tree>, ScopeError> {
    let mut parser = Parser::new();
    parser
        .set_language(&grammar)
        .map_err(|e| ScopeError::Parse(format!("failed to set language: {e}")))?;
    Ok(parser.parse(source, None))
}

/// Build an entity spanning `node`.
pub(crate) fn entity_from_node(
    node: &Node,
    source: &[u8],
    path: &Path,
    language: Language,
    name: String,
    kind: EntityKind,
    docstring: Option<String>,
) -> CodeEntity {
    let body_open = if language == Language::Python { ':' } else { '{' };
    CodeEntity {
        name,
        kind,
        file: path.to_path_buf(),
        start_line: node.start_position().row as u32 + 1,
        end_line: node.end_position().row as u32 + 1,
        language: language.name().to_string(),
        signature: extract_signature(node, source, body_open),
        docstring,
        content: node_text(node, source),
    }
}

/// Signature of a node: text up to the body opener, whitespace collapsed.
///
/// `{` is searched anywhere so multi-line Rust and JS signatures survive;
/// `:` only on the first line, where a Python header ends.
pub(crate) fn extract_signature(node: &Node, source: &[u8], body_open: char) -> String {
    let text = node_text(node, source);
    let first_line_end = text.find('\n').unwrap_or(text.len());
    let end = match body_open {
        ':' => text[..first_line_end].rfind(':'),
        open => text.find(open),
    }
    .unwrap_or(first_line_end);
    text[..end].split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn node_text(node: &Node, source: &[u8]) -> String {
    let start = node.start_byte();
    let end = node.end_byte();
    if start >= source.len() || end > source.len() {
        return String::new();
    }
    String::from_utf8_lossy(&source[start..end]).to_string()
}

pub(crate) fn find_child_text(node: &Node, kind: &str, source: &[u8]) -> Option<String> {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == kind {
            let text = node_text(&child, source);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

pub(crate) fn child_has_kind(node: &Node, kind: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| c.kind() == kind);
    found
}

/// Strip quotes from a string literal's source text.
pub(crate) fn unquote(text: &str) -> String {
    let trimmed = text.trim();
    let trimmed = trimmed
        .trim_start_matches(['r', 'b', 'f', 'u', 'R', 'B', 'F', 'U'])
        .trim_matches(|c| c == '"' || c == '\'' || c == '`');
    trimmed.to_string()
}

/// Sort and deduplicate dependency names.
pub(crate) fn normalize_dependencies(deps: impl IntoIterator<Item = String>) -> Vec<String> {
    let set: BTreeSet<String> = deps
        .into_iter()
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .collect();
    set.into_iter().collect()
}
