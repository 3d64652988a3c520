use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use reposcope_core::{AnalysisConfig, ScopeError};
use serde::{Deserialize, Serialize};

/// A source file discovered during repository walking.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use reposcope_lang::walker::{Language, SourceFile};
///
/// let file = SourceFile {
///     path: PathBuf::from("app/auth.py"),
///     language: Language::Python,
///     size: 120,
/// };
/// assert_eq!(file.language, Language::Python);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the repository root.
    pub path: PathBuf,
    /// Detected programming language.
    pub language: Language,
    /// File size in bytes.
    pub size: u64,
}

/// Programming language detected from file extension.
///
/// Detection covers more languages than there are analyzers, so language
/// statistics stay meaningful for mixed repositories.
///
/// # Examples
///
/// ```
/// use reposcope_lang::walker::Language;
///
/// assert_eq!(Language::from_extension("rs"), Language::Rust);
/// assert_eq!(Language::from_extension("py"), Language::Python);
/// assert_eq!(Language::from_extension("mjs"), Language::JavaScript);
/// assert_eq!(Language::from_extension("tsx"), Language::TypeScript);
/// assert_eq!(Language::from_extension("cs"), Language::CSharp);
/// assert_eq!(Language::from_extension("txt"), Language::Unknown);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Rust,
    Java,
    Go,
    Cpp,
    C,
    CSharp,
    Php,
    Ruby,
    Unknown,
}

impl Language {
    /// Detect language from a file extension string (without the dot).
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "py" => Language::Python,
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "ts" | "tsx" => Language::TypeScript,
            "rs" => Language::Rust,
            "java" => Language::Java,
            "go" => Language::Go,
            "cpp" | "cc" | "cxx" | "hpp" => Language::Cpp,
            "c" | "h" => Language::C,
            "cs" => Language::CSharp,
            "php" => Language::Php,
            "rb" => Language::Ruby,
            _ => Language::Unknown,
        }
    }

    /// Detect language from a path's extension.
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Language::from_extension)
            .unwrap_or(Language::Unknown)
    }

    /// Lowercase name, as used in JSON and summaries.
    pub fn name(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Rust => "rust",
            Language::Java => "java",
            Language::Go => "go",
            Language::Cpp => "cpp",
            Language::C => "c",
            Language::CSharp => "csharp",
            Language::Php => "php",
            Language::Ruby => "ruby",
            Language::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Filters applied while walking a repository.
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Files larger than this are skipped.
    pub max_file_size: u64,
    /// Relative paths matching any of these are skipped.
    pub exclude: Vec<glob::Pattern>,
}

impl WalkOptions {
    /// Build walk options from the `[analysis]` config section.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::Config`] if an exclude pattern is not a valid glob.
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, ScopeError> {
        let exclude = config
            .exclude
            .iter()
            .map(|p| {
                glob::Pattern::new(p)
                    .map_err(|e| ScopeError::Config(format!("invalid exclude pattern {p:?}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            max_file_size: config.max_file_size,
            exclude,
        })
    }

    /// Whether `relative` matches an exclude pattern.
    pub fn is_excluded(&self, relative: &Path) -> bool {
        self.exclude.iter().any(|p| p.matches_path(relative))
    }
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            max_file_size: AnalysisConfig::default().max_file_size,
            exclude: Vec::new(),
        }
    }
}

/// Walk a repository, respecting `.gitignore`, returning files in known languages.
///
/// Skips hidden files, files larger than `options.max_file_size`, excluded
/// paths and files with unknown extensions. Returned paths are relative to
/// `root` and sorted.
///
/// # Errors
///
/// Returns [`ScopeError::FileNotFound`] if `root` is not a directory.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use reposcope_lang::walker::{walk_repo, WalkOptions};
///
/// let files = walk_repo(Path::new("."), &WalkOptions::default()).unwrap();
/// for f in &files {
///     println!("{}: {}", f.path.display(), f.language);
/// }
/// ```
pub fn walk_repo(root: &Path, options: &WalkOptions) -> Result<Vec<SourceFile>, ScopeError> {
    if !root.is_dir() {
        return Err(ScopeError::FileNotFound(root.to_path_buf()));
    }

    let walker = ignore::WalkBuilder::new(root).build();
    let mut files = Vec::new();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable walk entry");
                continue;
            }
        };

        let Some(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_file() {
            continue;
        }

        let path = entry.path();
        let language = Language::from_path(path);
        if language == Language::Unknown {
            continue;
        }

        let relative = match path.strip_prefix(root) {
            Ok(r) => r.to_path_buf(),
            Err(_) => path.to_path_buf(),
        };
        if options.is_excluded(&relative) {
            continue;
        }

        let size = match entry.metadata() {
            Ok(m) => m.len(),
            Err(_) => continue,
        };
        if size > options.max_file_size {
            tracing::debug!(path = %relative.display(), size, "skipping large file");
            continue;
        }

        files.push(SourceFile {
            path: relative,
            language,
            size,
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

/// Count files per language, most common first; ties sort by language name.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use reposcope_lang::walker::{detect_languages, Language, SourceFile};
///
/// let files = vec![
///     SourceFile { path: PathBuf::from("a.py"), language: Language::Python, size: 1 },
///     SourceFile { path: PathBuf::from("b.js"), language: Language::JavaScript, size: 1 },
///     SourceFile { path: PathBuf::from("c.py"), language: Language::Python, size: 1 },
/// ];
/// let counts = detect_languages(&files);
/// assert_eq!(counts[0], (Language::Python, 2));
/// assert_eq!(counts[1], (Language::JavaScript, 1));
/// ```
pub fn detect_languages(files: &[SourceFile]) -> Vec<(Language, usize)> {
    let mut counts: HashMap<Language, usize> = HashMap::new();
    for file in files {
        *counts.entry(file.language).or_default() += 1;
    }
    let mut counts: Vec<_> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.name().cmp(b.0.name())));
    counts
}
