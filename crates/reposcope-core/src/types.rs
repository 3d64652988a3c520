use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ScopeError;

/// Kind of a named code entity.
///
/// # Examples
///
/// ```
/// use reposcope_core::EntityKind;
///
/// let kind: EntityKind = "api_endpoint".parse().unwrap();
/// assert_eq!(kind, EntityKind::ApiEndpoint);
/// assert_eq!(kind.to_string(), "api_endpoint");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Function,
    Method,
    Class,
    Struct,
    Enum,
    Trait,
    Interface,
    ApiEndpoint,
    Import,
    /// Whole-file or top-level code without a narrower entity.
    Module,
}

impl EntityKind {
    /// All kinds, in declaration order.
    pub const ALL: [EntityKind; 10] = [
        EntityKind::Function,
        EntityKind::Method,
        EntityKind::Class,
        EntityKind::Struct,
        EntityKind::Enum,
        EntityKind::Trait,
        EntityKind::Interface,
        EntityKind::ApiEndpoint,
        EntityKind::Import,
        EntityKind::Module,
    ];

    /// The snake_case label used in JSON and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Function => "function",
            EntityKind::Method => "method",
            EntityKind::Class => "class",
            EntityKind::Struct => "struct",
            EntityKind::Enum => "enum",
            EntityKind::Trait => "trait",
            EntityKind::Interface => "interface",
            EntityKind::ApiEndpoint => "api_endpoint",
            EntityKind::Import => "import",
            EntityKind::Module => "module",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .or(match normalized.as_str() {
                "endpoint" | "route" => Some(EntityKind::ApiEndpoint),
                "fn" => Some(EntityKind::Function),
                _ => None,
            })
            .ok_or_else(|| format!("unknown entity kind: {s}"))
    }
}

/// A named entity extracted from a source file by an analyzer.
///
/// # Examples
///
/// ```
/// use reposcope_core::{CodeEntity, EntityKind};
/// use std::path::PathBuf;
///
/// let entity = CodeEntity {
///     name: "login".into(),
///     kind: EntityKind::Function,
///     file: PathBuf::from("auth.py"),
///     start_line: 1,
///     end_line: 3,
///     language: "python".into(),
///     signature: "def login(user, password):".into(),
///     docstring: Some("Check credentials.".into()),
///     content: "def login(user, password):\n    return True".into(),
/// };
/// assert_eq!(entity.kind, EntityKind::Function);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeEntity {
    /// Entity name (e.g. `"process_payment"`, `"GET /users"`).
    pub name: String,
    /// What sort of entity this is.
    pub kind: EntityKind,
    /// Path of the source file, relative to the repository root.
    pub file: PathBuf,
    /// First line (1-indexed).
    pub start_line: u32,
    /// Last line (1-indexed, inclusive).
    pub end_line: u32,
    /// Language name as reported by the analyzer.
    pub language: String,
    /// First line of the definition.
    pub signature: String,
    /// Attached documentation, if any.
    pub docstring: Option<String>,
    /// Source text of the entity.
    pub content: String,
}

/// A unit of source text that gets embedded.
///
/// Immutable once built; the search index shares chunks through `Arc`.
///
/// # Examples
///
/// ```
/// use reposcope_core::{CodeChunk, EntityKind};
/// use std::path::PathBuf;
///
/// let chunk = CodeChunk::new(PathBuf::from("api/auth.py"), 1, 2, "def login():\n    pass").unwrap();
/// assert_eq!(chunk.kind, EntityKind::Module);
/// assert!(CodeChunk::new(PathBuf::from("x.py"), 3, 2, "oops").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeChunk {
    /// Path of the source file, prefixed with the repository name.
    pub file: PathBuf,
    /// First line of the chunk (1-indexed).
    pub start_line: u32,
    /// Last line of the chunk (1-indexed, inclusive).
    pub end_line: u32,
    /// Raw code content.
    pub content: String,
    /// Name of the entity the chunk covers, empty for whole-file chunks.
    pub entity_name: String,
    /// Entity kind; search filters match on this.
    pub kind: EntityKind,
    /// Programming language.
    pub language: String,
    /// Descriptive lines prepended to `content` before embedding.
    pub context_header: String,
}

impl CodeChunk {
    /// Build a module-level chunk covering `start_line..=end_line`.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::Parse`] if `start_line` is 0 or greater than `end_line`.
    pub fn new(
        file: PathBuf,
        start_line: u32,
        end_line: u32,
        content: impl Into<String>,
    ) -> Result<Self, ScopeError> {
        if start_line == 0 || end_line < start_line {
            return Err(ScopeError::Parse(format!(
                "invalid line range {start_line}-{end_line} for {}",
                file.display()
            )));
        }
        Ok(Self {
            file,
            start_line,
            end_line,
            content: content.into(),
            entity_name: String::new(),
            kind: EntityKind::Module,
            language: String::new(),
            context_header: String::new(),
        })
    }

    /// Build the chunk for an analyzer entity, under `display_path`.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::Parse`] if the entity's line range is invalid.
    pub fn from_entity(entity: &CodeEntity, display_path: &Path) -> Result<Self, ScopeError> {
        let mut chunk = Self::new(
            display_path.to_path_buf(),
            entity.start_line,
            entity.end_line,
            entity.content.clone(),
        )?;
        chunk.entity_name = entity.name.clone();
        chunk.kind = entity.kind;
        chunk.language = entity.language.clone();
        chunk.context_header = context_header(
            display_path,
            entity.kind,
            &entity.name,
            &entity.signature,
            entity.docstring.as_deref(),
        );
        Ok(chunk)
    }

    /// The text handed to the embedding model: context header plus content.
    pub fn embedding_text(&self) -> String {
        if self.context_header.is_empty() {
            self.content.clone()
        } else {
            format!("{}\n\n{}", self.context_header, self.content)
        }
    }

    /// Whether the chunk has no embeddable content.
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Descriptive header for a chunk, e.g. `# File: a.py\n# Type: function\n# Name: f`.
pub fn context_header(
    file: &Path,
    kind: EntityKind,
    name: &str,
    signature: &str,
    docstring: Option<&str>,
) -> String {
    let mut header = format!("# File: {}\n# Type: {}", file.display(), kind);
    if !name.is_empty() {
        header.push_str(&format!("\n# Name: {name}"));
    }
    if !signature.is_empty() {
        header.push_str(&format!("\n# Signature: {signature}"));
    }
    if let Some(doc) = docstring.map(str::trim).filter(|d| !d.is_empty()) {
        let first_line = doc.lines().next().unwrap_or_default();
        header.push_str(&format!("\n# Doc: {first_line}"));
    }
    header
}

/// A ranked search hit.
///
/// Field names are part of the JSON answer format and stay snake_case.
///
/// # Examples
///
/// ```
/// use reposcope_core::QueryResult;
/// use std::path::PathBuf;
///
/// let result = QueryResult {
///     file: PathBuf::from("api/auth.py"),
///     start_line: 1,
///     end_line: 2,
///     summary: "def login(): pass".into(),
///     score: 0.92,
/// };
/// let json = serde_json::to_value(&result).unwrap();
/// assert_eq!(json["start_line"], 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// File containing the match.
    pub file: PathBuf,
    /// First line of the matched chunk.
    pub start_line: u32,
    /// Last line of the matched chunk.
    pub end_line: u32,
    /// Truncated, single-line chunk content.
    pub summary: String,
    /// Cosine similarity to the query.
    pub score: f64,
}

/// Single-line summary of `content`: at most `max_chars` characters,
/// trimmed, with newlines replaced by spaces.
///
/// # Examples
///
/// ```
/// use reposcope_core::summarize;
///
/// assert_eq!(summarize("def f():\n    pass\n", 200), "def f():     pass");
/// assert_eq!(summarize("abcdef", 3), "abc");
/// ```
pub fn summarize(content: &str, max_chars: usize) -> String {
    let truncated: String = content.chars().take(max_chars).collect();
    truncated.trim().replace(['\r', '\n'], " ")
}

/// Content fingerprint of a repository: lowercase hex digest.
///
/// # Examples
///
/// ```
/// use reposcope_core::Fingerprint;
///
/// let fp = Fingerprint::new("9f86d081").unwrap();
/// assert_eq!(fp.as_str(), "9f86d081");
/// assert!(Fingerprint::new("../etc").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap a hex digest.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::Cache`] unless `hex` is non-empty lowercase hex.
    pub fn new(hex: impl Into<String>) -> Result<Self, ScopeError> {
        let hex = hex.into();
        let valid = !hex.is_empty()
            && hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Self(hex))
        } else {
            Err(ScopeError::Cache(format!("invalid fingerprint: {hex:?}")))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = ScopeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.0
    }
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use reposcope_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// Machine-readable JSON.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
