//! Language detection and per-language entity extraction.
//!
//! Walks a repository, fingerprints its contents, and turns source files into
//! [`CodeEntity`](reposcope_core::CodeEntity) values through the [`Analyzer`]
//! trait. Python, JavaScript/TypeScript and Rust analyzers are built on
//! tree-sitter grammars.

pub mod analyzer;
pub mod fingerprint;
pub mod javascript;
pub mod python;
pub mod rust;
pub mod walker;

pub use analyzer::{read_source, Analyzer, AnalyzerRegistry};
pub use fingerprint::fingerprint_repo;
pub use javascript::JavaScriptAnalyzer;
pub use python::PythonAnalyzer;
pub use rust::RustAnalyzer;
pub use walker::{detect_languages, walk_repo, Language, SourceFile, WalkOptions};
