//! Core types, configuration, and error handling for reposcope.
//!
//! This crate provides the shared foundation used by all other reposcope crates:
//! - [`ScopeError`]: unified error type using `thiserror` and `miette`
//! - [`ScopeConfig`]: configuration loaded from `.reposcope.toml`
//! - Shared types: [`CodeEntity`], [`CodeChunk`], [`QueryResult`],
//!   [`Fingerprint`], [`EntityKind`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{AnalysisConfig, CacheConfig, EmbeddingConfig, ScopeConfig, SearchConfig};
pub use error::ScopeError;
pub use types::{
    context_header, summarize, CodeChunk, CodeEntity, EntityKind, Fingerprint, OutputFormat,
    QueryResult,
};

/// A convenience `Result` type for reposcope operations.
pub type Result<T> = std::result::Result<T, ScopeError>;
