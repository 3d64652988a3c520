//! Multi-repository analysis.
//!
//! [`MultiRepoAnalyzer`] walks each added repository, extracts entities with
//! the language analyzers, caches the result by content fingerprint, and feeds
//! the chunks into one shared semantic index that backs
//! [`semantic_query`](MultiRepoAnalyzer::semantic_query) and natural-language
//! [`answer`](MultiRepoAnalyzer::answer)s.

pub mod cache;
pub mod chunks;
pub mod multi;
pub mod record;

pub use cache::AnalysisCache;
pub use chunks::build_chunks;
pub use multi::{AnalyzerOptions, MultiRepoAnalyzer, RepositoryStatus};
pub use record::{LanguageCount, LanguageStatistics, RepositoryInfo, RepositorySummary};
