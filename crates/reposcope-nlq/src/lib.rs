//! Natural-language questions about indexed code.
//!
//! [`classify`] maps a question to an [`Intent`]; [`NlqEngine`] answers the
//! supported intents with semantic search.

pub mod engine;
pub mod intent;

pub use engine::{Answer, NlqEngine, StructuredAnswer};
pub use intent::{classify, Intent, INTENT_PRIORITY};
