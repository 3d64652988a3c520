//! Answers natural-language questions by routing them to semantic search.

use reposcope_core::{EntityKind, QueryResult, ScopeError};
use reposcope_search::{SearchFilter, SemanticSearchEngine};
use serde::{Deserialize, Serialize};

use crate::intent::{classify, Intent};

/// How one supported intent is answered.
struct Handler {
    intent: Intent,
    top_k: usize,
    kinds: &'static [EntityKind],
    header: &'static str,
    empty: &'static str,
}

const HANDLERS: &[Handler] = &[
    Handler {
        intent: Intent::DescribeAuthentication,
        top_k: 5,
        kinds: &[],
        header: "Authentication-related code found:",
        empty: "No authentication-related logic found.",
    },
    Handler {
        intent: Intent::ListDbInteractions,
        top_k: 5,
        kinds: &[],
        header: "Database interaction code found:",
        empty: "No database interaction code found.",
    },
    Handler {
        intent: Intent::GetApiEndpoints,
        top_k: 10,
        kinds: &[EntityKind::ApiEndpoint],
        header: "API endpoints found:",
        empty: "No API endpoints found.",
    },
    Handler {
        intent: Intent::FindEntityUsage,
        top_k: 10,
        kinds: &[],
        header: "Possible usages found:",
        empty: "No matching usages found.",
    },
];

/// Machine-readable answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredAnswer {
    pub intent: Intent,
    pub matches: Vec<QueryResult>,
    /// Set only when the intent is not supported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// An answer, as text or as a structured record.
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Text(String),
    Structured(StructuredAnswer),
}

impl Answer {
    /// Render for display: text as is, structured answers as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::Serialization`] if JSON encoding fails.
    pub fn render(&self) -> Result<String, ScopeError> {
        match self {
            Answer::Text(text) => Ok(text.clone()),
            Answer::Structured(answer) => Ok(serde_json::to_string_pretty(answer)?),
        }
    }
}

/// Routes questions to intent handlers.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use reposcope_core::EmbeddingConfig;
/// use reposcope_nlq::{Answer, NlqEngine};
/// use reposcope_search::{EmbeddingProvider, SemanticSearchEngine};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let provider = EmbeddingProvider::new(EmbeddingConfig::default()).unwrap();
/// let search = SemanticSearchEngine::new(Arc::new(provider), None, 200);
/// let answer = NlqEngine::new().answer("How is login handled?", &search, false).await.unwrap();
/// assert_eq!(answer, Answer::Text("No authentication-related logic found.".into()));
/// # });
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct NlqEngine;

impl NlqEngine {
    pub fn new() -> Self {
        Self
    }

    /// Whether `intent` has a handler.
    pub fn supports(&self, intent: Intent) -> bool {
        HANDLERS.iter().any(|h| h.intent == intent)
    }

    /// Classify `query` and answer it from `search`.
    ///
    /// Unsupported intents get an explicit "not supported" answer naming the
    /// intent rather than an error.
    ///
    /// # Errors
    ///
    /// Returns the search error if the query cannot be embedded.
    pub async fn answer(
        &self,
        query: &str,
        search: &SemanticSearchEngine,
        json_output: bool,
    ) -> Result<Answer, ScopeError> {
        let intent = classify(query);
        tracing::debug!(%intent, "classified question");

        let Some(handler) = HANDLERS.iter().find(|h| h.intent == intent) else {
            let message =
                format!("Sorry, I couldn't understand or support this question yet. Intent: {intent}");
            return Ok(if json_output {
                Answer::Structured(StructuredAnswer {
                    intent,
                    matches: Vec::new(),
                    message: Some(message),
                })
            } else {
                Answer::Text(message)
            });
        };

        let filter = (!handler.kinds.is_empty())
            .then(|| SearchFilter::default().with_kinds(handler.kinds.iter().copied()));
        let matches = search.search(query, handler.top_k, filter.as_ref()).await?;

        if json_output {
            return Ok(Answer::Structured(StructuredAnswer {
                intent,
                matches,
                message: None,
            }));
        }
        if matches.is_empty() {
            return Ok(Answer::Text(handler.empty.to_string()));
        }
        Ok(Answer::Text(format_results(handler.header, &matches)))
    }
}

fn format_results(header: &str, results: &[QueryResult]) -> String {
    let mut lines = vec![header.to_string()];
    for r in results {
        lines.push(format!(
            "{} (lines {}-{}): {}",
            r.file.display(),
            r.start_line,
            r.end_line,
            r.summary
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use reposcope_core::{CodeChunk, EmbeddingConfig, Fingerprint};
    use reposcope_search::{EmbeddingProvider, RepositoryRef};

    use super::*;

    async fn indexed_engine() -> SemanticSearchEngine {
        let provider = EmbeddingProvider::new(EmbeddingConfig::default()).unwrap();
        let engine = SemanticSearchEngine::new(Arc::new(provider), None, 200);
        let login = CodeChunk::new(
            PathBuf::from("shop/auth.py"),
            3,
            5,
            "def login(user, password):\n    return check_password(user, password)",
        )
        .unwrap();
        let mut route = CodeChunk::new(
            PathBuf::from("shop/api.py"),
            10,
            12,
            "@app.get('/products')\ndef products():\n    return []",
        )
        .unwrap();
        route.kind = EntityKind::ApiEndpoint;
        let repo = RepositoryRef {
            id: "shop".into(),
            fingerprint: Fingerprint::new("aa").unwrap(),
        };
        engine
            .index(&repo, &[Arc::new(login), Arc::new(route)])
            .await
            .unwrap();
        engine
    }

    #[tokio::test]
    async fn auth_question_lists_matches_under_header() {
        let engine = indexed_engine().await;
        let answer = NlqEngine::new()
            .answer("How does the login functionality work?", &engine, false)
            .await
            .unwrap();
        let Answer::Text(text) = answer else {
            panic!("expected text answer");
        };
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Authentication-related code found:"));
        assert!(lines
            .next()
            .unwrap()
            .starts_with("shop/auth.py (lines 3-5): def login(user, password):"));
    }

    #[tokio::test]
    async fn endpoint_question_only_returns_endpoints() {
        let engine = indexed_engine().await;
        let answer = NlqEngine::new()
            .answer("Which API endpoints exist?", &engine, true)
            .await
            .unwrap();
        let Answer::Structured(answer) = answer else {
            panic!("expected structured answer");
        };
        assert_eq!(answer.intent, Intent::GetApiEndpoints);
        assert_eq!(answer.matches.len(), 1);
        assert_eq!(answer.matches[0].file, PathBuf::from("shop/api.py"));
        assert!(answer.message.is_none());
    }

    #[tokio::test]
    async fn empty_results_use_intent_message() {
        let provider = EmbeddingProvider::new(EmbeddingConfig::default()).unwrap();
        let engine = SemanticSearchEngine::new(Arc::new(provider), None, 200);
        let nlq = NlqEngine::new();
        let cases = [
            ("Which tables exist?", "No database interaction code found."),
            ("List the routes", "No API endpoints found."),
            ("Who uses parse_config", "No matching usages found."),
        ];
        for (query, expected) in cases {
            let answer = nlq.answer(query, &engine, false).await.unwrap();
            assert_eq!(answer, Answer::Text(expected.into()), "{query}");
        }
    }

    #[tokio::test]
    async fn unsupported_intent_names_the_intent() {
        let engine = indexed_engine().await;
        let nlq = NlqEngine::new();

        let text = nlq.answer("no relevant terms", &engine, false).await.unwrap();
        assert_eq!(
            text,
            Answer::Text(
                "Sorry, I couldn't understand or support this question yet. Intent: unknown_intent"
                    .into()
            )
        );

        let structured = nlq.answer("Explain control flow", &engine, true).await.unwrap();
        let json = structured.render().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["intent"], "trace_control_flow");
        assert_eq!(value["matches"].as_array().unwrap().len(), 0);
        assert!(value["message"].as_str().unwrap().ends_with("Intent: trace_control_flow"));
    }

    #[tokio::test]
    async fn structured_answer_omits_message_when_supported() {
        let engine = indexed_engine().await;
        let answer = NlqEngine::new()
            .answer("login", &engine, true)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&answer.render().unwrap()).unwrap();
        assert!(value.get("message").is_none());
        let first = &value["matches"][0];
        for field in ["file", "start_line", "end_line", "summary", "score"] {
            assert!(first.get(field).is_some(), "missing {field}");
        }
    }

    #[test]
    fn supported_intents() {
        let nlq = NlqEngine::new();
        assert!(nlq.supports(Intent::GetApiEndpoints));
        assert!(!nlq.supports(Intent::SummarizeRepo));
        assert!(!nlq.supports(Intent::UnknownIntent));
    }
}
