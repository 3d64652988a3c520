//! Rule-based intent classification for code questions.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// What a natural-language question is asking for.
///
/// # Examples
///
/// ```
/// use reposcope_nlq::Intent;
///
/// assert_eq!(Intent::DescribeAuthentication.as_str(), "describe_authentication");
/// assert_eq!(Intent::UnknownIntent.to_string(), "unknown_intent");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    DescribeAuthentication,
    ListDbInteractions,
    GetApiEndpoints,
    TraceDataFlow,
    TraceControlFlow,
    FindEntityUsage,
    SummarizeRepo,
    UnknownIntent,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Intent::DescribeAuthentication => "describe_authentication",
            Intent::ListDbInteractions => "list_db_interactions",
            Intent::GetApiEndpoints => "get_api_endpoints",
            Intent::TraceDataFlow => "trace_data_flow",
            Intent::TraceControlFlow => "trace_control_flow",
            Intent::FindEntityUsage => "find_entity_usage",
            Intent::SummarizeRepo => "summarize_repo",
            Intent::UnknownIntent => "unknown_intent",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intents in the order they are tried. The first with a matching rule wins.
pub const INTENT_PRIORITY: [Intent; 7] = [
    Intent::DescribeAuthentication,
    Intent::ListDbInteractions,
    Intent::GetApiEndpoints,
    Intent::TraceDataFlow,
    Intent::TraceControlFlow,
    Intent::FindEntityUsage,
    Intent::SummarizeRepo,
];

fn patterns(intent: Intent) -> &'static [&'static str] {
    match intent {
        Intent::DescribeAuthentication => &[
            r"\blog ?in\b",
            r"\blog ?out\b",
            r"\bauthenticat\w*",
            r"\bauth\b",
            r"\bauth flow\b",
            r"\bjwt\b",
            r"\bverify credentials\b",
            r"\bpasswords?\b",
            r"\bsign[ -]?in\b",
            r"\bsession tokens?\b",
        ],
        Intent::ListDbInteractions => &[
            r"\bdatabases?\b",
            r"\bdb\b",
            r"\btables?\b",
            r"\bsql\b",
            r"\borm\b",
            r"\bquer(y|ies)\b.*\b(db|database|table)",
            r"\bpersist\w*",
            r"\brepositor(y|ies) pattern\b",
        ],
        Intent::GetApiEndpoints => &[
            r"\bapis?\b",
            r"\bendpoints?\b",
            r"\brest\b.*\bexpos",
            r"\broutes?\b",
            r"\bavailable\b.*\bmethods\b",
            r"\bhttp handlers?\b",
        ],
        Intent::TraceDataFlow => &[
            r"\bdata flows?\b",
            r"\bhow\b.*\bdata\b.*\bmoves?\b",
            r"\btrack\w*\b.*\bdata\b",
            r"\binput\b.*\bto\b.*\boutput\b",
        ],
        Intent::TraceControlFlow => &[
            r"\bcontrol flow\b",
            r"\bcall chains?\b",
            r"\bexecution paths?\b",
            r"\bsequence of calls\b",
        ],
        Intent::FindEntityUsage => &[
            r"\bwhere\b.*\b(class|function|variable|entity|method)\b.*\bused\b",
            r"\busages? of\b",
            r"\breferences to\b",
            r"\bwho uses\b",
            r"\bcallers of\b",
        ],
        Intent::SummarizeRepo => &[
            r"\bsummari[sz]e\b",
            r"\boverview\b",
            r"\bexplain\b.*\brepo",
            r"\bwhat\b.*\bdoes\b.*\brepo\w*\b.*\bdo\b",
        ],
        Intent::UnknownIntent => &[],
    }
}

static RULES: LazyLock<Vec<(Intent, Vec<Regex>)>> = LazyLock::new(|| {
    INTENT_PRIORITY
        .iter()
        .map(|&intent| {
            let rules = patterns(intent)
                .iter()
                .map(|p| Regex::new(p).expect("valid intent pattern"))
                .collect();
            (intent, rules)
        })
        .collect()
});

/// Classify `query`. Pure and deterministic; case-insensitive.
///
/// # Examples
///
/// ```
/// use reposcope_nlq::{classify, Intent};
///
/// assert_eq!(classify("How is login handled?"), Intent::DescribeAuthentication);
/// assert_eq!(classify("Which tables hold orders?"), Intent::ListDbInteractions);
/// assert_eq!(classify("no relevant terms"), Intent::UnknownIntent);
/// ```
pub fn classify(query: &str) -> Intent {
    let query = query.to_lowercase();
    RULES
        .iter()
        .find(|(_, rules)| rules.iter().any(|rule| rule.is_match(&query)))
        .map_or(Intent::UnknownIntent, |(intent, _)| *intent)
}
