use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{ChatError, Result};

pub const MIN_RESULTS: i64 = 1;
pub const MAX_RESULTS: i64 = 10;
pub const DEFAULT_MAX_RESULTS: i64 = 5;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    #[default]
    Basic,
    Advanced,
}

impl FromStr for SearchDepth {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "basic" => Ok(SearchDepth::Basic),
            "advanced" => Ok(SearchDepth::Advanced),
            other => Err(ChatError::validation(
                "search_depth",
                format!("expected 'basic' or 'advanced', got '{other}'"),
            )),
        }
    }
}

/// A validated search request. The only way to get one is through a
/// constructor that checks every field, so a `SearchRequest` that exists is
/// always safe to dispatch.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    query: String,
    max_results: u8,
    search_depth: SearchDepth,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, max_results: i64, search_depth: &str) -> Result<Self> {
        let query = query.into();
        if query.trim().is_empty() {
            return Err(ChatError::validation("query", "must not be empty"));
        }
        if !(MIN_RESULTS..=MAX_RESULTS).contains(&max_results) {
            return Err(ChatError::validation(
                "max_results",
                format!("must be between {MIN_RESULTS} and {MAX_RESULTS}, got {max_results}"),
            ));
        }
        let search_depth: SearchDepth = search_depth.parse()?;

        Ok(SearchRequest {
            query,
            max_results: max_results as u8,
            search_depth,
        })
    }

    /// `max_results = 5`, `search_depth = basic`.
    pub fn with_defaults(query: impl Into<String>) -> Result<Self> {
        Self::new(query, DEFAULT_MAX_RESULTS, "basic")
    }

    /// Build a request from tool-call arguments produced by the LLM.
    /// Integers are accepted as JSON numbers (`3` or `3.0`) or numeric
    /// strings, since smaller models are loose about argument types.
    pub fn from_arguments(args: &Value) -> Result<Self> {
        let args = args
            .as_object()
            .ok_or_else(|| ChatError::validation("arguments", "expected a JSON object"))?;

        let query = match args.get("query") {
            Some(Value::String(q)) => q.clone(),
            Some(_) => return Err(ChatError::validation("query", "must be a string")),
            None => return Err(ChatError::validation("query", "is required")),
        };

        let max_results = match args.get("max_results") {
            None | Some(Value::Null) => DEFAULT_MAX_RESULTS,
            Some(Value::Number(n)) => whole_number(n)
                .ok_or_else(|| ChatError::validation("max_results", "must be an integer"))?,
            Some(Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| ChatError::validation("max_results", "must be an integer"))?,
            Some(_) => return Err(ChatError::validation("max_results", "must be an integer")),
        };

        let search_depth = match args.get("search_depth") {
            None | Some(Value::Null) => "basic",
            Some(Value::String(s)) => s.as_str(),
            Some(_) => return Err(ChatError::validation("search_depth", "must be a string")),
        };

        Self::new(query, max_results, search_depth)
    }

    /// JSON schema advertised to the LLM for the search tool's parameters.
    pub fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query string"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return",
                    "minimum": MIN_RESULTS,
                    "maximum": MAX_RESULTS,
                    "default": DEFAULT_MAX_RESULTS
                },
                "search_depth": {
                    "type": "string",
                    "description": "Search depth: 'basic' or 'advanced'",
                    "enum": ["basic", "advanced"],
                    "default": "basic"
                }
            },
            "required": ["query"]
        })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn max_results(&self) -> u8 {
        self.max_results
    }

    pub fn search_depth(&self) -> SearchDepth {
        self.search_depth
    }
}

fn whole_number(n: &serde_json::Number) -> Option<i64> {
    n.as_i64().or_else(|| {
        n.as_f64()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

/// One search hit, in the order the provider ranked it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
}

impl SearchHit {
    pub fn new(title: impl Into<String>, url: impl Into<String>, content: impl Into<String>) -> Self {
        SearchHit {
            title: title.into(),
            url: url.into(),
            content: content.into(),
        }
    }
}

/// The two participants of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// LLM-backed; answers or asks for a tool.
    Requester,
    /// Relays the user's text and runs tools; never writes prose itself.
    Executor,
}

/// A tool call as the backend asked for it. The arguments stay raw until
/// the executor has resolved `tool_name`, since only the resolved tool knows
/// what shape they must have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocationRequest {
    /// Backend-assigned id, echoed back with the result.
    pub call_id: String,
    pub tool_name: String,
    pub arguments: Value,
}

impl ToolInvocationRequest {
    pub fn new(call_id: impl Into<String>, tool_name: impl Into<String>, arguments: Value) -> Self {
        ToolInvocationRequest {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }

    pub fn arguments_json(&self) -> String {
        self.arguments.to_string()
    }
}

/// Renders the raw directive, e.g. `tavily_search({"query":"rust"})`.
impl fmt::Display for ToolInvocationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.tool_name, self.arguments_json())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub call_id: String,
    pub tool_name: String,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Text(String),
    ToolCall(ToolInvocationRequest),
    ToolResult(ToolResult),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub speaker: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn text(speaker: Role, text: impl Into<String>) -> Message {
        Message {
            speaker,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn tool_call(request: ToolInvocationRequest) -> Message {
        Message {
            speaker: Role::Requester,
            content: MessageContent::ToolCall(request),
        }
    }

    pub fn tool_result(result: ToolResult) -> Message {
        Message {
            speaker: Role::Executor,
            content: MessageContent::ToolResult(result),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// What the backend gave back for one Requester turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    PlainText(String),
    ToolCall(ToolInvocationRequest),
}

impl From<Reply> for Message {
    fn from(reply: Reply) -> Message {
        match reply {
            Reply::PlainText(text) => Message::text(Role::Requester, text),
            Reply::ToolCall(request) => Message::tool_call(request),
        }
    }
}

#[test]
fn test_search_depth_parse() {
    assert_eq!("basic".parse::<SearchDepth>().unwrap(), SearchDepth::Basic);
    assert_eq!("advanced".parse::<SearchDepth>().unwrap(), SearchDepth::Advanced);
    assert!("Basic".parse::<SearchDepth>().is_err());
    assert!("deep".parse::<SearchDepth>().is_err());
}

#[test]
fn test_directive_rendering() {
    let request = ToolInvocationRequest::new("call_1", "tavily_search", json!({"query": "rust"}));
    assert_eq!(request.to_string(), r#"tavily_search({"query":"rust"})"#);
}

#[test]
fn test_whole_float_counts_as_integer() {
    let request = SearchRequest::from_arguments(&json!({"query": "rust", "max_results": 3.0})).unwrap();
    assert_eq!(request.max_results(), 3);

    for bad in [json!(2.5), json!(1e300)] {
        let err = SearchRequest::from_arguments(&json!({"query": "rust", "max_results": bad}));
        assert!(matches!(err, Err(ChatError::Validation { field: "max_results", .. })));
    }
}
