use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::config::SearchConfig;
use crate::data_models::{SearchHit, SearchRequest};
use crate::error::{ChatError, Result};

pub const SEARCH_TOOL_NAME: &str = "tavily_search";
pub const SEARCH_TOOL_DESCRIPTION: &str = "A tool to search the internet using the Tavily API";

/// A web-search backend. One call per invocation, no retries.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>>;
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

pub struct TavilyClient {
    client: reqwest::Client,
    config: SearchConfig,
}

impl TavilyClient {
    pub fn new(config: SearchConfig) -> TavilyClient {
        TavilyClient {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/search", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SearchProvider for TavilyClient {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| ChatError::Credential("TAVILY_API_KEY is not set".to_string()))?;

        let res = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| ChatError::ToolExecution(format!("search request failed: {e}")))?;

        let status = res.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = res.text().await.unwrap_or_default();
            return Err(ChatError::Credential(format!("Tavily rejected the API key ({status}): {body}")));
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ChatError::ToolExecution(format!("Tavily returned {status}: {body}")));
        }

        let body: TavilyResponse = res
            .json()
            .await
            .map_err(|e| ChatError::ToolExecution(format!("malformed Tavily response: {e}")))?;
        Ok(body.results)
    }
}

/// The search tool the executor runs on the requester's behalf.
pub struct SearchTool {
    provider: Arc<dyn SearchProvider>,
}

impl SearchTool {
    pub fn new(provider: Arc<dyn SearchProvider>) -> SearchTool {
        SearchTool { provider }
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<String> {
        tracing::info!(
            query = request.query(),
            max_results = request.max_results(),
            "running web search"
        );
        let hits = self.provider.search(request).await.inspect_err(|e| {
            tracing::warn!("search provider failed: {e}");
        })?;
        tracing::debug!("search returned {} hits", hits.len());
        Ok(render_hits(&hits))
    }
}

/// Three lines per hit, a blank line between hits, provider order kept.
pub fn render_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| format!("Title: {}\nURL: {}\nContent: {}", hit.title, hit.url, hit.content))
        .collect::<Vec<String>>()
        .join("\n\n")
}

#[test]
fn test_render_hits() {
    assert_eq!(render_hits(&[]), "");

    let one = vec![SearchHit::new("Rust", "https://rust-lang.org", "A language")];
    assert_eq!(
        render_hits(&one),
        "Title: Rust\nURL: https://rust-lang.org\nContent: A language"
    );

    let two = vec![
        SearchHit::new("A", "https://a.example", "first"),
        SearchHit::new("B", "https://b.example", "second"),
    ];
    assert_eq!(
        render_hits(&two),
        "Title: A\nURL: https://a.example\nContent: first\n\nTitle: B\nURL: https://b.example\nContent: second"
    );
}

#[test]
fn test_tavily_response_ignores_extra_fields() {
    let body = r#"{
        "query": "rust",
        "response_time": 0.4,
        "results": [
            {"title": "Rust", "url": "https://rust-lang.org", "content": "fast", "score": 0.9}
        ]
    }"#;
    let parsed: TavilyResponse = serde_json::from_str(body).unwrap();
    assert_eq!(parsed.results, vec![SearchHit::new("Rust", "https://rust-lang.org", "fast")]);

    let empty: TavilyResponse = serde_json::from_str(r#"{"query": "rust"}"#).unwrap();
    assert!(empty.results.is_empty());
}
