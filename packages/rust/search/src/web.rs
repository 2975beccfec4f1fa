//! External web-search client.
//!
//! Thin client over a Tavily-style search API. The contract is total:
//! no-match, HTTP failure, and decode failure all surface as `None`, so a
//! failing search never aborts the stage using it.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use dealscope_shared::config::SearchConfig;
use dealscope_shared::{DealScopeError, Result, SearchAnswer, SearchSource, api_key_from_env};

/// Maximum sources attached to one answer.
const MAX_SOURCES: usize = 3;

/// Per-request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Search thoroughness requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDepth {
    Basic,
    Advanced,
}

impl SearchDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Advanced => "advanced",
        }
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    search_depth: &'static str,
    include_answer: bool,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Client for the external web-search API.
pub struct WebSearchClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl WebSearchClient {
    /// Build a client from config, reading the API key from the configured
    /// environment variable.
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let api_key = api_key_from_env(&config.api_key_env).ok_or_else(|| {
            DealScopeError::config(format!(
                "search API key not found. Set the {} environment variable.",
                config.api_key_env
            ))
        })?;

        let client = Client::builder()
            .user_agent(concat!("DealScope/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| DealScopeError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Run one web search. Returns the provider's answer with up to three
    /// sources, or `None` when there is no usable answer.
    pub async fn search(
        &self,
        query: &str,
        depth: SearchDepth,
        want_answer: bool,
    ) -> Option<SearchAnswer> {
        if query.trim().is_empty() {
            warn!("empty query provided to web search");
            return None;
        }

        info!(query, depth = depth.as_str(), "searching the web");

        let request = SearchRequest {
            query,
            search_depth: depth.as_str(),
            include_answer: want_answer,
            max_results: MAX_SOURCES,
        };

        let response = match self
            .client
            .post(format!("{}/search", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(query, error = %e, "web search request failed");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(query, %status, "web search returned non-success status");
            return None;
        }

        let decoded: SearchResponse = match response.json().await {
            Ok(d) => d,
            Err(e) => {
                warn!(query, error = %e, "failed to decode web search response");
                return None;
            }
        };

        let answer = decoded.answer.filter(|a| !a.trim().is_empty());
        let sources: Vec<SearchSource> = decoded
            .results
            .into_iter()
            .filter_map(|r| {
                Some(SearchSource {
                    title: r.title.unwrap_or_else(|| "Untitled".into()),
                    url: r.url?,
                })
            })
            .take(MAX_SOURCES)
            .collect();

        if answer.is_none() && sources.is_empty() {
            info!(query, "web search produced no usable result");
            return None;
        }

        Some(SearchAnswer { answer, sources })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server_uri: &str) -> WebSearchClient {
        unsafe { std::env::set_var("DS_SEARCH_TEST_KEY", "test-key") };
        let config = SearchConfig {
            api_key_env: "DS_SEARCH_TEST_KEY".into(),
            base_url: server_uri.into(),
        };
        WebSearchClient::new(&config).expect("build client")
    }

    #[tokio::test]
    async fn search_decodes_answer_and_sources() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(json!({
                "search_depth": "advanced",
                "include_answer": true,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "answer": "Acme raised a Series C in 2025.",
                "results": [
                    {"title": "Acme funding news", "url": "https://news.example.com/acme"},
                    {"title": "Press release", "url": "https://acme.example.com/press"},
                    {"url": "https://untitled.example.com/x"},
                    {"title": "Fourth source", "url": "https://extra.example.com/y"}
                ]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let result = client
            .search("acme funding 2025", SearchDepth::Advanced, true)
            .await
            .expect("search result");

        assert_eq!(result.answer.as_deref(), Some("Acme raised a Series C in 2025."));
        assert_eq!(result.sources.len(), 3);
        assert_eq!(result.sources[0].title, "Acme funding news");
        assert_eq!(result.sources[2].title, "Untitled");
    }

    #[tokio::test]
    async fn server_error_yields_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        assert!(client.search("query", SearchDepth::Basic, true).await.is_none());
    }

    #[tokio::test]
    async fn empty_answer_and_results_yield_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "answer": "",
                "results": []
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        assert!(client.search("query", SearchDepth::Basic, true).await.is_none());
    }

    #[tokio::test]
    async fn empty_query_short_circuits() {
        let server = MockServer::start().await;
        let client = test_client(&server.uri());
        assert!(client.search("  ", SearchDepth::Basic, true).await.is_none());
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
