//! Internal knowledge-base retrieval client.
//!
//! Retrieves labeled excerpts from an internal retrieval service. Like the
//! web-search client, retrieval is total: failures and empty result sets
//! both come back as an empty vector, leaving the fatal/non-fatal decision
//! to the calling stage.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use dealscope_shared::config::KnowledgeBaseConfig;
use dealscope_shared::{DealScopeError, KbExcerpt, Result};

/// Source label used when a result carries no metadata.
const DEFAULT_SOURCE: &str = "Internal document";

/// Per-request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
struct RetrieveRequest<'a> {
    index: &'a str,
    query: &'a str,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct RetrieveResponse {
    #[serde(default)]
    results: Vec<RetrieveResult>,
}

#[derive(Debug, Deserialize)]
struct RetrieveResult {
    #[serde(default)]
    content: RetrieveContent,
    #[serde(default)]
    metadata: RetrieveMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct RetrieveContent {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct RetrieveMetadata {
    #[serde(default)]
    source: Option<String>,
}

/// Client for the internal knowledge-base retrieval endpoint.
pub struct KnowledgeBaseClient {
    client: Client,
    base_url: String,
    index: String,
}

impl KnowledgeBaseClient {
    /// Build a client from config. Returns `Ok(None)` when no base URL is
    /// configured — the knowledge-base stage is then disabled.
    pub fn new(config: &KnowledgeBaseConfig) -> Result<Option<Self>> {
        if config.base_url.trim().is_empty() {
            info!("knowledge base not configured, retrieval disabled");
            return Ok(None);
        }

        let client = Client::builder()
            .user_agent(concat!("DealScope/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| DealScopeError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Some(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            index: config.index.clone(),
        }))
    }

    /// Retrieve up to `max_results` excerpts for a query. Failures and
    /// no-match both yield an empty vector.
    pub async fn retrieve(&self, query: &str, max_results: u32) -> Vec<KbExcerpt> {
        if query.trim().is_empty() {
            warn!("empty query provided to knowledge base retrieval");
            return Vec::new();
        }

        info!(query, index = %self.index, "querying knowledge base");

        let request = RetrieveRequest {
            index: &self.index,
            query,
            max_results,
        };

        let response = match self
            .client
            .post(format!("{}/retrieve", self.base_url))
            .json(&request)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(query, error = %e, "knowledge base request failed");
                return Vec::new();
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(query, %status, "knowledge base returned non-success status");
            return Vec::new();
        }

        let decoded: RetrieveResponse = match response.json().await {
            Ok(d) => d,
            Err(e) => {
                warn!(query, error = %e, "failed to decode knowledge base response");
                return Vec::new();
            }
        };

        let excerpts: Vec<KbExcerpt> = decoded
            .results
            .into_iter()
            .filter(|r| !r.content.text.trim().is_empty())
            .map(|r| KbExcerpt {
                text: r.content.text,
                source: r.metadata.source.unwrap_or_else(|| DEFAULT_SOURCE.into()),
            })
            .collect();

        info!(query, count = excerpts.len(), "knowledge base retrieval complete");
        excerpts
    }
}
