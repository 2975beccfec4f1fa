//! Bounded same-origin site text fetcher.
//!
//! The fetcher starts from a given URL, performs BFS traversal over
//! same-origin links up to a depth cap, and concatenates the visible text
//! of every page it reaches. It is the "content fetcher" collaborator of
//! the research pipeline and never fails: any error — malformed URL,
//! network trouble, non-2xx response — degrades to less (or no) text.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

use dealscope_shared::{DealScopeError, Result};

/// User-Agent string for fetch requests.
const USER_AGENT: &str = concat!("DealScope/", env!("CARGO_PKG_VERSION"));

/// Per-request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Maximum redirects to follow per request.
const MAX_REDIRECTS: usize = 5;

/// Same-origin site text fetcher with a depth cap.
pub struct SiteFetcher {
    client: Client,
}

impl SiteFetcher {
    /// Create a new fetcher with default HTTP settings.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| DealScopeError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Fetch the visible text of `url` and its same-origin links up to
    /// `max_depth` levels (depth 1 = the start page only).
    ///
    /// Returns the concatenated page texts separated by blank lines, or an
    /// empty string when nothing could be fetched. Never returns an error.
    #[instrument(skip(self))]
    pub async fn fetch_site_text(&self, url: &str, max_depth: u32) -> String {
        let start = match validate_url(url) {
            Some(u) => u,
            None => {
                warn!(url, "invalid URL, skipping fetch");
                return String::new();
            }
        };

        let mut visited: HashSet<String> = HashSet::new();
        let mut all_text: Vec<String> = Vec::new();
        let mut frontier: Vec<Url> = vec![start.clone()];

        info!(url, max_depth, "starting site fetch");

        let mut depth = 1;
        while depth <= max_depth && !frontier.is_empty() {
            let mut next_frontier: Vec<Url> = Vec::new();

            for page_url in frontier {
                let normalized = normalize_url(&page_url);
                if !visited.insert(normalized) {
                    continue;
                }

                debug!(url = %page_url, depth, "fetching page");
                let body = match self.fetch_page(&page_url).await {
                    Some(body) => body,
                    None => continue,
                };

                let doc = Html::parse_document(&body);

                let text = extract_page_text(&doc);
                if !text.is_empty() {
                    all_text.push(text);
                }

                for link in extract_same_origin_links(&doc, &page_url) {
                    if !visited.contains(&normalize_url(&link)) {
                        next_frontier.push(link);
                    }
                }
            }

            frontier = next_frontier;
            depth += 1;
        }

        let result = all_text.join("\n\n");
        info!(
            pages = visited.len(),
            chars = result.len(),
            "site fetch complete"
        );
        result
    }

    /// Fetch a single page body, logging and swallowing any failure.
    async fn fetch_page(&self, url: &Url) -> Option<String> {
        let response = match self.client.get(url.as_str()).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(url = %url, error = %e, "page fetch failed");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, %status, "page fetch returned non-success status");
            return None;
        }

        match response.text().await {
            Ok(body) => Some(body),
            Err(e) => {
                warn!(url = %url, error = %e, "failed to read page body");
                None
            }
        }
    }
}

/// Parse and validate a fetch URL. Only `http(s)` with a host qualifies.
fn validate_url(url: &str) -> Option<Url> {
    let parsed = Url::parse(url).ok()?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return None;
    }
    parsed.host_str()?;
    Some(parsed)
}

/// Extract the visible text of a document, skipping script/style content.
fn extract_page_text(doc: &Html) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for node in doc.tree.nodes() {
        if let scraper::Node::Text(text) = node.value() {
            let in_chrome = node
                .parent()
                .and_then(|p| p.value().as_element().map(|el| el.name()))
                .is_some_and(|name| matches!(name, "script" | "style" | "noscript"));
            if in_chrome {
                continue;
            }
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed);
            }
        }
    }

    parts.join(" ")
}

/// Extract all same-origin links from a document, resolved against the
/// page URL. Fragment-only, `javascript:`, and `mailto:` links are skipped
/// and fragments are stripped from the rest.
fn extract_same_origin_links(doc: &Html, base_url: &Url) -> Vec<Url> {
    let link_sel = Selector::parse("a[href]").expect("valid selector");
    let mut links = Vec::new();

    for el in doc.select(&link_sel) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };

        if href.starts_with('#') || href.starts_with("javascript:") || href.starts_with("mailto:")
        {
            continue;
        }

        let Ok(mut resolved) = base_url.join(href) else {
            continue;
        };
        resolved.set_fragment(None);

        if resolved.host_str() == base_url.host_str()
            && resolved.port_or_known_default() == base_url.port_or_known_default()
        {
            links.push(resolved);
        }
    }

    links
}

/// Normalize a URL for deduplication (strip fragment, trailing slash).
fn normalize_url(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    let mut s = normalized.to_string();
    // Remove trailing slash for consistency (except root path)
    if s.ends_with('/') && s.matches('/').count() > 3 {
        s.pop();
    }
    s
}
