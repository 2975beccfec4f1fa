//! Knowledge-base query stage.
//!
//! Reformulates the user query into two complementary search phrasings,
//! retrieves excerpts for each, and formats them into titled markdown
//! sections. The whole stage is non-fatal: anything that goes wrong
//! surfaces as `None` and the job proceeds without internal evidence.

use tracing::{info, warn};

use dealscope_model::{ModelClient, ModelTier, Prompt, extract_structured_data, render};
use dealscope_search::KnowledgeBaseClient;
use dealscope_shared::KbExcerpt;

/// Reformulate the user query into optimized knowledge-base search queries.
///
/// Returns an empty vector when the model or extraction produced nothing —
/// the caller then falls back to the original query.
pub async fn reformulate_query(model: &ModelClient, query: &str) -> Vec<String> {
    if query.trim().is_empty() {
        warn!("empty query provided to reformulate_query");
        return Vec::new();
    }

    info!("reformulating user query for knowledge base search");
    let prompt = render(Prompt::QueryReformulation, &[("query", query)]);

    let Some(response) = model.ask(&prompt, ModelTier::Medium).await else {
        warn!("no response from model for query reformulation");
        return Vec::new();
    };

    let Some(value) = extract_structured_data(&response) else {
        warn!("failed to extract structured data from reformulation response");
        return Vec::new();
    };

    let queries: Vec<String> = value
        .get("reformulated_queries")
        .and_then(|q| q.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .filter(|s| !s.trim().is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    if queries.is_empty() {
        warn!("no reformulated queries found in response");
    } else {
        info!(count = queries.len(), "reformulated query");
    }
    queries
}

/// Query the internal knowledge base and format the results.
///
/// Each reformulated phrasing is searched with a bounded result count and
/// the merged excerpts come back as `### Result N: <source>` sections.
/// Returns `None` when the knowledge base is disabled or nothing usable
/// was found.
pub async fn query_knowledge_base(
    model: &ModelClient,
    kb: Option<&KnowledgeBaseClient>,
    query: &str,
    max_results: u32,
) -> Option<String> {
    if query.trim().is_empty() {
        warn!("empty query provided to query_knowledge_base");
        return None;
    }

    let kb = match kb {
        Some(kb) => kb,
        None => {
            info!("knowledge base not configured, skipping retrieval");
            return None;
        }
    };

    let reformulated = reformulate_query(model, query).await;
    let queries = if reformulated.is_empty() {
        warn!("query reformulation failed, using original query");
        vec![query.to_string()]
    } else {
        reformulated
    };

    let mut all_results: Vec<KbExcerpt> = Vec::new();
    for (idx, search_query) in queries.iter().enumerate() {
        info!(idx = idx + 1, query = %search_query, "searching knowledge base");
        let excerpts = kb.retrieve(search_query, max_results).await;
        if excerpts.is_empty() {
            warn!(query = %search_query, "no results for reformulated query");
        }
        all_results.extend(excerpts);
    }

    if all_results.is_empty() {
        info!("no relevant information found in knowledge base");
        return None;
    }

    info!(count = all_results.len(), "retrieved insights from knowledge base");
    Some(format_excerpts(&all_results))
}

/// Format excerpts as titled markdown sections with source attribution.
fn format_excerpts(excerpts: &[KbExcerpt]) -> String {
    excerpts
        .iter()
        .enumerate()
        .map(|(i, excerpt)| {
            format!("### Result {}: {}\n{}\n", i + 1, excerpt.source, excerpt.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
