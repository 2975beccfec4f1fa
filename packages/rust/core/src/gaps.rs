//! The knowledge-gap loop: bounded iterative self-improvement of a
//! synthesized analysis.
//!
//! Each round identifies gaps in the current analysis, searches the web to
//! fill them, and re-synthesizes. The loop stops on any of three
//! convergence signals — no gaps identified, no gap could be filled, or an
//! enrichment that changed nothing — or when the round budget runs out.
//! Per-gap search failure is isolated: one failing gap never aborts the
//! round.

use tracing::{error, info, instrument, warn};

use dealscope_model::{ModelClient, ModelTier, Prompt, extract_structured_data, render};
use dealscope_search::{SearchDepth, WebSearchClient};
use dealscope_shared::{KnowledgeGap, SearchAnswer};

use crate::synthesize::enrich_analysis;

/// Identify knowledge gaps in the current analysis.
///
/// Each gap is validated to carry a description and at least one search
/// query; anything else from the model is logged and dropped. Returns an
/// empty vector on model or extraction failure.
pub async fn identify_knowledge_gaps(
    model: &ModelClient,
    query: &str,
    current_analysis: &str,
) -> Vec<KnowledgeGap> {
    if query.trim().is_empty() {
        error!("empty query provided to identify_knowledge_gaps");
        return Vec::new();
    }
    if current_analysis.trim().is_empty() {
        error!("empty analysis provided to identify_knowledge_gaps");
        return Vec::new();
    }

    info!("identifying knowledge gaps in research");
    let prompt = render(
        Prompt::KnowledgeGaps,
        &[("query", query), ("current_analysis", current_analysis)],
    );

    let Some(response) = model.ask(&prompt, ModelTier::Medium).await else {
        warn!("no response from model for knowledge gap identification");
        return Vec::new();
    };

    let Some(value) = extract_structured_data(&response) else {
        warn!("failed to extract structured data from knowledge gaps response");
        return Vec::new();
    };

    gaps_from_value(&value)
}

/// Decode and validate the `knowledge_gaps` array of an extracted value.
fn gaps_from_value(value: &serde_json::Value) -> Vec<KnowledgeGap> {
    let Some(items) = value.get("knowledge_gaps").and_then(|g| g.as_array()) else {
        warn!("missing knowledge_gaps key in response data");
        return Vec::new();
    };

    let mut valid_gaps = Vec::new();
    for item in items {
        match serde_json::from_value::<KnowledgeGap>(item.clone()) {
            Ok(gap) if gap.is_valid() => valid_gaps.push(gap),
            Ok(gap) => warn!(gap_id = gap.gap_id, "skipping invalid knowledge gap"),
            Err(e) => warn!(error = %e, "skipping malformed knowledge gap"),
        }
    }

    info!(count = valid_gaps.len(), "identified valid knowledge gaps");
    valid_gaps
}

/// Research the identified gaps via external web search.
///
/// For each gap the primary query is searched at advanced depth with an
/// answer requested; when that yields no answer, the fallback query (if
/// present) is tried at basic depth. Returns one markdown section per gap
/// that produced an answer.
pub async fn research_gaps(
    search: Option<&WebSearchClient>,
    gaps: &[KnowledgeGap],
) -> Vec<String> {
    if gaps.is_empty() {
        info!("no knowledge gaps provided for research");
        return Vec::new();
    }

    let Some(search) = search else {
        warn!("external search not configured, skipping gap research");
        return Vec::new();
    };

    let mut sections = Vec::new();
    info!(count = gaps.len(), "researching knowledge gaps");

    for gap in gaps {
        let Some(primary_query) = gap.primary_query() else {
            warn!(gap_id = gap.gap_id, "no search queries for knowledge gap");
            continue;
        };

        info!(gap_id = gap.gap_id, description = %gap.description, "processing knowledge gap");

        let mut answer = search
            .search(primary_query, SearchDepth::Advanced, true)
            .await
            .filter(has_answer);

        if answer.is_none() {
            warn!(query = primary_query, "no answer from primary search");
            if let Some(fallback_query) = gap.fallback_query() {
                info!(query = fallback_query, "trying fallback search");
                answer = search
                    .search(fallback_query, SearchDepth::Basic, true)
                    .await
                    .filter(has_answer);
            }
        }

        match answer {
            Some(answer) => {
                sections.push(format_gap_section(&gap.description, &answer));
                info!(description = %gap.description, "added research content for gap");
            }
            None => warn!(description = %gap.description, "failed to research gap"),
        }
    }

    info!(sections = sections.len(), "completed gap research");
    sections
}

fn has_answer(result: &SearchAnswer) -> bool {
    result.answer.as_deref().is_some_and(|a| !a.trim().is_empty())
}

/// Format one researched gap as a markdown section with its sources.
fn format_gap_section(description: &str, result: &SearchAnswer) -> String {
    let mut section = format!(
        "\n\n## {description}\n\n{}\n\n",
        result.answer.as_deref().unwrap_or_default()
    );

    if !result.sources.is_empty() {
        section.push_str("**Sources:**\n");
        for (idx, source) in result.sources.iter().take(3).enumerate() {
            section.push_str(&format!("{}. [{}]({})\n", idx + 1, source.title, source.url));
        }
    }

    section
}

/// Run up to `rounds` rounds of identify → search → incorporate.
///
/// Returns the final analysis. Terminates strictly earlier than the round
/// budget when a round yields no gaps, no usable sections, or an unchanged
/// analysis.
#[instrument(skip_all, fields(rounds = rounds))]
pub async fn deep_research_rounds(
    model: &ModelClient,
    search: Option<&WebSearchClient>,
    query: &str,
    initial_analysis: String,
    rounds: u32,
) -> String {
    if query.trim().is_empty() {
        error!("empty query provided to deep_research_rounds");
        return initial_analysis;
    }
    if initial_analysis.trim().is_empty() {
        error!("empty analysis provided to deep_research_rounds");
        return initial_analysis;
    }

    let rounds = rounds.max(1);
    let mut analysis = initial_analysis;

    info!(rounds, "starting deep research");

    for round in 1..=rounds {
        info!(round, rounds, "starting deep research round");

        let gaps = identify_knowledge_gaps(model, query, &analysis).await;
        if gaps.is_empty() {
            info!(round, "no knowledge gaps found, research complete");
            break;
        }

        let sections = research_gaps(search, &gaps).await;
        if sections.is_empty() {
            info!(round, "no additional content found, research complete");
            break;
        }

        let previous = analysis.clone();
        match enrich_analysis(model, query, &previous, &sections).await {
            Some(enriched) => analysis = enriched,
            None => {
                warn!(round, "enrichment failed, keeping current analysis");
                break;
            }
        }

        if analysis == previous {
            warn!(round, "analysis did not change after incorporation, stopping research");
            break;
        }

        info!(round, "completed deep research round");
    }

    analysis
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_model(server_uri: &str) -> ModelClient {
        unsafe { std::env::set_var("DS_GAPS_TEST_KEY", "test-key") };
        let config = dealscope_shared::ModelConfig {
            api_key_env: "DS_GAPS_TEST_KEY".into(),
            base_url: server_uri.into(),
            ..Default::default()
        };
        ModelClient::new(&config).expect("build model client")
    }

    fn test_search(server_uri: &str) -> WebSearchClient {
        unsafe { std::env::set_var("DS_GAPS_SEARCH_KEY", "test-key") };
        let config = dealscope_shared::SearchConfig {
            api_key_env: "DS_GAPS_SEARCH_KEY".into(),
            base_url: server_uri.into(),
        };
        WebSearchClient::new(&config).expect("build search client")
    }

    fn completion(text: &str) -> serde_json::Value {
        json!({"choices": [{"message": {"role": "assistant", "content": text}}]})
    }

    fn gaps_response(gaps: serde_json::Value) -> serde_json::Value {
        completion(&format!(
            "```json\n{}\n```",
            json!({ "knowledge_gaps": gaps })
        ))
    }

    fn two_gaps() -> serde_json::Value {
        json!([
            {
                "gap_id": 1,
                "description": "Recent funding",
                "search_queries": ["acme funding 2025", "acme series c"]
            },
            {
                "gap_id": 2,
                "description": "Market position",
                "search_queries": ["acme market share robotics"]
            }
        ])
    }

    #[test]
    fn gaps_are_validated_individually() {
        let value = json!({
            "knowledge_gaps": [
                {"gap_id": 1, "description": "Funding", "search_queries": ["q1"]},
                {"gap_id": 2, "description": "", "search_queries": ["q2"]},
                {"gap_id": 3, "description": "No queries", "search_queries": []},
                {"gap_id": 4, "search_queries": ["missing description"]},
                "not even an object"
            ]
        });
        let gaps = gaps_from_value(&value);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].description, "Funding");
    }

    #[test]
    fn missing_gaps_key_is_empty() {
        assert!(gaps_from_value(&json!({"other": []})).is_empty());
    }

    #[test]
    fn gap_section_includes_answer_and_sources() {
        let result = SearchAnswer {
            answer: Some("Acme raised $50M.".into()),
            sources: vec![
                dealscope_shared::SearchSource {
                    title: "News".into(),
                    url: "https://news.example.com/acme".into(),
                },
            ],
        };
        let section = format_gap_section("Recent funding", &result);
        assert!(section.contains("## Recent funding"));
        assert!(section.contains("Acme raised $50M."));
        assert!(section.contains("**Sources:**"));
        assert!(section.contains("[News](https://news.example.com/acme)"));
    }

    #[tokio::test]
    async fn fallback_query_used_when_primary_has_no_answer() {
        let search_server = MockServer::start().await;

        // Primary (advanced) search: no answer.
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_string_contains("advanced"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "answer": "", "results": []
            })))
            .mount(&search_server)
            .await;

        // Fallback (basic) search: answers.
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_string_contains("basic"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "answer": "Raised a Series C in 2025.",
                "results": [{"title": "News", "url": "https://news.example.com/x"}]
            })))
            .mount(&search_server)
            .await;

        let search = test_search(&search_server.uri());
        let gaps = vec![KnowledgeGap {
            gap_id: 1,
            description: "Recent funding".into(),
            search_queries: vec!["primary".into(), "fallback".into()],
        }];

        let sections = research_gaps(Some(&search), &gaps).await;
        assert_eq!(sections.len(), 1);
        assert!(sections[0].contains("Series C"));
    }

    #[tokio::test]
    async fn failing_gap_does_not_abort_round() {
        let search_server = MockServer::start().await;

        // Every query about "funding" fails outright; the rest answer.
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_string_contains("funding"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&search_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "answer": "Acme leads the market.",
                "results": []
            })))
            .mount(&search_server)
            .await;

        let search = test_search(&search_server.uri());
        let gaps = vec![
            KnowledgeGap {
                gap_id: 1,
                description: "Recent funding".into(),
                search_queries: vec!["acme funding".into()],
            },
            KnowledgeGap {
                gap_id: 2,
                description: "Market position".into(),
                search_queries: vec!["acme market share".into()],
            },
        ];

        let sections = research_gaps(Some(&search), &gaps).await;
        assert_eq!(sections.len(), 1);
        assert!(sections[0].contains("Market position"));
    }

    #[tokio::test]
    async fn unconfigured_search_yields_no_sections() {
        let gaps = vec![KnowledgeGap {
            gap_id: 1,
            description: "Anything".into(),
            search_queries: vec!["query".into()],
        }];
        assert!(research_gaps(None, &gaps).await.is_empty());
    }

    #[tokio::test]
    async fn loop_stops_when_second_round_finds_no_gaps() {
        let model_server = MockServer::start().await;
        let search_server = MockServer::start().await;

        // Round 1: two gaps. Round 2: none.
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("CURRENT RESEARCH"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gaps_response(two_gaps())))
            .up_to_n_times(1)
            .mount(&model_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("CURRENT RESEARCH"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gaps_response(json!([]))))
            .mount(&model_server)
            .await;

        // Enrichment call.
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("NEW INFORMATION"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion("# Enriched analysis")),
            )
            .mount(&model_server)
            .await;

        // Every gap search answers.
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "answer": "Useful fact.",
                "results": [{"title": "Source", "url": "https://example.com/s"}]
            })))
            .mount(&search_server)
            .await;

        let model = test_model(&model_server.uri());
        let search = test_search(&search_server.uri());

        let final_analysis = deep_research_rounds(
            &model,
            Some(&search),
            "What does Acme do?",
            "# Initial analysis".into(),
            3,
        )
        .await;

        assert_eq!(final_analysis, "# Enriched analysis");

        // Gap identification ran exactly twice: round 1 found gaps,
        // round 2 found none and stopped the loop.
        let identify_calls = model_server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| String::from_utf8_lossy(&r.body).contains("CURRENT RESEARCH"))
            .count();
        assert_eq!(identify_calls, 2);
    }

    #[tokio::test]
    async fn loop_stops_on_unchanged_analysis() {
        let model_server = MockServer::start().await;
        let search_server = MockServer::start().await;

        let initial = "# Stable analysis";

        // Gap identification always finds a gap.
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("CURRENT RESEARCH"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gaps_response(two_gaps())))
            .mount(&model_server)
            .await;

        // Enrichment returns the input unchanged.
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("NEW INFORMATION"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(initial)))
            .mount(&model_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "answer": "Fact.", "results": []
            })))
            .mount(&search_server)
            .await;

        let model = test_model(&model_server.uri());
        let search = test_search(&search_server.uri());

        let final_analysis =
            deep_research_rounds(&model, Some(&search), "query", initial.into(), 5).await;
        assert_eq!(final_analysis, initial);

        // Only one round ran despite the budget of 5.
        let identify_calls = model_server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| String::from_utf8_lossy(&r.body).contains("CURRENT RESEARCH"))
            .count();
        assert_eq!(identify_calls, 1);
    }

    #[tokio::test]
    async fn loop_is_bounded_by_round_budget() {
        let model_server = MockServer::start().await;
        let search_server = MockServer::start().await;

        // Gaps are always found and enrichment always changes the text,
        // so only the budget can stop the loop.
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("CURRENT RESEARCH"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gaps_response(two_gaps())))
            .mount(&model_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("NEW INFORMATION"))
            .respond_with(move |req: &wiremock::Request| {
                // Vary the enrichment output per call so the unchanged-analysis
                // signal never fires.
                let len = req.body.len();
                ResponseTemplate::new(200)
                    .set_body_json(completion(&format!("analysis v{len}")))
            })
            .mount(&model_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "answer": "Fact.", "results": []
            })))
            .mount(&search_server)
            .await;

        let model = test_model(&model_server.uri());
        let search = test_search(&search_server.uri());

        let _final =
            deep_research_rounds(&model, Some(&search), "query", "# Initial".into(), 2).await;

        let identify_calls = model_server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| String::from_utf8_lossy(&r.body).contains("CURRENT RESEARCH"))
            .count();
        assert_eq!(identify_calls, 2);
    }
}
