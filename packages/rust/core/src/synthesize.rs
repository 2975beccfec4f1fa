//! Answer synthesis.
//!
//! Two entry points share one underlying large-tier call: initial
//! synthesis from the gathered evidence bundle, and enrichment synthesis
//! that folds newly researched sections into a prior analysis. Both return
//! `None` on model failure so the caller can keep its prior state. The
//! no-company fallback reply lives here too — it degrades to a canned
//! apology rather than failing the job.

use tracing::{error, info, warn};

use dealscope_model::{ModelClient, ModelTier, Prompt, render};
use dealscope_shared::EvidenceBundle;

/// Placeholder used when one evidence text is empty.
const NO_REFERENCE_CONTENT: &str = "No reference page content available";
const NO_SITE_CONTENT: &str = "No company website content available";

/// Canned reply when even the fallback model call fails.
const FALLBACK_OF_LAST_RESORT: &str =
    "I'm sorry, but I can only provide information about specific portfolio companies.";

/// Generate the initial analysis from query + evidence bundle.
///
/// Requires at least one non-empty evidence text; returns `None` on empty
/// evidence or model failure.
pub async fn initial_analysis(
    model: &ModelClient,
    query: &str,
    bundle: &EvidenceBundle,
) -> Option<String> {
    if query.trim().is_empty() {
        error!("empty query provided to initial_analysis");
        return None;
    }
    if bundle.is_empty() {
        error!("no evidence provided to initial_analysis");
        return None;
    }

    info!("analyzing collected company information");

    let kb_data_section = match &bundle.knowledge_base {
        Some(kb_data) => format!(
            "## INTERNAL KNOWLEDGE BASE DATA\n{kb_data}\n\n_This information was retrieved from the internal knowledge base_\n"
        ),
        None => String::new(),
    };

    let reference_content = if bundle.reference_text.trim().is_empty() {
        NO_REFERENCE_CONTENT
    } else {
        bundle.reference_text.as_str()
    };
    let site_content = if bundle.site_text.trim().is_empty() {
        NO_SITE_CONTENT
    } else {
        bundle.site_text.as_str()
    };

    let prompt = render(
        Prompt::WebSummary,
        &[
            ("query", query),
            ("reference_content", reference_content),
            ("site_content", site_content),
            ("kb_data_section", &kb_data_section),
        ],
    );

    let response = model.ask(&prompt, ModelTier::Large).await;
    match &response {
        Some(text) => info!(chars = text.len(), "generated analysis"),
        None => error!("failed to get response from model for analysis"),
    }
    response
}

/// Integrate newly researched sections into the current analysis.
///
/// Returns the enriched analysis, or `None` on model failure (the caller
/// must keep the prior analysis in that case).
pub async fn enrich_analysis(
    model: &ModelClient,
    query: &str,
    current_analysis: &str,
    new_sections: &[String],
) -> Option<String> {
    if current_analysis.trim().is_empty() {
        error!("empty analysis provided to enrich_analysis");
        return None;
    }
    if new_sections.is_empty() {
        info!("no new sections to incorporate, keeping current analysis");
        return Some(current_analysis.to_string());
    }

    info!(sections = new_sections.len(), "enriching analysis with new research");

    let mut new_information = String::from(
        "\n\n# Additional Research\n\nThe following sections contain additional information gathered from external sources to enhance this analysis:",
    );
    for section in new_sections {
        new_information.push_str(section);
    }

    let prompt = render(
        Prompt::EnrichResearch,
        &[
            ("query", query),
            ("current_analysis", current_analysis),
            ("new_information", &new_information),
        ],
    );

    let response = model.ask(&prompt, ModelTier::Large).await;
    match &response {
        Some(text) => info!(
            previous_chars = current_analysis.len(),
            chars = text.len(),
            "enriched analysis"
        ),
        None => warn!("failed to get response from model for enrichment"),
    }
    response
}

/// Generate a conversational reply when no company was identified.
///
/// Never returns an empty answer: model failure degrades to a canned
/// apology so the job can still complete.
pub async fn generate_fallback_response(model: &ModelClient, query: &str) -> String {
    if query.trim().is_empty() {
        error!("empty query provided to generate_fallback_response");
        return "I'm sorry, but I didn't receive a valid query to respond to.".into();
    }

    info!("generating fallback response (no company identified)");
    let prompt = render(Prompt::NoCompanyFallback, &[("query", query)]);

    match model.ask(&prompt, ModelTier::Small).await {
        Some(response) => {
            info!(chars = response.len(), "generated fallback response");
            response
        }
        None => {
            error!("failed to get fallback response from model");
            FALLBACK_OF_LAST_RESORT.into()
        }
    }
}
