//! Entity resolution: which catalog company does a query concern?
//!
//! The resolver embeds the catalog in an identification prompt, asks the
//! mid model tier, and decodes the structured response. "No company
//! identified" is a normal outcome, not an error — callers branch on the
//! `None` to produce a fallback response instead of full research.

use tracing::{info, warn};

use dealscope_model::{ModelClient, ModelTier, Prompt, extract_structured_data, render};
use dealscope_shared::PortfolioCompany;

/// Identify which portfolio company the query is about.
///
/// Returns the matched catalog record, or `None` when the query mentions
/// no known company (or the model/extraction produced nothing usable).
pub async fn identify_company(
    model: &ModelClient,
    query: &str,
    companies: &[PortfolioCompany],
) -> Option<PortfolioCompany> {
    if query.trim().is_empty() {
        warn!("empty query provided to identify_company");
        return None;
    }
    if companies.is_empty() {
        warn!("empty catalog provided to identify_company");
        return None;
    }

    info!("identifying company mentioned in query");

    let companies_list = serde_json::to_string_pretty(companies).unwrap_or_default();
    let prompt = render(
        Prompt::IdentifyCompany,
        &[("query", query), ("companies_list", &companies_list)],
    );

    let response = model.ask(&prompt, ModelTier::Medium).await?;
    let company = company_from_response(&response);

    match &company {
        Some(c) => info!(name = %c.name, "identified company"),
        None => info!("no company identified in user query"),
    }
    company
}

/// Decode an identification response into a catalog record.
///
/// Accepts either a bare object or a non-empty array (first element used);
/// an empty array, absent extraction, or shape mismatch all mean "no
/// company identified". Deterministic given a fixed response text.
pub fn company_from_response(response: &str) -> Option<PortfolioCompany> {
    let value = extract_structured_data(response)?;

    let candidate = match value {
        serde_json::Value::Array(items) => items.into_iter().next()?,
        object @ serde_json::Value::Object(_) => object,
        other => {
            warn!(kind = json_kind(&other), "unexpected identification response shape");
            return None;
        }
    };

    match serde_json::from_value::<PortfolioCompany>(candidate) {
        Ok(company) if !company.name.trim().is_empty() => Some(company),
        Ok(_) => {
            warn!("identification response has an empty company name");
            None
        }
        Err(e) => {
            warn!(error = %e, "identification response does not match a catalog record");
            None
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
