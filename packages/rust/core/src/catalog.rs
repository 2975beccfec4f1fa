//! Portfolio catalog loading.
//!
//! The catalog is a static JSON file of known portfolio companies, loaded
//! once per job execution and shared read-only by the entity resolver and
//! the evidence gatherer.

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use dealscope_shared::{DealScopeError, PortfolioCompany, Result};

/// Raw catalog entry as it appears in the source file.
#[derive(Debug, Deserialize)]
struct RawCatalogEntry {
    #[serde(rename = "Company", default)]
    company: String,
    #[serde(rename = "Sector", default)]
    sector: String,
    #[serde(rename = "Fund", default)]
    fund: String,
    #[serde(rename = "Market", default)]
    market: String,
    #[serde(rename = "Entry", default)]
    entry: String,
    #[serde(rename = "Link", default)]
    link: String,
    #[serde(rename = "company_website", default)]
    company_website: Option<String>,
}

impl From<RawCatalogEntry> for PortfolioCompany {
    fn from(raw: RawCatalogEntry) -> Self {
        Self {
            name: raw.company,
            sector: raw.sector,
            fund: raw.fund,
            country: raw.market,
            entry_year: raw.entry,
            link: raw.link,
            website: raw.company_website.filter(|w| !w.is_empty()),
        }
    }
}

/// Load the portfolio catalog from a JSON file.
pub fn load_catalog(path: &Path) -> Result<Vec<PortfolioCompany>> {
    let content = std::fs::read_to_string(path).map_err(|e| DealScopeError::io(path, e))?;

    let raw: Vec<RawCatalogEntry> = serde_json::from_str(&content).map_err(|e| {
        DealScopeError::parse(format!("failed to parse catalog {}: {e}", path.display()))
    })?;

    let companies: Vec<PortfolioCompany> = raw.into_iter().map(Into::into).collect();
    info!(path = %path.display(), count = companies.len(), "loaded portfolio catalog");
    Ok(companies)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_fixture_loads() {
        let companies =
            load_catalog(Path::new("../../../fixtures/json/portfolio.fixture.json"))
                .expect("load fixture catalog");
        assert_eq!(companies.len(), 3);

        let campus = &companies[0];
        assert_eq!(campus.name, "Campus");
        assert_eq!(campus.sector, "Real Estate");
        assert_eq!(campus.country, "Spain");
        assert!(campus.link.starts_with("https://"));
        assert!(campus.website.is_some());
    }

    #[test]
    fn empty_website_becomes_none() {
        let raw = RawCatalogEntry {
            company: "Acme".into(),
            sector: "Robotics".into(),
            fund: "Fund IX".into(),
            market: "Sweden".into(),
            entry: "2021".into(),
            link: "https://portfolio.example.com/acme".into(),
            company_website: Some(String::new()),
        };
        let company = PortfolioCompany::from(raw);
        assert!(company.website.is_none());
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = load_catalog(Path::new("/nonexistent/portfolio.json"));
        assert!(result.is_err());
    }
}
