//! Evidence gathering for a resolved company.
//!
//! Fetches the portfolio reference page (shallow) and the company's own
//! website (deeper). URLs are validated before any fetch: a malformed or
//! missing URL is a hard failure for that field, and the job fails only
//! when both fields are unusable. Empty fetched text is logged and
//! tolerated — sites occasionally serve empty or blocked pages.

use tracing::{info, instrument, warn};
use url::Url;

use dealscope_fetcher::SiteFetcher;
use dealscope_shared::config::ResearchConfig;
use dealscope_shared::{DealScopeError, PortfolioCompany, Result};

/// Validate that a URL is well-formed `http(s)`.
fn valid_fetch_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some()
        }
        Err(_) => false,
    }
}

/// Fetch reference-page and company-site text for a company.
///
/// Returns `(reference_text, site_text)`. Either text may be empty when
/// that field's URL was invalid or its site yielded nothing; an error is
/// returned only when both URL fields fail validation.
#[instrument(skip_all, fields(company = %company.name))]
pub async fn gather_company_info(
    fetcher: &SiteFetcher,
    company: &PortfolioCompany,
    research: &ResearchConfig,
) -> Result<(String, String)> {
    info!("gathering information about {}", company.name);

    let reference_url = company.link.as_str();
    let site_url = company.website.as_deref().unwrap_or("");

    let reference_ok = valid_fetch_url(reference_url);
    if !reference_ok {
        warn!(url = reference_url, "invalid reference page URL");
    }
    let site_ok = valid_fetch_url(site_url);
    if !site_ok {
        warn!(url = site_url, "invalid company website URL");
    }

    if !reference_ok && !site_ok {
        return Err(DealScopeError::validation(format!(
            "invalid company URLs: reference page '{reference_url}', website '{site_url}'"
        )));
    }

    let reference_text = if reference_ok {
        let text = fetcher
            .fetch_site_text(reference_url, research.reference_depth)
            .await;
        if text.is_empty() {
            warn!(url = reference_url, "no content retrieved from reference page");
        }
        info!(url = reference_url, chars = text.len(), "reference page fetched");
        text
    } else {
        String::new()
    };

    let site_text = if site_ok {
        let text = fetcher.fetch_site_text(site_url, research.site_depth).await;
        if text.is_empty() {
            warn!(url = site_url, "no content retrieved from company website");
        }
        info!(url = site_url, chars = text.len(), "company website fetched");
        text
    } else {
        String::new()
    };

    Ok((reference_text, site_text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn company(link: &str, website: Option<&str>) -> PortfolioCompany {
        PortfolioCompany {
            name: "Acme Robotics".into(),
            sector: "Industrial Tech".into(),
            fund: "Fund X".into(),
            country: "Germany".into(),
            entry_year: "2023".into(),
            link: link.into(),
            website: website.map(String::from),
        }
    }

    fn research() -> ResearchConfig {
        ResearchConfig {
            rounds: 1,
            reference_depth: 1,
            site_depth: 2,
        }
    }

    #[test]
    fn url_validation() {
        assert!(valid_fetch_url("https://example.com/page"));
        assert!(valid_fetch_url("http://example.com"));
        assert!(!valid_fetch_url("ftp://example.com"));
        assert!(!valid_fetch_url("example.com/no-scheme"));
        assert!(!valid_fetch_url(""));
    }

    #[tokio::test]
    async fn both_invalid_urls_fail() {
        let fetcher = SiteFetcher::new().unwrap();
        let company = company("not-a-url", Some("also//broken"));

        let result = gather_company_info(&fetcher, &company, &research()).await;
        let err = result.expect_err("should fail").to_string();
        assert!(err.contains("not-a-url"));
        assert!(err.contains("also//broken"));
    }

    #[tokio::test]
    async fn one_valid_url_proceeds_with_partial_evidence() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_string("<html><body><p>Reference entry for Acme.</p></body></html>"),
            )
            .mount(&server)
            .await;

        let fetcher = SiteFetcher::new().unwrap();
        let company = company(&server.uri(), Some("not-a-url"));

        let (reference_text, site_text) =
            gather_company_info(&fetcher, &company, &research())
                .await
                .expect("partial evidence is fine");
        assert!(reference_text.contains("Reference entry for Acme."));
        assert!(site_text.is_empty());
    }

    #[tokio::test]
    async fn missing_website_field_counts_as_invalid() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_string("<html><body><p>Entry.</p></body></html>"),
            )
            .mount(&server)
            .await;

        let fetcher = SiteFetcher::new().unwrap();
        let company = company(&server.uri(), None);

        let (reference_text, site_text) =
            gather_company_info(&fetcher, &company, &research())
                .await
                .expect("reference alone is enough");
        assert!(!reference_text.is_empty());
        assert!(site_text.is_empty());
    }
}
