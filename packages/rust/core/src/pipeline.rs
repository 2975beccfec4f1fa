//! End-to-end research pipeline: resolve entity → gather evidence →
//! synthesize → (optionally) iterate the knowledge-gap loop → complete.
//!
//! The orchestrator owns the job's terminal guarantee: every fatal
//! condition calls `fail` with a specific message, and any unexpected
//! error is caught at the top level and converted to a failed job. No
//! control path leaves a job in a non-terminal state.

use std::path::Path;

use tracing::{error, info, instrument, warn};

use dealscope_fetcher::SiteFetcher;
use dealscope_model::ModelClient;
use dealscope_search::{KnowledgeBaseClient, WebSearchClient};
use dealscope_shared::config::ResearchConfig;
use dealscope_shared::{AppConfig, EvidenceBundle, JobId, Result};
use dealscope_storage::JobStore;

use crate::{catalog, evidence, gaps, knowledge, resolver, synthesize};

/// Dispatch payload for one job execution.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub job_id: JobId,
    pub user_id: String,
    pub query: String,
    pub deep_research: bool,
}

/// Run the full research pipeline for one job.
///
/// Returns `true` when the job completed, `false` when it failed. The job
/// record is guaranteed to be in a terminal state afterwards (modulo a
/// store that is itself unreachable).
#[instrument(skip_all, fields(job_id = %request.job_id, deep_research = request.deep_research))]
pub async fn process_job(request: &JobRequest, store: &JobStore, config: &AppConfig) -> bool {
    info!(query_len = request.query.len(), "processing research job");

    match run_pipeline(request, store, config).await {
        Ok(completed) => completed,
        Err(e) => {
            error!(error = %e, "unexpected error during research pipeline");
            if let Err(fail_err) = store
                .fail(&request.job_id, &format!("Research error: {e}"))
                .await
            {
                error!(error = %fail_err, "failed to record job failure");
            }
            false
        }
    }
}

/// The pipeline body. Expected fatal conditions mark the job failed and
/// return `Ok(false)`; only unexpected errors bubble up as `Err`.
async fn run_pipeline(
    request: &JobRequest,
    store: &JobStore,
    config: &AppConfig,
) -> Result<bool> {
    let job_id = &request.job_id;
    let query = request.query.trim();

    if query.is_empty() {
        store.fail(job_id, "Invalid or empty query parameter").await?;
        return Ok(false);
    }

    // Step 1: Load the portfolio catalog
    store.advance(job_id, "Retrieving portfolio data").await?;
    let companies = match catalog::load_catalog(Path::new(&config.defaults.catalog_path)) {
        Ok(companies) if !companies.is_empty() => companies,
        Ok(_) => {
            store.fail(job_id, "Failed to access portfolio data").await?;
            return Ok(false);
        }
        Err(e) => {
            warn!(error = %e, "catalog load failed");
            store.fail(job_id, "Failed to access portfolio data").await?;
            return Ok(false);
        }
    };
    info!(count = companies.len(), "fetched portfolio companies");

    let model = match ModelClient::new(&config.model) {
        Ok(model) => model,
        Err(e) => {
            store.fail(job_id, &e.to_string()).await?;
            return Ok(false);
        }
    };

    // Step 2: Identify the company in the query
    store.advance(job_id, "Identifying company to research").await?;
    let company = resolver::identify_company(&model, query, &companies).await;

    let Some(company) = company else {
        // No company identified: answer conversationally and complete.
        store.advance(job_id, "Generating general response").await?;
        let fallback = synthesize::generate_fallback_response(&model, query).await;
        store.complete(job_id, &fallback).await?;
        return Ok(true);
    };

    // Step 3: Gather evidence from both sites
    store
        .advance(
            job_id,
            &format!("Gathering information about {}", company.name),
        )
        .await?;
    let fetcher = SiteFetcher::new()?;
    let research = ResearchConfig::from(config);
    let (reference_text, site_text) =
        match evidence::gather_company_info(&fetcher, &company, &research).await {
            Ok(texts) => texts,
            Err(e) => {
                store
                    .fail(job_id, &format!("Failed to gather company information: {e}"))
                    .await?;
                return Ok(false);
            }
        };

    // Step 4: Query the internal knowledge base (non-fatal)
    let kb_client = KnowledgeBaseClient::new(&config.knowledge_base)?;
    let kb_data = knowledge::query_knowledge_base(
        &model,
        kb_client.as_ref(),
        query,
        config.knowledge_base.max_results,
    )
    .await;

    // Step 5: Initial synthesis
    store.advance(job_id, "Analyzing collected information").await?;
    let bundle = EvidenceBundle {
        reference_text,
        site_text,
        knowledge_base: kb_data,
    };
    let Some(mut analysis) = synthesize::initial_analysis(&model, query, &bundle).await else {
        store
            .fail(job_id, "Failed to analyze company information")
            .await?;
        return Ok(false);
    };

    // Step 6: Knowledge-gap loop, when deep research was requested
    if request.deep_research {
        store
            .advance(
                job_id,
                &format!("Performing deep research on {}", company.name),
            )
            .await?;

        let search = match WebSearchClient::new(&config.search) {
            Ok(search) => Some(search),
            Err(e) => {
                warn!(error = %e, "external search unavailable, skipping gap research");
                None
            }
        };

        analysis = gaps::deep_research_rounds(
            &model,
            search.as_ref(),
            query,
            analysis,
            research.rounds,
        )
        .await;
    }

    store.complete(job_id, &analysis).await?;
    Ok(true)
}
