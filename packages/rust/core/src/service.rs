//! Submit/status facade over the research pipeline.
//!
//! Submission validates the query, creates the job record, dispatches the
//! pipeline onto a detached tokio task, and returns immediately with the
//! `Pending` record — the caller polls [`ResearchService::status`] until
//! the job reaches a terminal state. There is no cancellation path.

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info};

use dealscope_shared::{AppConfig, DealScopeError, JobId, JobRecord, Result};
use dealscope_storage::JobStore;

use crate::pipeline::{JobRequest, process_job};

/// Handle for submitting research jobs and reading their status.
#[derive(Clone)]
pub struct ResearchService {
    store: Arc<JobStore>,
    config: Arc<AppConfig>,
}

impl ResearchService {
    /// Open the job store configured in `config` and build a service.
    pub async fn open(config: AppConfig) -> Result<Self> {
        let store = JobStore::open(Path::new(&config.defaults.jobs_db)).await?;
        Ok(Self::with_store(store, config))
    }

    /// Build a service over an already-open store.
    pub fn with_store(store: JobStore, config: AppConfig) -> Self {
        Self {
            store: Arc::new(store),
            config: Arc::new(config),
        }
    }

    /// Submit a research job. Validates the query, creates the job record,
    /// and dispatches processing fire-and-forget. Returns the `Pending`
    /// record immediately.
    pub async fn submit(
        &self,
        query: &str,
        deep_research: bool,
        user_id: &str,
    ) -> Result<JobRecord> {
        if query.trim().is_empty() {
            return Err(DealScopeError::validation("query must not be empty"));
        }

        let job_id = JobId::new();
        let user_id = if user_id.is_empty() { "anonymous" } else { user_id };

        let record = self.store.create_job(&job_id, user_id, query).await?;
        info!(job_id = %job_id, user_id, deep_research, "created research job");

        let request = JobRequest {
            job_id,
            user_id: user_id.to_string(),
            query: query.to_string(),
            deep_research,
        };
        let store = Arc::clone(&self.store);
        let config = Arc::clone(&self.config);

        tokio::spawn(async move {
            let success = process_job(&request, &store, &config).await;
            if success {
                info!(job_id = %request.job_id, "successfully processed job");
            } else {
                error!(job_id = %request.job_id, "job processing completed with errors");
            }
        });

        Ok(record)
    }

    /// Read the current job record, or `None` for an unknown id.
    pub async fn status(&self, job_id: &JobId) -> Result<Option<JobRecord>> {
        self.store.get_job(job_id).await
    }
}
