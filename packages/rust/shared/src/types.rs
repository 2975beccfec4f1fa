//! Core domain types for DealScope research jobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// JobId
// ---------------------------------------------------------------------------

/// Opaque job identifier of the form `job_<uuid>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new job identifier.
    pub fn new() -> Self {
        Self(format!("job_{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Status of an asynchronous research job.
///
/// `Pending` is the only initial state; `Completed` and `Failed` are
/// terminal. Transitions are one-directional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Whether this status admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// JobRecord
// ---------------------------------------------------------------------------

/// A persisted research job.
///
/// `result` is only present on `Completed` and `error` only on `Failed`;
/// both are absent until the job reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub user_id: String,
    pub query: String,
    pub status: JobStatus,
    /// Human-readable progress message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Final markdown answer, present only when completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Error text, present only when failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// PortfolioCompany
// ---------------------------------------------------------------------------

/// A company in the portfolio catalog.
///
/// Loaded once per job execution and shared read-only by the entity
/// resolver and the evidence gatherer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioCompany {
    pub name: String,
    #[serde(default)]
    pub sector: String,
    #[serde(default)]
    pub fund: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub entry_year: String,
    /// Reference page on the portfolio site.
    #[serde(default)]
    pub link: String,
    /// The company's own website, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

// ---------------------------------------------------------------------------
// KnowledgeGap
// ---------------------------------------------------------------------------

/// A model-identified missing aspect of the current analysis, paired with
/// the search queries meant to fill it. Scoped to one loop round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeGap {
    #[serde(default)]
    pub gap_id: u32,
    #[serde(default)]
    pub description: String,
    /// Ordered queries: first is primary, optional second is the fallback.
    pub search_queries: Vec<String>,
}

impl KnowledgeGap {
    /// A gap is usable only with a description and at least one query.
    pub fn is_valid(&self) -> bool {
        !self.description.trim().is_empty()
            && self.search_queries.iter().any(|q| !q.trim().is_empty())
    }

    pub fn primary_query(&self) -> Option<&str> {
        self.search_queries.first().map(String::as_str)
    }

    pub fn fallback_query(&self) -> Option<&str> {
        self.search_queries.get(1).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Search results
// ---------------------------------------------------------------------------

/// A titled link backing a web-search answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSource {
    pub title: String,
    pub url: String,
}

/// Result of one external web search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchAnswer {
    /// Synthesized answer text, when the provider produced one.
    #[serde(default)]
    pub answer: Option<String>,
    /// Up to three supporting sources.
    #[serde(default)]
    pub sources: Vec<SearchSource>,
}

/// One excerpt retrieved from the internal knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KbExcerpt {
    pub text: String,
    /// Source label for attribution (document name or similar).
    pub source: String,
}

// ---------------------------------------------------------------------------
// EvidenceBundle
// ---------------------------------------------------------------------------

/// Transient aggregate of gathered evidence for one job execution.
/// Never persisted; only the synthesized answer lands on the job record.
#[derive(Debug, Clone, Default)]
pub struct EvidenceBundle {
    /// Text fetched from the portfolio reference page.
    pub reference_text: String,
    /// Text fetched from the company's own website.
    pub site_text: String,
    /// Formatted knowledge-base excerpts, when the stage produced any.
    pub knowledge_base: Option<String>,
}

impl EvidenceBundle {
    /// True when neither site yielded any text.
    pub fn is_empty(&self) -> bool {
        self.reference_text.trim().is_empty() && self.site_text.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_format() {
        let id = JobId::new();
        assert!(id.as_str().starts_with("job_"));
        assert_ne!(JobId::new(), JobId::new());
    }

    #[test]
    fn job_status_roundtrip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            let parsed: JobStatus = status.as_str().parse().expect("parse status");
            assert_eq!(parsed, status);
        }
        assert!("cancelled".parse::<JobStatus>().is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn job_status_serializes_lowercase() {
        let json = serde_json::to_string(&JobStatus::Pending).expect("serialize");
        assert_eq!(json, r#""pending""#);
    }

    #[test]
    fn knowledge_gap_validity() {
        let gap = KnowledgeGap {
            gap_id: 1,
            description: "Recent funding rounds".into(),
            search_queries: vec!["acme funding 2025".into(), "acme series c".into()],
        };
        assert!(gap.is_valid());
        assert_eq!(gap.primary_query(), Some("acme funding 2025"));
        assert_eq!(gap.fallback_query(), Some("acme series c"));

        let no_queries = KnowledgeGap {
            gap_id: 2,
            description: "Something".into(),
            search_queries: vec![],
        };
        assert!(!no_queries.is_valid());

        let no_description = KnowledgeGap {
            gap_id: 3,
            description: "  ".into(),
            search_queries: vec!["query".into()],
        };
        assert!(!no_description.is_valid());
    }

    #[test]
    fn company_serialization() {
        let company = PortfolioCompany {
            name: "Acme Robotics".into(),
            sector: "Industrial Tech".into(),
            fund: "Fund IX".into(),
            country: "Sweden".into(),
            entry_year: "2021".into(),
            link: "https://portfolio.example.com/companies/acme".into(),
            website: Some("https://acme.example.com".into()),
        };
        let json = serde_json::to_string(&company).expect("serialize");
        let parsed: PortfolioCompany = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, company);
    }

    #[test]
    fn evidence_bundle_emptiness() {
        let mut bundle = EvidenceBundle::default();
        assert!(bundle.is_empty());
        bundle.site_text = "About Acme".into();
        assert!(!bundle.is_empty());
    }
}
