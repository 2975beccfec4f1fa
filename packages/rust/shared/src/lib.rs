//! Shared types, error model, and configuration for DealScope.
//!
//! This crate is the foundation depended on by all other DealScope crates.
//! It provides:
//! - [`DealScopeError`] — the unified error type
//! - Domain types ([`JobRecord`], [`PortfolioCompany`], [`KnowledgeGap`], …)
//! - Configuration ([`AppConfig`], [`ResearchConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, KnowledgeBaseConfig, ModelConfig, ResearchConfig, SearchConfig,
    api_key_from_env, config_dir, config_file_path, init_config, load_config, load_config_from,
    validate_api_key,
};
pub use error::{DealScopeError, Result};
pub use types::{
    EvidenceBundle, JobId, JobRecord, JobStatus, KbExcerpt, KnowledgeGap, PortfolioCompany,
    SearchAnswer, SearchSource,
};
