//! External search collaborators for the research pipeline.
//!
//! This crate provides:
//! - [`WebSearchClient`] — external web-search API client
//! - [`KnowledgeBaseClient`] — internal knowledge-base retrieval client
//!
//! Both clients are total: any failure degrades to an absent/empty result.

pub mod knowledge;
pub mod web;

pub use knowledge::KnowledgeBaseClient;
pub use web::{SearchDepth, WebSearchClient};
