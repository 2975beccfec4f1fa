//! Language-model gateway, prompt templates, and response extraction.
//!
//! This crate provides:
//! - [`ModelClient`] — three-tier gateway over a chat-completions API,
//!   with a bounded retry policy for large-tier timeouts
//! - [`prompts`] — the prompt template catalog
//! - [`extract_structured_data`] — tolerant JSON extraction from free text

pub mod client;
pub mod extract;
pub mod prompts;

pub use client::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, ModelClient, ModelTier, RetryPolicy};
pub use extract::extract_structured_data;
pub use prompts::{Prompt, render};
