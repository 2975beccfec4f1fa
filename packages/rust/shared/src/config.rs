//! Application configuration for DealScope.
//!
//! User config lives at `~/.dealscope/dealscope.toml`.
//! CLI flags override config file values, which override defaults.
//! API keys are never stored in the file — only the names of the
//! environment variables holding them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DealScopeError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "dealscope.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".dealscope";

// ---------------------------------------------------------------------------
// Config structs (matching dealscope.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Language-model gateway settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// External web-search settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Internal knowledge-base settings.
    #[serde(default)]
    pub knowledge_base: KnowledgeBaseConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Number of knowledge-gap rounds for deep research.
    #[serde(default = "default_research_rounds")]
    pub research_rounds: u32,

    /// Fetch depth for the portfolio reference page.
    #[serde(default = "default_reference_depth")]
    pub reference_depth: u32,

    /// Fetch depth for the company's own website.
    #[serde(default = "default_site_depth")]
    pub site_depth: u32,

    /// Path to the jobs database file.
    #[serde(default = "default_jobs_db")]
    pub jobs_db: String,

    /// Path to the portfolio catalog JSON file.
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            research_rounds: default_research_rounds(),
            reference_depth: default_reference_depth(),
            site_depth: default_site_depth(),
            jobs_db: default_jobs_db(),
            catalog_path: default_catalog_path(),
        }
    }
}

fn default_research_rounds() -> u32 {
    1
}
fn default_reference_depth() -> u32 {
    1
}
fn default_site_depth() -> u32 {
    2
}
fn default_jobs_db() -> String {
    "var/jobs.db".into()
}
fn default_catalog_path() -> String {
    "assets/portfolio.json".into()
}

/// `[model]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_model_api_key_env")]
    pub api_key_env: String,

    /// Base URL of the chat-completions API.
    #[serde(default = "default_model_base_url")]
    pub base_url: String,

    /// Cheapest tier — short conversational replies.
    #[serde(default = "default_small_model")]
    pub small_model: String,

    /// Mid tier — identification, reformulation, gap analysis.
    #[serde(default = "default_medium_model")]
    pub medium_model: String,

    /// Most capable tier — synthesis and enrichment.
    #[serde(default = "default_large_model")]
    pub large_model: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_model_api_key_env(),
            base_url: default_model_base_url(),
            small_model: default_small_model(),
            medium_model: default_medium_model(),
            large_model: default_large_model(),
        }
    }
}

fn default_model_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_small_model() -> String {
    "amazon/nova-micro-v1".into()
}
fn default_medium_model() -> String {
    "amazon/nova-lite-v1".into()
}
fn default_large_model() -> String {
    "anthropic/claude-3.7-sonnet".into()
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Name of the env var holding the search API key.
    #[serde(default = "default_search_api_key_env")]
    pub api_key_env: String,

    /// Base URL of the search API.
    #[serde(default = "default_search_base_url")]
    pub base_url: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_search_api_key_env(),
            base_url: default_search_base_url(),
        }
    }
}

fn default_search_api_key_env() -> String {
    "TAVILY_API_KEY".into()
}
fn default_search_base_url() -> String {
    "https://api.tavily.com".into()
}

/// `[knowledge_base]` section. An empty `base_url` disables the stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseConfig {
    /// Base URL of the retrieval endpoint. Empty disables KB retrieval.
    #[serde(default)]
    pub base_url: String,

    /// Index/collection to retrieve from.
    #[serde(default)]
    pub index: String,

    /// Maximum excerpts per search phrasing.
    #[serde(default = "default_kb_max_results")]
    pub max_results: u32,
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            index: String::new(),
            max_results: default_kb_max_results(),
        }
    }
}

fn default_kb_max_results() -> u32 {
    5
}

// ---------------------------------------------------------------------------
// Research config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime research configuration — merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct ResearchConfig {
    /// Knowledge-gap loop round budget (clamped to at least 1).
    pub rounds: u32,
    /// Fetch depth for the reference page.
    pub reference_depth: u32,
    /// Fetch depth for the company website.
    pub site_depth: u32,
}

impl From<&AppConfig> for ResearchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            rounds: config.defaults.research_rounds.max(1),
            reference_depth: config.defaults.reference_depth,
            site_depth: config.defaults.site_depth,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.dealscope/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DealScopeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.dealscope/dealscope.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DealScopeError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        DealScopeError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DealScopeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DealScopeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DealScopeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read an API key from the environment variable named in config.
/// Returns `None` when the variable is unset or empty.
pub fn api_key_from_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Some(val),
        _ => None,
    }
}

/// Check that the model API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.model.api_key_env;
    match api_key_from_env(var_name) {
        Some(_) => Ok(()),
        None => Err(DealScopeError::config(format!(
            "model API key not found. Set the {var_name} environment variable."
        ))),
    }
}
