//! CLI command definitions, routing, and tracing setup.

use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use dealscope_core::ResearchService;
use dealscope_shared::{AppConfig, JobId, JobStatus, init_config, load_config, validate_api_key};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// DealScope — sourced answers about portfolio companies.
#[derive(Parser)]
#[command(
    name = "dealscope",
    version,
    about = "Ask research questions about portfolio companies and get sourced markdown answers.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Submit a research question and wait for the answer.
    Ask {
        /// The research question.
        query: String,

        /// Run the iterative knowledge-gap loop after the initial answer.
        #[arg(long)]
        deep: bool,

        /// Caller id to tag the job with.
        #[arg(long, default_value = "cli")]
        user: String,
    },

    /// Print the stored record of a research job.
    Status {
        /// Job id (e.g. job_6f9e…).
        job_id: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "dealscope=info",
        1 => "dealscope=debug",
        _ => "dealscope=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Ask { query, deep, user } => cmd_ask(&query, deep, &user).await,
        Command::Status { job_id } => cmd_status(&job_id).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// ask
// ---------------------------------------------------------------------------

/// Poll interval while waiting for a job.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

async fn cmd_ask(query: &str, deep: bool, user: &str) -> Result<()> {
    // Validate API key before doing anything
    let config = load_config()?;
    validate_api_key(&config)?;

    let service = ResearchService::open(config).await?;

    info!(deep, user, "submitting research job");
    let record = service.submit(query, deep, user).await?;
    println!("  Job:    {}", record.job_id);

    // Poll the job to a terminal state, surfacing progress messages.
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.enable_steady_tick(Duration::from_millis(80));

    let job = loop {
        tokio::time::sleep(POLL_INTERVAL).await;
        let job = service
            .status(&record.job_id)
            .await?
            .ok_or_else(|| eyre!("job {} disappeared from the store", record.job_id))?;

        if job.status.is_terminal() {
            break job;
        }
        if let Some(message) = &job.message {
            spinner.set_message(message.clone());
        }
    };
    spinner.finish_and_clear();

    match job.status {
        JobStatus::Completed => {
            println!();
            println!("{}", job.result.unwrap_or_default());
            Ok(())
        }
        JobStatus::Failed => Err(eyre!(
            "research job failed: {}",
            job.error.unwrap_or_else(|| "unknown error".into())
        )),
        other => Err(eyre!("job ended in unexpected state: {other}")),
    }
}

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

async fn cmd_status(job_id: &str) -> Result<()> {
    let config = load_config()?;
    let service = ResearchService::open(config).await?;

    let job = service
        .status(&JobId::from(job_id))
        .await?
        .ok_or_else(|| eyre!("research job {job_id} not found"))?;

    println!("{}", serde_json::to_string_pretty(&job)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
