//! DealScope CLI — portfolio company research from the command line.
//!
//! Submits research questions about portfolio companies, drives the
//! asynchronous job pipeline, and polls jobs to completion.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
