//! Draftsmith CLI — fill document templates with generated prose.
//!
//! Reads a template's section structure, generates content for every
//! placeholder, computes labelled table cells, and saves the result.

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
