// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{Parser, Subcommand};
use pricewatch_runtime::cli;
use pricewatch_runtime::config::PipelineConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "pricewatch",
    about = "Pricewatch: resilient product price scraping pipeline",
    version,
    after_help = "Run 'pricewatch <command> --help' for details on each command."
)]
struct Cli {
    /// JSON config file (defaults, then this file, then PRICEWATCH_* env)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Output results and logs as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scraper stage: scrape requests to raw content
    Scrape,
    /// Run the transformer stage: raw content to product records
    Transform,
    /// Run the loader stage: product records to store
    Load,
    /// Publish scrape requests from the schedule file
    Schedule,
    /// Run scheduler, scraper, transformer and loader in one process
    RunAll,
    /// Navigate to one URL with a stealth browser and snapshot the page
    Navigate {
        url: String,
        /// Wait for this selector to be visible before the snapshot
        #[arg(long)]
        wait_for: Option<String>,
        /// Show the browser window
        #[arg(long)]
        headed: bool,
    },
    /// List stored product records
    Products {
        /// Only records for this site
        #[arg(long)]
        site: Option<String>,
        #[arg(long, default_value = "50")]
        limit: usize,
    },
    /// Show recent dead letters without consuming them
    DeadLetters {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Check environment and diagnose issues
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli::init_tracing(cli.verbose, cli.json);

    let mut config = PipelineConfig::load(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Scrape => cli::stage_cmd::run_scrape(&config).await,
        Commands::Transform => cli::stage_cmd::run_transform(&config).await,
        Commands::Load => cli::stage_cmd::run_load(&config).await,
        Commands::Schedule => cli::stage_cmd::run_schedule(&config).await,
        Commands::RunAll => cli::stage_cmd::run_all(&config).await,
        Commands::Navigate {
            url,
            wait_for,
            headed,
        } => {
            if headed {
                config.navigation.headless = false;
            }
            cli::navigate_cmd::run(&config, &url, wait_for.as_deref(), cli.json).await
        }
        Commands::Products { site, limit } => {
            cli::products_cmd::run(&config, site.as_deref(), limit, cli.json)
        }
        Commands::DeadLetters { limit } => {
            cli::dead_letters_cmd::run(&config, limit, cli.json).await
        }
        Commands::Doctor => cli::doctor::run(&config).await,
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if cli.json {
            println!(
                "{}",
                serde_json::json!({ "error": true, "message": format!("{e:#}") })
            );
        } else {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}
