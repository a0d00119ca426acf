//! FinSight CLI: the main entry point.
//!
//! Commands:
//! - `init`     Write a default config file
//! - `analyze`  Generate a report from spreadsheets and PDFs
//! - `chat`     Analyze, then ask questions and edit the report
//! - `schema`   Print the report JSON Schema

use clap::{Parser, Subcommand};
use finsight_core::Language;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "finsight",
    about = "FinSight: financial analysis reports from spreadsheets and PDFs",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create ~/.finsight/config.toml with defaults
    Init,

    /// Analyze documents and print the report as JSON
    Analyze {
        /// Spreadsheets (.xlsx, .xls, .csv) and PDFs to analyze
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Report language (it, en, es, fr, de)
        #[arg(short, long)]
        lang: Option<Language>,

        /// API key for this run; overrides environment and config
        #[arg(long, env = "FINSIGHT_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Analyze documents, then chat about and edit the report
    Chat {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(short, long)]
        lang: Option<Language>,

        #[arg(long, env = "FINSIGHT_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },

    /// Print the report JSON Schema
    Schema {
        /// Omit the top-level required list (the shape of a patch)
        #[arg(long)]
        partial: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => commands::init::run().await?,
        Commands::Analyze {
            files,
            lang,
            api_key,
            out,
        } => commands::analyze::run(files, lang, api_key, out).await?,
        Commands::Chat {
            files,
            lang,
            api_key,
        } => commands::chat::run(files, lang, api_key).await?,
        Commands::Schema { partial } => commands::schema::run(partial)?,
    }

    Ok(())
}
