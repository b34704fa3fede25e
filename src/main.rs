//! Knowledge Bot CLI - main entry point
//!
//! Unified CLI for ingestion, questions and the interactive chat.

use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use anyhow::Context;
use knowledge_bot::{auth, commands, metrics, Config};
use tracing::warn;

#[derive(Parser)]
#[command(name = "knowledge_bot")]
#[command(about = "Retrieval-augmented campus assistant", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config.yml (defaults to ./config.yml, then ../config.yml)
    #[arg(long, global = true, env = "KB_CONFIG")]
    config: Option<PathBuf>,

    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add one or more files to the knowledge base
    Ingest {
        /// Files to ingest (.pdf, .md, .json)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Override format detection: pdf | md | json
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Add every supported file under a folder
    IngestFolder {
        /// Folder to scan recursively
        path: PathBuf,
    },

    /// Ask a single question
    Ask {
        /// The question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Interactive chat with admin commands
    Chat,

    /// Show how many chunks are stored
    Stats,

    /// Read a password from stdin and print its SHA-256 for ADMIN_PASSWORD_SHA256
    HashPassword,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Ingest { .. } => "ingest",
            Commands::IngestFolder { .. } => "ingest_folder",
            Commands::Ask { .. } => "ask",
            Commands::Chat => "chat",
            Commands::Stats => "stats",
            Commands::HashPassword => "hash_password",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for local development
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("knowledge_bot=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr.as_deref() {
        match addr.parse::<SocketAddr>() {
            Ok(socket) => metrics::spawn_metrics_server(socket),
            Err(err) => warn!(%addr, "Invalid metrics address: {}", err),
        }
    }

    let command_name = cli.command.name();
    metrics::record_command_start(command_name);
    let start = Instant::now();

    let result = execute_command(cli.command, cli.config).await;

    metrics::record_command_result(command_name, start.elapsed(), result.is_ok());

    result
}

async fn execute_command(command: Commands, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let load_config =
        || Config::from_path(config_path.as_deref()).context("failed to load configuration");

    match command {
        Commands::Ingest { files, format } => {
            commands::ingest::run_files(&load_config()?, &files, format.as_deref()).await?;
        }
        Commands::IngestFolder { path } => {
            commands::ingest::run_folder(&load_config()?, &path).await?;
        }
        Commands::Ask { question } => {
            commands::ask::run(&load_config()?, &question.join(" ")).await?;
        }
        Commands::Chat => {
            commands::chat::run(&load_config()?).await?;
        }
        Commands::Stats => {
            commands::stats::run(&load_config()?).await?;
        }
        Commands::HashPassword => {
            let mut password = String::new();
            std::io::stdin().lock().read_line(&mut password)?;
            println!("{}", auth::hash_password(password.trim_end_matches(['\r', '\n'])));
        }
    }

    Ok(())
}
