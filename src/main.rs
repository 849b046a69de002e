mod commands;

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use codebase_rag::{AppConfig, RagPipeline};

#[derive(Parser)]
#[command(name = "rag")]
#[command(about = "Question answering and retrieval evaluation over a codebase", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the corpus index
    Index {
        #[arg(long, help = "Drop the existing index first")]
        force: bool,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Answer a question from the indexed corpus
    Ask {
        question: String,
        #[arg(long, short = 'k', help = "Number of passages to retrieve")]
        top_k: Option<usize>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Run the QA set and print the evaluation report as JSON
    Eval {
        #[arg(long, short = 'k', help = "Number of passages per question")]
        top_k: Option<usize>,
        #[arg(long, help = "Do not update the index first")]
        skip_index: bool,
    },
    /// Show what is currently indexed
    Status {
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Start the HTTP API
    Serve {
        #[arg(long, short, help = "Port to listen on (default: PORT or 3000)")]
        port: Option<u16>,
    },

    // ===== MCP Server =====
    /// Start MCP server on stdio
    #[cfg(feature = "mcp")]
    Mcp,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = AppConfig::from_env().context("failed to read configuration")?;
    // Built outside any async runtime: remote embedders hold blocking HTTP clients.
    let pipeline = Arc::new(RagPipeline::from_config(config).context("failed to start pipeline")?);

    match cli.command {
        Commands::Index { force, json } => commands::index::run(&pipeline, force, json),
        Commands::Ask {
            question,
            top_k,
            json,
        } => commands::ask::run(&pipeline, &question, top_k, json),
        Commands::Eval { top_k, skip_index } => commands::eval::run(&pipeline, top_k, skip_index),
        Commands::Status { json } => commands::status::run(&pipeline, json),
        Commands::Serve { port } => {
            let port = port.unwrap_or(pipeline.config().port);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(codebase_rag::server::serve(Arc::clone(&pipeline), port))?;
            Ok(())
        }

        #[cfg(feature = "mcp")]
        Commands::Mcp => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(codebase_rag::mcp::run_mcp_server(Arc::clone(&pipeline)))
        }
    }
}
