mod cli;
mod server;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use lorekeep::config::LorekeepConfig;

#[derive(Parser)]
#[command(name = "lorekeep", version, about = "Knowledge indexing and retrieval for AI agents")]
struct Cli {
    /// Config file (defaults to ~/.lorekeep/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server
    Serve {
        /// Transport: "stdio" or "http". Overrides server.transport.
        #[arg(long)]
        transport: Option<String>,
    },
    /// Add a topic
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        definition: String,
        /// Supporting fact (repeatable)
        #[arg(long = "fact")]
        facts: Vec<String>,
        #[arg(long, default_value_t = 0.0)]
        confidence: f64,
    },
    /// Update a topic by ID; omitted fields keep their values
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        definition: Option<String>,
        /// Replacement fact list (repeatable)
        #[arg(long = "fact")]
        facts: Vec<String>,
        /// Remove all facts
        #[arg(long, conflicts_with = "facts")]
        clear_facts: bool,
        #[arg(long)]
        confidence: Option<f64>,
    },
    /// Import topics from a JSON file
    Import { file: PathBuf },
    /// Export all topics as JSON to stdout
    Export,
    /// Find the topics most relevant to a query
    Query {
        query: String,
        /// Number of results (defaults to retrieval.default_top_k)
        #[arg(long, short = 'k')]
        top_k: Option<usize>,
    },
    /// Show knowledge base statistics
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run database diagnostics
    Doctor,
    /// Re-embed every topic and rebuild the index
    Reload,
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.lorekeep/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => LorekeepConfig::load_from(path)?,
        None => LorekeepConfig::load()?,
    };

    // Log to stderr so stdout stays clean for MCP JSON-RPC and command output.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { transport } => {
            let transport = transport.unwrap_or_else(|| config.server.transport.clone());
            match transport.as_str() {
                "stdio" => server::serve_stdio(config).await?,
                "http" => server::serve_http(config).await?,
                other => anyhow::bail!("unknown transport: {other}. Supported: stdio, http"),
            }
        }
        Command::Add {
            name,
            definition,
            facts,
            confidence,
        } => cli::topic::add(&config, name, definition, facts, confidence)?,
        Command::Update {
            id,
            name,
            definition,
            facts,
            clear_facts,
            confidence,
        } => {
            let facts = if clear_facts {
                Some(vec![])
            } else if facts.is_empty() {
                None
            } else {
                Some(facts)
            };
            let changes = cli::topic::TopicChanges {
                name,
                definition,
                facts,
                confidence,
            };
            cli::topic::update(&config, &id, changes)?;
        }
        Command::Import { file } => cli::import::import(&config, &file)?,
        Command::Export => cli::export::export(&config)?,
        Command::Query { query, top_k } => cli::query::query(&config, &query, top_k)?,
        Command::Stats { json } => cli::stats::stats(&config, json)?,
        Command::Doctor => cli::doctor::doctor(&config)?,
        Command::Reload => cli::reload::reload(&config)?,
        Command::Model { action } => match action {
            ModelAction::Download => cli::model_download(&config.embedding).await?,
        },
    }

    Ok(())
}
