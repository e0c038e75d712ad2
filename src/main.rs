//! # Evidence Engine CLI (`evq`)
//!
//! The `evq` binary builds the vector index and relational store from the
//! configured data roots, then either serves HTTP or answers a single
//! question.
//!
//! ## Usage
//!
//! ```bash
//! evq --config ./config/evq.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `evq serve` | Build indexes, then start the HTTP server |
//! | `evq ask "<question>"` | Build indexes, answer one question, print JSON |
//! | `evq tables` | Load the CSV tables and print the relational schema |
//!
//! ## Examples
//!
//! ```bash
//! # Start the server
//! evq serve --config ./config/evq.toml
//!
//! # One-shot question with a deeper retrieval
//! evq ask "Which region had the most units sold?" --topk 10
//!
//! # Inspect what query synthesis will see
//! evq tables
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use evidence_engine::answer::Engine;
use evidence_engine::config::{load_config, Config};
use evidence_engine::embedding::HttpEmbedder;
use evidence_engine::index::VectorIndex;
use evidence_engine::llm::{ChatModel, HttpChatModel};
use evidence_engine::router::Router;
use evidence_engine::server::run_server;
use evidence_engine::sql::SqlEngine;

/// Evidence Engine CLI — routed retrieval and grounded answering over
/// documents, PDFs, code, and CSV tables.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/evq.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "evq",
    about = "Evidence Engine — routed retrieval and grounded answering over mixed evidence",
    version,
    long_about = "Evidence Engine indexes documents, PDFs, and source code into a dense \
    vector store, loads CSV files into a relational store, routes each question to the \
    right evidence source, and synthesizes a grounded, cited answer."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/evq.toml`. All data roots, chunking, retrieval,
    /// capability, and server settings are read from this file.
    #[arg(long, global = true, default_value = "./config/evq.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Build the indexes, then start the HTTP server.
    ///
    /// Walks the doc, pdf, and code roots, embeds everything, loads the
    /// CSV tables, and serves `POST /ask` and `GET /health` on the
    /// configured bind address. The index is immutable once serving starts.
    Serve,

    /// Answer a single question and print the JSON response.
    ///
    /// Builds the same indexes as `serve`, answers once, and exits.
    Ask {
        /// The question to answer.
        question: String,

        /// Number of chunks to retrieve (overrides the configured default).
        #[arg(long)]
        topk: Option<usize>,
    },

    /// Load the CSV tables and print the schema query synthesis will see.
    Tables,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            let engine = build_engine(&config).await?;
            run_server(&config, Arc::new(engine)).await?;
        }
        Commands::Ask { question, topk } => {
            let engine = build_engine(&config).await?;
            let response = engine.ask(&question, topk).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Tables => {
            let llm: Arc<dyn ChatModel> = Arc::new(HttpChatModel::new(&config.llm)?);
            let sql = SqlEngine::connect_in_memory(llm).await?;
            sql.ingest_csv_dir(&config.data.tables).await?;
            println!("{}", sql.schema_text().await?);
        }
    }

    Ok(())
}

/// Construct the engine: HTTP capabilities, one-time index build, CSV
/// ingestion. Runs before any question is accepted.
async fn build_engine(config: &Config) -> anyhow::Result<Engine> {
    let embedder = Arc::new(HttpEmbedder::new(&config.embedding)?);
    let llm: Arc<dyn ChatModel> = Arc::new(HttpChatModel::new(&config.llm)?);

    let mut index = VectorIndex::new(embedder);
    index.build(config).await?;

    let sql = SqlEngine::connect_in_memory(llm.clone()).await?;
    sql.ingest_csv_dir(&config.data.tables).await?;

    let router = Router::new(llm.clone());

    Ok(Engine::new(
        index,
        sql,
        router,
        llm,
        config.retrieval.clone(),
    ))
}
