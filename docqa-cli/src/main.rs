use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use docqa_cli::commands::{clear_index, index_stats, run_chat, run_ingest};
use docqa_cli::render::{format_response, format_stats};
use docqa_cli::server::{AppState, ServerConfig, run_server};
use docqa_cli::settings::{Settings, StoreKind};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docqa")]
#[command(about = "Answer questions from your PDF documents", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON settings file
    #[arg(short, long, global = true, env = "DOCQA_CONFIG")]
    config: Option<PathBuf>,

    /// Override the index snapshot path
    #[arg(long, global = true)]
    index: Option<PathBuf>,

    /// Override the vector index backend
    #[arg(long, global = true, value_enum)]
    store: Option<StoreKind>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add PDF files to the index
    Ingest {
        /// Files to ingest; every PDF in --dir when omitted
        files: Vec<PathBuf>,

        /// Directory scanned when no files are given
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Clear the index first
        #[arg(long)]
        clear: bool,
    },

    /// Ask one question
    Query {
        question: String,

        /// Print the response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Interactive question loop
    Chat,

    /// Show index size
    Stats,

    /// Remove every document from the index
    Clear,

    /// Serve the HTTP API
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(short, long, default_value_t = 8000)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(index) = cli.index {
        settings.index_path = index;
    }
    if let Some(store) = cli.store {
        settings.store = store;
    }

    match cli.command {
        Commands::Stats => println!("{}", format_stats(&index_stats(&settings).await?)),
        Commands::Clear => {
            clear_index(&settings).await?;
            println!("Index cleared.");
        }
        Commands::Ingest { files, dir, clear } => {
            let qa = settings.build_assistant().await?;
            let dir = dir.unwrap_or_else(|| settings.upload_dir.clone());
            run_ingest(&qa, files, &dir, clear).await?;
        }
        Commands::Query { question, json } => {
            let response = settings.build_assistant().await?.query(&question).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("{}", format_response(&response));
            }
        }
        Commands::Chat => run_chat(&settings.build_assistant().await?).await?,
        Commands::Serve { host, port } => {
            let qa = settings.build_assistant().await?;
            let state = AppState::new(Arc::new(qa))
                .with_upload_dir(settings.upload_dir.clone())
                .with_max_upload_bytes(settings.max_upload_bytes);
            run_server(state, ServerConfig { host, port }).await?;
        }
    }

    Ok(())
}
