use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ragstore::Result;
use ragstore::commands::{build_index, chunk_file, search, show_status};
use ragstore::config::{run_interactive_config, show_config};
use ragstore::embeddings::ChunkingConfig;

#[derive(Parser)]
#[command(name = "ragstore")]
#[command(about = "Build and query a vector index over a paper dataset")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection, dataset and index settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Build or rebuild the index from the dataset
    Build,
    /// Retrieve the chunks nearest to a query
    Search {
        /// Natural language query
        query: String,
        /// Number of results to return
        #[arg(short, default_value_t = 3)]
        k: usize,
        /// Characters of each result to print
        #[arg(long, default_value_t = 200)]
        excerpt: usize,
    },
    /// Show the state of the persisted index
    Status,
    /// Split a text file into sections the way uploads are chunked
    Chunk {
        /// UTF-8 text file
        file: PathBuf,
        /// Words per section
        #[arg(long)]
        size: Option<usize>,
        /// Words shared between consecutive sections
        #[arg(long)]
        overlap: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Build => {
            build_index().await?;
        }
        Commands::Search { query, k, excerpt } => {
            search(&query, k, excerpt).await?;
        }
        Commands::Status => {
            show_status().await?;
        }
        Commands::Chunk {
            file,
            size,
            overlap,
        } => {
            let defaults = ChunkingConfig::upload();
            let chunking = ChunkingConfig {
                chunk_size: size.unwrap_or(defaults.chunk_size),
                overlap: overlap.unwrap_or(defaults.overlap),
            };
            chunk_file(&file, chunking)?;
        }
    }

    Ok(())
}
