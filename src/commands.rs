use anyhow::{Context, Result};
use console::style;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::embeddings::chunking::{ChunkingConfig, chunk_title, truncate_chars};
use crate::embeddings::ollama::OllamaClient;
use crate::indexer::{DocumentStore, IndexState};

fn open_store() -> Result<DocumentStore<OllamaClient>> {
    let config = Config::load().context("Failed to load configuration")?;
    let client = OllamaClient::new(&config.ollama).context("Failed to initialize Ollama client")?;
    Ok(DocumentStore::new(config, Arc::new(client)))
}

/// Build (or rebuild) the index from the configured dataset
#[inline]
pub async fn build_index() -> Result<()> {
    let store = open_store()?;

    if let Err(e) = store.embedder().health_check() {
        warn!("Ollama health check failed: {:#}", e);
        eprintln!(
            "{}",
            style("⚠ Ollama is not reachable, chunks will be stored with zero vectors").yellow()
        );
    }

    println!(
        "Building index from {}",
        style(store.config().dataset_path().display()).cyan()
    );
    let (index, report) = store.build_index().await?;

    println!("{}", style("✓ Index built").green());
    println!("  Documents: {}", report.documents);
    println!("  Chunks: {}", report.chunks);
    if index.is_fully_degraded() {
        eprintln!(
            "{}",
            style("⚠ No chunk could be embedded. Rebuild once Ollama is reachable.").red()
        );
    } else if report.degraded > 0 {
        println!(
            "  Degraded: {}",
            style(format!("{} chunks have zero vectors", report.degraded)).yellow()
        );
    }
    if index.is_partitioned() {
        println!("  Partitions: {}", report.partitions);
    } else {
        println!("  Partitions: none (exact search)");
    }
    println!("  Duration: {:.1}s", report.elapsed.as_secs_f64());
    println!("  Location: {}", index.store().path().display());

    Ok(())
}

/// Search the index and print the nearest sources
#[inline]
pub async fn search(query: &str, k: usize, excerpt_chars: usize) -> Result<()> {
    let store = open_store()?;
    let index = store.load_index().await?;
    if index.is_fully_degraded() {
        eprintln!(
            "{}",
            style("⚠ The index holds only zero vectors. Run `ragstore build` once Ollama is reachable.")
                .yellow()
        );
    }
    let retriever = store.retriever(index);

    let response = retriever.search(query, k).await?;
    info!("Search for '{}' returned {} hits", query, response.hits.len());

    if response.degraded {
        eprintln!(
            "{}",
            style("⚠ Query embedding failed, results are not ranked by meaning").yellow()
        );
    }

    if response.hits.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Sources:");
    for (rank, hit) in response.hits.iter().enumerate() {
        println!(
            "{}. {} ({})",
            rank + 1,
            style(&hit.metadata.title).bold(),
            style(&hit.metadata.url).cyan()
        );
        println!("   {}", hit.excerpt(excerpt_chars));
        println!("   {}", style(format!("distance {:.4}", hit.distance)).dim());
    }

    if response.skipped > 0 {
        println!();
        println!(
            "{}",
            style(format!(
                "{} hits were outside the loaded index and skipped. Rebuild with `ragstore build`.",
                response.skipped
            ))
            .yellow()
        );
    }

    Ok(())
}

/// Show the state of the persisted index
#[inline]
pub async fn show_status() -> Result<()> {
    let store = open_store()?;
    let index_path = store.config().index_path();

    println!("{}", style("Index Status").bold().cyan());
    println!("  Location: {}", index_path.display());

    let index = match store.load_index().await {
        Ok(index) => index,
        Err(e) => {
            println!("  State: {}", style(e).red());
            return Ok(());
        }
    };

    let state = match index.state() {
        IndexState::Built => "built",
        IndexState::Loaded => "loaded",
    };
    println!("  State: {}", style(state).green());
    println!("  Chunks: {}", index.len());
    println!("  Dimension: {}", index.dimension());
    println!(
        "  Search: {}",
        if index.is_partitioned() {
            "partitioned (IVF_FLAT, L2)"
        } else {
            "exact (L2)"
        }
    );

    match index.manifest() {
        Some(manifest) => {
            println!("  Model: {}", manifest.model);
            println!(
                "  Chunking: {} words, {} overlap",
                manifest.chunk_size, manifest.overlap
            );
            println!("  Partitions: {}", manifest.partitions);
            if manifest.degraded > 0 {
                println!(
                    "  Degraded: {}",
                    style(format!("{} chunks", manifest.degraded)).yellow()
                );
            }
            println!(
                "  Built: {}",
                manifest.built_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
        None => println!("  Manifest: {}", style("missing").yellow()),
    }

    match store.embedder().validate_model() {
        Ok(()) => println!("  Ollama: {}", style("model available").green()),
        Err(e) => println!("  Ollama: {} ({:#})", style("unavailable").red(), e),
    }

    Ok(())
}

/// Split a text file into sections and print each section's title
#[inline]
pub fn chunk_file(path: &Path, chunking: ChunkingConfig) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let chunks = chunking.chunk(&text);
    println!(
        "{} sections ({} words each, {} overlap)",
        chunks.len(),
        chunking.chunk_size,
        chunking.overlap
    );

    for (number, chunk) in chunks.iter().enumerate() {
        println!();
        println!(
            "{}",
            style(format!("Section {}: {}", number + 1, chunk_title(chunk))).bold()
        );
        println!("{}", truncate_chars(chunk, 200));
    }

    Ok(())
}
