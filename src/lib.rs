use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RetrievalError>;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dataset not found at {}", .0.display())]
    DatasetNotFound(PathBuf),

    #[error("Dataset at {} produced no chunks", .0.display())]
    EmptyDataset(PathBuf),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Index not found at {}. Run `ragstore build` first to generate it.", .0.display())]
    IndexNotFound(PathBuf),

    #[error("Loaded index at {} is empty", .0.display())]
    EmptyIndex(PathBuf),

    #[error("Index vectors have {actual} dimensions but the embedder produces {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod database;
pub mod dataset;
pub mod embeddings;
pub mod indexer;
pub mod search;

#[cfg(test)]
mod test_support;
