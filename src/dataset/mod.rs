// Dataset module
// Reads the paper dataset and splits it into chunk records


use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::embeddings::chunking::ChunkingConfig;
use crate::{Result, RetrievalError};

const REQUIRED_COLUMNS: [&str; 3] = ["title", "abstract", "url"];

/// Source attribution carried by every chunk of a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: String,
    pub url: String,
}

/// A paper from the dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub text: String,
    pub metadata: DocumentMetadata,
}

/// A chunk of a document together with its source metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Insertion order across the whole dataset, equal to the index row order
    pub position: u64,
    pub text: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Deserialize)]
struct DatasetRow {
    title: String,
    #[serde(rename = "abstract")]
    abstract_text: String,
    url: String,
}

impl From<DatasetRow> for Document {
    fn from(row: DatasetRow) -> Self {
        Self {
            text: row.abstract_text,
            metadata: DocumentMetadata {
                title: row.title,
                url: row.url,
            },
        }
    }
}

/// Read all documents from a CSV file with `title`, `abstract` and `url`
/// columns
///
/// Rows that cannot be parsed are skipped with a warning.
#[inline]
pub fn load_documents(path: &Path) -> Result<Vec<Document>> {
    if !path.is_file() {
        return Err(RetrievalError::DatasetNotFound(path.to_path_buf()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| RetrievalError::Dataset(format!("Failed to open {}: {}", path.display(), e)))?;

    let headers = reader
        .headers()
        .map_err(|e| RetrievalError::Dataset(format!("Failed to read header row: {}", e)))?
        .clone();
    if let Some(missing) = REQUIRED_COLUMNS
        .iter()
        .find(|column| !headers.iter().any(|h| h.trim() == **column))
    {
        return Err(RetrievalError::Dataset(format!(
            "Dataset {} is missing required column '{}'",
            path.display(),
            missing
        )));
    }

    let mut documents = Vec::new();
    let mut skipped = 0_usize;
    for (row_idx, result) in reader.deserialize::<DatasetRow>().enumerate() {
        match result {
            Ok(row) => documents.push(Document::from(row)),
            Err(e) => {
                skipped += 1;
                warn!("Skipping malformed dataset row {}: {}", row_idx + 1, e);
            }
        }
    }

    info!(
        "Loaded {} documents from {} ({} rows skipped)",
        documents.len(),
        path.display(),
        skipped
    );
    Ok(documents)
}

/// Split documents into chunk records, numbering chunks in dataset order
#[inline]
pub fn split_documents(documents: &[Document], chunking: &ChunkingConfig) -> Vec<ChunkRecord> {
    let mut records = Vec::new();

    for document in documents {
        for text in chunking.chunk(&document.text) {
            records.push(ChunkRecord {
                position: records.len() as u64,
                text,
                metadata: document.metadata.clone(),
            });
        }
    }

    debug!(
        "Split {} documents into {} chunks",
        documents.len(),
        records.len()
    );
    records
}

/// Load the dataset and split it into chunk records
#[inline]
pub fn load_and_split(path: &Path, chunking: &ChunkingConfig) -> Result<Vec<ChunkRecord>> {
    let documents = load_documents(path)?;
    Ok(split_documents(&documents, chunking))
}
