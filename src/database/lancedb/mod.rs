// LanceDB vector database module
// Handles vector storage and similarity search for chunk embeddings


pub mod vector_store;

use serde::{Deserialize, Serialize};

use crate::dataset::{ChunkRecord, DocumentMetadata};

/// A chunk and its vector, stored together as one row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub chunk: ChunkRecord,
    pub vector: Vec<f32>,
    /// Set when the vector is a zero placeholder for a failed embedding
    pub degraded: bool,
}

impl EmbeddingRecord {
    #[inline]
    pub fn position(&self) -> u64 {
        self.chunk.position
    }
}

/// A row returned by a nearest-neighbour query
#[derive(Debug, Clone, PartialEq)]
pub struct StoredHit {
    pub position: u64,
    pub text: String,
    pub metadata: DocumentMetadata,
    pub degraded: bool,
    /// Squared L2 distance to the query vector
    pub distance: f32,
}
