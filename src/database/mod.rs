// Database module
// LanceDB storage for chunk vectors and their metadata

pub mod lancedb;

pub use self::lancedb::{EmbeddingRecord, StoredHit, vector_store::VectorStore};
