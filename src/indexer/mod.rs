// Indexer module
// Builds the chunk index from the dataset and loads it back from disk


use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::database::{EmbeddingRecord, VectorStore};
use crate::dataset::{self, ChunkRecord};
use crate::embeddings::{Embedder, embed_texts_with_progress};
use crate::search::Retriever;
use crate::{Result, RetrievalError};

pub const MANIFEST_FILE_NAME: &str = "build_manifest.json";

/// How a [`RetrievalIndex`] came to be in memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Built,
    Loaded,
}

/// Details of the last build, persisted next to the table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifest {
    pub model: String,
    pub dimension: usize,
    pub chunk_size: usize,
    pub overlap: usize,
    pub rows: u64,
    pub degraded: u64,
    pub partitions: u32,
    pub built_at: DateTime<Utc>,
}

impl BuildManifest {
    #[inline]
    pub fn path_in(index_path: &Path) -> PathBuf {
        index_path.join(MANIFEST_FILE_NAME)
    }

    fn read(index_path: &Path) -> Option<Self> {
        let path = Self::path_in(index_path);
        let content = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                warn!("Ignoring unreadable manifest {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Every stored vector is a zero placeholder, so search ranking is arbitrary
    #[inline]
    pub fn is_fully_degraded(&self) -> bool {
        self.rows > 0 && self.degraded >= self.rows
    }

    fn write(&self, index_path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| RetrievalError::Database(format!("Failed to serialize manifest: {}", e)))?;
        std::fs::write(Self::path_in(index_path), content)?;
        Ok(())
    }
}

/// Outcome of a build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub documents: usize,
    pub chunks: usize,
    pub degraded: usize,
    pub partitions: u32,
    pub elapsed: Duration,
}

/// A built or loaded index, ready to be searched
pub struct RetrievalIndex {
    store: VectorStore,
    rows: u64,
    dimension: usize,
    partitioned: bool,
    state: IndexState,
    manifest: Option<BuildManifest>,
}

impl RetrievalIndex {
    #[inline]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Row count observed when the index was built or loaded
    #[inline]
    pub fn len(&self) -> u64 {
        self.rows
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn is_partitioned(&self) -> bool {
        self.partitioned
    }

    #[inline]
    pub fn state(&self) -> IndexState {
        self.state
    }

    #[inline]
    pub fn manifest(&self) -> Option<&BuildManifest> {
        self.manifest.as_ref()
    }

    /// The last build could not embed any chunk
    #[inline]
    pub fn is_fully_degraded(&self) -> bool {
        self.manifest
            .as_ref()
            .is_some_and(BuildManifest::is_fully_degraded)
    }
}

/// Number of IVF partitions for a table of `rows` vectors
///
/// Each partition holds at least `rows_per_partition` vectors and there are
/// never more than `max_partitions`. Zero means the table is too small to
/// partition.
#[inline]
pub fn partition_count(rows: u64, max_partitions: u32, rows_per_partition: u32) -> u32 {
    let per_partition = u64::from(rows_per_partition.max(1));
    let wanted = rows / per_partition;
    u32::try_from(wanted).map_or(max_partitions, |wanted| wanted.min(max_partitions))
}

/// Owns the configuration and embedder used to build, load and query the index
pub struct DocumentStore<E: Embedder> {
    config: Config,
    embedder: Arc<E>,
}

impl<E: Embedder> DocumentStore<E> {
    #[inline]
    pub fn new(config: Config, embedder: Arc<E>) -> Self {
        Self { config, embedder }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn embedder(&self) -> &Arc<E> {
        &self.embedder
    }

    /// Build the index from the dataset, replacing any index already on disk
    #[inline]
    pub async fn build_index(&self) -> Result<(RetrievalIndex, BuildReport)> {
        let started = Instant::now();
        let dataset_path = self.config.dataset_path();
        let index_path = self.config.index_path();

        let documents = dataset::load_documents(&dataset_path)?;
        let chunks = dataset::split_documents(&documents, &self.config.chunking);
        if chunks.is_empty() {
            return Err(RetrievalError::EmptyDataset(dataset_path));
        }
        info!(
            "Embedding {} chunks from {} documents",
            chunks.len(),
            documents.len()
        );

        let records = self.embed_chunks(chunks);
        let degraded = records.iter().filter(|r| r.degraded).count();
        if degraded == records.len() {
            warn!(
                "No chunk could be embedded, the index will not rank results by meaning"
            );
        } else if degraded > 0 {
            warn!(
                "{} of {} chunks were stored with zero vectors",
                degraded,
                records.len()
            );
        }

        let dimension = self.embedder.dimension();
        let store = VectorStore::create(&index_path).await?;
        store.replace_all(&records, dimension).await?;

        let rows = records.len() as u64;
        let partitions = self.train_partitions(&store, rows).await?;

        let manifest = BuildManifest {
            model: self.embedder.model_name().to_string(),
            dimension,
            chunk_size: self.config.chunking.chunk_size,
            overlap: self.config.chunking.overlap,
            rows,
            degraded: degraded as u64,
            partitions,
            built_at: Utc::now(),
        };
        manifest.write(&index_path)?;

        let report = BuildReport {
            documents: documents.len(),
            chunks: records.len(),
            degraded,
            partitions,
            elapsed: started.elapsed(),
        };
        info!(
            "Built index at {} with {} rows in {:.1}s",
            index_path.display(),
            rows,
            report.elapsed.as_secs_f64()
        );

        let index = RetrievalIndex {
            store,
            rows,
            dimension,
            partitioned: partitions > 0,
            state: IndexState::Built,
            manifest: Some(manifest),
        };
        Ok((index, report))
    }

    /// Load the persisted index without modifying it
    #[inline]
    pub async fn load_index(&self) -> Result<RetrievalIndex> {
        let index_path = self.config.index_path();
        let store = VectorStore::open(&index_path).await?;

        let rows = store.count_rows().await?;
        if rows == 0 {
            return Err(RetrievalError::EmptyIndex(index_path));
        }

        let dimension = store.vector_dimension().await?;
        if dimension != self.embedder.dimension() {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.embedder.dimension(),
                actual: dimension,
            });
        }

        let manifest = BuildManifest::read(&index_path);
        if let Some(manifest) = &manifest {
            if manifest.model != self.embedder.model_name() {
                warn!(
                    "Index was built with model '{}' but queries use '{}'",
                    manifest.model,
                    self.embedder.model_name()
                );
            }
            if manifest.is_fully_degraded() {
                warn!(
                    "Every chunk in {} was stored with a zero vector; rebuild once the model is reachable",
                    index_path.display()
                );
            }
        }

        let partitioned = store.has_partition_index().await?;
        info!(
            "Loaded index at {} with {} rows ({})",
            index_path.display(),
            rows,
            if partitioned { "partitioned" } else { "exact scan" }
        );

        Ok(RetrievalIndex {
            store,
            rows,
            dimension,
            partitioned,
            state: IndexState::Loaded,
            manifest,
        })
    }

    /// Load the index when one exists on disk, otherwise build it
    #[inline]
    pub async fn open_or_build(&self) -> Result<RetrievalIndex> {
        match self.load_index().await {
            Ok(index) => Ok(index),
            Err(RetrievalError::IndexNotFound(path)) => {
                info!("No index at {}, building one", path.display());
                let (index, _) = self.build_index().await?;
                Ok(index)
            }
            Err(e) => Err(e),
        }
    }

    /// A query handle over `index` sharing this store's embedder
    #[inline]
    pub fn retriever(&self, index: RetrievalIndex) -> Retriever<E> {
        Retriever::new(
            index,
            Arc::clone(&self.embedder),
            self.config.index.nprobes as usize,
            self.config.index.display_chars,
        )
    }

    fn embed_chunks(&self, chunks: Vec<ChunkRecord>) -> Vec<EmbeddingRecord> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();

        let bar = if console::user_attended_stderr() {
            ProgressBar::new(texts.len() as u64).with_style(
                ProgressStyle::with_template("{bar:40} [{pos}/{len}] Embedding chunks ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            )
        } else {
            ProgressBar::hidden()
        };

        let embeddings = embed_texts_with_progress(
            self.embedder.as_ref(),
            &texts,
            self.config.ollama.batch_size as usize,
            |done| bar.set_position(done as u64),
        );
        bar.finish_and_clear();

        chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                let degraded = embedding.is_degraded();
                EmbeddingRecord {
                    chunk,
                    vector: embedding.into_vector(),
                    degraded,
                }
            })
            .collect()
    }

    async fn train_partitions(&self, store: &VectorStore, rows: u64) -> Result<u32> {
        let settings = &self.config.index;
        if rows < u64::from(settings.min_rows_for_partitions) {
            debug!(
                "{} rows is below {}, keeping exact search",
                rows, settings.min_rows_for_partitions
            );
            return Ok(0);
        }

        let partitions = partition_count(rows, settings.max_partitions, settings.rows_per_partition);
        if partitions == 0 {
            return Ok(0);
        }

        store.create_partition_index(partitions).await?;
        Ok(partitions)
    }
}
