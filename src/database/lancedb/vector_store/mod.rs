#[cfg(test)]
mod tests;

use super::{EmbeddingRecord, StoredHit};
use crate::dataset::DocumentMetadata;
use crate::{Result, RetrievalError};
use arrow::array::{
    Array, BooleanArray, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray,
    UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::index::Index;
use lancedb::index::vector::IvfFlatIndexBuilder;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub const TABLE_NAME: &str = "chunks";

/// Rows written to LanceDB per record batch
const WRITE_BATCH_ROWS: usize = 1024;

/// Chunk vectors and metadata stored in a single LanceDB table
pub struct VectorStore {
    connection: Connection,
    path: PathBuf,
    table_name: String,
}

impl VectorStore {
    /// Connect to the database at `path`, creating the directory if needed
    #[inline]
    pub async fn create(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path).map_err(|e| {
            RetrievalError::Database(format!(
                "Failed to create index directory {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::connect(path).await
    }

    /// Connect to an existing index, failing if the directory or table is missing
    #[inline]
    pub async fn open(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return Err(RetrievalError::IndexNotFound(path.to_path_buf()));
        }

        let store = Self::connect(path).await?;
        if !store.table_exists().await? {
            return Err(RetrievalError::IndexNotFound(path.to_path_buf()));
        }
        Ok(store)
    }

    async fn connect(path: &Path) -> Result<Self> {
        debug!("Connecting to LanceDB at path: {:?}", path);
        let uri = format!("file://{}", path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RetrievalError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        Ok(Self {
            connection,
            path: path.to_path_buf(),
            table_name: TABLE_NAME.to_string(),
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub async fn table_exists(&self) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RetrievalError::Database(format!("Failed to list tables: {}", e)))?;
        Ok(table_names.contains(&self.table_name))
    }

    async fn open_table(&self) -> Result<Table> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RetrievalError::Database(format!("Failed to open table: {}", e)))
    }

    /// Replace the table contents with `records`, in position order
    ///
    /// Every vector must have `dimension` components.
    #[inline]
    pub async fn replace_all(&self, records: &[EmbeddingRecord], dimension: usize) -> Result<()> {
        if let Some(bad) = records.iter().find(|r| r.vector.len() != dimension) {
            return Err(RetrievalError::DimensionMismatch {
                expected: dimension,
                actual: bad.vector.len(),
            });
        }

        self.drop_table_if_exists().await?;

        let schema = create_schema(dimension);
        self.connection
            .create_empty_table(&self.table_name, Arc::clone(&schema))
            .execute()
            .await
            .map_err(|e| RetrievalError::Database(format!("Failed to create table: {}", e)))?;

        if records.is_empty() {
            debug!("No rows to store");
            return Ok(());
        }

        let batches = records
            .chunks(WRITE_BATCH_ROWS)
            .map(|batch| create_record_batch(&schema, batch, dimension))
            .collect::<Result<Vec<_>>>()?;

        let table = self.open_table().await?;
        let reader = RecordBatchIterator::new(batches.into_iter().map(Ok), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| RetrievalError::Database(format!("Failed to insert rows: {}", e)))?;

        info!("Stored {} rows in {}", records.len(), self.path.display());
        Ok(())
    }

    #[inline]
    pub async fn count_rows(&self) -> Result<u64> {
        let table = self.open_table().await?;
        let count = table
            .count_rows(None)
            .await
            .map_err(|e| RetrievalError::Database(format!("Failed to count rows: {}", e)))?;
        Ok(count as u64)
    }

    /// Width of the stored vectors, read from the table schema
    #[inline]
    pub async fn vector_dimension(&self) -> Result<usize> {
        let table = self.open_table().await?;
        let schema = table
            .schema()
            .await
            .map_err(|e| RetrievalError::Database(format!("Failed to get table schema: {}", e)))?;

        schema
            .fields()
            .iter()
            .find(|field| field.name() == "vector")
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            })
            .ok_or_else(|| {
                RetrievalError::Database(
                    "Could not find vector column or determine dimension".to_string(),
                )
            })
    }

    /// Train an IVF_FLAT partition index over L2 distance on the vector column
    #[inline]
    pub async fn create_partition_index(&self, num_partitions: u32) -> Result<()> {
        debug!("Training vector index with {} partitions", num_partitions);
        let table = self.open_table().await?;

        let builder = IvfFlatIndexBuilder::default()
            .distance_type(DistanceType::L2)
            .num_partitions(num_partitions);
        table
            .create_index(&["vector"], Index::IvfFlat(builder))
            .replace(true)
            .execute()
            .await
            .map_err(|e| RetrievalError::Database(format!("Failed to create vector index: {}", e)))?;

        info!("Vector index created with {} partitions", num_partitions);
        Ok(())
    }

    #[inline]
    pub async fn has_partition_index(&self) -> Result<bool> {
        let table = self.open_table().await?;
        let indices = table
            .list_indices()
            .await
            .map_err(|e| RetrievalError::Database(format!("Failed to list indices: {}", e)))?;
        Ok(indices
            .iter()
            .any(|index| index.columns.iter().any(|column| column == "vector")))
    }

    /// The `limit` rows nearest to `query`, nearest first
    ///
    /// `nprobes` only applies once a partition index exists. Without one
    /// the table is scanned exhaustively.
    #[inline]
    pub async fn nearest(
        &self,
        query: &[f32],
        limit: usize,
        nprobes: usize,
    ) -> Result<Vec<StoredHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        debug!("Searching for nearest vectors with limit: {}", limit);

        let table = self.open_table().await?;
        let results = table
            .vector_search(query)
            .map_err(|e| RetrievalError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::L2)
            .nprobes(nprobes)
            .limit(limit)
            .execute()
            .await
            .map_err(|e| RetrievalError::Database(format!("Failed to execute search: {}", e)))?;

        let mut hits = parse_search_results_stream(results).await?;
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(hits)
    }

    async fn drop_table_if_exists(&self) -> Result<()> {
        if self.table_exists().await? {
            info!("Dropping existing {} table", self.table_name);
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| RetrievalError::Database(format!("Failed to drop table: {}", e)))?;
        }
        Ok(())
    }
}

fn create_schema(vector_dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("position", DataType::UInt64, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("title", DataType::Utf8, false),
        Field::new("url", DataType::Utf8, false),
        Field::new("degraded", DataType::Boolean, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                vector_dim as i32,
            ),
            false,
        ),
    ]))
}

fn create_record_batch(
    schema: &Arc<Schema>,
    records: &[EmbeddingRecord],
    vector_dim: usize,
) -> Result<RecordBatch> {
    let mut flat_values = Vec::with_capacity(records.len() * vector_dim);
    for record in records {
        flat_values.extend_from_slice(&record.vector);
    }
    let values_array = Float32Array::from(flat_values);
    let field = Arc::new(Field::new("item", DataType::Float32, false));
    let vector_array =
        FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
            .map_err(|e| {
                RetrievalError::Database(format!("Failed to create vector array: {}", e))
            })?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(UInt64Array::from_iter_values(
            records.iter().map(EmbeddingRecord::position),
        )),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.chunk.text.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.chunk.metadata.title.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.chunk.metadata.url.as_str()),
        )),
        Arc::new(BooleanArray::from(
            records.iter().map(|r| r.degraded).collect::<Vec<_>>(),
        )),
        Arc::new(vector_array),
    ];

    RecordBatch::try_new(Arc::clone(schema), arrays)
        .map_err(|e| RetrievalError::Database(format!("Failed to create record batch: {}", e)))
}

async fn parse_search_results_stream(
    mut results: lancedb::arrow::SendableRecordBatchStream,
) -> Result<Vec<StoredHit>> {
    let mut hits = Vec::new();

    while let Some(batch) = results
        .try_next()
        .await
        .map_err(|e| RetrievalError::Database(format!("Failed to read result stream: {}", e)))?
    {
        hits.extend(parse_search_batch(&batch)?);
    }

    debug!("Parsed {} search results from stream", hits.len());
    Ok(hits)
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RetrievalError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| RetrievalError::Database(format!("Invalid {} column type", name)))
}

fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<StoredHit>> {
    let positions = column::<UInt64Array>(batch, "position")?;
    let texts = column::<StringArray>(batch, "text")?;
    let titles = column::<StringArray>(batch, "title")?;
    let urls = column::<StringArray>(batch, "url")?;
    let degraded = column::<BooleanArray>(batch, "degraded")?;
    let distances = column::<Float32Array>(batch, "_distance")?;

    let hits = (0..batch.num_rows())
        .map(|row| StoredHit {
            position: positions.value(row),
            text: texts.value(row).to_string(),
            metadata: DocumentMetadata {
                title: titles.value(row).to_string(),
                url: urls.value(row).to_string(),
            },
            degraded: degraded.value(row),
            distance: if distances.is_null(row) {
                f32::INFINITY
            } else {
                distances.value(row)
            },
        })
        .collect();

    Ok(hits)
}
