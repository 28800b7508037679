use super::*;
use crate::dataset::ChunkRecord;
use tempfile::TempDir;

const DIM: usize = 4;

fn record(position: u64, vector: Vec<f32>) -> EmbeddingRecord {
    EmbeddingRecord {
        chunk: ChunkRecord {
            position,
            text: format!("chunk text {}", position),
            metadata: DocumentMetadata {
                title: format!("Paper {}", position),
                url: format!("https://arxiv.org/abs/{}", position),
            },
        },
        vector,
        degraded: false,
    }
}

/// Points spread along the first axis, one per position
fn line_records(count: u64) -> Vec<EmbeddingRecord> {
    (0..count)
        .map(|i| record(i, vec![i as f32, 0.0, 0.0, 0.0]))
        .collect()
}

async fn create_store() -> (VectorStore, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = VectorStore::create(&temp_dir.path().join("chunks.lance"))
        .await
        .expect("should create vector store");
    (store, temp_dir)
}

#[tokio::test]
async fn open_missing_index_is_not_found() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("missing.lance");

    let result = VectorStore::open(&path).await;
    assert!(matches!(result, Err(RetrievalError::IndexNotFound(p)) if p == path));
}

#[tokio::test]
async fn open_directory_without_table_is_not_found() {
    let (store, _temp_dir) = create_store().await;

    let result = VectorStore::open(store.path()).await;
    assert!(matches!(result, Err(RetrievalError::IndexNotFound(_))));
}

#[tokio::test]
async fn replace_all_stores_rows_and_dimension() {
    let (store, _temp_dir) = create_store().await;

    store
        .replace_all(&line_records(3), DIM)
        .await
        .expect("should store rows");

    assert!(store.table_exists().await.expect("should list tables"));
    assert_eq!(store.count_rows().await.expect("should count rows"), 3);
    assert_eq!(
        store.vector_dimension().await.expect("should read dimension"),
        DIM
    );

    let reopened = VectorStore::open(store.path())
        .await
        .expect("should reopen store");
    assert_eq!(reopened.count_rows().await.expect("should count rows"), 3);
}

#[tokio::test]
async fn replace_all_discards_previous_rows() {
    let (store, _temp_dir) = create_store().await;

    store
        .replace_all(&line_records(5), DIM)
        .await
        .expect("should store rows");
    store
        .replace_all(&line_records(2), DIM)
        .await
        .expect("should replace rows");

    assert_eq!(store.count_rows().await.expect("should count rows"), 2);
}

#[tokio::test]
async fn replace_all_rejects_wrong_width() {
    let (store, _temp_dir) = create_store().await;
    let records = vec![record(0, vec![0.0; DIM]), record(1, vec![0.0; DIM + 1])];

    let result = store.replace_all(&records, DIM).await;
    assert!(matches!(
        result,
        Err(RetrievalError::DimensionMismatch {
            expected: DIM,
            actual: 5
        })
    ));
}

#[tokio::test]
async fn nearest_orders_by_distance() {
    let (store, _temp_dir) = create_store().await;
    store
        .replace_all(&line_records(10), DIM)
        .await
        .expect("should store rows");

    let hits = store
        .nearest(&[6.2, 0.0, 0.0, 0.0], 3, 5)
        .await
        .expect("search should succeed");

    let positions: Vec<u64> = hits.iter().map(|h| h.position).collect();
    assert_eq!(positions, vec![6, 7, 5]);
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    assert_eq!(hits[0].metadata.title, "Paper 6");
    assert_eq!(hits[0].text, "chunk text 6");
}

#[tokio::test]
async fn nearest_returns_all_rows_when_k_exceeds_size() {
    let (store, _temp_dir) = create_store().await;
    store
        .replace_all(&line_records(3), DIM)
        .await
        .expect("should store rows");

    let hits = store
        .nearest(&[0.0; DIM], 10, 5)
        .await
        .expect("search should succeed");
    assert_eq!(hits.len(), 3);

    let none = store
        .nearest(&[0.0; DIM], 0, 5)
        .await
        .expect("search should succeed");
    assert!(none.is_empty());
}

#[tokio::test]
async fn degraded_flag_is_persisted() {
    let (store, _temp_dir) = create_store().await;
    let mut records = line_records(2);
    records[1].vector = vec![0.0; DIM];
    records[1].degraded = true;
    store
        .replace_all(&records, DIM)
        .await
        .expect("should store rows");

    let hits = store
        .nearest(&[0.0; DIM], 2, 5)
        .await
        .expect("search should succeed");

    let degraded: Vec<(u64, bool)> = hits.iter().map(|h| (h.position, h.degraded)).collect();
    assert!(degraded.contains(&(1, true)));
    assert!(degraded.contains(&(0, false)));
}

#[tokio::test]
async fn partition_index_is_created() {
    let (store, _temp_dir) = create_store().await;
    let records: Vec<EmbeddingRecord> = (0..300_u64)
        .map(|i| {
            let x = i as f32;
            record(i, vec![x, (x * 0.5).sin(), (x * 0.25).cos(), 1.0])
        })
        .collect();
    store
        .replace_all(&records, DIM)
        .await
        .expect("should store rows");

    assert!(!store.has_partition_index().await.expect("should list indices"));
    store
        .create_partition_index(4)
        .await
        .expect("should train index");
    assert!(store.has_partition_index().await.expect("should list indices"));

    let hits = store
        .nearest(&records[150].vector, 1, 4)
        .await
        .expect("search should succeed");
    assert_eq!(hits[0].position, 150);
}
