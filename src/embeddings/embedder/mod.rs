
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

/// A sentence-embedding model that maps text to fixed-width vectors
pub trait Embedder: Send + Sync {
    /// Identifier of the underlying model
    fn model_name(&self) -> &str;

    /// Width of every vector this model produces
    fn dimension(&self) -> usize;

    /// Embed a batch of texts, returning one vector per input in order
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

impl<E: Embedder + ?Sized> Embedder for Arc<E> {
    #[inline]
    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    #[inline]
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_batch(texts)
    }
}

/// Outcome of embedding a single text
#[derive(Debug, Clone, PartialEq)]
pub enum Embedding {
    /// Vector produced by the model
    Model(Vec<f32>),
    /// All-zero stand-in used when the model could not produce a vector
    Degraded(Vec<f32>),
}

impl Embedding {
    #[inline]
    pub fn zeroed(dimension: usize) -> Self {
        Self::Degraded(vec![0.0; dimension])
    }

    #[inline]
    pub fn vector(&self) -> &[f32] {
        match self {
            Self::Model(vector) | Self::Degraded(vector) => vector,
        }
    }

    #[inline]
    pub fn into_vector(self) -> Vec<f32> {
        match self {
            Self::Model(vector) | Self::Degraded(vector) => vector,
        }
    }

    #[inline]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }
}

/// Embed a search query, substituting a zero vector if the model fails
#[inline]
pub fn embed_query<E: Embedder + ?Sized>(embedder: &E, query: &str) -> Embedding {
    let dimension = embedder.dimension();
    match embed_checked(embedder, &[query.to_string()]) {
        Ok(mut vectors) => vectors
            .pop()
            .map_or_else(|| Embedding::zeroed(dimension), Embedding::Model),
        Err(e) => {
            warn!(
                "Embedding failed for query with model {}: {:#}",
                embedder.model_name(),
                e
            );
            Embedding::zeroed(dimension)
        }
    }
}

/// Embed texts in batches of `batch_size`
///
/// A batch that fails is replaced by zero vectors so the output always has
/// one entry per input.
#[inline]
pub fn embed_texts<E: Embedder + ?Sized>(
    embedder: &E,
    texts: &[String],
    batch_size: usize,
) -> Vec<Embedding> {
    embed_texts_with_progress(embedder, texts, batch_size, |done| {
        debug!("Embedded {}/{} texts", done, texts.len());
    })
}

/// Same as [`embed_texts`], reporting the number of texts processed after
/// each batch
#[inline]
pub fn embed_texts_with_progress<E, F>(
    embedder: &E,
    texts: &[String],
    batch_size: usize,
    mut on_batch: F,
) -> Vec<Embedding>
where
    E: Embedder + ?Sized,
    F: FnMut(usize),
{
    let dimension = embedder.dimension();
    let mut embeddings = Vec::with_capacity(texts.len());

    for batch in texts.chunks(batch_size.max(1)) {
        match embed_checked(embedder, batch) {
            Ok(vectors) => embeddings.extend(vectors.into_iter().map(Embedding::Model)),
            Err(e) => {
                warn!(
                    "Embedding batch of {} texts failed, using zero vectors: {:#}",
                    batch.len(),
                    e
                );
                embeddings.extend(batch.iter().map(|_| Embedding::zeroed(dimension)));
            }
        }
        on_batch(embeddings.len());
    }

    embeddings
}

/// Call the model and verify it returned one correctly sized vector per input
fn embed_checked<E: Embedder + ?Sized>(embedder: &E, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let vectors = embedder.embed_batch(texts)?;

    if vectors.len() != texts.len() {
        anyhow::bail!(
            "Mismatch between request and response counts: {} vs {}",
            texts.len(),
            vectors.len()
        );
    }

    let expected = embedder.dimension();
    if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
        anyhow::bail!(
            "Invalid vector dimension: expected {}, got {}",
            expected,
            bad.len()
        );
    }

    Ok(vectors)
}
