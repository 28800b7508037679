// Search module
// Embeds queries and retrieves the nearest chunks with their source metadata


use std::sync::Arc;

use tracing::{debug, warn};

use crate::Result;
use crate::dataset::DocumentMetadata;
use crate::embeddings::chunking::truncate_chars;
use crate::embeddings::{Embedder, embed_query};
use crate::indexer::RetrievalIndex;

/// A retrieved chunk and the paper it came from
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub text: String,
    pub metadata: DocumentMetadata,
    pub distance: f32,
    pub position: u64,
}

impl SearchHit {
    /// The first `max_chars` characters of the chunk, with `...` appended
    /// when the text was cut
    #[inline]
    pub fn excerpt(&self, max_chars: usize) -> String {
        let cut = truncate_chars(&self.text, max_chars);
        if cut.len() < self.text.len() {
            format!("{}...", cut)
        } else {
            cut.to_string()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    /// Nearest first
    pub hits: Vec<SearchHit>,
    /// The query was searched with a zero vector because embedding failed
    pub degraded: bool,
    /// Hits dropped because their position was outside the loaded index
    pub skipped: usize,
}

/// Query handle over a loaded or freshly built index
pub struct Retriever<E: Embedder> {
    index: RetrievalIndex,
    embedder: Arc<E>,
    nprobes: usize,
    display_chars: usize,
}

impl<E: Embedder> Retriever<E> {
    #[inline]
    pub fn new(index: RetrievalIndex, embedder: Arc<E>, nprobes: usize, display_chars: usize) -> Self {
        Self {
            index,
            embedder,
            nprobes,
            display_chars,
        }
    }

    #[inline]
    pub fn index(&self) -> &RetrievalIndex {
        &self.index
    }

    /// The `k` chunks nearest to `query`
    #[inline]
    pub async fn search(&self, query: &str, k: usize) -> Result<SearchResponse> {
        if k == 0 {
            return Ok(SearchResponse::default());
        }

        let embedding = embed_query(self.embedder.as_ref(), query);
        let degraded = embedding.is_degraded();
        if degraded {
            warn!("Searching with a zero vector, results are not meaningful");
        }

        let stored = self
            .index
            .store()
            .nearest(embedding.vector(), k, self.nprobes)
            .await?;

        let rows = self.index.len();
        let mut skipped = 0;
        let mut hits = Vec::with_capacity(stored.len());
        for hit in stored {
            if hit.position >= rows {
                warn!(
                    "Skipping hit at position {} outside the {} indexed chunks",
                    hit.position, rows
                );
                skipped += 1;
                continue;
            }
            hits.push(SearchHit {
                text: truncate_chars(&hit.text, self.display_chars).to_string(),
                metadata: hit.metadata,
                distance: hit.distance,
                position: hit.position,
            });
        }

        debug!("Query returned {} hits ({} skipped)", hits.len(), skipped);
        Ok(SearchResponse {
            hits,
            degraded,
            skipped,
        })
    }
}
