//! Query-time retrieval over a loaded index.

use std::sync::Arc;

use tracing::debug;

use super::index::VectorIndex;
use crate::error::Result;
use crate::llm::Embedder;
use crate::models::Chunk;

pub const DEFAULT_TOP_K: usize = 5;

pub struct Retriever {
    index: VectorIndex,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl Retriever {
    pub fn new(index: VectorIndex, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            index,
            embedder,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub const fn top_k(&self) -> usize {
        self.top_k
    }

    /// The `top_k` chunks most similar to `query`.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<Chunk>> {
        let vector = self.embedder.embed_query(query).await?;
        let hits = self.index.search(&vector, self.top_k);
        debug!(
            hits = hits.len(),
            best = hits.first().map(|h| h.score),
            "Retrieved context chunks"
        );
        Ok(hits.into_iter().map(|h| h.chunk).collect())
    }
}
