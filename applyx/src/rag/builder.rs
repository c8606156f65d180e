//! Offline index build: load, split, embed.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use super::index::VectorIndex;
use super::loader::load_documents;
use super::splitter::TextSplitter;
use crate::error::{ChatError, Result};
use crate::llm::{EmbedTask, Embedder};
use crate::models::Chunk;

/// Chunks embedded per embedder call.
const EMBED_BATCH: usize = 64;

pub struct IndexBuilder {
    splitter: TextSplitter,
    embedder: Arc<dyn Embedder>,
    embedding_model: String,
}

impl IndexBuilder {
    pub fn new(embedder: Arc<dyn Embedder>, embedding_model: impl Into<String>) -> Self {
        Self {
            splitter: TextSplitter::default(),
            embedder,
            embedding_model: embedding_model.into(),
        }
    }

    pub const fn with_splitter(mut self, splitter: TextSplitter) -> Self {
        self.splitter = splitter;
        self
    }

    /// Split every document under `docs_dir` into chunks.
    pub fn chunk_directory(&self, docs_dir: &Path) -> Result<Vec<Chunk>> {
        let documents = load_documents(docs_dir)?;
        if documents.is_empty() {
            return Err(ChatError::InvalidInput(format!(
                "no documents found in {}",
                docs_dir.display()
            )));
        }
        info!(documents = documents.len(), "Loaded source pages");

        let chunks: Vec<Chunk> = documents
            .iter()
            .flat_map(|doc| {
                self.splitter.split(&doc.text).into_iter().map(|content| Chunk {
                    content,
                    source: doc.source.clone(),
                    page: doc.page,
                    kind: doc.kind,
                })
            })
            .collect();
        info!(chunks = chunks.len(), "Split documents into chunks");
        Ok(chunks)
    }

    /// Build an in-memory index from `docs_dir`. Saving is up to the caller.
    pub async fn build(&self, docs_dir: &Path) -> Result<VectorIndex> {
        let chunks = self.chunk_directory(docs_dir)?;
        let mut index = VectorIndex::new(self.embedding_model.clone());

        for batch in chunks.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = self.embedder.embed(&texts, EmbedTask::Document).await?;
            if vectors.len() != batch.len() {
                return Err(ChatError::Upstream(format!(
                    "embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                )));
            }
            for (chunk, vector) in batch.iter().cloned().zip(vectors) {
                index.push(chunk, vector)?;
            }
            info!(embedded = index.len(), total = chunks.len(), "Embedding progress");
        }

        Ok(index)
    }
}
