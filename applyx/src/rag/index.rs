//! Flat vector index persisted as JSON.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ChatError, Result};
use crate::models::Chunk;

const INDEX_FILE: &str = "index.json";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// A chunk returned by a similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Every chunk with its embedding. Search is an exhaustive cosine scan,
/// which is plenty for an admissions handbook sized corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    version: u32,
    embedding_model: String,
    dimensions: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    pub fn new(embedding_model: impl Into<String>) -> Self {
        Self {
            version: FORMAT_VERSION,
            embedding_model: embedding_model.into(),
            dimensions: 0,
            entries: Vec::new(),
        }
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a chunk. All embeddings must share the first one's dimensions.
    pub fn push(&mut self, chunk: Chunk, embedding: Vec<f32>) -> Result<()> {
        if embedding.is_empty() {
            return Err(ChatError::Upstream("empty embedding vector".to_string()));
        }
        if self.entries.is_empty() {
            self.dimensions = embedding.len();
        } else if embedding.len() != self.dimensions {
            return Err(ChatError::Upstream(format!(
                "embedding has {} dimensions, index expects {}",
                embedding.len(),
                self.dimensions
            )));
        }
        self.entries.push(IndexEntry { chunk, embedding });
        Ok(())
    }

    /// The `k` chunks most similar to `query`, best first.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|entry| ScoredChunk {
                chunk: entry.chunk.clone(),
                score: cosine_similarity(query, &entry.embedding),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        scored
    }

    pub fn file_path(dir: &Path) -> PathBuf {
        dir.join(INDEX_FILE)
    }

    /// Write `index.json` into `dir`, replacing any previous index atomically.
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let path = Self::file_path(dir);
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, serde_json::to_vec(self)?)?;
        std::fs::rename(&tmp_path, &path)?;
        info!(path = %path.display(), chunks = self.len(), "Saved vector index");
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let path = Self::file_path(dir);
        if !path.exists() {
            return Err(ChatError::NotFound(format!(
                "Vector index {} does not exist. Run `applyx index` first.",
                path.display()
            )));
        }
        let raw = std::fs::read(&path)?;
        let index: Self = serde_json::from_slice(&raw)
            .map_err(|e| ChatError::corrupt(path.display().to_string(), e.to_string()))?;
        if index.version != FORMAT_VERSION {
            return Err(ChatError::corrupt(
                path.display().to_string(),
                format!("unsupported index version {}", index.version),
            ));
        }
        info!(path = %path.display(), chunks = index.len(), "Loaded vector index");
        Ok(index)
    }
}

/// Cosine similarity; zero vectors or mismatched lengths score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkKind;
    use tempfile::tempdir;

    fn chunk(content: &str) -> Chunk {
        Chunk {
            content: content.to_string(),
            source: "doc.pdf".to_string(),
            page: 1,
            kind: ChunkKind::Pdf,
        }
    }

    #[test]
    fn cosine_edges() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).abs() < f32::EPSILON);
        assert!(cosine_similarity(&[1.0], &[1.0, 1.0]).abs() < f32::EPSILON);
    }

    #[test]
    fn search_ranks_by_similarity() {
        let mut index = VectorIndex::new("test");
        index.push(chunk("east"), vec![1.0, 0.0]).unwrap();
        index.push(chunk("north"), vec![0.0, 1.0]).unwrap();
        index.push(chunk("northeast"), vec![0.7, 0.7]).unwrap();

        let hits = index.search(&[0.1, 1.0], 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.content, "north");
        assert_eq!(hits[1].chunk.content, "northeast");
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let mut index = VectorIndex::new("test");
        index.push(chunk("a"), vec![1.0, 0.0]).unwrap();
        assert!(index.push(chunk("b"), vec![1.0, 0.0, 0.0]).is_err());
        assert!(index.push(chunk("c"), Vec::new()).is_err());
    }

    #[test]
    fn save_and_load() {
        let dir = tempdir().unwrap();
        let mut index = VectorIndex::new("models/embedding-001");
        index.push(chunk("Học phí"), vec![0.5, 0.5]).unwrap();
        index.save(dir.path()).unwrap();

        let loaded = VectorIndex::load(dir.path()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.embedding_model(), "models/embedding-001");
        assert_eq!(loaded.search(&[0.5, 0.5], 5)[0].chunk.content, "Học phí");
        assert!(!VectorIndex::file_path(dir.path()).with_extension("json.tmp").exists());
    }

    #[test]
    fn load_missing_and_corrupt() {
        use crate::error::ErrorKind;

        let dir = tempdir().unwrap();
        assert_eq!(
            VectorIndex::load(dir.path()).unwrap_err().kind(),
            ErrorKind::NotFound
        );

        std::fs::write(VectorIndex::file_path(dir.path()), "[]").unwrap();
        assert_eq!(
            VectorIndex::load(dir.path()).unwrap_err().kind(),
            ErrorKind::CorruptData
        );
    }
}
