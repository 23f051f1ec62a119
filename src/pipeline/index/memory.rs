use std::sync::Mutex;

use super::types::{ScoredChunk, VectorIndex};
use super::IndexError;
use crate::pipeline::ingest::types::Chunk;

/// In-memory vector index. The lock is held only for the in-memory scan,
/// never across I/O, so concurrent pipeline runs do not serialize on it.
pub struct InMemoryVectorIndex {
    entries: Mutex<Vec<IndexedChunk>>,
}

struct IndexedChunk {
    chunk: Chunk,
    embedding: Vec<f32>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn count_for_source(&self, source_id: &str) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.chunk.source_id == source_id)
            .count()
    }
}

impl Default for InMemoryVectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorIndex for InMemoryVectorIndex {
    fn add_documents(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<usize, IndexError> {
        if chunks.len() != embeddings.len() {
            return Err(IndexError::Index(
                "Chunk count does not match embedding count".into(),
            ));
        }

        let mut entries = self.entries.lock().unwrap();
        for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
            entries.push(IndexedChunk {
                chunk: chunk.clone(),
                embedding: embedding.clone(),
            });
        }
        Ok(chunks.len())
    }

    fn similarity_search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        source_id: &str,
    ) -> Result<Vec<ScoredChunk>, IndexError> {
        let entries = self.entries.lock().unwrap();
        let mut scored: Vec<(f32, &IndexedChunk)> = entries
            .iter()
            .filter(|e| e.chunk.source_id == source_id)
            .map(|e| (cosine_similarity(query_embedding, &e.embedding), e))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, entry)| ScoredChunk {
                chunk: entry.chunk.clone(),
                score,
            })
            .collect())
    }

    fn chunks_in_range(
        &self,
        source_id: &str,
        start: usize,
        end: usize,
    ) -> Result<Vec<Chunk>, IndexError> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .iter()
            .filter(|e| {
                e.chunk.source_id == source_id && e.chunk.index >= start && e.chunk.index <= end
            })
            .map(|e| e.chunk.clone())
            .collect())
    }

    fn delete_by_source(&self, source_id: &str) -> Result<(), IndexError> {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|e| e.chunk.source_id != source_id);
        Ok(())
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
