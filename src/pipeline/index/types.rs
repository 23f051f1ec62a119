use super::IndexError;
use crate::pipeline::ingest::types::Chunk;

/// Embedding model abstraction
pub trait EmbeddingModel: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError>;
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, IndexError>;
    fn dimension(&self) -> usize;
}

/// A chunk with its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Vector index abstraction. One embedding per chunk, with the chunk's
/// metadata stored alongside so neighbor fetches need no second store.
///
/// Implementations are shared across concurrent pipeline runs and must be
/// safe under concurrent access; no global lock may be held across I/O.
pub trait VectorIndex: Send + Sync {
    /// Store chunks with their embeddings.
    fn add_documents(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<usize, IndexError>;

    /// Top-k chunks by similarity, restricted to one source.
    fn similarity_search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        source_id: &str,
    ) -> Result<Vec<ScoredChunk>, IndexError>;

    /// All chunks of a source whose index falls in `[start, end]`, for
    /// neighbor expansion. Ordering is not guaranteed.
    fn chunks_in_range(
        &self,
        source_id: &str,
        start: usize,
        end: usize,
    ) -> Result<Vec<Chunk>, IndexError>;

    /// Drop everything indexed for one source.
    fn delete_by_source(&self, source_id: &str) -> Result<(), IndexError>;
}
