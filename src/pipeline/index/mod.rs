pub mod embedder;
pub mod memory;
pub mod types;

pub use embedder::{TermHashEmbedder, EMBEDDING_DIM};
pub use memory::InMemoryVectorIndex;
pub use types::{EmbeddingModel, ScoredChunk, VectorIndex};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Vector index error: {0}")]
    Index(String),

    #[error("Vector index unavailable: {0}")]
    Unavailable(String),
}
