use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-chunk anonymization sub-mapping: entity type → original → placeholder.
pub type ChunkMapping = BTreeMap<String, BTreeMap<String, String>>;

/// A contiguous slice of extracted release text.
///
/// Chunks are produced once at ingestion and are immutable afterwards; the
/// vector index stores one embedding per chunk alongside this metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    /// Identifier of the uploaded file this chunk came from (the release id).
    pub source_id: String,
    /// Ordinal position within the document.
    pub index: usize,
    /// Total chunk count for the source.
    pub total: usize,
    /// Whether anonymization succeeded for this chunk.
    pub anonymized: bool,
    /// Entities replaced in this chunk's content.
    pub mapping: ChunkMapping,
}

impl Chunk {
    pub fn new(content: String, source_id: &str, index: usize, total: usize) -> Self {
        Self {
            content,
            source_id: source_id.to_string(),
            index,
            total,
            anonymized: false,
            mapping: ChunkMapping::new(),
        }
    }

    /// Stable chunk identifier: `{source_id}:{index:06}`.
    pub fn chunk_id(&self) -> String {
        format!("{}:{:06}", self.source_id, self.index)
    }

    /// Identifier of the preceding chunk, if any.
    pub fn back_id(&self) -> Option<String> {
        self.index
            .checked_sub(1)
            .map(|i| format!("{}:{:06}", self.source_id, i))
    }

    /// Identifier of the following chunk, if any.
    pub fn forward_id(&self) -> Option<String> {
        let next = self.index + 1;
        (next < self.total).then(|| format!("{}:{:06}", self.source_id, next))
    }
}
