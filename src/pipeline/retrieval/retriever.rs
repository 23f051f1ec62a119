use std::collections::HashSet;

use crate::pipeline::index::types::{EmbeddingModel, VectorIndex};
use crate::pipeline::index::IndexError;
use crate::pipeline::ingest::types::Chunk;

/// Retrieval tuning per criterion.
#[derive(Debug, Clone)]
pub struct RetrievalParams {
    /// Top-k chunks returned by similarity search.
    pub top_k: usize,
    /// Each hit expands to the index range [i - margin, i + margin].
    pub neighbor_margin: usize,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self { top_k: 3, neighbor_margin: 2 }
    }
}

/// The query text for one branch: criterion title + description plus the
/// enclosing taxonomy title for disambiguation.
pub fn criterion_query(branch_title: &str, branch_description: &str, taxonomy_title: &str) -> String {
    format!("{taxonomy_title}: {branch_title}. {branch_description}")
}

/// Fetches the most relevant excerpts of one release for one criterion.
pub struct ContextRetriever<'a> {
    embedder: &'a dyn EmbeddingModel,
    index: &'a dyn VectorIndex,
    params: RetrievalParams,
}

impl<'a> ContextRetriever<'a> {
    pub fn new(
        embedder: &'a dyn EmbeddingModel,
        index: &'a dyn VectorIndex,
        params: RetrievalParams,
    ) -> Self {
        Self { embedder, index, params }
    }

    /// Top-k similarity hits, each expanded to its contiguous neighborhood,
    /// deduplicated across overlapping ranges, in document order.
    ///
    /// Zero hits yield an empty list; the caller still builds the
    /// evaluation prompt so the model can report "not found".
    pub fn retrieve(&self, query: &str, source_id: &str) -> Result<Vec<Chunk>, IndexError> {
        let query_embedding = self.embedder.embed(query)?;
        let hits = self
            .index
            .similarity_search(&query_embedding, self.params.top_k, source_id)?;

        if hits.is_empty() {
            tracing::debug!(source_id, "Similarity search returned no hits for criterion");
            return Ok(Vec::new());
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut chunks: Vec<Chunk> = Vec::new();

        for hit in &hits {
            let margin = self.params.neighbor_margin;
            let start = hit.chunk.index.saturating_sub(margin);
            let end = (hit.chunk.index + margin).min(hit.chunk.total.saturating_sub(1));

            for chunk in self.index.chunks_in_range(source_id, start, end)? {
                if seen.insert(chunk.chunk_id()) {
                    chunks.push(chunk);
                }
            }
        }

        // The model sees excerpts in document order regardless of
        // retrieval order.
        chunks.sort_by_key(|c| c.index);
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::index::{InMemoryVectorIndex, TermHashEmbedder};
    use crate::pipeline::index::types::ScoredChunk;

    fn indexed_document(contents: &[&str], source_id: &str) -> (TermHashEmbedder, InMemoryVectorIndex) {
        let embedder = TermHashEmbedder::new();
        let index = InMemoryVectorIndex::new();
        let total = contents.len();
        let chunks: Vec<Chunk> = contents
            .iter()
            .enumerate()
            .map(|(i, text)| Chunk::new((*text).into(), source_id, i, total))
            .collect();
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let embeddings = embedder.embed_batch(&texts).unwrap();
        index.add_documents(&chunks, &embeddings).unwrap();
        (embedder, index)
    }

    #[test]
    fn expands_hit_to_neighborhood_in_order() {
        // 10 chunks; only index 5 mentions the query terms.
        let contents: Vec<String> = (0..10)
            .map(|i| {
                if i == 5 {
                    "the leverage ratio disclosure appears here".to_string()
                } else {
                    format!("unrelated filler paragraph number {i}")
                }
            })
            .collect();
        let refs: Vec<&str> = contents.iter().map(String::as_str).collect();
        let (embedder, index) = indexed_document(&refs, "rel");

        let retriever = ContextRetriever::new(
            &embedder,
            &index,
            RetrievalParams { top_k: 1, neighbor_margin: 2 },
        );
        let chunks = retriever.retrieve("leverage ratio disclosure", "rel").unwrap();

        let indices: Vec<usize> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn expansion_clips_at_document_edges() {
        let contents: Vec<String> = (0..4)
            .map(|i| {
                if i == 0 {
                    "tier one capital requirement stated".to_string()
                } else {
                    format!("other text {i}")
                }
            })
            .collect();
        let refs: Vec<&str> = contents.iter().map(String::as_str).collect();
        let (embedder, index) = indexed_document(&refs, "rel");

        let retriever = ContextRetriever::new(
            &embedder,
            &index,
            RetrievalParams { top_k: 1, neighbor_margin: 2 },
        );
        let chunks = retriever.retrieve("tier one capital requirement", "rel").unwrap();

        let indices: Vec<usize> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn overlapping_neighborhoods_deduplicate() {
        // Hits at adjacent positions: their windows overlap heavily.
        let contents = vec![
            "capital ratio mentioned first",
            "capital ratio mentioned second",
            "capital ratio mentioned third",
            "nothing relevant",
            "nothing at all",
        ];
        let (embedder, index) = indexed_document(&contents, "rel");

        let retriever = ContextRetriever::new(
            &embedder,
            &index,
            RetrievalParams { top_k: 3, neighbor_margin: 2 },
        );
        let chunks = retriever.retrieve("capital ratio mentioned", "rel").unwrap();

        let indices: Vec<usize> = chunks.iter().map(|c| c.index).collect();
        // No duplicates, ascending.
        let mut deduped = indices.clone();
        deduped.dedup();
        assert_eq!(indices, deduped);
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn zero_hits_give_empty_context() {
        let embedder = TermHashEmbedder::new();
        let index = InMemoryVectorIndex::new();
        let retriever = ContextRetriever::new(&embedder, &index, RetrievalParams::default());

        let chunks = retriever.retrieve("anything", "rel-without-chunks").unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn retrieval_respects_source_filter() {
        let contents_a = vec!["liquidity coverage ratio discussed"];
        let (embedder, index) = indexed_document(&contents_a, "rel-a");
        // Second source with identical text indexed into the same store.
        let chunk_b = Chunk::new("liquidity coverage ratio discussed".into(), "rel-b", 0, 1);
        let emb = embedder.embed(&chunk_b.content).unwrap();
        index.add_documents(&[chunk_b], &[emb]).unwrap();

        let retriever = ContextRetriever::new(&embedder, &index, RetrievalParams::default());
        let chunks = retriever.retrieve("liquidity coverage ratio", "rel-a").unwrap();
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.source_id == "rel-a"));
    }

    #[test]
    fn criterion_query_combines_hierarchy() {
        let query = criterion_query(
            "Tier 1 ratio published",
            "The release states the Tier 1 capital ratio.",
            "Capital disclosure",
        );
        assert!(query.starts_with("Capital disclosure: "));
        assert!(query.contains("Tier 1 ratio published"));
        assert!(query.contains("states the Tier 1 capital ratio"));
    }

    /// Failing index to verify error propagation (the orchestrator retries).
    struct DownIndex;

    impl VectorIndex for DownIndex {
        fn add_documents(&self, _: &[Chunk], _: &[Vec<f32>]) -> Result<usize, IndexError> {
            Err(IndexError::Unavailable("down".into()))
        }

        fn similarity_search(
            &self,
            _: &[f32],
            _: usize,
            _: &str,
        ) -> Result<Vec<ScoredChunk>, IndexError> {
            Err(IndexError::Unavailable("down".into()))
        }

        fn chunks_in_range(&self, _: &str, _: usize, _: usize) -> Result<Vec<Chunk>, IndexError> {
            Err(IndexError::Unavailable("down".into()))
        }

        fn delete_by_source(&self, _: &str) -> Result<(), IndexError> {
            Err(IndexError::Unavailable("down".into()))
        }
    }

    #[test]
    fn index_unavailability_propagates() {
        let embedder = TermHashEmbedder::new();
        let index = DownIndex;
        let retriever = ContextRetriever::new(&embedder, &index, RetrievalParams::default());
        let result = retriever.retrieve("query", "rel");
        assert!(matches!(result, Err(IndexError::Unavailable(_))));
    }
}
