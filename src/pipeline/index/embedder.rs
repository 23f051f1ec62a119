use super::types::EmbeddingModel;
use super::IndexError;

/// Embedding dimension shared by every model this crate constructs.
pub const EMBEDDING_DIM: usize = 384;

/// Deterministic bag-of-words embedder: terms are hashed into buckets and
/// the resulting vector L2-normalized. No model download, no I/O, identical
/// output for identical input. Adequate for lexical-overlap retrieval and
/// for tests. Swap in a real model behind the same trait for semantic
/// retrieval.
pub struct TermHashEmbedder {
    dimension: usize,
}

impl TermHashEmbedder {
    pub fn new() -> Self {
        Self { dimension: EMBEDDING_DIM }
    }
}

impl Default for TermHashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingModel for TermHashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError> {
        Ok(term_hash_vector(text, self.dimension))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, IndexError> {
        Ok(texts.iter().map(|t| term_hash_vector(t, self.dimension)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// FNV-1a over a lowercased term; stable across platforms and runs.
fn term_bucket(term: &str, dim: usize) -> usize {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in term.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    (hash % dim as u64) as usize
}

fn term_hash_vector(text: &str, dim: usize) -> Vec<f32> {
    let mut vec = vec![0.0f32; dim];

    for term in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
    {
        let lowered = term.to_lowercase();
        vec[term_bucket(&lowered, dim)] += 1.0;
    }

    // L2 normalize
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for val in &mut vec {
            *val /= norm;
        }
    }

    vec
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_returns_correct_dimension() {
        let embedder = TermHashEmbedder::new();
        let vec = embedder.embed("capital adequacy disclosure").unwrap();
        assert_eq!(vec.len(), EMBEDDING_DIM);
    }

    #[test]
    fn embed_is_deterministic() {
        let embedder = TermHashEmbedder::new();
        let v1 = embedder.embed("same regulatory text").unwrap();
        let v2 = embedder.embed("same regulatory text").unwrap();
        assert_eq!(v1, v2);
    }

    #[test]
    fn different_texts_differ() {
        let embedder = TermHashEmbedder::new();
        let v1 = embedder.embed("capital ratios").unwrap();
        let v2 = embedder.embed("governance policy").unwrap();
        assert_ne!(v1, v2);
    }

    #[test]
    fn embed_is_l2_normalized() {
        let embedder = TermHashEmbedder::new();
        let vec = embedder.embed("test normalization of the vector").unwrap();
        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!(
            (norm - 1.0).abs() < 0.01,
            "Vector should be L2-normalized, got norm = {norm}"
        );
    }

    #[test]
    fn shared_terms_increase_similarity() {
        let embedder = TermHashEmbedder::new();
        let query = embedder.embed("leverage ratio disclosure").unwrap();
        let related = embedder.embed("the leverage ratio must appear in the disclosure").unwrap();
        let unrelated = embedder.embed("acquisition of foreign subsidiaries abroad").unwrap();

        let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
        assert!(dot(&query, &related) > dot(&query, &unrelated));
    }

    #[test]
    fn case_insensitive_terms() {
        let embedder = TermHashEmbedder::new();
        let v1 = embedder.embed("Capital Ratio").unwrap();
        let v2 = embedder.embed("capital ratio").unwrap();
        assert_eq!(v1, v2);
    }

    #[test]
    fn batch_matches_single() {
        let embedder = TermHashEmbedder::new();
        let single = embedder.embed("one two three words").unwrap();
        let batch = embedder.embed_batch(&["one two three words"]).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0], single);
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let embedder = TermHashEmbedder::new();
        let vec = embedder.embed("").unwrap();
        assert!(vec.iter().all(|&x| x == 0.0));
    }
}
