use std::collections::HashMap;

use super::mapping::EntityMapping;
use super::recognizers::{default_recognizers, EntityType, Recognizer};
use super::AnonymizeError;
use crate::pipeline::ingest::types::Chunk;

/// Replaces personally-identifiable fragments in chunk text with stable,
/// reversible placeholders.
///
/// One instance per pipeline run: placeholder numbering is scoped to the
/// run, and the per-type next-index cache below must not be shared across
/// concurrent releases.
pub struct ChunkAnonymizer {
    recognizers: Vec<Box<dyn Recognizer>>,
    mapping: EntityMapping,
    /// Next free placeholder index per type, seeded once from the mapping
    /// at construction instead of re-scanning it on every allocation.
    next_index: HashMap<&'static str, u32>,
}

impl ChunkAnonymizer {
    /// Build with the production recognizer set and an optional pre-existing
    /// mapping (to continue numbering across documents in one session).
    pub fn new(institution_names: Vec<String>, existing: EntityMapping) -> Self {
        Self::with_recognizers(default_recognizers(institution_names), existing)
    }

    pub fn with_recognizers(recognizers: Vec<Box<dyn Recognizer>>, existing: EntityMapping) -> Self {
        let mut next_index = HashMap::new();
        for entity_type in EntityType::all() {
            let tag = entity_type.as_str();
            next_index.insert(tag, existing.max_index(tag) + 1);
        }
        Self {
            recognizers,
            mapping: existing,
            next_index,
        }
    }

    /// Anonymize every chunk in place, accumulating the session mapping.
    ///
    /// A recognizer failure on one chunk leaves that chunk un-anonymized
    /// (`anonymized` stays false) and processing continues, observable by
    /// the caller through the flag, never fatal for the batch.
    pub fn anonymize_chunks(&mut self, chunks: &mut [Chunk]) {
        for chunk in chunks.iter_mut() {
            match self.anonymize_chunk(chunk) {
                Ok(()) => chunk.anonymized = true,
                Err(e) => {
                    chunk.anonymized = false;
                    tracing::warn!(
                        chunk_id = %chunk.chunk_id(),
                        error = %e,
                        "Anonymization failed for chunk, leaving it un-anonymized"
                    );
                }
            }
        }
    }

    fn anonymize_chunk(&mut self, chunk: &mut Chunk) -> Result<(), AnonymizeError> {
        // Detect everything first so a recognizer error leaves the chunk
        // content untouched.
        let mut detected: Vec<(EntityType, String)> = Vec::new();
        for recognizer in &self.recognizers {
            for original in recognizer.detect(&chunk.content)? {
                detected.push((recognizer.entity_type(), original));
            }
        }

        for (entity_type, original) in detected {
            let tag = entity_type.as_str();
            let existing = self.mapping.placeholder_for(tag, &original).map(str::to_string);
            let placeholder = match existing {
                Some(placeholder) => placeholder,
                None => {
                    let index = self.next_index.entry(tag).or_insert(1);
                    let placeholder = format!("<{tag}_{index}>");
                    *index += 1;
                    self.mapping.insert(tag, original.clone(), placeholder.clone());
                    placeholder
                }
            };

            chunk.content = chunk.content.replace(&original, &placeholder);
            chunk
                .mapping
                .entry(tag.to_string())
                .or_default()
                .insert(original, placeholder);
        }

        Ok(())
    }

    /// The cumulative mapping built so far.
    pub fn mapping(&self) -> &EntityMapping {
        &self.mapping
    }

    /// Consume the anonymizer, yielding the session mapping for persistence.
    pub fn into_mapping(self) -> EntityMapping {
        self.mapping
    }
}

/// Replace every placeholder occurrence in `text` with its original value.
/// Text without placeholders passes through unchanged, so the operation is
/// idempotent on already-plain text.
pub fn deanonymize(text: &str, mapping: &EntityMapping) -> String {
    let mut result = text.to_string();
    for (_, original, placeholder) in mapping.iter() {
        if result.contains(placeholder) {
            result = result.replace(placeholder, original);
        }
    }
    result
}
