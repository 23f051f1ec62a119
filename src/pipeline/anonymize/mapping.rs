use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Cumulative pseudonymization table for one processing session:
/// entity type → (original text → placeholder).
///
/// The same real value always maps to the same placeholder within one
/// session, and the table can be serialized and re-seeded so numbering
/// stays consistent across multiple documents anonymized together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityMapping {
    entries: BTreeMap<String, BTreeMap<String, String>>,
}

impl EntityMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(|m| m.is_empty())
    }

    pub fn placeholder_for(&self, entity_type: &str, original: &str) -> Option<&str> {
        self.entries
            .get(entity_type)
            .and_then(|m| m.get(original))
            .map(String::as_str)
    }

    pub fn insert(&mut self, entity_type: &str, original: String, placeholder: String) {
        self.entries
            .entry(entity_type.to_string())
            .or_default()
            .insert(original, placeholder);
    }

    /// Iterate (entity type, original, placeholder) triples.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.entries.iter().flat_map(|(entity_type, values)| {
            values
                .iter()
                .map(move |(original, placeholder)| {
                    (entity_type.as_str(), original.as_str(), placeholder.as_str())
                })
        })
    }

    /// Highest placeholder index already allocated for one entity type.
    ///
    /// Derived by parsing the stored placeholders rather than a separate
    /// counter, so it stays correct when a mapping was merged from several
    /// independent anonymization runs.
    pub fn max_index(&self, entity_type: &str) -> u32 {
        let prefix = format!("<{entity_type}_");
        self.entries
            .get(entity_type)
            .map(|values| {
                values
                    .values()
                    .filter_map(|placeholder| {
                        placeholder
                            .strip_prefix(&prefix)?
                            .strip_suffix('>')?
                            .parse::<u32>()
                            .ok()
                    })
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }
}
