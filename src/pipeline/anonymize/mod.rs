pub mod anonymizer;
pub mod mapping;
pub mod recognizers;

pub use anonymizer::{deanonymize, ChunkAnonymizer};
pub use mapping::EntityMapping;
pub use recognizers::{default_recognizers, DenyListRecognizer, EntityType, Recognizer, RegexRecognizer};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnonymizeError {
    #[error("Recognizer failed for {entity_type}: {reason}")]
    Recognizer { entity_type: &'static str, reason: String },

    #[error("Mapping serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
