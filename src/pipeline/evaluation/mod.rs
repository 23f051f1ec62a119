pub mod llm;
pub mod orchestrator;
pub mod parse;
pub mod prompt;

pub use llm::{HttpLlmClient, LlmClient, MockLlmClient};
pub use orchestrator::{EvaluationReport, ReleaseEvaluator, VectorizeOutcome};
pub use parse::{fallback_verdict, parse_verdict, BranchVerdict};

use thiserror::Error;

use crate::db::DatabaseError;
use crate::pipeline::anonymize::AnonymizeError;
use crate::pipeline::index::IndexError;
use crate::pipeline::ingest::IngestError;

#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Ingestion failed: {0}")]
    Ingest(#[from] IngestError),

    #[error("Anonymization failed: {0}")]
    Anonymize(#[from] AnonymizeError),

    #[error("Vector index error: {0}")]
    Index(#[from] IndexError),

    #[error("Model connection failed: {0}")]
    LlmConnection(String),

    #[error("Model request timed out after {0}s")]
    LlmTimeout(u64),

    #[error("Model returned HTTP {status}: {body}")]
    LlmHttp { status: u16, body: String },

    #[error("Model response parsing failed: {0}")]
    ResponseParsing(String),

    #[error("Release not found: {0}")]
    ReleaseNotFound(uuid::Uuid),

    #[error("Mapping serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EvaluationError {
    /// Transport errors are retryable; everything else fails the stage (or,
    /// for `ResponseParsing`, is handled per item with a fallback result).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::LlmConnection(_) | Self::LlmTimeout(_) | Self::LlmHttp { .. }
        )
    }
}
