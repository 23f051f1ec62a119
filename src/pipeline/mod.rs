pub mod anonymize;
pub mod evaluation;
pub mod index;
pub mod ingest;
pub mod retrieval;
pub mod snapshot;
