pub mod retriever;

pub use retriever::{criterion_query, ContextRetriever, RetrievalParams};
