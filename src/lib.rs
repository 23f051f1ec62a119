pub mod config;
pub mod db;
pub mod models;
pub mod pipeline;
pub mod runtime;
pub mod storage;

#[cfg(test)]
pub(crate) mod testutil;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::PipelineConfig;
use crate::db::Database;
use crate::pipeline::evaluation::{HttpLlmClient, ReleaseEvaluator};
use crate::pipeline::index::{InMemoryVectorIndex, TermHashEmbedder};
use crate::pipeline::ingest::extract::PlainTextExtractor;
use crate::runtime::{LogNotificationSink, Runtime};
use crate::storage::FileStore;

/// Assemble the production runtime: on-disk database under the app data
/// dir, file store for uploads, deterministic local embedder, in-memory
/// vector index, and the HTTP model gateway from the config.
///
/// Dependencies are constructed here and passed in explicitly; there are
/// no global client singletons, so alternative wiring (tests, embedded
/// use) builds its own `Runtime` the same way.
pub fn build_runtime(config: PipelineConfig) -> Result<Runtime, db::DatabaseError> {
    std::fs::create_dir_all(config::app_data_dir()).ok();

    let db = Database::new(config::database_path());
    db.open()?; // run migrations up front

    let llm = HttpLlmClient::new(&config.llm_base_url, &config.llm_model, config.llm_timeout_secs);
    let evaluator = ReleaseEvaluator::new(
        Arc::new(PlainTextExtractor),
        Arc::new(TermHashEmbedder::new()),
        Arc::new(InMemoryVectorIndex::new()),
        Arc::new(llm),
        Vec::new(),
        config.clone(),
    );

    Ok(Runtime::start(
        db,
        FileStore::new(config::releases_dir()),
        evaluator,
        Arc::new(LogNotificationSink),
        config,
    ))
}

/// Service entry point: tracing, runtime, then park until interrupted.
pub async fn run() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let runtime = match build_runtime(PipelineConfig::default()) {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize");
            return;
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Signal handler failed");
    }
    tracing::info!("Shutting down");
    runtime.shutdown();
}
