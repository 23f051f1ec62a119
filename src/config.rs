use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "Normlens";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    format!("{}=info", env!("CARGO_PKG_NAME"))
}

/// Get the application data directory
/// ~/Normlens/ on all platforms (user-visible, per design requirement)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Normlens")
}

/// Get the directory holding uploaded release files
pub fn releases_dir() -> PathBuf {
    app_data_dir().join("releases")
}

/// Get the default database path
pub fn database_path() -> PathBuf {
    app_data_dir().join("normlens.db")
}

/// Tunable pipeline parameters.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Base URL of the language-model gateway.
    pub llm_base_url: String,
    /// Model name sent with every generation request.
    pub llm_model: String,
    /// Per-request timeout for model calls, in seconds.
    pub llm_timeout_secs: u64,
    /// Top-k chunks returned by similarity search per criterion.
    pub retrieval_top_k: usize,
    /// Neighbor margin: each hit expands to [index-m, index+m].
    pub neighbor_margin: usize,
    /// Attempts for the batch model call on transport errors.
    pub batch_retries: u32,
    /// Attempts for vector-index reads/writes before the stage fails.
    pub index_retries: u32,
    /// Backoff between retry attempts.
    pub retry_backoff: Duration,
    /// Target chunk size in characters.
    pub max_chunk_chars: usize,
    /// Interval between completion-poll attempts.
    pub poll_interval: Duration,
    /// Maximum completion-poll attempts before timing out.
    pub poll_max_attempts: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            llm_base_url: "http://localhost:11434".to_string(),
            llm_model: "qwen2.5:14b".to_string(),
            llm_timeout_secs: 300,
            retrieval_top_k: 3,
            neighbor_margin: 2,
            batch_retries: 3,
            index_retries: 3,
            retry_backoff: Duration::from_millis(500),
            max_chunk_chars: 1200,
            poll_interval: Duration::from_secs(5),
            poll_max_attempts: 60,
        }
    }
}
