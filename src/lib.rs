pub mod config;
pub mod models;
pub mod db;
pub mod storage;
pub mod pipeline;

pub use models::{DocumentDescriptor, ExtractionRecord, ExtractionStatus, TenantId};
pub use pipeline::extraction::{ExtractionError, ExtractionService, ExtractionStore};

use config::AppConfig;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber filtered by `config.log_filter`.
///
/// Safe to call more than once: later calls leave the first subscriber in place.
pub fn init_tracing(config: &AppConfig) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .try_init();
}

/// An unparseable filter falls back to `config::default_log_filter()`.
fn env_filter(config: &AppConfig) -> EnvFilter {
    EnvFilter::try_new(&config.log_filter)
        .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter()))
}
