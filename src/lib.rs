// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analyze;
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod scheduler;
pub mod store;
pub mod target;

use std::sync::Arc;

// ---- Re-exports for stable public API ----
pub use analyze::ai_adapter;
pub use api::router;
pub use engine::{Brief, BriefRunner, RunSummary};
pub use error::{BriefError, Result};
pub use target::{Reason, RiskLevel, Target};

use crate::analyze::Analyst;
use crate::config::ai::AiConfig;
use crate::ingest::providers::yahoo_rss::YahooRssProvider;
use crate::store::BriefStore;

/// Wire the production runner: Yahoo RSS feed, configured AI provider, and
/// the given store.
pub fn build_runner(ai: &AiConfig, store: Arc<dyn BriefStore>) -> anyhow::Result<BriefRunner> {
    let provider = ai_adapter::build_provider(ai)?;
    tracing::info!(provider = provider.name(), model = %ai.model, "AI provider ready");
    let analyst = Analyst::new(provider).with_max_output_tokens(ai.max_output_tokens);
    let feed = YahooRssProvider::new()?;
    Ok(BriefRunner::new(Arc::new(feed), analyst, store))
}
