//! Market Brief Service: binary entrypoint.
//! Loads configuration, starts the weekday scheduler, and serves the HTTP API.
//!
//! See `README.md` for quickstart.

use std::sync::Arc;

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use market_brief::api::{self, AppState};
use market_brief::config::{ai::AiConfig, briefs::load_briefs_default};
use market_brief::metrics::Metrics;
use market_brief::scheduler::{spawn_scheduler, SchedulerCfg};
use market_brief::store::FileStore;

/// Compact logs; RUST_LOG overrides the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("market_brief=info,warn"));

    // Shuttle may already have installed a subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let briefs = load_briefs_default()?;
    let ai = AiConfig::load_default()?;
    let metrics = Metrics::init(briefs.targets.len(), briefs.schedule.len())?;

    let store = Arc::new(FileStore::from_env());
    tracing::info!(root = %store.root().display(), "brief store ready");
    let runner = Arc::new(market_brief::build_runner(&ai, store)?);

    let keys: Vec<&str> = briefs.targets.iter().map(|t| t.key.as_str()).collect();
    tracing::info!(targets = ?keys, slots = briefs.schedule.len(), "briefs config loaded");

    spawn_scheduler(
        SchedulerCfg::default(),
        runner.clone(),
        Arc::new(briefs.targets),
        briefs.schedule,
    );

    let router = api::router(AppState::from_env(runner)).merge(metrics.router());
    Ok(router.into())
}
