//! # Brief Engine
//! Runs one target end to end: fetch -> process -> analyze -> persist.
//!
//! A run writes nothing unless fetch and analysis both succeed. The
//! create-only history entry (keyed by the capture instant in epoch
//! milliseconds) is written first, so a colliding id fails the run before the
//! latest snapshot is merged.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analyze::Analyst;
use crate::error::Result;
use crate::ingest::{self, providers::FeedSource, types::FeedItem};
use crate::store::BriefStore;
use crate::target::{Reason, Target};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSnapshot {
    pub source: String,
    pub url: String,
    pub items: Vec<FeedItem>,
}

/// The persisted unit of one run for one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Brief {
    pub target: Target,
    pub feed: FeedSnapshot,
    /// Digest text sent to the analyst.
    pub brief: String,
    pub recommendation: String,
    pub reason: Reason,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub key: String,
    pub item_count: usize,
}

/// History document id for a capture instant.
pub fn history_id(captured_at: DateTime<Utc>) -> String {
    captured_at.timestamp_millis().to_string()
}

#[derive(Clone)]
pub struct BriefRunner {
    feed: Arc<dyn FeedSource>,
    analyst: Analyst,
    store: Arc<dyn BriefStore>,
}

impl BriefRunner {
    pub fn new(feed: Arc<dyn FeedSource>, analyst: Analyst, store: Arc<dyn BriefStore>) -> Self {
        Self {
            feed,
            analyst,
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn BriefStore> {
        &self.store
    }

    /// Build the brief without touching the store.
    pub async fn compose(
        &self,
        target: &Target,
        reason: Reason,
        captured_at: DateTime<Utc>,
    ) -> Result<Brief> {
        let fetched = self.feed.fetch(target).await?;
        let processed = ingest::process(&fetched.raw_items, target.page_size);
        let recommendation = self
            .analyst
            .analyze(target, &processed.digest_text)
            .await?;

        Ok(Brief {
            target: target.clone(),
            feed: FeedSnapshot {
                source: self.feed.name().to_string(),
                url: fetched.url,
                items: processed.feed_items(),
            },
            brief: processed.digest_text,
            recommendation,
            reason,
            updated_at: captured_at,
        })
    }

    /// Compose and persist (history entry, then latest merge).
    pub async fn execute_at(
        &self,
        target: &Target,
        reason: Reason,
        captured_at: DateTime<Utc>,
    ) -> Result<Brief> {
        let outcome = self.compose_and_store(target, reason, captured_at).await;
        match &outcome {
            Ok(brief) => {
                counter!("brief_runs_total", "reason" => reason.as_str()).increment(1);
                info!(
                    key = %target.key,
                    reason = reason.as_str(),
                    items = brief.feed.items.len(),
                    "brief stored"
                );
            }
            Err(e) => {
                counter!("brief_run_failures_total", "reason" => reason.as_str()).increment(1);
                warn!(key = %target.key, reason = reason.as_str(), error = %e, "brief run failed");
            }
        }
        outcome
    }

    async fn compose_and_store(
        &self,
        target: &Target,
        reason: Reason,
        captured_at: DateTime<Utc>,
    ) -> Result<Brief> {
        let brief = self.compose(target, reason, captured_at).await?;
        self.store
            .append_history(&target.key, &history_id(captured_at), &brief)
            .await?;
        self.store.upsert_latest(&target.key, &brief).await?;
        Ok(brief)
    }

    pub async fn execute(&self, target: &Target, reason: Reason) -> Result<Brief> {
        self.execute_at(target, reason, Utc::now()).await
    }

    pub async fn run_at(
        &self,
        target: &Target,
        reason: Reason,
        captured_at: DateTime<Utc>,
    ) -> Result<RunSummary> {
        let brief = self.execute_at(target, reason, captured_at).await?;
        Ok(RunSummary {
            key: target.key.clone(),
            item_count: brief.feed.items.len(),
        })
    }

    /// `{ key, itemCount }` for the caller's logs.
    pub async fn run(&self, target: &Target, reason: Reason) -> Result<RunSummary> {
        self.run_at(target, reason, Utc::now()).await
    }
}
