// src/ingest/providers/mod.rs
pub mod yahoo_rss;

use async_trait::async_trait;

use crate::error::Result;
use crate::ingest::types::FetchedFeed;
use crate::target::Target;

/// Where raw feed entries come from for a target.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, target: &Target) -> Result<FetchedFeed>;
    /// Label persisted as `feed.source`.
    fn name(&self) -> &'static str;
}
