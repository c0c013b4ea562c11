// src/ingest/providers/yahoo_rss.rs
use std::time::Duration;

use async_trait::async_trait;
use metrics::{counter, histogram};

use crate::error::{BriefError, Result};
use crate::ingest::providers::FeedSource;
use crate::ingest::types::FetchedFeed;
use crate::ingest::xml;
use crate::target::Target;

pub const SOURCE_NAME: &str = "Yahoo Finance RSS";
pub const DEFAULT_BASE_URL: &str = "https://feeds.finance.yahoo.com";
const HEADLINE_PATH: &str = "/rss/2.0/headline";
/// Broad-market indices used when a target names no tickers.
const BROAD_MARKET_SYMBOLS: &str = "^GSPC,^NDX,^DJI,^IXIC";

/// Feed URL for a target against `base`. Pure.
pub fn url_for(base: &str, target: &Target) -> String {
    let base = base.trim_end_matches('/');
    match target.active_tickers() {
        Some(tickers) => format!(
            "{base}{HEADLINE_PATH}?s={}&region=US&lang=en-US",
            urlencoding::encode(&tickers.join(","))
        ),
        None => format!("{base}{HEADLINE_PATH}?s={BROAD_MARKET_SYMBOLS}&region=US&lang=en-US"),
    }
}

/// Feed URL against the production host.
pub fn rss_url_for(target: &Target) -> String {
    url_for(DEFAULT_BASE_URL, target)
}

pub struct YahooRssProvider {
    mode: Mode,
}

enum Mode {
    // Same body for every target; URL is still built from the target.
    Fixture(String),
    Http {
        base_url: String,
        client: reqwest::Client,
    },
}

impl YahooRssProvider {
    pub fn from_fixture(xml: &str) -> Self {
        Self {
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("market-brief/0.1")
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            mode: Mode::Http {
                base_url: base_url.into(),
                client,
            },
        })
    }

    fn base_url(&self) -> &str {
        match &self.mode {
            Mode::Fixture(_) => DEFAULT_BASE_URL,
            Mode::Http { base_url, .. } => base_url,
        }
    }

    fn parse_body(url: String, body: &str) -> Result<FetchedFeed> {
        let t0 = std::time::Instant::now();
        let raw_items = xml::parse_feed(body)?;
        histogram!("feed_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(FetchedFeed { url, raw_items })
    }
}

#[async_trait]
impl FeedSource for YahooRssProvider {
    async fn fetch(&self, target: &Target) -> Result<FetchedFeed> {
        let url = url_for(self.base_url(), target);
        match &self.mode {
            Mode::Fixture(s) => Self::parse_body(url, s),
            Mode::Http { client, .. } => {
                let t0 = std::time::Instant::now();
                let resp = client.get(&url).send().await.map_err(|e| {
                    tracing::warn!(error = ?e, key = %target.key, "feed http error");
                    counter!("feed_fetch_errors_total").increment(1);
                    BriefError::Http(e)
                })?;

                let status = resp.status();
                if !status.is_success() {
                    tracing::warn!(status = status.as_u16(), %url, "feed fetch non-2xx");
                    counter!("feed_fetch_errors_total").increment(1);
                    return Err(BriefError::Fetch {
                        status: status.as_u16(),
                    });
                }

                let body = resp.text().await?;
                histogram!("feed_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
                tracing::debug!(%url, bytes = body.len(), "feed fetched");
                Self::parse_body(url, &body)
            }
        }
    }

    fn name(&self) -> &'static str {
        SOURCE_NAME
    }
}
