// tests/engine_run.rs
//
// One target end to end: fixture feed -> pipeline -> mock analyst -> store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_brief::ai_adapter::{GenerateFuture, MockProvider, PromptRequest, Provider};
use market_brief::analyze::Analyst;
use market_brief::engine::{history_id, BriefRunner};
use market_brief::error::{BriefError, Result};
use market_brief::ingest::providers::yahoo_rss::YahooRssProvider;
use market_brief::ingest::providers::FeedSource;
use market_brief::ingest::types::FetchedFeed;
use market_brief::store::{BriefStore, FileStore, MemoryStore};
use market_brief::target::{Reason, Target};

const YAHOO_XML: &str = include_str!("fixtures/yahoo_rss.xml");

struct DownFeed;

#[async_trait]
impl FeedSource for DownFeed {
    async fn fetch(&self, _target: &Target) -> Result<FetchedFeed> {
        Err(BriefError::Fetch { status: 503 })
    }
    fn name(&self) -> &'static str {
        "down"
    }
}

struct FailingAi;

impl Provider for FailingAi {
    fn generate<'a>(&'a self, _req: &'a PromptRequest) -> GenerateFuture<'a> {
        Box::pin(async {
            Err(BriefError::Analysis {
                status: 500,
                body: "boom".into(),
            })
        })
    }
    fn name(&self) -> &'static str {
        "failing"
    }
}

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

fn runner_with(
    feed: Arc<dyn FeedSource>,
    provider: Arc<dyn Provider>,
    store: Arc<dyn BriefStore>,
) -> BriefRunner {
    BriefRunner::new(feed, Analyst::new(provider), store)
}

fn tech() -> Target {
    Target::new("tech_megacaps").with_tickers(["AAPL", "MSFT", "NVDA", "GOOGL", "AMZN"])
}

#[tokio::test]
async fn successful_run_writes_latest_and_history() {
    let store = Arc::new(MemoryStore::new());
    let mock = Arc::new(MockProvider::new("Action: HOLD"));
    let runner = runner_with(
        Arc::new(YahooRssProvider::from_fixture(YAHOO_XML)),
        mock.clone(),
        store.clone(),
    );

    let captured = at(1_760_447_100);
    let summary = runner
        .run_at(&tech(), Reason::Preopen, captured)
        .await
        .expect("run ok");
    assert_eq!(summary.key, "tech_megacaps");
    assert_eq!(summary.item_count, 4);

    let latest = store.latest("tech_megacaps").await.unwrap().expect("latest");
    assert_eq!(latest["reason"], "preopen");
    assert_eq!(latest["recommendation"], "Action: HOLD");
    assert_eq!(latest["feed"]["source"], "Yahoo Finance RSS");
    assert_eq!(latest["updatedAt"], "2025-10-14T13:05:00Z");
    assert_eq!(
        latest["feed"]["items"][0]["title"],
        "Nvidia & Microsoft extend AI partnership"
    );
    assert_eq!(latest["feed"]["items"][3]["publishedAt"], "1970-01-01T00:00:00Z");
    assert!(latest["brief"]
        .as_str()
        .unwrap()
        .starts_with("• Nvidia & Microsoft extend AI partnership — Deal covers"));

    let history = store.history_for("tech_megacaps");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].0, "1760447100000");
    assert_eq!(history[0].1, latest);

    // the analyst saw the digest and the ticker topic
    let calls = mock.recorded();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].user.starts_with("Topic: AAPL, MSFT, NVDA, GOOGL, AMZN\n"));
    assert!(calls[0].user.contains(latest["brief"].as_str().unwrap()));
}

#[tokio::test]
async fn repeated_runs_merge_latest_and_append_history() {
    let store = Arc::new(MemoryStore::new());
    let runner = runner_with(
        Arc::new(YahooRssProvider::from_fixture(YAHOO_XML)),
        Arc::new(MockProvider::new("HOLD")),
        store.clone(),
    );

    runner.run_at(&tech(), Reason::Intraday, at(1_000)).await.unwrap();
    runner.run_at(&tech(), Reason::Postclose, at(2_000)).await.unwrap();

    let latest = store.latest("tech_megacaps").await.unwrap().unwrap();
    assert_eq!(latest["reason"], "postclose");
    assert_eq!(latest["feed"]["items"].as_array().unwrap().len(), 4);

    let ids: Vec<String> = store
        .history_for("tech_megacaps")
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    assert_eq!(ids, vec![history_id(at(1_000)), history_id(at(2_000))]);
}

#[tokio::test]
async fn feed_failure_persists_nothing() {
    let store = Arc::new(MemoryStore::new());
    let mock = Arc::new(MockProvider::new("HOLD"));
    let runner = runner_with(Arc::new(DownFeed), mock.clone(), store.clone());

    let err = runner.run(&tech(), Reason::Intraday).await.unwrap_err();
    assert!(matches!(err, BriefError::Fetch { status: 503 }));
    assert!(store.latest_keys().is_empty());
    assert!(store.history_for("tech_megacaps").is_empty());
    assert!(mock.recorded().is_empty(), "analyst must not be called");
}

#[tokio::test]
async fn analysis_failure_persists_nothing() {
    let store = Arc::new(MemoryStore::new());
    let runner = runner_with(
        Arc::new(YahooRssProvider::from_fixture(YAHOO_XML)),
        Arc::new(FailingAi),
        store.clone(),
    );

    let err = runner.run(&tech(), Reason::Intraday).await.unwrap_err();
    assert!(matches!(err, BriefError::Analysis { status: 500, .. }));
    assert!(store.latest_keys().is_empty());
}

#[tokio::test]
async fn empty_feed_still_produces_a_brief() {
    let store = Arc::new(MemoryStore::new());
    let runner = runner_with(
        Arc::new(YahooRssProvider::from_fixture("<rss><channel></channel></rss>")),
        Arc::new(MockProvider::new("WATCHLIST")),
        store.clone(),
    );

    let brief = runner.execute(&Target::new("quiet"), Reason::Adhoc).await.unwrap();
    assert!(brief.feed.items.is_empty());
    assert_eq!(brief.brief, "");
    assert_eq!(brief.reason, Reason::Adhoc);
    assert!(store.latest("quiet").await.unwrap().is_some());
}

#[tokio::test]
async fn file_store_layout_and_create_only_history() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::new(dir.path()));
    let runner = runner_with(
        Arc::new(YahooRssProvider::from_fixture(YAHOO_XML)),
        Arc::new(MockProvider::new("HOLD")),
        store.clone(),
    );

    let captured = at(1_760_447_100);
    runner.run_at(&tech(), Reason::Preopen, captured).await.unwrap();

    let key_dir = dir.path().join("tech_megacaps");
    assert!(key_dir.join("latest.json").is_file());
    assert!(key_dir.join("history").join("1760447100000.json").is_file());

    let latest = store.latest("tech_megacaps").await.unwrap().unwrap();
    assert_eq!(latest["target"]["tickers"][0], "AAPL");

    // same capture instant again: history refuses to overwrite and the
    // failed run leaves the latest snapshot untouched
    let err = runner
        .run_at(&tech(), Reason::Postclose, captured)
        .await
        .unwrap_err();
    assert!(matches!(err, BriefError::Store(_)), "unexpected error: {err:?}");
    let after = store.latest("tech_megacaps").await.unwrap().unwrap();
    assert_eq!(after["reason"], "preopen");
    assert_eq!(after, latest);

    assert!(store.latest("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn history_collision_does_not_touch_latest_in_memory() {
    let store = Arc::new(MemoryStore::new());
    let runner = runner_with(
        Arc::new(YahooRssProvider::from_fixture(YAHOO_XML)),
        Arc::new(MockProvider::new("HOLD")),
        store.clone(),
    );

    let captured = at(5_000);
    runner.run_at(&tech(), Reason::Intraday, captured).await.unwrap();
    let err = runner
        .run_at(&tech(), Reason::Adhoc, captured)
        .await
        .unwrap_err();
    assert!(matches!(err, BriefError::Store(_)));

    let latest = store.latest("tech_megacaps").await.unwrap().unwrap();
    assert_eq!(latest["reason"], "intraday");
    assert_eq!(store.history_for("tech_megacaps").len(), 1);
}
