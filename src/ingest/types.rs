// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `link` as feeds deliver it: RSS gives text, Atom gives `<link href="..."/>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawLink {
    Url(String),
    Object { href: Option<String> },
}

impl RawLink {
    pub fn href(href: impl Into<String>) -> Self {
        RawLink::Object {
            href: Some(href.into()),
        }
    }

    /// Resolve to a plain string; unresolvable shapes become `""`.
    pub fn resolve(&self) -> String {
        match self {
            RawLink::Url(s) => s.clone(),
            RawLink::Object { href } => href.clone().unwrap_or_default(),
        }
    }
}

/// Entry as read from the feed tree, before any normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawItem {
    pub title: Option<String>,
    pub link: Option<RawLink>,
    #[serde(rename = "pubDate")]
    pub pub_date: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedItem {
    pub title: String,
    pub link: String,
    /// Raw description; HTML is stripped only when the digest is rendered.
    pub description: String,
    pub published_at: DateTime<Utc>,
}

/// Selected headline as persisted and returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub published_at: DateTime<Utc>,
}

impl From<&NormalizedItem> for FeedItem {
    fn from(it: &NormalizedItem) -> Self {
        Self {
            title: it.title.clone(),
            link: it.link.clone(),
            published_at: it.published_at,
        }
    }
}

/// Output of one fetch: the URL that was requested and its raw entries.
#[derive(Debug, Clone)]
pub struct FetchedFeed {
    pub url: String,
    pub raw_items: Vec<RawItem>,
}

/// Output of the item pipeline for one feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedFeed {
    pub items: Vec<NormalizedItem>,
    pub digest_lines: Vec<String>,
    pub digest_text: String,
}

impl ProcessedFeed {
    pub fn feed_items(&self) -> Vec<FeedItem> {
        self.items.iter().map(FeedItem::from).collect()
    }
}
