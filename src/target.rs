// src/target.rs
//! Briefing subjects and run tags.

use serde::{Deserialize, Serialize};

/// Page size used when a target does not set one.
pub const DEFAULT_PAGE_SIZE: usize = 8;
/// Lower bound on selected headlines, applied even to smaller page sizes.
pub const MIN_PAGE_SIZE: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

/// Why a run happened. Persisted verbatim in every brief.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reason {
    Preopen,
    Intraday,
    Postclose,
    Adhoc,
}

impl Reason {
    pub fn as_str(self) -> &'static str {
        match self {
            Reason::Preopen => "preopen",
            Reason::Intraday => "intraday",
            Reason::Postclose => "postclose",
            Reason::Adhoc => "adhoc",
        }
    }
}

/// One briefing subject. `key` doubles as the store document id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tickers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,
}

impl Target {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            tickers: None,
            topic: None,
            risk_level: None,
            page_size: None,
        }
    }

    pub fn with_tickers<I, S>(mut self, tickers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tickers = Some(tickers.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_risk_level(mut self, risk: RiskLevel) -> Self {
        self.risk_level = Some(risk);
        self
    }

    pub fn with_page_size(mut self, n: usize) -> Self {
        self.page_size = Some(n);
        self
    }

    /// Non-empty ticker list, if any.
    pub fn active_tickers(&self) -> Option<&[String]> {
        self.tickers.as_deref().filter(|t| !t.is_empty())
    }

    pub fn risk(&self) -> RiskLevel {
        self.risk_level.unwrap_or_default()
    }

    /// Number of headlines a run keeps: `max(3, pageSize ?? 8)`.
    pub fn selection_size(&self) -> usize {
        selection_size(self.page_size)
    }
}

pub fn selection_size(page_size: Option<usize>) -> usize {
    page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(MIN_PAGE_SIZE)
}

/// Built-in target list used when no config file is present.
pub fn default_targets() -> Vec<Target> {
    vec![
        Target::new("us_market")
            .with_topic("stock market")
            .with_risk_level(RiskLevel::Medium)
            .with_page_size(8),
        Target::new("tech_megacaps")
            .with_tickers(["AAPL", "MSFT", "NVDA", "GOOGL", "AMZN"])
            .with_risk_level(RiskLevel::Medium),
    ]
}
