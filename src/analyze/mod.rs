// src/analyze/mod.rs
//! Analyst: deterministic prompt from (target, digest) + one provider call.

pub mod ai_adapter;

use metrics::counter;

use crate::analyze::ai_adapter::{DynProvider, PromptRequest};
use crate::error::Result;
use crate::target::Target;

pub const SYSTEM_PROMPT: &str = "You are a pragmatic, risk-aware investment analyst. Be concise.";
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 250;

/// Tickers joined with ", ", else the topic, else "market".
pub fn topic_label(target: &Target) -> String {
    match (target.active_tickers(), target.topic.as_deref()) {
        (Some(tickers), _) => tickers.join(", "),
        (None, Some(topic)) => topic.to_string(),
        (None, None) => "market".to_string(),
    }
}

pub fn build_prompt(target: &Target, digest: &str, source_label: &str) -> String {
    [
        format!("Topic: {}", topic_label(target)),
        format!("Risk tolerance: {}", target.risk().as_str()),
        format!("Recent market headlines ({source_label}):"),
        digest.to_string(),
        String::new(),
        "Task:".to_string(),
        "1) Market read in 3 concise bullets.".to_string(),
        "2) One action (BUY/SELL/HOLD/WATCHLIST) + rationale.".to_string(),
        "3) Two key risks to monitor.".to_string(),
        "Limit to 120 words.".to_string(),
    ]
    .join("\n")
}

#[derive(Clone)]
pub struct Analyst {
    provider: DynProvider,
    max_output_tokens: u32,
    source_label: String,
}

impl Analyst {
    pub fn new(provider: DynProvider) -> Self {
        Self {
            provider,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            source_label: "Yahoo Finance".to_string(),
        }
    }

    pub fn with_max_output_tokens(mut self, n: u32) -> Self {
        self.max_output_tokens = n;
        self
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn request_for(&self, target: &Target, digest: &str) -> PromptRequest {
        PromptRequest {
            system: SYSTEM_PROMPT.to_string(),
            user: build_prompt(target, digest, &self.source_label),
            max_output_tokens: self.max_output_tokens,
        }
    }

    /// One call, no retry. Provider errors propagate unchanged.
    pub async fn analyze(&self, target: &Target, digest: &str) -> Result<String> {
        let req = self.request_for(target, digest);
        match self.provider.generate(&req).await {
            Ok(text) => {
                tracing::debug!(
                    key = %target.key,
                    provider = self.provider.name(),
                    chars = text.len(),
                    "analysis done"
                );
                Ok(text)
            }
            Err(e) => {
                counter!("ai_errors_total").increment(1);
                tracing::warn!(key = %target.key, error = %e, "analysis failed");
                Err(e)
            }
        }
    }
}
