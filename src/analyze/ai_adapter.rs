//! AI adapter: provider abstraction for the single text-generation call.
//!
//! The OpenAI provider talks to the Responses API; mock and disabled providers
//! cover tests and local runs without a key.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::config::ai::AiConfig;
use crate::error::{BriefError, Result};

/// One fully built request: system instruction, user prompt, output ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub system: String,
    pub user: String,
    pub max_output_tokens: u32,
}

pub type GenerateFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// Low-level provider: text in, text out.
pub trait Provider: Send + Sync + 'static {
    fn generate<'a>(&'a self, req: &'a PromptRequest) -> GenerateFuture<'a>;
    fn name(&self) -> &'static str;
}

/// Convenient alias used by callers.
pub type DynProvider = Arc<dyn Provider>;

/// Factory: build a provider according to config and environment variables.
///
/// * If `AI_TEST_MODE=mock`, returns a deterministic mock provider.
/// * Else if `config.enabled==false` or the provider is unknown, returns a disabled provider.
/// * Else builds the OpenAI provider (needs an API key).
pub fn build_provider(config: &AiConfig) -> anyhow::Result<DynProvider> {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Ok(Arc::new(MockProvider::new(
            "- Neutral tape (mock)\nAction: HOLD\nRisks: rates, earnings",
        )));
    }

    if !config.enabled {
        return Ok(Arc::new(DisabledProvider));
    }

    match config.provider.as_str() {
        "openai" => {
            let key = config.resolved_api_key()?;
            Ok(Arc::new(OpenAiProvider::new(
                key,
                &config.model,
                &config.base_url,
            )?))
        }
        other => {
            tracing::warn!(provider = other, "unknown AI provider; analysis disabled");
            Ok(Arc::new(DisabledProvider))
        }
    }
}

/// Pull the answer text out of a Responses API body.
/// `output_text` wins; otherwise `output[].content[]` parts of type
/// `output_text` are concatenated. Missing text is `""`, not an error.
pub fn extract_output_text(body: &Value) -> String {
    if let Some(s) = body.get("output_text").and_then(Value::as_str) {
        return s.to_string();
    }
    let Some(output) = body.get("output").and_then(Value::as_array) else {
        return String::new();
    };
    output
        .iter()
        .filter_map(|o| o.get("content").and_then(Value::as_array))
        .flatten()
        .filter(|part| part.get("type").and_then(Value::as_str) == Some("output_text"))
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("")
}

/// OpenAI provider (Responses API).
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: &str, base_url: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            tracing::warn!("OpenAI provider built with an empty API key");
        }
        let http = reqwest::Client::builder()
            .user_agent("market-brief/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            api_key,
            model: model.to_string(),
            endpoint: format!("{}/v1/responses", base_url.trim_end_matches('/')),
        })
    }
}

impl Provider for OpenAiProvider {
    fn generate<'a>(&'a self, req: &'a PromptRequest) -> GenerateFuture<'a> {
        Box::pin(async move {
            #[derive(Serialize)]
            struct Msg<'a> {
                role: &'a str,
                content: &'a str,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                input: Vec<Msg<'a>>,
                max_output_tokens: u32,
            }

            let body = Req {
                model: &self.model,
                input: vec![
                    Msg {
                        role: "system",
                        content: &req.system,
                    },
                    Msg {
                        role: "user",
                        content: &req.user,
                    },
                ],
                max_output_tokens: req.max_output_tokens,
            };

            let resp = self
                .http
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(BriefError::Analysis {
                    status: status.as_u16(),
                    body,
                });
            }
            let data: Value = resp.json().await?;
            Ok(extract_output_text(&data))
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Returns `""` without any call; used when AI is disabled.
pub struct DisabledProvider;

impl Provider for DisabledProvider {
    fn generate<'a>(&'a self, _req: &'a PromptRequest) -> GenerateFuture<'a> {
        tracing::debug!("AI disabled; empty recommendation");
        Box::pin(async { Ok(String::new()) })
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Fixed-answer provider for tests/local runs. Records every request.
pub struct MockProvider {
    pub fixed: String,
    pub calls: Mutex<Vec<PromptRequest>>,
}

impl MockProvider {
    pub fn new(fixed: impl Into<String>) -> Self {
        Self {
            fixed: fixed.into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn recorded(&self) -> Vec<PromptRequest> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Provider for MockProvider {
    fn generate<'a>(&'a self, req: &'a PromptRequest) -> GenerateFuture<'a> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(req.clone());
        }
        let out = self.fixed.clone();
        Box::pin(async move { Ok(out) })
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}
