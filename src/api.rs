// src/api.rs
//! HTTP surface: health, the authenticated on-demand brief, and a read
//! endpoint for the latest stored brief of a key.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shuttle_axum::axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::engine::{BriefRunner, FeedSnapshot};
use crate::error::BriefError;
use crate::target::{Reason, RiskLevel, Target};

pub const ENV_API_TOKEN: &str = "API_TOKEN";
/// Store key used by every on-demand run.
pub const ADHOC_KEY: &str = "adhoc";

pub const MAX_TICKERS: usize = 10;
pub const TOPIC_MIN_CHARS: usize = 2;
pub const TOPIC_MAX_CHARS: usize = 64;
pub const PAGE_SIZE_MIN: usize = 3;
pub const PAGE_SIZE_MAX: usize = 15;

#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<BriefRunner>,
    /// Bearer token for `POST /analyze`. `None` rejects every request.
    pub api_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(runner: Arc<BriefRunner>, api_token: Option<&str>) -> Self {
        Self {
            runner,
            api_token: api_token.filter(|t| !t.is_empty()).map(Arc::from),
        }
    }

    /// Token from $API_TOKEN.
    pub fn from_env(runner: Arc<BriefRunner>) -> Self {
        let token = std::env::var(ENV_API_TOKEN).ok();
        if token.as_deref().map_or(true, str::is_empty) {
            tracing::warn!("API_TOKEN not set; POST /analyze will reject every request");
        }
        Self::new(runner, token.as_deref())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/analyze", post(analyze))
        .route("/briefs/{key}", get(latest_brief))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

// ---------- errors ----------

#[derive(Debug)]
pub enum ApiError {
    Unauthenticated,
    InvalidPayload(String),
    Upstream(BriefError),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated => "unauthenticated",
            ApiError::InvalidPayload(_) => "invalid-argument",
            ApiError::Upstream(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<BriefError> for ApiError {
    fn from(e: BriefError) -> Self {
        ApiError::Upstream(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Unauthenticated => "Missing or invalid bearer token".to_string(),
            ApiError::InvalidPayload(m) => m.clone(),
            ApiError::Upstream(e) => e.to_string(),
        };
        let body = json!({ "ok": false, "code": self.code(), "message": message });
        (self.status(), Json(body)).into_response()
    }
}

// ---------- on-demand ----------

/// Wire shape of the on-demand body. Unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdhocRequest {
    #[serde(default)]
    pub tickers: Option<Vec<String>>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
    #[serde(default)]
    pub page_size: Option<f64>,
}

impl AdhocRequest {
    /// Parse a raw body. Empty and `null` bodies mean "all defaults".
    pub fn from_body(body: &[u8]) -> Result<Self, ApiError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        let v: Value = serde_json::from_slice(body)
            .map_err(|e| ApiError::InvalidPayload(format!("body is not JSON: {e}")))?;
        match v {
            Value::Null => Ok(Self::default()),
            Value::Object(_) => serde_json::from_value(v)
                .map_err(|e| ApiError::InvalidPayload(e.to_string())),
            _ => Err(ApiError::InvalidPayload("body must be a JSON object".into())),
        }
    }

    /// Validate and turn into the ad-hoc target.
    pub fn into_target(self) -> Result<Target, ApiError> {
        let mut target = Target::new(ADHOC_KEY);

        if let Some(tickers) = self.tickers {
            if tickers.len() > MAX_TICKERS {
                return Err(ApiError::InvalidPayload(format!(
                    "tickers: at most {MAX_TICKERS} allowed, got {}",
                    tickers.len()
                )));
            }
            target.tickers = Some(tickers.iter().map(|t| t.to_uppercase()).collect());
        }

        if let Some(topic) = self.topic {
            let n = topic.chars().count();
            if !(TOPIC_MIN_CHARS..=TOPIC_MAX_CHARS).contains(&n) {
                return Err(ApiError::InvalidPayload(format!(
                    "topic: length must be {TOPIC_MIN_CHARS}..={TOPIC_MAX_CHARS}, got {n}"
                )));
            }
            target.topic = Some(topic);
        }

        target.risk_level = self.risk_level;

        if let Some(ps) = self.page_size {
            if ps.fract() != 0.0 || !ps.is_finite() {
                return Err(ApiError::InvalidPayload(format!(
                    "pageSize: must be an integer, got {ps}"
                )));
            }
            if ps < PAGE_SIZE_MIN as f64 || ps > PAGE_SIZE_MAX as f64 {
                return Err(ApiError::InvalidPayload(format!(
                    "pageSize: must be {PAGE_SIZE_MIN}..={PAGE_SIZE_MAX}, got {ps}"
                )));
            }
            target.page_size = Some(ps as usize);
        }

        Ok(target)
    }
}

#[derive(Debug, Serialize)]
pub struct AdhocResponse {
    pub ok: bool,
    pub feed: FeedSnapshot,
    pub brief: String,
    pub recommendation: String,
}

fn authorize(headers: &HeaderMap, expected: Option<&str>) -> Result<(), ApiError> {
    let Some(expected) = expected else {
        return Err(ApiError::Unauthenticated);
    };
    // exact bytes after the scheme; no trimming
    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.as_bytes().strip_prefix(b"Bearer "));
    match presented {
        Some(token) if token == expected.as_bytes() => Ok(()),
        _ => Err(ApiError::Unauthenticated),
    }
}

async fn analyze(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AdhocResponse>, ApiError> {
    authorize(&headers, state.api_token.as_deref())?;
    let target = AdhocRequest::from_body(&body)?.into_target()?;

    let brief = state.runner.execute(&target, Reason::Adhoc).await?;
    Ok(Json(AdhocResponse {
        ok: true,
        feed: brief.feed,
        brief: brief.brief,
        recommendation: brief.recommendation,
    }))
}

async fn latest_brief(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Value>, Response> {
    match state.runner.store().latest(&key).await {
        Ok(Some(doc)) => Ok(Json(doc)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "ok": false, "code": "not-found", "message": format!("no brief for {key}") })),
        )
            .into_response()),
        Err(BriefError::Store(m)) => Err(ApiError::InvalidPayload(m).into_response()),
        Err(e) => Err(ApiError::Upstream(e).into_response()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_null_bodies_are_defaults() {
        let t = AdhocRequest::from_body(b"").unwrap().into_target().unwrap();
        assert_eq!(t, Target::new("adhoc"));
        let t = AdhocRequest::from_body(b"null").unwrap().into_target().unwrap();
        assert_eq!(t, Target::new("adhoc"));
    }

    #[test]
    fn tickers_are_uppercased_and_capped() {
        let t = AdhocRequest::from_body(br#"{"tickers":["aapl","Nvda"],"extra":1}"#)
            .unwrap()
            .into_target()
            .unwrap();
        assert_eq!(t.tickers, Some(vec!["AAPL".to_string(), "NVDA".to_string()]));

        let eleven: Vec<String> = (0..11).map(|i| format!("T{i}")).collect();
        let body = json!({ "tickers": eleven }).to_string();
        let err = AdhocRequest::from_body(body.as_bytes())
            .unwrap()
            .into_target()
            .unwrap_err();
        assert_eq!(err.code(), "invalid-argument");
    }

    #[test]
    fn page_size_must_be_whole_and_in_range() {
        for bad in ["2", "16", "3.5"] {
            let body = format!(r#"{{"pageSize":{bad}}}"#);
            let r = AdhocRequest::from_body(body.as_bytes()).unwrap().into_target();
            assert!(r.is_err(), "pageSize {bad} should be rejected");
        }
        let t = AdhocRequest::from_body(br#"{"pageSize":15}"#)
            .unwrap()
            .into_target()
            .unwrap();
        assert_eq!(t.page_size, Some(15));
    }

    #[test]
    fn unknown_risk_level_is_rejected() {
        assert!(AdhocRequest::from_body(br#"{"riskLevel":"yolo"}"#).is_err());
    }

    #[test]
    fn bearer_token_must_match() {
        let mut h = HeaderMap::new();
        assert!(authorize(&h, Some("s3cret")).is_err());
        h.insert(AUTHORIZATION, "Bearer s3cret".parse().unwrap());
        assert!(authorize(&h, Some("s3cret")).is_ok());
        assert!(authorize(&h, Some("other")).is_err());
        assert!(authorize(&h, None).is_err());
    }

    #[test]
    fn bearer_token_is_compared_exactly() {
        for presented in ["Bearer s3cret ", "Bearer  s3cret", "bearer s3cret", "Bearer s3cre", "s3cret"] {
            let mut h = HeaderMap::new();
            h.insert(AUTHORIZATION, presented.parse().unwrap());
            assert!(authorize(&h, Some("s3cret")).is_err(), "{presented:?} must be rejected");
        }
    }
}
