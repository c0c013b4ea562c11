// tests/ai_adapter_openai.rs
//
// OpenAI provider against a local server speaking the Responses API shape.

use std::sync::{Arc, Mutex};

use market_brief::ai_adapter::{build_provider, OpenAiProvider, PromptRequest, Provider};
use market_brief::config::ai::AiConfig;
use market_brief::error::BriefError;
use serde_json::{json, Value};
use shuttle_axum::axum::{
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        shuttle_axum::axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn request() -> PromptRequest {
    PromptRequest {
        system: "You are a pragmatic, risk-aware investment analyst. Be concise.".into(),
        user: "Topic: market".into(),
        max_output_tokens: 250,
    }
}

#[tokio::test]
async fn sends_model_messages_and_ceiling_with_bearer_key() {
    let captured: Arc<Mutex<Option<(String, Value)>>> = Arc::new(Mutex::new(None));
    let cap = captured.clone();
    let app = Router::new().route(
        "/v1/responses",
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let cap = cap.clone();
            async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                *cap.lock().unwrap() = Some((auth, body));
                Json(json!({ "output_text": "Action: HOLD" }))
            }
        }),
    );
    let base = serve(app).await;

    let provider = OpenAiProvider::new("sk-test".into(), "gpt-4.1-mini", &base).unwrap();
    let out = provider.generate(&request()).await.unwrap();
    assert_eq!(out, "Action: HOLD");

    let (auth, body) = captured.lock().unwrap().take().expect("request captured");
    assert_eq!(auth, "Bearer sk-test");
    assert_eq!(body["model"], "gpt-4.1-mini");
    assert_eq!(body["max_output_tokens"], 250);
    assert_eq!(body["input"][0]["role"], "system");
    assert_eq!(body["input"][1], json!({ "role": "user", "content": "Topic: market" }));
}

#[tokio::test]
async fn error_status_carries_status_and_body() {
    let app = Router::new().route(
        "/v1/responses",
        post(|| async { (StatusCode::TOO_MANY_REQUESTS, "rate limited") }),
    );
    let base = serve(app).await;

    let provider = OpenAiProvider::new("sk-test".into(), "gpt-4.1-mini", &base).unwrap();
    match provider.generate(&request()).await {
        Err(BriefError::Analysis { status, body }) => {
            assert_eq!(status, 429);
            assert_eq!(body, "rate limited");
        }
        other => panic!("expected Analysis error, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_output_text_is_empty_string() {
    let app = Router::new().route(
        "/v1/responses",
        post(|| async { Json(json!({ "id": "resp_1", "output": [] })) }),
    );
    let base = serve(app).await;

    let provider = OpenAiProvider::new("sk-test".into(), "gpt-4.1-mini", &base).unwrap();
    assert_eq!(provider.generate(&request()).await.unwrap(), "");
}

#[serial_test::serial]
#[test]
fn factory_honours_mock_mode_and_disabled_flag() {
    std::env::set_var("AI_TEST_MODE", "mock");
    let p = build_provider(&AiConfig::default()).unwrap();
    assert_eq!(p.name(), "mock");
    std::env::remove_var("AI_TEST_MODE");

    let off = AiConfig {
        enabled: false,
        ..Default::default()
    };
    assert_eq!(build_provider(&off).unwrap().name(), "disabled");

    let unknown = AiConfig {
        provider: "somebody-else".into(),
        ..Default::default()
    };
    assert_eq!(build_provider(&unknown).unwrap().name(), "disabled");

    let literal = AiConfig {
        api_key: "sk-literal".into(),
        ..Default::default()
    };
    assert_eq!(build_provider(&literal).unwrap().name(), "openai");
}
