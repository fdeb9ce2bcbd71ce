//! Integration tests for POST /chat against mocked chat backends.
//!
//! Verifies that:
//! - The completions backend sends an OpenAI-style body with bearer auth
//!   and relays `choices[0].message`
//! - The inference backend sends `{"inputs": ...}` and relays raw JSON
//! - Upstream errors, timeouts and unreachable hosts become HTTP 500
//!   with a `"<backend> API error: ..."` detail
//! - Nothing is retried

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use algochat::answers::AnswerTable;
use algochat::config::Config;
use algochat::proxy::{create_router, AppState};

/// Build an app whose chat backend is described by `backend_toml`.
fn setup_app(backend_toml: &str, timeout_secs: u64) -> axum::Router {
    let toml = format!(
        r#"
        [chat]
        api_key = "k1"

        [chat.backend]
        {backend_toml}

        [upstream]
        timeout_secs = {timeout_secs}
        connect_timeout_secs = 1
        "#
    );
    let (config, _) = Config::parse_str(&toml)
        .unwrap()
        .resolve_api_key()
        .unwrap();
    let state = AppState::new(config, AnswerTable::default()).unwrap();
    create_router(state)
}

fn completions_app(server_uri: &str) -> axum::Router {
    setup_app(
        &format!(
            r#"
            kind = "completions"
            url = "{server_uri}/v1"
            model = "deepseek-ai/DeepSeek-R1"
            "#
        ),
        5,
    )
}

fn chat_request(query: &str) -> Request<Body> {
    Request::post("/chat")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::json!({ "query": query }).to_string()))
        .unwrap()
}

/// Parse the response body as JSON and return (status_code, json_value).
async fn parse_body(response: axum::response::Response) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
        .await
        .expect("read body");
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap_or_default();
    (status, json)
}

#[tokio::test]
async fn test_completions_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer k1"))
        .and(body_partial_json(serde_json::json!({
            "model": "deepseek-ai/DeepSeek-R1",
            "messages": [{"role": "user", "content": "What is Algorand?"}],
            "max_tokens": 500
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "chatcmpl-mock",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "A pure proof-of-stake chain."},
                "finish_reason": "stop"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = completions_app(&server.uri());
    let response = app.oneshot(chat_request("What is Algorand?")).await.unwrap();
    let (status, json) = parse_body(response).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["query"], "What is Algorand?");
    assert_eq!(
        json["response"],
        serde_json::json!({"role": "assistant", "content": "A pure proof-of-stake chain."})
    );
}

#[tokio::test]
async fn test_completions_no_choices() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": []
        })))
        .mount(&server)
        .await;

    let app = completions_app(&server.uri());
    let response = app.oneshot(chat_request("hi")).await.unwrap();
    let (status, json) = parse_body(response).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["response"], "No response received.");
}

#[tokio::test]
async fn test_inference_backend_relays_raw_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/meta-llama/Llama-3.2-3B"))
        .and(header("authorization", "Bearer k1"))
        .and(body_json(serde_json::json!({"inputs": "gm"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"generated_text": "gm, anon"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let app = setup_app(
        &format!(
            r#"
            kind = "inference"
            url = "{}/models/meta-llama/Llama-3.2-3B"
            "#,
            server.uri()
        ),
        5,
    );
    let response = app.oneshot(chat_request("gm")).await.unwrap();
    let (status, json) = parse_body(response).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["query"], "gm");
    assert_eq!(json["response"][0]["generated_text"], "gm, anon");
}

#[tokio::test]
async fn test_upstream_error_returns_500_with_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("model overloaded"))
        // Failures are never retried
        .expect(1)
        .mount(&server)
        .await;

    let app = completions_app(&server.uri());
    let response = app.oneshot(chat_request("hi")).await.unwrap();
    let (status, json) = parse_body(response).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let detail = json["detail"].as_str().expect("detail string");
    assert!(
        detail.starts_with("DeepSeek API error: "),
        "unexpected detail: {}",
        detail
    );
    assert!(detail.contains("503"), "detail should carry status: {}", detail);
    assert!(
        detail.contains("model overloaded"),
        "detail should carry upstream message: {}",
        detail
    );
}

#[tokio::test]
async fn test_upstream_invalid_json_returns_500() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let app = completions_app(&server.uri());
    let response = app.oneshot(chat_request("hi")).await.unwrap();
    let (status, json) = parse_body(response).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["detail"]
        .as_str()
        .unwrap_or("")
        .starts_with("DeepSeek API error: "));
}

#[tokio::test]
async fn test_upstream_timeout_returns_500() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"choices": []}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let app = setup_app(
        &format!(
            r#"
            kind = "completions"
            url = "{}/v1"
            "#,
            server.uri()
        ),
        1,
    );

    let started = std::time::Instant::now();
    let response = app.oneshot(chat_request("hi")).await.unwrap();
    let (status, json) = parse_body(response).await;

    assert!(
        started.elapsed() < Duration::from_secs(4),
        "request should be cut off by the upstream timeout"
    );
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["detail"]
        .as_str()
        .unwrap_or("")
        .starts_with("DeepSeek API error: "));
}

#[tokio::test]
async fn test_upstream_unreachable_returns_500() {
    let app = setup_app(
        r#"
        kind = "completions"
        url = "http://127.0.0.1:1/v1"
        "#,
        5,
    );

    let response = app.oneshot(chat_request("hi")).await.unwrap();
    let (status, json) = parse_body(response).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["detail"]
        .as_str()
        .unwrap_or("")
        .starts_with("DeepSeek API error: "));
}

#[tokio::test]
async fn test_custom_backend_name_in_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
        .mount(&server)
        .await;

    let toml = format!(
        r#"
        [chat]
        name = "Llama"
        api_key = "k1"

        [chat.backend]
        kind = "inference"
        url = "{}/models/llama"
        "#,
        server.uri()
    );
    let (config, _) = Config::parse_str(&toml)
        .unwrap()
        .resolve_api_key()
        .unwrap();
    let app = create_router(AppState::new(config, AnswerTable::default()).unwrap());

    let response = app.oneshot(chat_request("hi")).await.unwrap();
    let (status, json) = parse_body(response).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let detail = json["detail"].as_str().unwrap_or("");
    assert!(detail.starts_with("Llama API error: "), "{}", detail);
    assert!(detail.contains("invalid token"), "{}", detail);
}
