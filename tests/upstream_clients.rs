//! Exercises the reqwest clients against local axum stand-ins for the
//! OpenAI and Unsplash APIs.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use element_editor::ErrorKind;
use element_editor::chat::{ChatCompletion, OpenAiChat};
use element_editor::image_search::{ImageSearch, UnsplashSearch};
use element_editor::types::{ChatMessage, CompletionRequest, ToolSpec};

#[derive(Clone, Default)]
struct Captured {
    body: Arc<Mutex<Option<Value>>>,
    query: Arc<Mutex<Option<Vec<(String, String)>>>>,
    auth: Arc<Mutex<Option<String>>>,
}

#[derive(Clone)]
struct Stub {
    status: StatusCode,
    reply: Value,
    delay: Duration,
    captured: Captured,
}

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn auth_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn completions(
    State(stub): State<Stub>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    *stub.captured.body.lock().unwrap() = Some(body);
    *stub.captured.auth.lock().unwrap() = auth_header(&headers);
    tokio::time::sleep(stub.delay).await;
    (stub.status, Json(stub.reply))
}

async fn photos(
    State(stub): State<Stub>,
    headers: HeaderMap,
    Query(query): Query<Vec<(String, String)>>,
) -> impl IntoResponse {
    *stub.captured.query.lock().unwrap() = Some(query);
    *stub.captured.auth.lock().unwrap() = auth_header(&headers);
    (stub.status, Json(stub.reply))
}

async fn openai_stub(status: StatusCode, reply: Value, delay: Duration) -> (String, Captured) {
    let captured = Captured::default();
    let stub = Stub {
        status,
        reply,
        delay,
        captured: captured.clone(),
    };
    let url = spawn(
        Router::new()
            .route("/v1/chat/completions", post(completions))
            .with_state(stub),
    )
    .await;
    (format!("{}/v1", url), captured)
}

async fn unsplash_stub(status: StatusCode, reply: Value) -> (String, Captured) {
    let captured = Captured::default();
    let stub = Stub {
        status,
        reply,
        delay: Duration::ZERO,
        captured: captured.clone(),
    };
    let url = spawn(
        Router::new()
            .route("/search/photos", get(photos))
            .with_state(stub),
    )
    .await;
    (url, captured)
}

fn request() -> CompletionRequest {
    CompletionRequest {
        messages: vec![ChatMessage::system("rewrite"), ChatMessage::user("<p>A</p>")],
        tools: vec![ToolSpec::search_image()],
        temperature: 0.0,
    }
}

#[tokio::test]
async fn chat_sends_model_tools_and_bearer_key() {
    let (base, captured) = openai_stub(
        StatusCode::OK,
        json!({ "choices": [{ "index": 0, "message": { "role": "assistant", "content": "<p>B</p>" } }] }),
        Duration::ZERO,
    )
    .await;
    let chat = OpenAiChat::new("sk-test", base, "gpt-4o", Duration::from_secs(5)).unwrap();

    let reply = chat.complete(request()).await.unwrap();

    assert_eq!(reply.content.as_deref(), Some("<p>B</p>"));
    assert!(reply.tool_calls.is_empty());
    let body = captured.body.lock().unwrap().clone().unwrap();
    assert_eq!(body["model"], "gpt-4o");
    assert_eq!(body["temperature"], 0.0);
    assert_eq!(body["messages"].as_array().unwrap().len(), 2);
    assert_eq!(body["tools"][0]["function"]["name"], "search_image");
    assert_eq!(
        captured.auth.lock().unwrap().as_deref(),
        Some("Bearer sk-test")
    );
}

#[tokio::test]
async fn chat_parses_tool_calls() {
    let (base, _) = openai_stub(
        StatusCode::OK,
        json!({ "choices": [{ "message": {
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_9",
                "type": "function",
                "function": { "name": "search_image", "arguments": "{\"query\":\"sunset\"}" }
            }]
        } }] }),
        Duration::ZERO,
    )
    .await;
    let chat = OpenAiChat::new("k", base, "gpt-4o", Duration::from_secs(5)).unwrap();

    let reply = chat.complete(request()).await.unwrap();

    assert!(reply.content.is_none());
    assert_eq!(reply.tool_calls.len(), 1);
    assert_eq!(reply.tool_calls[0].id, "call_9");
    assert_eq!(reply.tool_calls[0].function.arguments, r#"{"query":"sunset"}"#);
}

#[tokio::test]
async fn chat_error_status_is_upstream_unavailable() {
    let (base, _) = openai_stub(
        StatusCode::UNAUTHORIZED,
        json!({ "error": { "message": "Incorrect API key provided" } }),
        Duration::ZERO,
    )
    .await;
    let chat = OpenAiChat::new("bad", base, "gpt-4o", Duration::from_secs(5)).unwrap();

    let err = chat.complete(request()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
    assert!(err.to_string().contains("Incorrect API key provided"));
}

#[tokio::test]
async fn chat_without_choices_is_empty_completion() {
    let (base, _) = openai_stub(StatusCode::OK, json!({ "choices": [] }), Duration::ZERO).await;
    let chat = OpenAiChat::new("k", base, "gpt-4o", Duration::from_secs(5)).unwrap();

    let err = chat.complete(request()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyCompletion);
}

#[tokio::test]
async fn chat_timeout_is_upstream_unavailable() {
    let (base, _) = openai_stub(
        StatusCode::OK,
        json!({ "choices": [] }),
        Duration::from_secs(5),
    )
    .await;
    let chat = OpenAiChat::new("k", base, "gpt-4o", Duration::from_millis(200)).unwrap();

    let err = chat.complete(request()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
}

#[tokio::test]
async fn chat_unreachable_is_upstream_unavailable() {
    // Bind then drop to get a port nobody listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let chat = OpenAiChat::new("k", format!("http://{}/v1", addr), "gpt-4o", Duration::from_secs(2))
        .unwrap();

    let err = chat.complete(request()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
}

#[tokio::test]
async fn unsplash_returns_first_regular_url() {
    let (base, captured) = unsplash_stub(
        StatusCode::OK,
        json!({ "total": 2, "results": [
            { "urls": { "regular": "https://images.example/sunset-regular.jpg", "full": "https://images.example/sunset-full.jpg" },
              "alt_description": "sun setting over the sea" },
            { "urls": { "regular": "https://images.example/other.jpg" } }
        ] }),
    )
    .await;
    let search = UnsplashSearch::new("access-key", base, Duration::from_secs(5)).unwrap();

    let image = search.search("sunset").await.unwrap().unwrap();

    assert_eq!(image.url, "https://images.example/sunset-regular.jpg");
    assert_eq!(image.description.as_deref(), Some("sun setting over the sea"));
    let query = captured.query.lock().unwrap().clone().unwrap();
    assert!(query.contains(&("query".to_string(), "sunset".to_string())));
    assert!(query.contains(&("per_page".to_string(), "1".to_string())));
    assert_eq!(
        captured.auth.lock().unwrap().as_deref(),
        Some("Client-ID access-key")
    );
}

#[tokio::test]
async fn unsplash_empty_results_is_none() {
    let (base, _) = unsplash_stub(StatusCode::OK, json!({ "total": 0, "results": [] })).await;
    let search = UnsplashSearch::new("k", base, Duration::from_secs(5)).unwrap();

    assert!(search.search("nothing at all").await.unwrap().is_none());
}

#[tokio::test]
async fn unsplash_error_status_is_upstream_unavailable() {
    let (base, _) = unsplash_stub(
        StatusCode::FORBIDDEN,
        json!({ "errors": ["Rate Limit Exceeded"] }),
    )
    .await;
    let search = UnsplashSearch::new("k", base, Duration::from_secs(5)).unwrap();

    let err = search.search("sunset").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
}
