//! OpenAI client against a local stub server.

use scenecast_core::{ChatMessage, CodeGenerator, GenerationError, GenerationParams, Role};
use scenecast_llm::{OpenAiConfig, OpenAiGenerator};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use warp::http::StatusCode;
use warp::Filter;

/// Serves `/v1/chat/completions` with a fixed status and body, capturing requests
fn spawn_stub(status: StatusCode, body: Value) -> (SocketAddr, Arc<Mutex<Vec<(String, Value)>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let captured = seen.clone();

    let route = warp::post()
        .and(warp::path!("v1" / "chat" / "completions"))
        .and(warp::header::<String>("authorization"))
        .and(warp::body::json())
        .map(move |auth: String, request: Value| {
            captured.lock().unwrap().push((auth, request));
            warp::reply::with_status(warp::reply::json(&body), status)
        });

    let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    (addr, seen)
}

fn generator(addr: SocketAddr) -> OpenAiGenerator {
    OpenAiGenerator::new(
        OpenAiConfig::new("sk-test")
            .with_model("gpt-test")
            .with_base_url(format!("http://{addr}/v1")),
    )
    .unwrap()
}

fn messages() -> Vec<ChatMessage> {
    vec![
        ChatMessage::system("You write animations."),
        ChatMessage::with_role(Role::User, "Create a Manim animation for: a dot"),
    ]
}

#[tokio::test]
async fn returns_first_choice_content() {
    let (addr, seen) = spawn_stub(
        StatusCode::OK,
        json!({"choices": [{"message": {"role": "assistant", "content": "```python\nprint(1)\n```"}}]}),
    );

    let text = generator(addr)
        .generate(&messages(), GenerationParams::default())
        .await
        .unwrap();
    assert_eq!(text, "```python\nprint(1)\n```");

    let seen = seen.lock().unwrap();
    let (auth, body) = &seen[0];
    assert_eq!(auth, "Bearer sk-test");
    assert_eq!(body["model"], "gpt-test");
    assert_eq!(body["temperature"], 0.5);
    assert_eq!(body["max_tokens"], 1000);
    assert_eq!(body["messages"].as_array().unwrap().len(), 2);
    assert_eq!(body["messages"][1]["role"], "user");
}

#[tokio::test]
async fn server_error_is_retryable() {
    let (addr, _) = spawn_stub(
        StatusCode::SERVICE_UNAVAILABLE,
        json!({"error": {"message": "overloaded", "type": "server_error"}}),
    );

    let err = generator(addr)
        .generate(&messages(), GenerationParams::default())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        GenerationError::Service {
            status: Some(503),
            message: "overloaded".to_string(),
            retryable: true,
        }
    );
}

#[tokio::test]
async fn bad_request_is_not_retryable() {
    let (addr, _) = spawn_stub(
        StatusCode::BAD_REQUEST,
        json!({"error": {"message": "max_tokens is too large"}}),
    );

    let err = generator(addr)
        .generate(&messages(), GenerationParams::default())
        .await
        .unwrap_err();
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn empty_choices_is_empty() {
    let (addr, _) = spawn_stub(StatusCode::OK, json!({"choices": []}));

    let err = generator(addr)
        .generate(&messages(), GenerationParams::default())
        .await
        .unwrap_err();
    assert_eq!(err, GenerationError::Empty);
}

#[tokio::test]
async fn unreachable_server_is_retryable() {
    // Bind and immediately drop to get a port nobody listens on.
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();

    let err = generator(addr)
        .generate(&messages(), GenerationParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Service { status: None, retryable: true, .. }));
}
