use std::net::SocketAddr;

use axum::body::to_bytes;
use serde_json::json;

use super::*;
use crate::actions::{ActionSubmitter, HttpActionClient, SubmitError};

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("body is JSON")
}

async fn post_action(value: Value) -> Response {
    card_action(State(ServerState::default()), Ok(Json(value))).await
}

async fn spawn_server(allow_framing: bool) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let app = router(ServerState::default(), allow_framing);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

#[tokio::test]
async fn add_todo_returns_result() {
    let response = post_action(json!({"action": "addTodo", "newTodo": "Buy milk"})).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["message"], "Added todo: Buy milk");
    assert_eq!(body["todoItem"]["text"], "Buy milk");
    assert_eq!(body["todoItem"]["completed"], false);
    assert!(body.get("executePrompt").is_none());
}

#[tokio::test]
async fn validation_failure_names_field() {
    let response = post_action(json!({"action": "addTodo"})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["field"], "newTodo");
    assert!(body["error"].as_str().expect("error text").contains("newTodo"));
}

#[tokio::test]
async fn missing_action_and_non_object_bodies_are_rejected() {
    let response = post_action(json!({"prompt": "hi"})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Missing action type");

    let response = post_action(json!(["addTodo"])).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body.get("field").is_none());
}

#[tokio::test]
async fn internal_error_has_generic_message() {
    let response = internal_error();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({"error": "Failed to process card action"})
    );

    let response = panic_response(Box::new("boom"));
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn health_reports_ok() {
    assert_eq!(health().await.0, json!({"status": "ok"}));
}

#[tokio::test]
async fn http_client_round_trips_through_server() {
    let addr = spawn_server(false).await;
    let client = HttpActionClient::new(reqwest::Client::new(), &format!("http://{addr}"));

    let result = client
        .submit(&ActionPayload::for_action("executePrompt").with("prompt", "Tell me a joke"))
        .await
        .expect("dispatched");
    assert_eq!(result.follow_up_prompt(), Some("Tell me a joke"));

    let err = client
        .submit(&ActionPayload::for_action("restartVMs").with("vmSelection", "vm-prod-01"))
        .await
        .expect_err("unconfirmed restart is rejected");
    let SubmitError::Rejected { status, message } = err else {
        panic!("expected rejection, got {err:?}");
    };
    assert_eq!(status, 400);
    assert!(message.contains("confirmToggle"));
}

#[tokio::test]
async fn malformed_json_body_is_bad_request() {
    let addr = spawn_server(false).await;
    let response = reqwest::Client::new()
        .post(format!("http://{addr}{CARD_ACTION_ROUTE}"))
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body("{\"action\": ")
        .send()
        .await
        .expect("request sent");

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.expect("JSON error body");
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn framing_headers_follow_configuration() {
    let framed = spawn_server(true).await;
    let response = reqwest::get(format!("http://{framed}{HEALTH_ROUTE}"))
        .await
        .expect("health request");
    assert_eq!(
        response.headers().get("content-security-policy").map(|v| v.as_bytes()),
        Some(b"frame-ancestors *".as_slice())
    );
    assert_eq!(
        response.headers().get("x-frame-options").map(|v| v.as_bytes()),
        Some(b"ALLOWALL".as_slice())
    );

    let plain = spawn_server(false).await;
    let response = reqwest::get(format!("http://{plain}{HEALTH_ROUTE}"))
        .await
        .expect("health request");
    assert!(response.headers().get("x-frame-options").is_none());
}
