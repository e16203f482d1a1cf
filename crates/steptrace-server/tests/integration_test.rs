//! End-to-end tests for the step tracer HTTP API.
//!
//! Tests use `tower::ServiceExt::oneshot` to send requests directly to the
//! router without starting a network server.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::json;
use tower::ServiceExt;

use steptrace_server::router::build_router;
use steptrace_server::state::AppState;

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

fn test_app() -> Router {
    build_router(AppState::default())
}

/// Sends a POST request with a raw body and returns (status, json).
async fn post_raw(app: &Router, path: &str, body: String) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(path)
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap_or(json!(null));
    (status, json)
}

async fn post_json(app: &Router, path: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    post_raw(app, path, body.to_string()).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_ok() {
    let app = test_app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json, json!({"status": "ok"}));
}

#[tokio::test]
async fn trace_returns_result_and_steps() {
    let app = test_app();
    let (status, body) = post_json(
        &app,
        "/trace",
        json!({
            "code": "def f(x):\n  y = x + 1\n  return y\n",
            "functionName": "f",
            "parameterValue": 5
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], json!(6));
    assert_eq!(
        body["steps"],
        json!([
            {"step": 0, "line": 2, "code": "y = x + 1", "variables": {"x": 5}},
            {"step": 1, "line": 3, "code": "return y", "variables": {"x": 5, "y": 6}}
        ])
    );
}

#[tokio::test]
async fn failures_are_ok_responses_with_an_error() {
    let app = test_app();
    let (status, body) = post_json(
        &app,
        "/trace",
        json!({"code": "def f(x):\n  return x\n", "functionName": "missing", "parameterValue": 1}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"error": "name 'missing' is not defined"}));
}

#[tokio::test]
async fn malformed_body_is_reported_in_protocol_shape() {
    let app = test_app();
    let (status, body) = post_raw(&app, "/trace", "{not json".to_string()).await;
    assert_eq!(status, StatusCode::OK);
    let error = body["error"].as_str().unwrap();
    assert!(error.starts_with("invalid request: "));
}

#[tokio::test]
async fn empty_function_name_is_rejected() {
    let app = test_app();
    let (_, body) = post_json(
        &app,
        "/trace",
        json!({"code": "def f(x):\n  return x\n", "functionName": "", "parameterValue": 1}),
    )
    .await;
    assert_eq!(body, json!({"error": "function name is required"}));
}

#[tokio::test]
async fn consecutive_requests_do_not_leak_steps() {
    let app = test_app();
    let loop_code = "def f(n):\n  t = 0\n  for i in range(n):\n    t += i\n  return t\n";
    let (_, first) = post_json(
        &app,
        "/trace",
        json!({"code": loop_code, "functionName": "f", "parameterValue": 3}),
    )
    .await;
    let (_, second) = post_json(
        &app,
        "/trace",
        json!({"code": "def g(x):\n  return x\n", "functionName": "g", "parameterValue": "s"}),
    )
    .await;
    assert_eq!(first["steps"].as_array().unwrap().len(), 9);
    assert_eq!(second["steps"].as_array().unwrap().len(), 1);
    assert_eq!(second["result"], json!("s"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_each_get_their_own_trace() {
    let app = test_app();
    let code = "def f(n):\n  t = 0\n  for i in range(n):\n    t += i\n  return t\n";
    let requests = (0..8i64).map(|n| {
        let app = app.clone();
        tokio::spawn(async move {
            let (_, body) = post_json(
                &app,
                "/trace",
                json!({"code": code, "functionName": "f", "parameterValue": n}),
            )
            .await;
            (n, body)
        })
    });
    for request in requests.collect::<Vec<_>>() {
        let (n, body) = request.await.unwrap();
        assert_eq!(body["result"], json!(n * (n - 1) / 2));
        // t = 0, n + 1 loop headers, n bodies, return
        let expected = 2 * n as usize + 3;
        assert_eq!(body["steps"].as_array().unwrap().len(), expected);
    }
}
