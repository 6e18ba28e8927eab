// sentrygate-gateway/tests/safe_request.rs
// ============================================================================
// Module: Safe Request End-to-End Test
// Description: Drives a clean request through the full gate -> queue ->
// worker -> post-check path and confirms it comes out the other side
// completed, with no audit trail.
// Purpose: Cover the pipeline's golden path end to end.
// ============================================================================

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::http::StatusCode;
use sentrygate_core::ResponseStatus;
use tower::ServiceExt;

use common::Harness;

#[tokio::test]
async fn clean_request_completes_with_the_model_response() {
    let harness = Harness::build(["Paris is the capital of France."], "");
    let (worker_handle, shutdown_tx) = harness.spawn_worker();

    let request = Request::post("/infer")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({"input_text": "What is the capital of France?"}).to_string(),
        ))
        .expect("build request");
    let response = harness.router().oneshot(request).await.expect("router call");
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("read body");
    let accepted: serde_json::Value = serde_json::from_slice(&body).expect("parse body");
    assert_eq!(accepted["status"], "queued");
    let request_id = accepted["request_id"].as_str().expect("request_id present").to_string();

    let message = harness
        .await_response(&request_id, Duration::from_secs(5))
        .await
        .expect("response published before timeout");
    assert_eq!(message.status, ResponseStatus::Completed);
    assert_eq!(message.response.as_deref(), Some("Paris is the capital of France."));

    assert!(harness.audit.list_escalated(10).await.expect("list escalated").is_empty());

    harness.stop_worker(shutdown_tx, worker_handle).await;
}
