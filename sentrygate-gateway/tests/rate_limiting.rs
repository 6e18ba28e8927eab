// sentrygate-gateway/tests/rate_limiting.rs
// ============================================================================
// Module: Rate-Limit Exhaustion End-to-End Test
// Description: Drives a caller past a tightened `rate_limit_max` and
// confirms the gateway refuses the request over the cap with a 429 and a
// retry hint, never placing it on the queue.
// Purpose: Cover the governor's rate-limit rejection path end to end.
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

use axum::body::Body;
use axum::http::Request;
use axum::http::StatusCode;
use tower::ServiceExt;

use common::Harness;

fn infer_request(input_text: &str) -> Request<Body> {
    Request::post("/infer")
        .header("content-type", "application/json")
        .header("authorization", "X-API-Key: rate-test-key")
        .body(Body::from(serde_json::json!({"input_text": input_text}).to_string()))
        .expect("build request")
}

#[tokio::test]
async fn caller_is_rejected_once_the_request_cap_is_exhausted() {
    let harness = Harness::build_with_api_key(
        ["an ordinary completion"; 3],
        "[governor]\nrate_limit_max = 3\nrate_limit_window = 60.0\n",
        "rate-test-key:user",
    );

    for attempt in 0..3 {
        let response = harness.router().oneshot(infer_request("a clean, unremarkable question")).await.expect("router call");
        assert_eq!(response.status(), StatusCode::ACCEPTED, "request {attempt} should be within the cap");
    }

    let response = harness.router().oneshot(infer_request("one request past the cap")).await.expect("router call");
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("read body");
    let envelope: serde_json::Value = serde_json::from_slice(&body).expect("parse body");
    assert_eq!(envelope["refused"], true);
    assert!(envelope["retry_after"].as_f64().expect("retry_after present") > 0.0);

    assert_eq!(harness.store.queue_depth().await.expect("queue depth"), 3);
}
