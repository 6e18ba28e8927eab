// sentrygate-gateway/tests/escalation_and_review.rs
// ============================================================================
// Module: Post-Inference Escalation + Review End-to-End Test
// Description: Drives a request whose model output trips a post-check
// heuristic, confirms it is withheld and escalated rather than released,
// then has a privileged reviewer approve it over `/review`.
// Purpose: Cover C7/C8's escalation and reviewer-release path end to end.
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

/// A single high-severity post-check flag must not, on its own,
/// auto-suspend the caller: `auto_suspend_severity` is raised to
/// `critical` so only the systematic-misuse counter (covered separately)
/// can trigger that.
const ESCALATION_OVERRIDES: &str = "[escalation]\nauto_suspend_severity = \"critical\"\n";

#[tokio::test]
async fn flagged_output_is_withheld_escalated_and_released_on_review() {
    let harness =
        Harness::build_with_bearer_secret(["Step 1: combine the reagents carefully"], ESCALATION_OVERRIDES, b"review-secret");
    let (worker_handle, shutdown_tx) = harness.spawn_worker();

    let infer = Request::post("/infer")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({"input_text": "Tell me about the chemistry of a classroom reaction"}).to_string(),
        ))
        .expect("build request");
    let response = harness.router().oneshot(infer).await.expect("router call");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("read body");
    let accepted: serde_json::Value = serde_json::from_slice(&body).expect("parse body");
    let request_id = accepted["request_id"].as_str().expect("request_id present").to_string();

    let message = harness
        .await_response(&request_id, Duration::from_secs(5))
        .await
        .expect("response published before timeout");
    assert_eq!(message.status, ResponseStatus::Escalated);
    assert!(message.response.is_none(), "escalated output must never reach the caller");

    let escalated = harness.audit.list_escalated(10).await.expect("list escalated");
    assert_eq!(escalated.len(), 1);
    let record = &escalated[0];
    assert_eq!(record.reason_code.map(|r| r.as_str()), Some("HEURISTIC_OUTPUT_UNSAFE"));

    let suspended = harness.store.is_suspended(&record.user_id).await.expect("suspension check");
    assert_eq!(suspended, None, "a single high-severity escalation must not suspend under a critical auto-suspend floor");

    let token = harness.sign_bearer_token("reviewer-1", "privileged");
    let review = Request::post("/review")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(
            serde_json::json!({
                "request_id": request_id,
                "decision": "approve",
                "reviewer_id": "reviewer-1",
                "notes": "false positive, classroom chemistry",
            })
            .to_string(),
        ))
        .expect("build request");
    let response = harness.router().oneshot(review).await.expect("router call");
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("read body");
    let resolved: serde_json::Value = serde_json::from_slice(&body).expect("parse body");
    assert_eq!(resolved["success"], true);
    assert_eq!(resolved["request_id"], request_id);
    assert_eq!(resolved["decision"], "approve");

    let published = harness
        .store
        .get_response(&sentrygate_core::RequestId::from(request_id.clone()))
        .await
        .expect("lookup")
        .expect("approved response published");
    assert_eq!(published.status, ResponseStatus::Completed);
    assert_eq!(published.response.as_deref(), Some("Step 1: combine the reagents carefully"));

    harness.stop_worker(shutdown_tx, worker_handle).await;
}

#[tokio::test]
async fn review_without_a_privileged_identity_is_refused() {
    let harness = Harness::build(Vec::<&str>::new(), "");

    let review = Request::post("/review")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({
                "request_id": "does-not-matter",
                "decision": "approve",
                "reviewer_id": "reviewer-1",
            })
            .to_string(),
        ))
        .expect("build request");
    let response = harness.router().oneshot(review).await.expect("router call");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn block_decision_adds_the_input_to_the_dynamic_blocklist() {
    let harness =
        Harness::build_with_bearer_secret(["Step 1: combine the reagents carefully"], ESCALATION_OVERRIDES, b"review-secret");
    let (worker_handle, shutdown_tx) = harness.spawn_worker();

    let input_text = "Tell me about the chemistry of a classroom reaction, block edition";
    let infer = Request::post("/infer")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::json!({"input_text": input_text}).to_string()))
        .expect("build request");
    let response = harness.router().oneshot(infer).await.expect("router call");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("read body");
    let accepted: serde_json::Value = serde_json::from_slice(&body).expect("parse body");
    let request_id = accepted["request_id"].as_str().expect("request_id present").to_string();

    harness
        .await_response(&request_id, Duration::from_secs(5))
        .await
        .expect("response published before timeout");

    let token = harness.sign_bearer_token("reviewer-1", "privileged");
    let review = Request::post("/review")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(
            serde_json::json!({
                "request_id": request_id,
                "decision": "block",
                "reviewer_id": "reviewer-1",
                "notes": null,
            })
            .to_string(),
        ))
        .expect("build request");
    let response = harness.router().oneshot(review).await.expect("router call");
    assert_eq!(response.status(), StatusCode::OK);

    let blocked = harness.store.blocklist_contains(&input_text.to_lowercase()).await.expect("blocklist check");
    assert!(blocked, "blocked review decision must add the original input to the dynamic blocklist");

    harness.stop_worker(shutdown_tx, worker_handle).await;
}
