// sentrygate-gateway/src/server.rs
// ============================================================================
// Module: HTTP Gateway
// Description: The axum router and synchronous request gate.
// Purpose: Implement C10 from the pipeline design (spec.md §4.9).
// Dependencies: axum, tokio, tracing, sentrygate-core
// ============================================================================

//! ## Overview
//! `/infer` is the only route that runs the full nine-step synchronous
//! gate: store reachability, identity resolution, suspension check,
//! rate/stamina/heat accounting, a bounded body read, and pre-check,
//! before the request is placed onto the inference stream and `202
//! Queued` is returned. Every other route (`/review`, `/status/{id}`,
//! `/queue/depth`) runs only identity resolution plus its own
//! authorization check; `/health` and `/metrics` run no gate at all,
//! matching `spec.md` §4.9's bypass set.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use sentrygate_config::SafetyConfig;
use sentrygate_core::AuditId;
use sentrygate_core::AuditRecord;
use sentrygate_core::AuditStatus;
use sentrygate_core::AuditStore;
use sentrygate_core::CoordinationStore;
use sentrygate_core::ReasonCode;
use sentrygate_core::RequestId;
use sentrygate_core::ResponseStatus;
use sentrygate_core::ReviewDecision;
use sentrygate_core::Severity;
use sentrygate_core::StreamMessage;
use sentrygate_core::TraceId;
use sentrygate_core::TrustTier;
use sentrygate_core::UserId;
use sentrygate_escalation::EscalationHandler;
use sentrygate_escalation::SuspensionStatus;
use sentrygate_governor::Governor;
use sentrygate_rules::RuleEngine;
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::watch;

use crate::error::rate_limited_response;
use crate::error::refusal_response;
use crate::error::rule_category_refusal_response;
use crate::identity::IdentityResolver;
use crate::precheck::PrecheckDetector;
use crate::security::security_headers;

/// Inner state shared across every handler, held behind an `Arc` so
/// [`AppState`] stays cheap to clone into axum's router.
struct Inner<S: CoordinationStore, A: AuditStore> {
    governor: Governor<S>,
    rules: Arc<RuleEngine>,
    precheck: PrecheckDetector<S>,
    escalation: EscalationHandler<S, A>,
    store: Arc<S>,
    audit: Arc<A>,
    identity: IdentityResolver,
    config: SafetyConfig,
}

/// Shared gateway state. Cheap to clone: every handler sees the same
/// `Arc<Inner>`.
pub struct AppState<S: CoordinationStore, A: AuditStore> {
    inner: Arc<Inner<S, A>>,
}

impl<S: CoordinationStore, A: AuditStore> Clone for AppState<S, A> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<S: CoordinationStore + 'static, A: AuditStore + 'static> AppState<S, A> {
    /// Builds gateway state over the given collaborators and configuration.
    #[must_use]
    pub fn new(
        governor: Governor<S>,
        rules: Arc<RuleEngine>,
        precheck: PrecheckDetector<S>,
        escalation: EscalationHandler<S, A>,
        store: Arc<S>,
        audit: Arc<A>,
        identity: IdentityResolver,
        config: SafetyConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                governor,
                rules,
                precheck,
                escalation,
                store,
                audit,
                identity,
                config,
            }),
        }
    }

    /// Reference to the rule engine, for callers (e.g. hot-reload
    /// wiring) that need it outside a request handler.
    #[must_use]
    pub fn rules(&self) -> &Arc<RuleEngine> {
        &self.inner.rules
    }

    /// Reference to the audit store, for callers (e.g. the CLI's
    /// `queue replay-pending`) that need it outside a request handler.
    #[must_use]
    pub fn audit_store(&self) -> &Arc<A> {
        &self.inner.audit
    }

    /// Builds the axum [`Router`] for this state, with security headers
    /// applied to every response.
    #[must_use]
    pub fn router(self) -> Router {
        Router::new()
            .route("/infer", post(infer))
            .route("/review", post(review))
            .route("/status/{request_id}", get(status))
            .route("/queue/depth", get(queue_depth))
            .route("/health", get(health))
            .route("/metrics", get(metrics))
            .layer(middleware::from_fn(security_headers))
            .with_state(self)
    }

    /// Runs the gateway until `shutdown` reports `true`, completing
    /// in-flight requests before the listener closes.
    ///
    /// # Errors
    ///
    /// Returns an error string if the listener cannot bind or the server
    /// loop exits abnormally.
    pub async fn serve(self, mut shutdown: watch::Receiver<bool>) -> Result<(), String> {
        let addr: SocketAddr = self
            .inner
            .config
            .server
            .bind
            .parse()
            .map_err(|err| format!("invalid bind address: {err}"))?;
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|err| format!("bind failed: {err}"))?;
        tracing::info!(%addr, "gateway listening");
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await
            .map_err(|err| format!("server loop failed: {err}"))
    }
}

// ============================================================================
// SECTION: /infer
// ============================================================================

#[derive(Debug, Deserialize)]
struct InferRequest {
    input_text: String,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct InferAccepted {
    request_id: String,
    trace_id: String,
    status: &'static str,
}

async fn infer<S, A>(State(state): State<AppState<S, A>>, headers: HeaderMap, body: axum::body::Bytes) -> Response
where
    S: CoordinationStore + 'static,
    A: AuditStore + 'static,
{
    let inner = &state.inner;
    let trace_id = TraceId::new(uuid::Uuid::new_v4().to_string());
    let request_id = RequestId::new(uuid::Uuid::new_v4().to_string());

    if inner.store.health_check().await.is_err() {
        return refusal_response(ReasonCode::SafetyUnavailable, &trace_id);
    }

    let authorization = authorization_header(&headers);
    let identity = inner.identity.resolve(authorization.as_deref(), request_id.as_str());

    match inner.escalation.is_suspended(&identity.user_id).await {
        SuspensionStatus::Clear => {}
        SuspensionStatus::Suspended(_) => {
            log_security_event(inner, &identity.user_id, ReasonCode::UserSuspended, &request_id).await;
            return refusal_response(ReasonCode::UserSuspended, &trace_id);
        }
        SuspensionStatus::Unknown => return refusal_response(ReasonCode::SuspensionCheckUnavailable, &trace_id),
    }

    if body.len() > inner.config.server.max_body_bytes {
        return refusal_response(ReasonCode::RequestBodyTooLarge, &trace_id);
    }

    let request: InferRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(_) => return refusal_response(ReasonCode::RequestBodyTooLarge, &trace_id),
    };

    let now = now_seconds();
    let decision = match inner.governor.check(&identity.user_id, request.input_text.chars().count(), now, true).await {
        Ok(decision) => decision,
        Err(_) => return refusal_response(ReasonCode::SafetyUnavailable, &trace_id),
    };
    if !decision.allowed {
        let reason = Governor::<S>::reason_code(&decision);
        log_security_event(inner, &identity.user_id, reason, &request_id).await;
        return rate_limited_response(reason, &trace_id, decision.retry_after);
    }

    let precheck_result = inner.precheck.check(&request.input_text, now).await;
    if !precheck_result.allowed {
        #[allow(clippy::unwrap_used, reason = "PreCheckResult::block always sets reason_code")]
        let reason_code = precheck_result.reason_code.unwrap();
        log_security_event(inner, &identity.user_id, reason_code, &request_id).await;
        let blocking_match = precheck_result.matches.iter().find(|m| m.blocks());
        insert_refusal_audit(
            inner,
            &identity.user_id,
            &request_id,
            &trace_id,
            reason_code,
            blocking_match.map(|m| m.severity),
        )
        .await;
        if reason_code == ReasonCode::RuleMatch {
            if let Some(m) = blocking_match {
                return rule_category_refusal_response(&m.category, &trace_id);
            }
        }
        return refusal_response(reason_code, &trace_id);
    }

    let published = inner
        .store
        .publish(StreamMessage {
            request_id: request_id.clone(),
            trace_id: trace_id.clone(),
            user_id: identity.user_id.clone(),
            trust_tier: identity.trust_tier,
            input_text: request.input_text,
            metadata: request.metadata,
        })
        .await;

    if published.is_err() {
        return refusal_response(ReasonCode::SafetyUnavailable, &trace_id);
    }

    (
        StatusCode::ACCEPTED,
        Json(InferAccepted {
            request_id: request_id.as_str().to_string(),
            trace_id: trace_id.as_str().to_string(),
            status: "queued",
        }),
    )
        .into_response()
}

// ============================================================================
// SECTION: /status/{request_id}
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum StatusResponse {
    Pending,
    Completed { response: String },
    Escalated,
}

async fn status<S, A>(State(state): State<AppState<S, A>>, Path(request_id): Path<String>) -> Response
where
    S: CoordinationStore + 'static,
    A: AuditStore + 'static,
{
    let trace_id = TraceId::new(uuid::Uuid::new_v4().to_string());
    match state.inner.store.get_response(&RequestId::from(request_id)).await {
        Ok(Some(message)) => {
            let body = match message.status {
                ResponseStatus::Completed => StatusResponse::Completed {
                    response: message.response.unwrap_or_default(),
                },
                ResponseStatus::Escalated => StatusResponse::Escalated,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Ok(None) => (StatusCode::OK, Json(StatusResponse::Pending)).into_response(),
        Err(_) => refusal_response(ReasonCode::SafetyUnavailable, &trace_id),
    }
}

// ============================================================================
// SECTION: /review
// ============================================================================

#[derive(Debug, Deserialize)]
struct ReviewRequest {
    request_id: String,
    decision: ReviewDecisionWire,
    reviewer_id: String,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ReviewDecisionWire {
    Approve,
    Block,
}

impl From<ReviewDecisionWire> for ReviewDecision {
    fn from(value: ReviewDecisionWire) -> Self {
        match value {
            ReviewDecisionWire::Approve => Self::Approve,
            ReviewDecisionWire::Block => Self::Block,
        }
    }
}

#[derive(Debug, Serialize)]
struct ReviewResponse {
    success: bool,
    request_id: String,
    decision: ReviewDecision,
}

async fn review<S, A>(State(state): State<AppState<S, A>>, headers: HeaderMap, Json(body): Json<ReviewRequest>) -> Response
where
    S: CoordinationStore + 'static,
    A: AuditStore + 'static,
{
    let trace_id = TraceId::new(uuid::Uuid::new_v4().to_string());
    let authorization = authorization_header(&headers);
    let identity = state.inner.identity.resolve(authorization.as_deref(), "reviewer");
    if identity.trust_tier != TrustTier::Privileged {
        return refusal_response(ReasonCode::UserSuspended, &trace_id);
    }

    let request_id = RequestId::from(body.request_id.clone());
    let decision: ReviewDecision = body.decision.into();
    match state
        .inner
        .escalation
        .resolve(&request_id, decision, &body.reviewer_id, body.notes.as_deref())
        .await
    {
        Ok(record) => (
            StatusCode::OK,
            Json(ReviewResponse {
                success: true,
                request_id: body.request_id,
                decision: record.decision.unwrap_or(decision),
            }),
        )
            .into_response(),
        Err(_) => refusal_response(ReasonCode::SafetyUnavailable, &trace_id),
    }
}

// ============================================================================
// SECTION: /queue/depth, /health, /metrics
// ============================================================================

#[derive(Debug, Serialize)]
struct QueueDepthResponse {
    depth: u64,
}

async fn queue_depth<S, A>(State(state): State<AppState<S, A>>) -> Response
where
    S: CoordinationStore + 'static,
    A: AuditStore + 'static,
{
    let trace_id = TraceId::new(uuid::Uuid::new_v4().to_string());
    match state.inner.store.queue_depth().await {
        Ok(depth) => (StatusCode::OK, Json(QueueDepthResponse { depth })).into_response(),
        Err(_) => refusal_response(ReasonCode::SafetyUnavailable, &trace_id),
    }
}

async fn health<S, A>(State(state): State<AppState<S, A>>) -> Response
where
    S: CoordinationStore + 'static,
    A: AuditStore + 'static,
{
    if state.inner.store.health_check().await.is_ok() {
        StatusCode::OK.into_response()
    } else {
        StatusCode::SERVICE_UNAVAILABLE.into_response()
    }
}

async fn metrics<S, A>(State(_state): State<AppState<S, A>>) -> Response
where
    S: CoordinationStore + 'static,
    A: AuditStore + 'static,
{
    (StatusCode::OK, "# sentrygate gateway metrics not yet wired to a registry\n").into_response()
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Emits a structured security event for a rejected request: blocked input,
/// a suspended-user rejection, or a rate/stamina/heat rejection. Independent
/// of the audit row C8 writes for escalated requests; this is ambient
/// observability, not a new store.
async fn log_security_event<S: CoordinationStore, A: AuditStore>(
    inner: &Inner<S, A>,
    user_id: &UserId,
    reason: ReasonCode,
    request_id: &RequestId,
) {
    let risk_score = inner.governor.risk_score(user_id).await.unwrap_or(0.0);
    tracing::warn!(
        event = "request_rejected",
        reason = ?reason,
        actor = %user_id.as_str(),
        request_id = %request_id.as_str(),
        risk_score,
        "rejected request"
    );
}

/// Writes the durable audit row for a pre-check refusal: every blocked
/// `/infer` request gets exactly one audit record, independent of the
/// structured log `log_security_event` already emitted.
async fn insert_refusal_audit<S: CoordinationStore, A: AuditStore>(
    inner: &Inner<S, A>,
    user_id: &UserId,
    request_id: &RequestId,
    trace_id: &TraceId,
    reason_code: ReasonCode,
    severity: Option<Severity>,
) {
    let now = OffsetDateTime::now_utc();
    let record = AuditRecord {
        audit_id: AuditId::new(uuid::Uuid::new_v4().to_string()),
        request_id: request_id.clone(),
        trace_id: trace_id.clone(),
        user_id: user_id.clone(),
        status: AuditStatus::Open,
        reason_code: Some(reason_code),
        severity,
        event_type: "refusal".to_string(),
        input_text: None,
        withheld_output: None,
        decision: None,
        reviewer_id: None,
        notes: None,
        created_at: now,
        updated_at: now,
        resolved_at: None,
    };
    if let Err(err) = inner.audit.insert(record).await {
        tracing::error!(request_id = %request_id.as_str(), error = %err, "failed to write refusal audit record");
    }
}

fn authorization_header(headers: &HeaderMap) -> Option<String> {
    headers.get(axum::http::header::AUTHORIZATION).and_then(|value| value.to_str().ok()).map(ToString::to_string)
}

fn now_seconds() -> f64 {
    use std::time::SystemTime;
    use std::time::UNIX_EPOCH;
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(0.0)
}
