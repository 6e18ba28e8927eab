// sentrygate-gateway/src/worker.rs
// ============================================================================
// Module: Worker Pool
// Description: Consumes the inference stream, invokes the sandbox and
// post-check detector, and publishes terminal responses.
// Purpose: Implement C9 from the pipeline design (spec.md §4.7).
// Dependencies: sentrygate-core, sentrygate-sandbox, sentrygate-governor,
// sentrygate-escalation, tokio, tracing
// ============================================================================

//! ## Overview
//! Each worker is a single consumer in the `safety-workers` group reading
//! from the inference stream. Ack discipline is the load-bearing
//! invariant here: a flagged message is escalated **and acked** (an
//! escalation must never be duplicated by redelivery); a message that
//! raises an unexpected processing error is **not acked**, leaving it for
//! `claim_pending`/`queue replay-pending` to recover.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use sentrygate_core::AuditId;
use sentrygate_core::AuditRecord;
use sentrygate_core::AuditStatus;
use sentrygate_core::AuditStore;
use sentrygate_core::CoordinationStore;
use sentrygate_core::ModelProvider;
use sentrygate_core::ModelRequest;
use sentrygate_core::ReasonCode;
use sentrygate_core::ResponseMessage;
use sentrygate_core::ResponseStatus;
use sentrygate_core::Severity;
use sentrygate_core::StreamMessage;
use sentrygate_core::TrustTier;
use sentrygate_core::canary;
use sentrygate_escalation::EscalationHandler;
use sentrygate_governor::Governor;
use sentrygate_sandbox::Sandbox;
use time::OffsetDateTime;
use tokio::sync::watch;

use crate::postcheck::PostcheckDetector;

/// Name of the consumer group every worker joins, matching `spec.md` §6's
/// coordination store key contract.
pub const CONSUMER_GROUP: &str = "safety-workers";

/// Worker pool tunables.
#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    /// Maximum messages read per `read_stream` call.
    pub batch_size: usize,
    /// Milliseconds to block waiting for new messages.
    pub block_ms: u64,
    /// Wall-clock timeout applied to the post-check call, in seconds.
    pub postcheck_timeout_seconds: f64,
    /// `max_tokens` requested on every sandbox call; the sandbox clamps
    /// this down further to its own configured ceiling.
    pub request_max_tokens: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            block_ms: 2_000,
            postcheck_timeout_seconds: 10.0,
            request_max_tokens: 4096,
        }
    }
}

/// Consumes the inference stream and drives each message through the
/// sandbox (C6) and post-check detector (C7).
pub struct Worker<S: CoordinationStore, A: AuditStore, P: ModelProvider> {
    consumer_name: String,
    store: Arc<S>,
    audit: Arc<A>,
    sandbox: Arc<Sandbox<P>>,
    postcheck: Arc<PostcheckDetector>,
    escalation: Arc<EscalationHandler<S, A>>,
    governor: Arc<Governor<S>>,
    config: WorkerConfig,
}

impl<S: CoordinationStore + 'static, A: AuditStore + 'static, P: ModelProvider + 'static> Worker<S, A, P> {
    /// Builds a worker identified by `consumer_name` within the
    /// `safety-workers` consumer group.
    #[must_use]
    pub fn new(
        consumer_name: impl Into<String>,
        store: Arc<S>,
        audit: Arc<A>,
        sandbox: Arc<Sandbox<P>>,
        postcheck: Arc<PostcheckDetector>,
        escalation: Arc<EscalationHandler<S, A>>,
        governor: Arc<Governor<S>>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            consumer_name: consumer_name.into(),
            store,
            audit,
            sandbox,
            postcheck,
            escalation,
            governor,
            config,
        }
    }

    /// Runs the consume loop until `shutdown` reports `true`, finishing
    /// whatever message is currently in flight before exiting (`spec.md`
    /// §5: "workers finish current message then exit").
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                return;
            }

            let batch = tokio::select! {
                biased;
                _ = shutdown.changed() => continue,
                result = self.store.read_stream(CONSUMER_GROUP, &self.consumer_name, self.config.batch_size, self.config.block_ms) => result,
            };

            let Ok(messages) = batch else {
                tokio::time::sleep(Duration::from_millis(self.config.block_ms)).await;
                continue;
            };

            for (entry_id, message) in messages {
                self.process_one(&entry_id, message).await;
            }
        }
    }

    async fn process_one(&self, entry_id: &str, message: StreamMessage) {
        tracing::info!(
            trace_id = %message.trace_id,
            request_id = %message.request_id,
            user_id = %message.user_id,
            "worker processing message"
        );

        let tools_allowed = matches!(message.trust_tier, TrustTier::Trusted | TrustTier::Privileged);
        let sandbox_result = self
            .sandbox
            .run(
                &message.user_id,
                ModelRequest {
                    input_text: message.input_text.clone(),
                    max_tokens: self.config.request_max_tokens,
                    tools: Vec::new(),
                },
                tools_allowed,
            )
            .await;

        let sandbox_result = match sandbox_result {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(request_id = %message.request_id, error = %err, "sandbox call failed");
                self.record_processing_error(&message, &err.to_string()).await;
                return;
            }
        };

        let postcheck_outcome = tokio::time::timeout(
            Duration::from_secs_f64(self.config.postcheck_timeout_seconds.max(0.0)),
            self.postcheck.check(&message.input_text, &sandbox_result.text, true),
        )
        .await;

        let outcome = match postcheck_outcome {
            Ok(result) => result,
            Err(_elapsed) => crate::postcheck::PostCheckResult::flag(
                ReasonCode::PostCheckTimeout,
                Severity::Medium,
                "postcheck_timeout",
            ),
        };

        if outcome.flagged {
            self.escalate_flagged(&message, &sandbox_result.text, &outcome).await;
            let _ = self.store.ack(CONSUMER_GROUP, entry_id).await;
            return;
        }

        let released_text = self.maybe_inject_canary(&message, sandbox_result.text).await;
        let published = self
            .store
            .publish_response(ResponseMessage {
                request_id: message.request_id.clone(),
                response: Some(released_text),
                status: ResponseStatus::Completed,
            })
            .await;

        if published.is_err() {
            tracing::error!(request_id = %message.request_id, "failed to publish response");
            return;
        }

        let _ = self.store.ack(CONSUMER_GROUP, entry_id).await;
    }

    async fn maybe_inject_canary(&self, message: &StreamMessage, text: String) -> String {
        let Ok(risk_score) = self.governor.risk_score(&message.user_id).await else {
            return text;
        };
        if risk_score <= 0.0 {
            return text;
        }
        let roll: f64 = rand::thread_rng().r#gen();
        if roll < risk_score { canary::inject(&text) } else { text }
    }

    async fn escalate_flagged(&self, message: &StreamMessage, withheld_output: &str, outcome: &crate::postcheck::PostCheckResult) {
        let now = OffsetDateTime::now_utc();
        let record = AuditRecord {
            audit_id: AuditId::new(uuid::Uuid::new_v4().to_string()),
            request_id: message.request_id.clone(),
            trace_id: message.trace_id.clone(),
            user_id: message.user_id.clone(),
            status: AuditStatus::Open,
            reason_code: outcome.reason_code,
            severity: outcome.severity,
            event_type: "postcheck_flag".to_string(),
            input_text: Some(message.input_text.clone()),
            withheld_output: Some(withheld_output.to_string()),
            decision: None,
            reviewer_id: None,
            notes: None,
            created_at: now,
            updated_at: now,
            resolved_at: None,
        };
        if outcome.severity.unwrap_or(Severity::Low) >= Severity::High {
            let _ = self.governor.record_severe_event(&message.user_id).await;
        }
        if let Err(err) = self.escalation.escalate(record).await {
            tracing::error!(request_id = %message.request_id, error = %err, "failed to persist escalation");
        }
        let _ = self
            .store
            .publish_response(ResponseMessage {
                request_id: message.request_id.clone(),
                response: None,
                status: ResponseStatus::Escalated,
            })
            .await;
    }

    async fn record_processing_error(&self, message: &StreamMessage, detail: &str) {
        let now = OffsetDateTime::now_utc();
        let record = AuditRecord {
            audit_id: AuditId::new(uuid::Uuid::new_v4().to_string()),
            request_id: message.request_id.clone(),
            trace_id: message.trace_id.clone(),
            user_id: message.user_id.clone(),
            status: AuditStatus::Open,
            reason_code: None,
            severity: None,
            event_type: "processing_error".to_string(),
            input_text: Some(message.input_text.clone()),
            withheld_output: Some(detail.to_string()),
            decision: None,
            reviewer_id: None,
            notes: None,
            created_at: now,
            updated_at: now,
            resolved_at: None,
        };
        let _ = self.audit.insert(record).await;
    }
}
