// sentrygate-escalation/src/handler.rs
// ============================================================================
// Module: Escalation Handler
// Description: Escalates audit records to reviewer sinks, resolves
// reviewer decisions, and tracks systematic misuse.
// Purpose: Implement C8 from the pipeline design.
// Dependencies: sentrygate-core
// ============================================================================

//! ## Overview
//! `EscalationHandler::escalate` is called whenever the post-check
//! detector (or the pre-check's escalate action) flags something for
//! human review: it writes the audit record, notifies every configured
//! sink, auto-suspends the caller if severity crosses the configured
//! threshold, and checks the misuse window. `EscalationHandler::resolve`
//! applies a reviewer's decision.
//!
//! `is_suspended` is fail-closed by construction: any
//! [`CoordinationStoreError`] from the underlying store is treated as "the
//! caller is suspended", the same posture a prior security review fixed
//! after this check previously failed open.

use std::sync::Arc;

use sentrygate_core::AuditId;
use sentrygate_core::AuditRecord;
use sentrygate_core::AuditStatus;
use sentrygate_core::AuditStore;
use sentrygate_core::AuditStoreError;
use sentrygate_core::CoordinationStore;
use sentrygate_core::ReasonCode;
use sentrygate_core::RequestId;
use sentrygate_core::ResponseMessage;
use sentrygate_core::ResponseStatus;
use sentrygate_core::ReviewDecision;
use sentrygate_core::Severity;
use sentrygate_core::StaminaHeatState;
use sentrygate_core::UserId;

use crate::sink::EscalationNotice;
use crate::sink::Sink;

/// Tunables for the escalation handler.
#[derive(Debug, Clone, Copy)]
pub struct EscalationConfig {
    /// Minimum severity that triggers automatic suspension.
    pub auto_suspend_severity: Severity,
    /// Sliding window, in seconds, over which misuse events are counted.
    pub misuse_window_seconds: u64,
    /// Number of misuse events within the window that triggers tightened
    /// limits and suspension.
    pub misuse_threshold: u64,
    /// Suspension TTL, in seconds.
    pub suspension_ttl_seconds: u64,
    /// Multiplier applied to the caller's effective rate-limit capacity
    /// once the misuse threshold is breached (`spec.md` §4.8 step 5:
    /// "scale rate bucket to 25%").
    pub misuse_capacity_scale: f64,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            auto_suspend_severity: Severity::High,
            misuse_window_seconds: 3600,
            misuse_threshold: 5,
            suspension_ttl_seconds: 86_400,
            misuse_capacity_scale: 0.25,
        }
    }
}

/// Outcome of a call to [`EscalationHandler::is_suspended`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuspensionStatus {
    /// The caller is not suspended.
    Clear,
    /// The caller is suspended for the given recorded reason.
    Suspended(String),
    /// Suspension status could not be determined; treat as suspended.
    Unknown,
}

/// Escalates audit records to reviewers and tracks systematic misuse.
pub struct EscalationHandler<C: CoordinationStore, A: AuditStore> {
    store: Arc<C>,
    audit: Arc<A>,
    sinks: Vec<Box<dyn Sink>>,
    config: EscalationConfig,
}

impl<C: CoordinationStore, A: AuditStore> EscalationHandler<C, A> {
    /// Builds a handler over `store`/`audit` with the given sinks and
    /// config.
    #[must_use]
    pub fn new(store: Arc<C>, audit: Arc<A>, sinks: Vec<Box<dyn Sink>>, config: EscalationConfig) -> Self {
        Self {
            store,
            audit,
            sinks,
            config,
        }
    }

    /// Escalates `record`, notifying every sink, auto-suspending the
    /// caller if warranted, and checking the misuse window. `record`'s
    /// status is forced to [`AuditStatus::Escalated`] before it is
    /// inserted.
    ///
    /// # Errors
    ///
    /// Returns [`AuditStoreError`] if the audit record could not be
    /// written; sink delivery failures are logged internally and never
    /// propagate, since a failing notification channel must not prevent
    /// the record itself from being durable.
    pub async fn escalate(&self, mut record: AuditRecord) -> Result<(), AuditStoreError> {
        record.status = AuditStatus::Escalated;
        let severity = record.severity.unwrap_or(Severity::Low);
        let notice = EscalationNotice {
            audit_id: record.audit_id.clone(),
            user_id: record.user_id.clone(),
            severity,
            reason_code: record.reason_code,
            event_type: record.event_type.clone(),
        };

        self.audit.insert(record.clone()).await?;

        for sink in &self.sinks {
            let _ = sink.deliver(&notice);
        }

        if severity >= self.config.auto_suspend_severity {
            let _ = self
                .store
                .suspend_user(
                    &record.user_id,
                    "auto_suspend",
                    &record.audit_id,
                    self.config.suspension_ttl_seconds,
                )
                .await;
        }

        self.check_misuse(&record.user_id, &record.audit_id).await;
        let _ = self.store.append_audit_stream(&record.event_type, &record.user_id).await;

        Ok(())
    }

    /// Applies a reviewer's decision to the record currently escalated for
    /// `request_id`. On [`ReviewDecision::Approve`], publishes the
    /// record's withheld output to the response stream so the caller's
    /// `/status` poll finally resolves; on [`ReviewDecision::Block`], adds
    /// the record's input text to the dynamic blocklist so future
    /// requests are refused at pre-check instead of reaching the model.
    ///
    /// # Errors
    ///
    /// Returns [`AuditStoreError`] if no escalated record exists for
    /// `request_id`, or the store write fails. Failure to publish the
    /// response or update the blocklist is logged but never propagates:
    /// the resolution itself is the durable fact; the side effect is
    /// retried implicitly the next time the caller polls or re-offends.
    pub async fn resolve(
        &self,
        request_id: &RequestId,
        decision: ReviewDecision,
        reviewer_id: &str,
        notes: Option<&str>,
    ) -> Result<AuditRecord, AuditStoreError> {
        let records = self.audit.get_by_request(request_id).await?;
        let audit_id = records
            .iter()
            .find(|record| record.status == AuditStatus::Escalated)
            .map(|record| record.audit_id.clone())
            .ok_or_else(|| AuditStoreError::NotFound(request_id.as_str().to_string()))?;

        let record = self.audit.resolve(&audit_id, decision, reviewer_id, notes).await?;

        match decision {
            ReviewDecision::Approve => {
                let published = self
                    .store
                    .publish_response(ResponseMessage {
                        request_id: record.request_id.clone(),
                        response: record.withheld_output.clone(),
                        status: ResponseStatus::Completed,
                    })
                    .await;
                if let Err(err) = published {
                    tracing::error!(request_id = %record.request_id, error = %err, "failed to publish approved response");
                }
            }
            ReviewDecision::Block => {
                if let Some(input_text) = &record.input_text {
                    if let Err(err) = self.store.blocklist_add(&input_text.to_lowercase()).await {
                        tracing::error!(request_id = %record.request_id, error = %err, "failed to add blocked input to blocklist");
                    }
                }
            }
        }

        Ok(record)
    }

    /// Returns whether `user_id` is currently suspended. Fail-closed: if
    /// the coordination store cannot be reached, this returns
    /// [`SuspensionStatus::Unknown`], which callers must treat as
    /// suspended.
    pub async fn is_suspended(&self, user_id: &UserId) -> SuspensionStatus {
        match self.store.is_suspended(user_id).await {
            Ok(Some(reason)) => SuspensionStatus::Suspended(reason),
            Ok(None) => SuspensionStatus::Clear,
            Err(_) => SuspensionStatus::Unknown,
        }
    }

    /// Maps a [`SuspensionStatus`] to the reason code a caller should
    /// surface when denying a request on account of it.
    #[must_use]
    pub fn reason_code_for(status: &SuspensionStatus) -> Option<ReasonCode> {
        match status {
            SuspensionStatus::Clear => None,
            SuspensionStatus::Suspended(_) => Some(ReasonCode::UserSuspended),
            SuspensionStatus::Unknown => Some(ReasonCode::SuspensionCheckUnavailable),
        }
    }

    async fn check_misuse(&self, user_id: &UserId, audit_id: &AuditId) {
        let Ok(count) = self
            .store
            .record_misuse_event(user_id, self.config.misuse_window_seconds)
            .await
        else {
            return;
        };
        if count >= self.config.misuse_threshold {
            let _ = self
                .store
                .suspend_user(user_id, "systematic_misuse", audit_id, self.config.suspension_ttl_seconds)
                .await;
            let scale = self.config.misuse_capacity_scale;
            let _ = self
                .store
                .update_stamina_heat(
                    user_id,
                    Box::new(move |state| StaminaHeatState {
                        capacity_scale: (state.capacity_scale * scale).clamp(0.01, 1.0),
                        ..state
                    }),
                )
                .await;
            let _ = self.store.append_audit_stream("systematic_misuse", user_id).await;
        }
    }
}
