// sentrygate-escalation/src/sink/mod.rs
// ============================================================================
// Module: Reviewer Notification Sinks
// Description: Trait and common error type for delivering escalation
// notifications to reviewer-facing channels.
// Purpose: Let the escalation handler notify Slack/PagerDuty-equivalent
// channels without depending on either directly.
// Dependencies: sentrygate-core
// ============================================================================

//! ## Overview
//! A [`Sink`] delivers one [`EscalationNotice`] to an external channel. The
//! escalation handler fans a single event out to every configured sink and
//! treats sink failures as independent of each other: a failing PagerDuty
//! webhook never prevents the Slack notification from going out, and
//! neither ever prevents the audit record itself from being written.

mod callback;
mod log;

pub use callback::CallbackSink;
pub use log::LogSink;

use sentrygate_core::AuditId;
use sentrygate_core::ReasonCode;
use sentrygate_core::Severity;
use sentrygate_core::UserId;

/// A single escalation event to notify reviewers about.
#[derive(Debug, Clone)]
pub struct EscalationNotice {
    /// Audit record this notice concerns.
    pub audit_id: AuditId,
    /// Caller identity that triggered the escalation.
    pub user_id: UserId,
    /// Severity of the triggering event.
    pub severity: Severity,
    /// Reason code, if any.
    pub reason_code: Option<ReasonCode>,
    /// Free-text event type (`"precheck_block"`, `"postcheck_flag"`,
    /// `"systematic_misuse"`, ...).
    pub event_type: String,
}

/// Errors raised while delivering a notification.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The sink's transport failed.
    #[error("notification delivery failed: {0}")]
    DeliveryFailed(String),
}

/// A reviewer notification channel.
pub trait Sink: Send + Sync {
    /// Delivers `notice`. Implementations should not panic on transport
    /// failure; they return [`SinkError`] instead so the caller can log
    /// and continue with the next sink.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::DeliveryFailed`] if delivery could not be
    /// completed.
    fn deliver(&self, notice: &EscalationNotice) -> Result<(), SinkError>;
}
