// sentrygate-escalation/src/sink/callback.rs
// ============================================================================
// Module: Callback Sink
// Description: Invokes a user-supplied closure for each escalation notice.
// Purpose: Let callers plug in Slack/PagerDuty-equivalent webhooks without
// a dedicated adapter per provider.
// Dependencies: std
// ============================================================================

use std::sync::Arc;

use crate::sink::EscalationNotice;
use crate::sink::Sink;
use crate::sink::SinkError;

type CallbackHandler = dyn Fn(&EscalationNotice) -> Result<(), SinkError> + Send + Sync;

/// Delivers notices by invoking a user-supplied handler.
#[derive(Clone)]
pub struct CallbackSink {
    handler: Arc<CallbackHandler>,
}

impl CallbackSink {
    /// Creates a callback sink from `handler`.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&EscalationNotice) -> Result<(), SinkError> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
        }
    }
}

impl Sink for CallbackSink {
    fn deliver(&self, notice: &EscalationNotice) -> Result<(), SinkError> {
        (self.handler)(notice)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use sentrygate_core::AuditId;
    use sentrygate_core::Severity;
    use sentrygate_core::UserId;

    use super::*;

    #[test]
    fn invokes_handler_once_per_notice() {
        let count = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&count);
        let sink = CallbackSink::new(move |_notice| {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let notice = EscalationNotice {
            audit_id: AuditId::from("a1"),
            user_id: UserId::from("u1"),
            severity: Severity::Critical,
            reason_code: None,
            event_type: "precheck_block".to_string(),
        };
        sink.deliver(&notice).expect("delivery succeeds");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
