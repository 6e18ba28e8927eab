// sentrygate-escalation/src/sink/log.rs
// ============================================================================
// Module: Log Sink
// Description: Writes one JSON line per escalation notice.
// Purpose: Minimal always-available sink; useful standalone and as the
// fallback when no external channel is configured.
// Dependencies: serde_json, std
// ============================================================================

use std::io::Write;
use std::sync::Mutex;

use serde_json::json;

use crate::sink::EscalationNotice;
use crate::sink::Sink;
use crate::sink::SinkError;

/// Writes each notice as a JSON line to `W`.
pub struct LogSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> LogSink<W> {
    /// Creates a log sink writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl<W: Write + Send> Sink for LogSink<W> {
    fn deliver(&self, notice: &EscalationNotice) -> Result<(), SinkError> {
        let record = json!({
            "audit_id": notice.audit_id.as_str(),
            "user_id": notice.user_id.as_str(),
            "severity": format!("{:?}", notice.severity),
            "reason_code": notice.reason_code.map(sentrygate_core::ReasonCode::as_str),
            "event_type": notice.event_type,
        });
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| SinkError::DeliveryFailed("log sink mutex poisoned".to_string()))?;
        serde_json::to_writer(&mut *guard, &record)
            .map_err(|err| SinkError::DeliveryFailed(err.to_string()))?;
        guard
            .write_all(b"\n")
            .map_err(|err| SinkError::DeliveryFailed(err.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sentrygate_core::AuditId;
    use sentrygate_core::Severity;
    use sentrygate_core::UserId;

    use super::*;

    #[test]
    fn writes_one_json_line_per_notice() {
        let buffer: Vec<u8> = Vec::new();
        let sink = LogSink::new(buffer);
        let notice = EscalationNotice {
            audit_id: AuditId::from("a1"),
            user_id: UserId::from("u1"),
            severity: Severity::High,
            reason_code: None,
            event_type: "precheck_block".to_string(),
        };
        sink.deliver(&notice).expect("delivery succeeds");
    }
}
