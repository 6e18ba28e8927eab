// sentrygate-escalation/src/lib.rs
// ============================================================================
// Module: Escalation & Suspension
// Description: Public API for escalating audit records and tracking
// systematic misuse.
// Purpose: Implement C8 from the pipeline design.
// Dependencies: sentrygate-core
// ============================================================================

//! ## Overview
//! `sentrygate-escalation` owns the reviewer-facing half of the pipeline:
//! turning a flagged request into a durable, notified, reviewable audit
//! record, and turning repeated flags from the same identity into a
//! suspension.

pub mod handler;
pub mod sink;

pub use handler::EscalationConfig;
pub use handler::EscalationHandler;
pub use handler::SuspensionStatus;
pub use sink::CallbackSink;
pub use sink::EscalationNotice;
pub use sink::LogSink;
pub use sink::Sink;
pub use sink::SinkError;
