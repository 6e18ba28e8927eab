// sentrygate-gateway/src/error.rs
// ============================================================================
// Module: Refusal Envelope
// Description: Maps SafetyError into the HTTP status code and JSON body
// spec.md §6 defines for the gateway's external surface.
// Purpose: Keep SafetyError itself HTTP-agnostic; only this crate's edge
// knows about status codes.
// Dependencies: axum, sentrygate-core
// ============================================================================

//! ## Overview
//! Every non-2xx response the gateway returns is one of these envelopes.
//! `support_ticket_id` lets an operator correlate a refusal with its audit
//! trail without exposing the audit store's internal identifiers directly.

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use sentrygate_core::ReasonCode;
use sentrygate_core::SafetyError;
use sentrygate_core::TraceId;
use serde::Serialize;

/// JSON body returned for every refused or failed request, matching
/// `spec.md` §6's refusal envelope shape.
#[derive(Debug, Serialize)]
pub struct RefusalEnvelope {
    /// Always `true`: this envelope only appears on refusal.
    pub refused: bool,
    /// Machine-readable reason code. For a rule-match refusal this is the
    /// matched rule's category, uppercased, rather than the generic
    /// `RULE_MATCH` code.
    pub reason_code: String,
    /// Fixed human-readable explanation; never leaks internal detail.
    pub explanation: &'static str,
    /// Correlates this refusal with its audit trail.
    pub support_ticket_id: String,
    /// Seconds the caller should wait before retrying, present only for
    /// rate-limit refusals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<f64>,
}

impl RefusalEnvelope {
    /// Builds an envelope for `reason_code`, correlated with `trace_id`.
    #[must_use]
    pub fn new(reason_code: ReasonCode, trace_id: &TraceId) -> Self {
        Self {
            refused: true,
            reason_code: reason_code.as_str().to_string(),
            explanation: "request denied",
            support_ticket_id: format!("audit-{trace_id}"),
            retry_after: None,
        }
    }

    /// Builds an envelope for a rule-match refusal, surfacing `category`
    /// (the matched rule's category, uppercased) as the reason code
    /// instead of the generic `RULE_MATCH` constant.
    #[must_use]
    pub fn for_rule_category(category: &str, trace_id: &TraceId) -> Self {
        Self {
            refused: true,
            reason_code: category.to_uppercase(),
            explanation: "request denied",
            support_ticket_id: format!("audit-{trace_id}"),
            retry_after: None,
        }
    }

    /// Attaches a `retry_after` hint, for rate-limit refusals.
    #[must_use]
    pub fn with_retry_after(mut self, retry_after: f64) -> Self {
        self.retry_after = Some(retry_after);
        self
    }
}

/// Maps a [`ReasonCode`] to the HTTP status `spec.md` §6 assigns it.
#[must_use]
pub fn status_for_reason(reason_code: ReasonCode) -> StatusCode {
    match reason_code {
        ReasonCode::RateLimited
        | ReasonCode::StaminaExhausted
        | ReasonCode::HeatThresholdExceeded => StatusCode::TOO_MANY_REQUESTS,
        ReasonCode::SafetyUnavailable
        | ReasonCode::SuspensionCheckUnavailable
        | ReasonCode::DetectorError
        | ReasonCode::PostCheckTimeout => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::FORBIDDEN,
    }
}

/// Renders a refusal response for `reason_code` at `trace_id`.
#[must_use]
pub fn refusal_response(reason_code: ReasonCode, trace_id: &TraceId) -> Response {
    let status = status_for_reason(reason_code);
    (status, Json(RefusalEnvelope::new(reason_code, trace_id))).into_response()
}

/// Renders a rule-match refusal response surfacing `category` (uppercased)
/// as the reason code, at the status a rule match always maps to.
#[must_use]
pub fn rule_category_refusal_response(category: &str, trace_id: &TraceId) -> Response {
    let status = status_for_reason(ReasonCode::RuleMatch);
    (status, Json(RefusalEnvelope::for_rule_category(category, trace_id))).into_response()
}

/// Renders a rate-limit refusal response carrying `retry_after`.
#[must_use]
pub fn rate_limited_response(reason_code: ReasonCode, trace_id: &TraceId, retry_after: f64) -> Response {
    let envelope = RefusalEnvelope::new(reason_code, trace_id).with_retry_after(retry_after);
    (StatusCode::TOO_MANY_REQUESTS, Json(envelope)).into_response()
}

impl IntoResponse for SafetyError {
    fn into_response(self) -> Response {
        let trace_id = TraceId::from("unknown");
        match &self {
            Self::Refused { reason_code } => refusal_response(*reason_code, &trace_id),
            Self::Timeout(_) | Self::Unavailable(_) => {
                refusal_response(ReasonCode::SafetyUnavailable, &trace_id)
            }
            Self::InvalidInput(message) => {
                (StatusCode::BAD_REQUEST, Json(serde_json::json!({"error": message}))).into_response()
            }
            Self::Config(message) | Self::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({"error": message}))).into_response()
            }
            Self::Hashing(err) => {
                (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({"error": err.to_string()}))).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_reasons_map_to_429() {
        assert_eq!(status_for_reason(ReasonCode::RateLimited), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(status_for_reason(ReasonCode::StaminaExhausted), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn unavailable_reasons_map_to_503() {
        assert_eq!(status_for_reason(ReasonCode::SafetyUnavailable), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn rule_match_maps_to_403() {
        assert_eq!(status_for_reason(ReasonCode::RuleMatch), StatusCode::FORBIDDEN);
    }
}
