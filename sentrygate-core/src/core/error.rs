// sentrygate-core/src/core/error.rs
// ============================================================================
// Module: Safety Error Taxonomy
// Description: The single consolidated error enum returned by every
// fallible operation in the pipeline.
// Purpose: Keep the fail-closed contract explicit and HTTP-agnostic.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! `SafetyError` is deliberately HTTP-agnostic: only the gateway crate maps
//! it onto a status code and a refusal envelope. Every other crate returns
//! it verbatim so callers (worker pool, CLI, tests) can match on variants
//! without depending on `axum`.

use thiserror::Error;

use crate::core::model::ReasonCode;

/// The error type returned by every fallible operation in the safety
/// pipeline.
#[derive(Debug, Error)]
pub enum SafetyError {
    /// A rule, heuristic, or governor check denied the request. This is
    /// the ordinary "the system worked as designed" outcome, not a fault.
    #[error("request refused: {reason_code:?}")]
    Refused {
        /// Machine-readable reason for the refusal.
        reason_code: ReasonCode,
    },

    /// A required dependency (coordination store, audit store, detector)
    /// was unreachable or returned an error. Per the fail-closed design,
    /// callers must treat this identically to an explicit refusal.
    #[error("dependency unavailable: {0}")]
    Unavailable(String),

    /// An operation exceeded its deadline.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Caller-supplied input failed structural validation (not a safety
    /// judgment, e.g. invalid UTF-8 or a missing required field).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration failed to load or validate.
    #[error("configuration error: {0}")]
    Config(String),

    /// Canonical hashing failed.
    #[error(transparent)]
    Hashing(#[from] crate::core::hashing::HashError),

    /// An internal invariant was violated; this indicates a bug rather
    /// than an environmental condition.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SafetyError {
    /// Returns the reason code to surface to the caller, synthesizing one
    /// for variants that do not carry a [`ReasonCode`] directly.
    #[must_use]
    pub fn reason_code(&self) -> ReasonCode {
        match self {
            Self::Refused { reason_code } => *reason_code,
            Self::Unavailable(_) | Self::Timeout(_) => ReasonCode::SafetyUnavailable,
            Self::InvalidInput(_) | Self::Config(_) | Self::Hashing(_) | Self::Internal(_) => {
                ReasonCode::SafetyUnavailable
            }
        }
    }

    /// Builds a refusal error for the given reason.
    #[must_use]
    pub fn refused(reason_code: ReasonCode) -> Self {
        Self::Refused { reason_code }
    }
}
