// sentrygate-core/src/core/mod.rs
// ============================================================================
// Module: Core Types
// Description: Canonical safety-pipeline schema shared by every crate in
// the workspace.
// Purpose: Provide stable, serializable types for requests, rules, audit
// records, and governor state.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! These types are the canonical source of truth for any derived surface
//! (HTTP envelopes, SQLite rows, Redis stream payloads, CLI output). They
//! carry no I/O of their own; see `crate::interfaces` for the trait
//! boundaries that move them across process and network edges.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod canary;
pub mod error;
pub mod hashing;
pub mod identifiers;
pub mod model;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use error::SafetyError;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::HashError;
pub use identifiers::AuditId;
pub use identifiers::RequestId;
pub use identifiers::RuleId;
pub use identifiers::RuleSetVersion;
pub use identifiers::TraceId;
pub use identifiers::UserId;
pub use model::AuditRecord;
pub use model::AuditStatus;
pub use model::BehavioralTrace;
pub use model::Identity;
pub use model::MatchType;
pub use model::PreCheckResult;
pub use model::ReasonCode;
pub use model::ResponseMessage;
pub use model::ResponseStatus;
pub use model::ReviewDecision;
pub use model::Request;
pub use model::Rule;
pub use model::RuleAction;
pub use model::RuleMatch;
pub use model::Severity;
pub use model::StaminaHeatState;
pub use model::StreamMessage;
pub use model::TrustTier;
