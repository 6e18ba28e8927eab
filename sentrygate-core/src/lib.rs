// sentrygate-core/src/lib.rs
// ============================================================================
// Module: Safety Gateway Core Library
// Description: Public API surface shared by every crate in the workspace.
// Purpose: Expose the canonical data model and the trait boundaries for
// external collaborators.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! This crate has no I/O of its own. It defines the request lifecycle data
//! model (identity, rules, pre-check results, audit records, governor
//! state), the consolidated `SafetyError` taxonomy, and the trait
//! boundaries (`CoordinationStore`, `AuditStore`, `ModelProvider`) that
//! every other crate in the workspace depends on rather than on a
//! concrete backend.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod memory_store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::AuditId;
pub use core::AuditRecord;
pub use core::AuditStatus;
pub use core::BehavioralTrace;
pub use core::DEFAULT_HASH_ALGORITHM;
pub use core::HashAlgorithm;
pub use core::HashDigest;
pub use core::HashError;
pub use core::Identity;
pub use core::MatchType;
pub use core::PreCheckResult;
pub use core::ReasonCode;
pub use core::RequestId;
pub use core::ResponseMessage;
pub use core::ResponseStatus;
pub use core::ReviewDecision;
pub use core::Rule;
pub use core::RuleAction;
pub use core::RuleId;
pub use core::RuleMatch;
pub use core::RuleSetVersion;
pub use core::SafetyError;
pub use core::Severity;
pub use core::StaminaHeatState;
pub use core::StreamMessage;
pub use core::TraceId;
pub use core::TrustTier;
pub use core::UserId;
pub use core::canary;
pub use core::model::Request;

pub use interfaces::AuditStore;
pub use interfaces::AuditStoreError;
pub use interfaces::CoordinationStore;
pub use interfaces::CoordinationStoreError;
pub use interfaces::ModelCompletion;
pub use interfaces::ModelProvider;
pub use interfaces::ModelProviderError;
pub use interfaces::ModelRequest;
pub use interfaces::RuleSetSnapshot;

pub use memory_store::InMemoryCoordinationStore;
