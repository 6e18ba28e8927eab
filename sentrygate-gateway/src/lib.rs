// sentrygate-gateway/src/lib.rs
// ============================================================================
// Module: Safety Gateway HTTP Edge
// Description: The synchronous request gate (C10), pre/post-check detectors
// (C5/C7), the worker pool (C9), identity resolution, and the model provider
// adapter.
// Purpose: Wire every other crate in the workspace into one HTTP service.
// Dependencies: axum, tokio, reqwest, sentrygate-core, sentrygate-rules,
// sentrygate-governor, sentrygate-sandbox, sentrygate-escalation
// ============================================================================

//! ## Overview
//! This crate is the only one in the workspace that speaks HTTP. It hosts
//! the synchronous ingress gate ([`server::AppState`]), the asynchronous
//! worker pool ([`worker::Worker`]) that drives the sandbox and post-check
//! detector, and the identity/security primitives both depend on.
//! Everything else in the pipeline (rule engine, governor, sandbox,
//! escalation, audit store) is a path dependency consumed through its own
//! trait boundary.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod error;
pub mod identity;
pub mod postcheck;
pub mod precheck;
pub mod provider;
pub mod security;
pub mod server;
pub mod worker;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use error::RefusalEnvelope;
pub use error::refusal_response;
pub use error::status_for_reason;
pub use identity::IdentityResolver;
pub use postcheck::ClassifierLabel;
pub use postcheck::ClassifierVerdict;
pub use postcheck::OutputClassifier;
pub use postcheck::PostCheckResult;
pub use postcheck::PostcheckDetector;
pub use precheck::PrecheckDetector;
pub use provider::OpenAiCompatibleProvider;
pub use security::CsrfValidator;
pub use security::constant_time_eq;
pub use security::constant_time_eq_str;
pub use server::AppState;
pub use worker::CONSUMER_GROUP;
pub use worker::Worker;
pub use worker::WorkerConfig;
