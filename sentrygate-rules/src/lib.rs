// sentrygate-rules/src/lib.rs
// ============================================================================
// Module: Deterministic Rule Engine
// Description: Public API for loading and evaluating keyword/regex safety
// rules.
// Purpose: Implement C3 from the pipeline design.
// Dependencies: sentrygate-core
// ============================================================================

//! ## Overview
//! `sentrygate-rules` is the deterministic, sub-millisecond rule matcher
//! that backs the pre-check detector's fast path. It has no knowledge of
//! HTTP, the coordination store, or the governor; it only matches text
//! against rules and reports what fired.

pub mod defaults;
pub mod engine;
pub mod loader;
pub mod regex_set;
pub mod registry;
pub mod trie;

pub use defaults::builtin_rules;
pub use engine::QuickVerdict;
pub use engine::RuleEngine;
pub use loader::LoaderError;
pub use loader::RuleSource;
pub use loader::merge;
pub use registry::RuleRegistry;
