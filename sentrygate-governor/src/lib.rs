// sentrygate-governor/src/lib.rs
// ============================================================================
// Module: Fair-Play Governor
// Description: Public API for stamina/heat/rate-limit accounting.
// Purpose: Implement C4 from the pipeline design.
// Dependencies: sentrygate-core
// ============================================================================

//! ## Overview
//! The governor sits between the rule engine and the sandbox: every
//! request that is not already blocked by a rule still has to clear the
//! stamina/heat/rate-limit check before a model call is made.

pub mod config;
pub mod formulas;
pub mod governor;

pub use config::GovernorConfig;
pub use formulas::GovernorDecision;
pub use formulas::StaminaReason;
pub use governor::Governor;
pub use governor::GovernorError;
