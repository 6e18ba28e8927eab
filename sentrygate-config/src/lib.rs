// sentrygate-config/src/lib.rs
// ============================================================================
// Module: Sentry Gate Configuration
// Description: Public API for loading and validating pipeline configuration.
// Purpose: Ambient configuration stack shared by the gateway and CLI.
// Dependencies: sentrygate-core, sentrygate-governor, sentrygate-sandbox,
// sentrygate-escalation, sentrygate-store-sqlite
// ============================================================================

//! ## Overview
//! `sentrygate-config` owns the single [`SafetyConfig`] struct every
//! binary in the workspace loads at startup. It aggregates each
//! component crate's tunables into one TOML document so an operator has
//! exactly one file to audit.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::AuditStoreConfig;
pub use config::CoordinationStoreConfig;
pub use config::ConfigError;
pub use config::EscalationSettings;
pub use config::GovernorSettings;
pub use config::JournalMode;
pub use config::RulesConfig;
pub use config::SafetyConfig;
pub use config::SandboxSettings;
pub use config::SecurityConfig;
pub use config::ServerConfig;
pub use config::CONFIG_ENV_VAR;
pub use config::MAX_CONFIG_FILE_SIZE;
pub use config::MAX_TOTAL_PATH_LENGTH;
