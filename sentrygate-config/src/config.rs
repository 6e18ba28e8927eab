// sentrygate-config/src/config.rs
// ============================================================================
// Module: Safety Gateway Configuration
// Description: Configuration loading and validation for the safety
// enforcement pipeline.
// Purpose: Provide strict, fail-closed config parsing with hard limits,
// covering every tunable the governor, sandbox, escalation, rule engine,
// audit store, and HTTP gateway depend on.
// Dependencies: sentrygate-core, sentrygate-governor, sentrygate-sandbox,
// sentrygate-escalation, sentrygate-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path
//! limits, following the same `resolve_path` → `validate_path` → parse →
//! `validate` pipeline the teacher's configuration crate uses for its own
//! manifest. Missing or invalid configuration fails closed: every
//! component downstream treats an unparsed or invalid config as a reason
//! to refuse to start, never as a reason to fall back to a permissive
//! default.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use sentrygate_core::Severity;
use sentrygate_escalation::EscalationConfig;
use sentrygate_governor::GovernorConfig;
use sentrygate_sandbox::SandboxConfig;
use sentrygate_store_sqlite::SqliteStoreMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "sentrygate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "SENTRYGATE_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum total path length accepted for any path-valued setting.
pub const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum request body size accepted by the gateway, in bytes, absent
/// an explicit override.
const DEFAULT_MAX_BODY_BYTES: usize = 256 * 1024;
/// Maximum input text length, in characters, accepted before pre-check
/// (`spec.md` §4.1).
const DEFAULT_MAX_INPUT_CHARS: usize = 32_768;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Top-Level Configuration
// ============================================================================

/// Root configuration for the safety enforcement pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct SafetyConfig {
    /// HTTP gateway configuration (C10).
    #[serde(default)]
    pub server: ServerConfig,
    /// Governor tunables (C4).
    #[serde(default)]
    pub governor: GovernorSettings,
    /// Sandbox tunables (C6).
    #[serde(default)]
    pub sandbox: SandboxSettings,
    /// Escalation tunables (C8).
    #[serde(default)]
    pub escalation: EscalationSettings,
    /// Rule engine configuration (C3).
    #[serde(default)]
    pub rules: RulesConfig,
    /// Audit store configuration (C1).
    pub audit_store: AuditStoreConfig,
    /// Coordination store configuration (C2).
    #[serde(default)]
    pub coordination_store: CoordinationStoreConfig,
    /// CSRF / signed-request validation configuration.
    #[serde(default)]
    pub security: SecurityConfig,
}

impl SafetyConfig {
    /// Loads configuration from disk using the default resolution rules:
    /// an explicit `path`, else the `SENTRYGATE_CONFIG` environment
    /// variable, else `sentrygate.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, parsed, or
    /// fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content =
            std::str::from_utf8(&bytes).map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self = toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency, failing
    /// closed on any inconsistency rather than silently coercing it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when any section is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.governor.validate()?;
        self.sandbox.validate()?;
        self.escalation.validate()?;
        self.rules.validate()?;
        self.audit_store.validate()?;
        self.coordination_store.validate()?;
        self.security.validate()?;
        Ok(())
    }

    /// Converts this configuration's governor section into the
    /// [`GovernorConfig`] the governor crate consumes.
    #[must_use]
    pub fn governor_config(&self) -> GovernorConfig {
        self.governor.clone().into()
    }

    /// Converts this configuration's sandbox section into the
    /// [`SandboxConfig`] the sandbox crate consumes.
    #[must_use]
    pub fn sandbox_config(&self) -> SandboxConfig {
        self.sandbox.clone().into()
    }

    /// Converts this configuration's escalation section into the
    /// [`EscalationConfig`] the escalation crate consumes.
    #[must_use]
    pub fn escalation_config(&self) -> EscalationConfig {
        self.escalation.clone().into()
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Gateway HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address the gateway listens on.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size, in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Maximum input text length, in characters, before pre-check.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    /// Number of worker-pool consumers to spawn (C9).
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            max_input_chars: default_max_input_chars(),
            worker_count: default_worker_count(),
        }
    }
}

impl ServerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("server.max_body_bytes must be greater than zero".to_string()));
        }
        if self.max_input_chars == 0 {
            return Err(ConfigError::Invalid("server.max_input_chars must be greater than zero".to_string()));
        }
        if self.worker_count == 0 {
            return Err(ConfigError::Invalid("server.worker_count must be greater than zero".to_string()));
        }
        self.bind
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::Invalid("server.bind must be a valid socket address".to_string()))?;
        Ok(())
    }
}

fn default_bind() -> String {
    "127.0.0.1:8443".to_string()
}

const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

const fn default_max_input_chars() -> usize {
    DEFAULT_MAX_INPUT_CHARS
}

const fn default_worker_count() -> usize {
    4
}

// ============================================================================
// SECTION: Governor
// ============================================================================

/// TOML-deserializable mirror of [`GovernorConfig`]; kept separate so the
/// governor crate itself carries no `serde` dependency.
#[derive(Debug, Clone, Deserialize)]
pub struct GovernorSettings {
    /// Maximum stamina reserve.
    #[serde(default = "default_stamina_max")]
    pub stamina_max: f64,
    /// Stamina regenerated per second.
    #[serde(default = "default_stamina_regen")]
    pub stamina_regen_per_second: f64,
    /// Stamina cost per input character.
    #[serde(default = "default_stamina_cost")]
    pub stamina_cost_per_char: f64,
    /// Regeneration multiplier once `consecutive_safe` reaches 5.
    #[serde(default = "default_flow_bonus")]
    pub stamina_flow_bonus: f64,
    /// Heat threshold above which requests are rate limited.
    #[serde(default = "default_heat_threshold")]
    pub heat_threshold: f64,
    /// Heat units decayed per second.
    #[serde(default = "default_heat_decay")]
    pub heat_decay_rate: f64,
    /// Sliding window, in seconds, for the rate limit.
    #[serde(default = "default_rate_window")]
    pub rate_limit_window: f64,
    /// Maximum requests allowed within the window.
    #[serde(default = "default_rate_max")]
    pub rate_limit_max: usize,
    /// Cooldown duration, in seconds, reported once heat crosses
    /// `heat_threshold`.
    #[serde(default = "default_cooldown")]
    pub cooldown_duration: f64,
    /// Per-second decay applied to the long-running risk score.
    #[serde(default = "default_risk_decay")]
    pub risk_score_decay_per_second: f64,
    /// Risk score added per severe security event.
    #[serde(default = "default_risk_increment")]
    pub severe_event_risk_increment: f64,
}

impl Default for GovernorSettings {
    fn default() -> Self {
        GovernorConfig::default().into()
    }
}

impl From<GovernorConfig> for GovernorSettings {
    fn from(value: GovernorConfig) -> Self {
        Self {
            stamina_max: value.stamina_max,
            stamina_regen_per_second: value.stamina_regen_per_second,
            stamina_cost_per_char: value.stamina_cost_per_char,
            stamina_flow_bonus: value.stamina_flow_bonus,
            heat_threshold: value.heat_threshold,
            heat_decay_rate: value.heat_decay_rate,
            rate_limit_window: value.rate_limit_window,
            rate_limit_max: value.rate_limit_max,
            cooldown_duration: value.cooldown_duration,
            risk_score_decay_per_second: value.risk_score_decay_per_second,
            severe_event_risk_increment: value.severe_event_risk_increment,
        }
    }
}

impl From<GovernorSettings> for GovernorConfig {
    fn from(value: GovernorSettings) -> Self {
        Self {
            stamina_max: value.stamina_max,
            stamina_regen_per_second: value.stamina_regen_per_second,
            stamina_cost_per_char: value.stamina_cost_per_char,
            stamina_flow_bonus: value.stamina_flow_bonus,
            heat_threshold: value.heat_threshold,
            heat_decay_rate: value.heat_decay_rate,
            rate_limit_window: value.rate_limit_window,
            rate_limit_max: value.rate_limit_max,
            cooldown_duration: value.cooldown_duration,
            risk_score_decay_per_second: value.risk_score_decay_per_second,
            severe_event_risk_increment: value.severe_event_risk_increment,
        }
    }
}

impl GovernorSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.stamina_max <= 0.0 {
            return Err(ConfigError::Invalid("governor.stamina_max must be positive".to_string()));
        }
        if self.heat_threshold <= 0.0 {
            return Err(ConfigError::Invalid("governor.heat_threshold must be positive".to_string()));
        }
        if self.rate_limit_max == 0 {
            return Err(ConfigError::Invalid("governor.rate_limit_max must be greater than zero".to_string()));
        }
        if self.rate_limit_window <= 0.0 {
            return Err(ConfigError::Invalid("governor.rate_limit_window must be positive".to_string()));
        }
        Ok(())
    }
}

fn default_stamina_max() -> f64 {
    GovernorConfig::default().stamina_max
}
fn default_stamina_regen() -> f64 {
    GovernorConfig::default().stamina_regen_per_second
}
fn default_stamina_cost() -> f64 {
    GovernorConfig::default().stamina_cost_per_char
}
fn default_flow_bonus() -> f64 {
    GovernorConfig::default().stamina_flow_bonus
}
fn default_heat_threshold() -> f64 {
    GovernorConfig::default().heat_threshold
}
fn default_heat_decay() -> f64 {
    GovernorConfig::default().heat_decay_rate
}
fn default_rate_window() -> f64 {
    GovernorConfig::default().rate_limit_window
}
fn default_rate_max() -> usize {
    GovernorConfig::default().rate_limit_max
}
fn default_cooldown() -> f64 {
    GovernorConfig::default().cooldown_duration
}
fn default_risk_decay() -> f64 {
    GovernorConfig::default().risk_score_decay_per_second
}
fn default_risk_increment() -> f64 {
    GovernorConfig::default().severe_event_risk_increment
}

// ============================================================================
// SECTION: Sandbox
// ============================================================================

/// TOML-deserializable mirror of [`SandboxConfig`].
#[derive(Debug, Clone, Deserialize)]
pub struct SandboxSettings {
    /// Maximum tokens a single call may request.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Wall-clock timeout, in seconds, applied to every call.
    #[serde(default = "default_sandbox_timeout")]
    pub timeout_seconds: f64,
    /// Maximum requests per second allowed per identity.
    #[serde(default = "default_max_rps")]
    pub max_rps: f64,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        SandboxConfig::default().into()
    }
}

impl From<SandboxConfig> for SandboxSettings {
    fn from(value: SandboxConfig) -> Self {
        Self {
            max_tokens: value.max_tokens,
            timeout_seconds: value.timeout_seconds,
            max_rps: value.max_rps,
        }
    }
}

impl From<SandboxSettings> for SandboxConfig {
    fn from(value: SandboxSettings) -> Self {
        Self {
            max_tokens: value.max_tokens,
            timeout_seconds: value.timeout_seconds,
            max_rps: value.max_rps,
        }
    }
}

impl SandboxSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tokens == 0 {
            return Err(ConfigError::Invalid("sandbox.max_tokens must be greater than zero".to_string()));
        }
        if self.timeout_seconds <= 0.0 {
            return Err(ConfigError::Invalid("sandbox.timeout_seconds must be positive".to_string()));
        }
        if self.max_rps <= 0.0 {
            return Err(ConfigError::Invalid("sandbox.max_rps must be positive".to_string()));
        }
        Ok(())
    }
}

fn default_max_tokens() -> u32 {
    SandboxConfig::default().max_tokens
}
fn default_sandbox_timeout() -> f64 {
    SandboxConfig::default().timeout_seconds
}
fn default_max_rps() -> f64 {
    SandboxConfig::default().max_rps
}

// ============================================================================
// SECTION: Escalation
// ============================================================================

/// TOML-deserializable mirror of [`EscalationConfig`].
#[derive(Debug, Clone, Deserialize)]
pub struct EscalationSettings {
    /// Minimum severity that triggers automatic suspension.
    #[serde(default = "default_auto_suspend_severity")]
    pub auto_suspend_severity: Severity,
    /// Sliding window, in seconds, over which misuse events are counted.
    #[serde(default = "default_misuse_window")]
    pub misuse_window_seconds: u64,
    /// Number of misuse events within the window that triggers tightened
    /// limits and suspension.
    #[serde(default = "default_misuse_threshold")]
    pub misuse_threshold: u64,
    /// Suspension TTL, in seconds.
    #[serde(default = "default_suspension_ttl")]
    pub suspension_ttl_seconds: u64,
    /// Capacity multiplier applied once the misuse threshold is breached.
    #[serde(default = "default_misuse_capacity_scale")]
    pub misuse_capacity_scale: f64,
}

impl Default for EscalationSettings {
    fn default() -> Self {
        EscalationConfig::default().into()
    }
}

impl From<EscalationConfig> for EscalationSettings {
    fn from(value: EscalationConfig) -> Self {
        Self {
            auto_suspend_severity: value.auto_suspend_severity,
            misuse_window_seconds: value.misuse_window_seconds,
            misuse_threshold: value.misuse_threshold,
            suspension_ttl_seconds: value.suspension_ttl_seconds,
            misuse_capacity_scale: value.misuse_capacity_scale,
        }
    }
}

impl From<EscalationSettings> for EscalationConfig {
    fn from(value: EscalationSettings) -> Self {
        Self {
            auto_suspend_severity: value.auto_suspend_severity,
            misuse_window_seconds: value.misuse_window_seconds,
            misuse_threshold: value.misuse_threshold,
            suspension_ttl_seconds: value.suspension_ttl_seconds,
            misuse_capacity_scale: value.misuse_capacity_scale,
        }
    }
}

impl EscalationSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.misuse_threshold == 0 {
            return Err(ConfigError::Invalid("escalation.misuse_threshold must be greater than zero".to_string()));
        }
        if self.misuse_window_seconds == 0 {
            return Err(ConfigError::Invalid(
                "escalation.misuse_window_seconds must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.misuse_capacity_scale) {
            return Err(ConfigError::Invalid("escalation.misuse_capacity_scale must be in [0, 1]".to_string()));
        }
        Ok(())
    }
}

fn default_auto_suspend_severity() -> Severity {
    EscalationConfig::default().auto_suspend_severity
}
fn default_misuse_window() -> u64 {
    EscalationConfig::default().misuse_window_seconds
}
fn default_misuse_threshold() -> u64 {
    EscalationConfig::default().misuse_threshold
}
fn default_suspension_ttl() -> u64 {
    EscalationConfig::default().suspension_ttl_seconds
}
fn default_misuse_capacity_scale() -> f64 {
    EscalationConfig::default().misuse_capacity_scale
}

// ============================================================================
// SECTION: Rules
// ============================================================================

/// Rule engine configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RulesConfig {
    /// Path to an operator-authored rule file, in addition to the
    /// built-in rule set.
    #[serde(default)]
    pub file_path: Option<PathBuf>,
    /// Poll interval, in seconds, for detecting rule file changes.
    #[serde(default = "default_rule_poll_seconds")]
    pub reload_poll_seconds: u64,
}

impl RulesConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.reload_poll_seconds == 0 {
            return Err(ConfigError::Invalid("rules.reload_poll_seconds must be greater than zero".to_string()));
        }
        if let Some(path) = &self.file_path {
            validate_path_string("rules.file_path", &path.to_string_lossy())?;
        }
        Ok(())
    }
}

const fn default_rule_poll_seconds() -> u64 {
    10
}

// ============================================================================
// SECTION: Audit Store
// ============================================================================

/// `SQLite` audit store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: JournalMode,
}

/// TOML-deserializable mirror of [`SqliteStoreMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy; single-writer deployments only).
    Delete,
}

impl From<JournalMode> for SqliteStoreMode {
    fn from(value: JournalMode) -> Self {
        match value {
            JournalMode::Wal => Self::Wal,
            JournalMode::Delete => Self::Delete,
        }
    }
}

impl AuditStoreConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("audit_store.path", &self.path.to_string_lossy())?;
        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid("audit_store.busy_timeout_ms must be greater than zero".to_string()));
        }
        Ok(())
    }
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}

// ============================================================================
// SECTION: Coordination Store
// ============================================================================

/// Coordination store backend selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum CoordinationStoreConfig {
    /// Single-process, non-durable store; development and tests only.
    InMemory,
    /// Redis-backed store, required for any multi-replica deployment.
    Redis {
        /// Connection URL, e.g. `redis://127.0.0.1:6379`.
        url: String,
    },
}

impl Default for CoordinationStoreConfig {
    fn default() -> Self {
        Self::InMemory
    }
}

impl CoordinationStoreConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Self::Redis { url } = self {
            if url.trim().is_empty() {
                return Err(ConfigError::Invalid("coordination_store.url must be non-empty".to_string()));
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Security
// ============================================================================

/// CSRF / signed-request validation configuration, supplementing C10.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SecurityConfig {
    /// Whether CSRF token validation is enforced on browser-originated
    /// requests (those carrying a `session_id`).
    #[serde(default)]
    pub csrf_enabled: bool,
    /// Name of the environment variable holding the HMAC signing secret
    /// for CSRF tokens. Never the secret itself: configuration files are
    /// not an acceptable place to store key material.
    #[serde(default)]
    pub csrf_secret_env_var: Option<String>,
    /// CSRF token validity window, in seconds.
    #[serde(default = "default_csrf_ttl")]
    pub csrf_token_ttl_seconds: u64,
}

impl SecurityConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.csrf_enabled && self.csrf_secret_env_var.is_none() {
            return Err(ConfigError::Invalid(
                "security.csrf_secret_env_var must be set when csrf_enabled is true".to_string(),
            ));
        }
        if self.csrf_token_ttl_seconds == 0 {
            return Err(ConfigError::Invalid(
                "security.csrf_token_ttl_seconds must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

const fn default_csrf_ttl() -> u64 {
    600
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

fn validate_path(path: &Path) -> Result<(), ConfigError> {
    validate_path_string("config path", &path.to_string_lossy())
}

fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> &'static str {
        r#"
            [audit_store]
            path = "/tmp/sentrygate-audit.db"
        "#
    }

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config: SafetyConfig = toml::from_str(minimal_toml()).expect("parse");
        config.validate().expect("validate");
        assert_eq!(config.server.bind, "127.0.0.1:8443");
        assert!(matches!(config.coordination_store, CoordinationStoreConfig::InMemory));
    }

    #[test]
    fn invalid_bind_address_fails_validation() {
        let toml_str = r#"
            [server]
            bind = "not-an-address"

            [audit_store]
            path = "/tmp/sentrygate-audit.db"
        "#;
        let config: SafetyConfig = toml::from_str(toml_str).expect("parse");
        assert!(config.validate().is_err());
    }

    #[test]
    fn csrf_enabled_without_secret_env_var_fails() {
        let toml_str = r#"
            [audit_store]
            path = "/tmp/sentrygate-audit.db"

            [security]
            csrf_enabled = true
        "#;
        let config: SafetyConfig = toml::from_str(toml_str).expect("parse");
        assert!(config.validate().is_err());
    }

    #[test]
    fn redis_coordination_store_requires_url() {
        let toml_str = r#"
            [audit_store]
            path = "/tmp/sentrygate-audit.db"

            [coordination_store]
            backend = "redis"
            url = "redis://127.0.0.1:6379"
        "#;
        let config: SafetyConfig = toml::from_str(toml_str).expect("parse");
        config.validate().expect("validate");
    }

    #[test]
    fn governor_settings_round_trip_into_governor_config() {
        let settings = GovernorSettings::default();
        let config: GovernorConfig = settings.into();
        assert_eq!(config, GovernorConfig::default());
    }

    #[test]
    fn resolve_path_prefers_explicit_over_env() {
        let explicit = PathBuf::from("/tmp/explicit.toml");
        let resolved = resolve_path(Some(&explicit)).expect("resolve");
        assert_eq!(resolved, explicit);
    }
}
