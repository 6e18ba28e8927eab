// sentrygate-cli/src/lib.rs
// ============================================================================
// Module: Sentry Gate CLI Library
// Description: Shared wiring that assembles every pipeline crate into a
// running gateway, given a loaded configuration.
// Purpose: Keep `main.rs` a thin command dispatcher by moving collaborator
// construction (store, rule engine, governor, sandbox, escalation) here.
// Dependencies: sentrygate-config, sentrygate-core, sentrygate-escalation,
// sentrygate-gateway, sentrygate-governor, sentrygate-rules,
// sentrygate-sandbox, sentrygate-store-sqlite
// ============================================================================

//! ## Overview
//! [`build_pipeline`] is the single place that turns a [`SafetyConfig`]
//! into a concrete, runnable pipeline. It is the CLI's analogue of the
//! teacher's own config-to-server wiring: every environment-derived
//! secret (Bearer HMAC key, API key allowlist, model provider
//! credentials) is read here, once, rather than threaded through every
//! collaborator's constructor.

use std::sync::Arc;

use sentrygate_config::SafetyConfig;
use sentrygate_core::InMemoryCoordinationStore;
use sentrygate_escalation::EscalationHandler;
use sentrygate_escalation::LogSink;
use sentrygate_gateway::AppState;
use sentrygate_gateway::IdentityResolver;
use sentrygate_gateway::OpenAiCompatibleProvider;
use sentrygate_gateway::PostcheckDetector;
use sentrygate_gateway::PrecheckDetector;
use sentrygate_governor::Governor;
use sentrygate_rules::RuleEngine;
use sentrygate_rules::RuleSource;
use sentrygate_sandbox::Sandbox;
use sentrygate_store_sqlite::SqliteAuditStore;
use sentrygate_store_sqlite::SqliteStoreConfig;
use thiserror::Error;

/// Environment variable holding the HMAC secret used to verify signed
/// Bearer tokens. Unset means Bearer auth is disabled and every caller
/// without a valid API key resolves anonymous.
pub const BEARER_SECRET_ENV_VAR: &str = "SENTRYGATE_BEARER_SECRET";
/// Environment variable holding a comma-separated `key:tier` API key
/// allowlist.
pub const API_KEYS_ENV_VAR: &str = "SENTRYGATE_API_KEYS";
/// Environment variable holding the OpenAI-compatible model provider base
/// URL.
pub const MODEL_BASE_URL_ENV_VAR: &str = "SENTRYGATE_MODEL_BASE_URL";
/// Environment variable holding the model provider API key.
pub const MODEL_API_KEY_ENV_VAR: &str = "SENTRYGATE_MODEL_API_KEY";
/// Environment variable holding the model name to request.
pub const MODEL_NAME_ENV_VAR: &str = "SENTRYGATE_MODEL_NAME";

/// Errors raised while assembling the pipeline from configuration.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The configured coordination store backend has no implementation in
    /// this build.
    #[error("coordination store backend not available: {0}")]
    UnsupportedCoordinationStore(String),
    /// The SQLite audit store could not be opened.
    #[error("failed to open audit store: {0}")]
    AuditStore(String),
    /// A required environment variable for the model provider was not
    /// set.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
}

/// The fully assembled, runnable pipeline: gateway state plus everything
/// a worker pool needs to drain the inference stream.
pub struct Pipeline {
    /// Shared gateway state, ready to be turned into an axum router.
    pub state: AppState<InMemoryCoordinationStore, SqliteAuditStore>,
    /// Coordination store, shared with the worker pool.
    pub store: Arc<InMemoryCoordinationStore>,
    /// Audit store, shared with the worker pool.
    pub audit: Arc<SqliteAuditStore>,
    /// Sandbox, shared with the worker pool.
    pub sandbox: Arc<Sandbox<OpenAiCompatibleProvider>>,
    /// Post-check detector, shared with the worker pool.
    pub postcheck: Arc<PostcheckDetector>,
    /// Escalation handler, shared with the worker pool.
    pub escalation: Arc<EscalationHandler<InMemoryCoordinationStore, SqliteAuditStore>>,
    /// Governor, shared with the worker pool (canary injection uses the
    /// caller's current risk score).
    pub governor: Arc<Governor<InMemoryCoordinationStore>>,
    /// Number of worker-pool consumers the configuration requested.
    pub worker_count: usize,
}

/// Assembles every pipeline collaborator from `config`, reading model
/// provider and identity secrets from the environment.
///
/// # Errors
///
/// Returns [`PipelineError`] if the configured coordination store backend
/// has no implementation, the audit store cannot be opened, or a required
/// model provider environment variable is missing.
pub fn build_pipeline(config: SafetyConfig) -> Result<Pipeline, PipelineError> {
    let store = Arc::new(match &config.coordination_store {
        sentrygate_config::CoordinationStoreConfig::InMemory => InMemoryCoordinationStore::new(),
        sentrygate_config::CoordinationStoreConfig::Redis { .. } => {
            return Err(PipelineError::UnsupportedCoordinationStore(
                "redis backend is configured but no Redis client is wired into this build".to_string(),
            ));
        }
    });

    let sqlite_config = SqliteStoreConfig {
        path: config.audit_store.path.clone(),
        busy_timeout_ms: config.audit_store.busy_timeout_ms,
        journal_mode: config.audit_store.journal_mode.into(),
    };
    let audit = Arc::new(SqliteAuditStore::open(&sqlite_config).map_err(|err| PipelineError::AuditStore(err.to_string()))?);

    let rules = Arc::new(build_rule_engine(&config));

    let governor = Arc::new(Governor::new(store.clone(), config.governor_config()));
    let precheck = PrecheckDetector::new(rules.clone(), store.clone(), config.server.max_input_chars);

    let base_url =
        std::env::var(MODEL_BASE_URL_ENV_VAR).map_err(|_| PipelineError::MissingEnvVar(MODEL_BASE_URL_ENV_VAR.to_string()))?;
    let api_key =
        std::env::var(MODEL_API_KEY_ENV_VAR).map_err(|_| PipelineError::MissingEnvVar(MODEL_API_KEY_ENV_VAR.to_string()))?;
    let model = std::env::var(MODEL_NAME_ENV_VAR).unwrap_or_else(|_| "gpt-4o-mini".to_string());
    let provider = OpenAiCompatibleProvider::new(base_url, api_key, model);
    let sandbox = Arc::new(Sandbox::new(provider, config.sandbox_config()));

    let postcheck = Arc::new(PostcheckDetector::new(None, true));

    let bearer_secret = std::env::var(BEARER_SECRET_ENV_VAR).ok().map(String::into_bytes);
    let api_keys_csv = std::env::var(API_KEYS_ENV_VAR).ok();
    let identity = IdentityResolver::new(bearer_secret, api_keys_csv.as_deref());

    let worker_count = config.server.worker_count;
    let escalation_config = config.escalation_config();
    let escalation = Arc::new(EscalationHandler::new(
        store.clone(),
        audit.clone(),
        vec![Box::new(LogSink::new(std::io::stderr()))],
        escalation_config,
    ));
    let state = AppState::new(
        Governor::new(store.clone(), config.governor_config()),
        rules,
        precheck,
        EscalationHandler::new(store.clone(), audit.clone(), vec![Box::new(LogSink::new(std::io::stderr()))], escalation_config),
        store.clone(),
        audit.clone(),
        identity,
        config,
    );

    Ok(Pipeline {
        state,
        store,
        audit,
        sandbox,
        postcheck,
        escalation,
        governor,
        worker_count,
    })
}

/// Builds the rule engine for `config`: built-in rules merged with an
/// optional operator-authored file (no dynamic rules at startup; those
/// only arrive through the coordination store at request time).
#[must_use]
pub fn build_rule_engine(config: &SafetyConfig) -> RuleEngine {
    let engine = RuleEngine::new();
    let mut source = match &config.rules.file_path {
        Some(path) => RuleSource::with_file(path.clone()),
        None => RuleSource::builtin_only(),
    };
    if let Ok(Some(operator_rules)) = source.poll() {
        if let Ok(merged) = sentrygate_rules::merge(operator_rules, &[]) {
            engine.load_rules(merged);
        }
    }
    engine
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config() -> SafetyConfig {
        toml::from_str(
            r#"
                [audit_store]
                path = ":memory:"
            "#,
        )
        .expect("parse minimal config")
    }

    #[test]
    fn build_rule_engine_loads_builtin_rules_without_a_rule_file() {
        let config = minimal_config();
        let engine = build_rule_engine(&config);
        let matches = engine.evaluate("what is the suicide method that works fastest");
        assert!(matches.iter().any(|m| m.rule_id.as_str() == "builtin.self_harm"));
    }

    #[test]
    fn build_pipeline_rejects_redis_backend() {
        let mut config = minimal_config();
        config.coordination_store =
            sentrygate_config::CoordinationStoreConfig::Redis { url: "redis://127.0.0.1:6379".to_string() };
        let err = build_pipeline(config).expect_err("redis backend is not implemented");
        assert!(matches!(err, PipelineError::UnsupportedCoordinationStore(_)));
    }

    #[test]
    fn build_pipeline_fails_closed_without_model_env_vars() {
        // SAFETY (test-only): these vars are unset at process start in CI and
        // not touched by any other test in this crate.
        unsafe {
            std::env::remove_var(MODEL_BASE_URL_ENV_VAR);
            std::env::remove_var(MODEL_API_KEY_ENV_VAR);
        }
        let config = minimal_config();
        let err = build_pipeline(config).expect_err("missing model provider credentials");
        assert!(matches!(err, PipelineError::MissingEnvVar(var) if var == MODEL_BASE_URL_ENV_VAR));
    }

    #[test]
    fn build_pipeline_assembles_with_model_env_vars_set() {
        // SAFETY (test-only): scoped to this test; no other test in this
        // crate reads or writes these variables.
        unsafe {
            std::env::set_var(MODEL_BASE_URL_ENV_VAR, "http://127.0.0.1:0");
            std::env::set_var(MODEL_API_KEY_ENV_VAR, "test-key");
        }
        let config = minimal_config();
        let pipeline = build_pipeline(config).expect("pipeline assembles with in-memory store");
        assert_eq!(pipeline.worker_count, 4);
        unsafe {
            std::env::remove_var(MODEL_BASE_URL_ENV_VAR);
            std::env::remove_var(MODEL_API_KEY_ENV_VAR);
        }
    }
}
