// sentrygate-gateway/tests/common/mod.rs
// ============================================================================
// Module: Gateway End-to-End Test Harness
// Description: Shared wiring for end-to-end tests driving the full
// ingest -> queue -> worker -> post-check -> escalation pipeline.
// Purpose: Give every gateway integration test the same in-memory
// coordination store, in-memory audit store, and canned model provider
// without duplicating the assembly `sentrygate-cli` does for a real
// deployment.
// Dependencies: sentrygate-core, sentrygate-config, sentrygate-escalation,
// sentrygate-gateway, sentrygate-governor, sentrygate-rules,
// sentrygate-sandbox, sentrygate-store-sqlite, tokio, tower
// ============================================================================

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    dead_code,
    reason = "Test-only helpers; not every scenario file exercises every one."
)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::Hmac;
use hmac::Mac;
use sentrygate_config::SafetyConfig;
use sentrygate_core::InMemoryCoordinationStore;
use sentrygate_core::ModelCompletion;
use sentrygate_core::ModelProvider;
use sentrygate_core::ModelProviderError;
use sentrygate_core::ModelRequest;
use sentrygate_core::RequestId;
use sentrygate_escalation::EscalationHandler;
use sentrygate_gateway::AppState;
use sentrygate_gateway::IdentityResolver;
use sentrygate_gateway::PostcheckDetector;
use sentrygate_gateway::PrecheckDetector;
use sentrygate_gateway::Worker;
use sentrygate_gateway::WorkerConfig;
use sentrygate_governor::Governor;
use sentrygate_rules::RuleEngine;
use sentrygate_rules::RuleSource;
use sentrygate_sandbox::Sandbox;
use sentrygate_sandbox::SandboxConfig;
use sentrygate_store_sqlite::SqliteAuditStore;
use sha2::Sha256;
use tokio::sync::watch;
use tokio::task::JoinHandle;

type HmacSha256 = Hmac<Sha256>;

/// A [`ModelProvider`] that serves a fixed queue of canned completions,
/// falling back to a constant default once the queue is drained.
pub struct CannedProvider {
    responses: Mutex<VecDeque<String>>,
    default_response: String,
}

impl CannedProvider {
    /// Builds a provider that serves `responses` in order, then
    /// `"a perfectly ordinary response"` forever after.
    pub fn new(responses: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(str::to_string).collect()),
            default_response: "a perfectly ordinary response".to_string(),
        }
    }

    /// Builds a provider that always serves `response`.
    pub fn constant(response: &'static str) -> Self {
        Self::new([response])
    }
}

#[async_trait]
impl ModelProvider for CannedProvider {
    async fn complete(&self, _request: ModelRequest) -> Result<ModelCompletion, ModelProviderError> {
        #[allow(clippy::unwrap_used, reason = "test-only mutex, never poisoned")]
        let mut guard = self.responses.lock().unwrap();
        let text = guard.pop_front().unwrap_or_else(|| self.default_response.clone());
        Ok(ModelCompletion { text, tokens_used: Some(8) })
    }
}

/// Every collaborator an end-to-end test needs, wired over a shared
/// in-memory coordination store and in-memory SQLite audit store, mirroring
/// `sentrygate_cli::build_pipeline` minus the real model provider and
/// on-disk audit store.
pub struct Harness {
    pub state: AppState<InMemoryCoordinationStore, SqliteAuditStore>,
    pub store: Arc<InMemoryCoordinationStore>,
    pub audit: Arc<SqliteAuditStore>,
    pub governor: Arc<Governor<InMemoryCoordinationStore>>,
    bearer_secret: Option<Vec<u8>>,
    worker: Arc<Worker<InMemoryCoordinationStore, SqliteAuditStore, CannedProvider>>,
}

/// Minimal valid configuration: in-memory audit store, in-memory
/// coordination store, built-in rules only. Individual scenarios splice in
/// a `[governor]` or `[escalation]` override via `toml_overrides`.
fn base_config(toml_overrides: &str) -> SafetyConfig {
    let document = format!(
        "[audit_store]\npath = \":memory:\"\n\n{toml_overrides}"
    );
    toml::from_str(&document).expect("parse test configuration")
}

impl Harness {
    /// Builds a harness whose sandboxed model invoker serves `responses` in
    /// order, using `toml_overrides` to tune the governor/escalation
    /// sections (e.g. a small `rate_limit_max` for a rate-limit scenario).
    /// Every request resolves to a fresh anonymous identity: no Bearer
    /// secret or API key allowlist is configured.
    pub fn build(responses: impl IntoIterator<Item = &'static str>, toml_overrides: &str) -> Self {
        Self::build_inner(responses, toml_overrides, None, None)
    }

    /// Builds a harness that verifies Bearer tokens against `secret`, for
    /// scenarios that need a stable, non-anonymous identity (e.g. a
    /// privileged reviewer calling `/review`). Pair with
    /// [`Harness::sign_bearer_token`].
    pub fn build_with_bearer_secret(
        responses: impl IntoIterator<Item = &'static str>,
        toml_overrides: &str,
        secret: &'static [u8],
    ) -> Self {
        Self::build_inner(responses, toml_overrides, Some(secret.to_vec()), None)
    }

    /// Builds a harness whose `IdentityResolver` recognizes `api_keys_csv`
    /// (a `key:tier` allowlist), for scenarios that need the same caller
    /// identity across several requests (e.g. rate limiting, systematic
    /// misuse). Anonymous identities are assigned a fresh user id per
    /// request and can't be used for that.
    pub fn build_with_api_key(
        responses: impl IntoIterator<Item = &'static str>,
        toml_overrides: &str,
        api_keys_csv: &str,
    ) -> Self {
        Self::build_inner(responses, toml_overrides, None, Some(api_keys_csv))
    }

    fn build_inner(
        responses: impl IntoIterator<Item = &'static str>,
        toml_overrides: &str,
        bearer_secret: Option<Vec<u8>>,
        api_keys_csv: Option<&str>,
    ) -> Self {
        let config = base_config(toml_overrides);

        let store = Arc::new(InMemoryCoordinationStore::new());
        let audit = Arc::new(SqliteAuditStore::open_in_memory().expect("open in-memory audit store"));

        let rule_engine = RuleEngine::new();
        let mut source = RuleSource::builtin_only();
        if let Ok(Some(operator_rules)) = source.poll() {
            if let Ok(merged) = sentrygate_rules::merge(operator_rules, &[]) {
                rule_engine.load_rules(merged);
            }
        }
        let rules = Arc::new(rule_engine);

        let governor = Arc::new(Governor::new(store.clone(), config.governor_config()));
        let precheck = PrecheckDetector::new(rules.clone(), store.clone(), config.server.max_input_chars);
        let sandbox = Arc::new(Sandbox::new(CannedProvider::new(responses), SandboxConfig::default()));
        let postcheck = Arc::new(PostcheckDetector::new(None, false));
        let identity = IdentityResolver::new(bearer_secret.clone(), api_keys_csv);

        let escalation_config = config.escalation_config();
        let worker_escalation = Arc::new(EscalationHandler::new(store.clone(), audit.clone(), Vec::new(), escalation_config));
        let state_escalation = EscalationHandler::new(store.clone(), audit.clone(), Vec::new(), escalation_config);

        let state = AppState::new(
            Governor::new(store.clone(), config.governor_config()),
            rules,
            precheck,
            state_escalation,
            store.clone(),
            audit.clone(),
            identity,
            config,
        );

        let worker = Arc::new(Worker::new(
            "test-worker",
            store.clone(),
            audit.clone(),
            sandbox,
            postcheck,
            worker_escalation,
            governor.clone(),
            WorkerConfig::default(),
        ));

        Self { state, store, audit, governor, bearer_secret, worker }
    }

    /// Signs a Bearer token claiming `sub`/`role`, verifiable by this
    /// harness's `IdentityResolver`. Panics if the harness was not built
    /// with [`Harness::build_with_bearer_secret`].
    pub fn sign_bearer_token(&self, sub: &str, role: &str) -> String {
        let secret = self.bearer_secret.as_ref().expect("harness built with a bearer secret");
        let payload = serde_json::to_vec(&serde_json::json!({"sub": sub, "role": role})).expect("encode claims");
        #[allow(clippy::unwrap_used, reason = "HMAC accepts a key of any length")]
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(&payload);
        let signature = mac.finalize().into_bytes();
        format!("{}.{}", URL_SAFE_NO_PAD.encode(&payload), URL_SAFE_NO_PAD.encode(signature))
    }

    /// Builds the axum [`Router`] for this harness's state.
    pub fn router(&self) -> Router {
        self.state.clone().router()
    }

    /// Spawns the worker pool's single consumer in the background, running
    /// until the returned [`watch::Sender`] is dropped or set to `true`.
    pub fn spawn_worker(&self) -> (JoinHandle<()>, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        let worker = self.worker.clone();
        let handle = tokio::spawn(async move { worker.run(rx).await });
        (handle, tx)
    }

    /// Polls `GET`-equivalent `store.get_response` for `request_id` until a
    /// terminal response appears or `timeout` elapses, returning `None` on
    /// timeout.
    pub async fn await_response(
        &self,
        request_id: &str,
        timeout: Duration,
    ) -> Option<sentrygate_core::ResponseMessage> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Ok(Some(message)) = self.store.get_response(&RequestId::from(request_id)).await {
                return Some(message);
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Stops the worker, awaiting its current in-flight message before
    /// returning.
    pub async fn stop_worker(&self, tx: watch::Sender<bool>, handle: JoinHandle<()>) {
        let _ = tx.send(true);
        let _ = handle.await;
    }
}
