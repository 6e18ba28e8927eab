// sentrygate-core/src/interfaces/mod.rs
// ============================================================================
// Module: External Collaborator Interfaces
// Description: Trait boundaries for the coordination store, audit store,
// model provider, and reviewer notification sinks.
// Purpose: Let every other crate depend on behavior, not a concrete backend.
// Dependencies: async-trait, serde
// ============================================================================

//! ## Overview
//! Every external system the pipeline touches (Redis-backed coordination
//! store, SQLite-backed audit store, the model backend, reviewer
//! notification channels) is represented here as a trait. Production code
//! depends only on these traits; concrete adapters live in their own
//! crates (`sentrygate-store-sqlite`, `sentrygate-escalation`) or behind a
//! feature flag in `sentrygate-governor`/`sentrygate-queue`.

use async_trait::async_trait;

use crate::core::identifiers::AuditId;
use crate::core::identifiers::RequestId;
use crate::core::identifiers::RuleSetVersion;
use crate::core::identifiers::UserId;
use crate::core::model::AuditRecord;
use crate::core::model::AuditStatus;
use crate::core::model::ResponseMessage;
use crate::core::model::StaminaHeatState;
use crate::core::model::StreamMessage;

/// Errors raised by a [`CoordinationStore`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum CoordinationStoreError {
    /// The backing store could not be reached.
    #[error("coordination store unavailable: {0}")]
    Unavailable(String),
    /// The operation exceeded its deadline.
    #[error("coordination store timed out")]
    Timeout,
    /// The stored value failed to (de)serialize.
    #[error("coordination store serialization error: {0}")]
    Serialization(String),
}

/// Atomic per-identity governor state plus the stream primitives the
/// queue worker consumes, matching the contract in `spec.md` §6
/// ("Coordination store contract").
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Atomically reads, updates via `f`, and writes back the governor
    /// state for `user_id`. Implementations must guarantee this is
    /// equivalent to a single atomic script (e.g. a Lua script against
    /// Redis) so concurrent requests from the same identity never race.
    async fn update_stamina_heat(
        &self,
        user_id: &UserId,
        f: Box<dyn FnOnce(StaminaHeatState) -> StaminaHeatState + Send>,
    ) -> Result<StaminaHeatState, CoordinationStoreError>;

    /// Returns whether `user_id` is currently suspended, and if so, the
    /// reason recorded at suspension time.
    async fn is_suspended(&self, user_id: &UserId) -> Result<Option<String>, CoordinationStoreError>;

    /// Suspends `user_id` for `ttl_seconds`, recording `reason` and the
    /// triggering `audit_id`.
    async fn suspend_user(
        &self,
        user_id: &UserId,
        reason: &str,
        audit_id: &AuditId,
        ttl_seconds: u64,
    ) -> Result<(), CoordinationStoreError>;

    /// Records one misuse-window event for `user_id` and returns the
    /// number of events currently within the sliding window.
    async fn record_misuse_event(
        &self,
        user_id: &UserId,
        window_seconds: u64,
    ) -> Result<u64, CoordinationStoreError>;

    /// Checks whether `text` (case-folded) is present in the dynamic
    /// blocklist.
    async fn blocklist_contains(&self, text_lower: &str) -> Result<bool, CoordinationStoreError>;

    /// Adds `text` (case-folded) to the dynamic blocklist.
    async fn blocklist_add(&self, text_lower: &str) -> Result<(), CoordinationStoreError>;

    /// Returns the set of rule JSON blobs injected live by an
    /// administrator (`guardian:dynamic_rules` in `spec.md` §6), each
    /// deserializable as a [`crate::core::model::Rule`].
    async fn dynamic_rules(&self) -> Result<Vec<String>, CoordinationStoreError>;

    /// Injects or replaces one dynamically-added rule, serialized as
    /// JSON, into the coordination store's dynamic rule set.
    async fn dynamic_rule_add(&self, rule_json: &str) -> Result<(), CoordinationStoreError>;

    /// Publishes a message to the inference stream for asynchronous
    /// worker processing.
    async fn publish(&self, message: StreamMessage) -> Result<(), CoordinationStoreError>;

    /// Reads up to `count` pending messages for `consumer_group`,
    /// blocking for at most `block_ms` milliseconds.
    async fn read_stream(
        &self,
        consumer_group: &str,
        consumer_name: &str,
        count: usize,
        block_ms: u64,
    ) -> Result<Vec<(String, StreamMessage)>, CoordinationStoreError>;

    /// Acknowledges successful processing of a stream entry, removing it
    /// from the consumer group's pending-entries list.
    async fn ack(&self, consumer_group: &str, entry_id: &str) -> Result<(), CoordinationStoreError>;

    /// Claims pending entries for `consumer_group` idle for at least
    /// `min_idle_ms`, returning them so they can be redelivered or moved
    /// to a dead-letter path. Backs the `queue replay-pending` CLI
    /// operation (`spec.md` §7, §4.15 of `SPEC_FULL.md`).
    async fn claim_pending(
        &self,
        consumer_group: &str,
        new_consumer: &str,
        min_idle_ms: u64,
    ) -> Result<Vec<(String, StreamMessage)>, CoordinationStoreError>;

    /// Returns the number of messages currently enqueued on the inference
    /// stream, including pending (unacked) entries. Backs `GET
    /// /queue/depth`.
    async fn queue_depth(&self) -> Result<u64, CoordinationStoreError>;

    /// Publishes a terminal response for `request_id` to the response
    /// stream, consumed by `GET /status/{request_id}`.
    async fn publish_response(&self, message: ResponseMessage) -> Result<(), CoordinationStoreError>;

    /// Fetches the terminal response for `request_id`, if one has been
    /// published yet.
    async fn get_response(
        &self,
        request_id: &RequestId,
    ) -> Result<Option<ResponseMessage>, CoordinationStoreError>;

    /// Appends an event to the durable audit stream, independent of the
    /// `AuditStore` row itself (`spec.md` §4.8 step 6).
    async fn append_audit_stream(&self, event: &str, user_id: &UserId) -> Result<(), CoordinationStoreError>;

    /// Returns whether the store is currently reachable; used by the
    /// gateway's fail-closed health gate.
    async fn health_check(&self) -> Result<(), CoordinationStoreError>;
}

/// Errors raised by an [`AuditStore`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum AuditStoreError {
    /// The backing store could not be reached.
    #[error("audit store unavailable: {0}")]
    Unavailable(String),
    /// The referenced record does not exist.
    #[error("audit record not found: {0}")]
    NotFound(String),
    /// The requested status transition is not permitted.
    #[error("invalid audit status transition: {from:?} -> {to:?}")]
    InvalidTransition {
        /// Status the record was in.
        from: AuditStatus,
        /// Status requested.
        to: AuditStatus,
    },
}

/// Durable audit trail for safety-relevant decisions, matching the
/// contract in `spec.md` §6 ("Audit store contract").
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Inserts a new audit record.
    async fn insert(&self, record: AuditRecord) -> Result<(), AuditStoreError>;

    /// Fetches a record by id.
    async fn get(&self, audit_id: &AuditId) -> Result<AuditRecord, AuditStoreError>;

    /// Fetches every record for a request, in insertion order.
    async fn get_by_request(&self, request_id: &RequestId) -> Result<Vec<AuditRecord>, AuditStoreError>;

    /// Applies a status transition and reviewer decision to an escalated
    /// record, recording the reviewer's identity, optional notes, and the
    /// resolution timestamp.
    async fn resolve(
        &self,
        audit_id: &AuditId,
        decision: crate::core::model::ReviewDecision,
        reviewer_id: &str,
        notes: Option<&str>,
    ) -> Result<AuditRecord, AuditStoreError>;

    /// Lists records currently in [`AuditStatus::Escalated`], most recent
    /// first, bounded by `limit`.
    async fn list_escalated(&self, limit: usize) -> Result<Vec<AuditRecord>, AuditStoreError>;
}

/// Errors raised by a [`ModelProvider`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum ModelProviderError {
    /// The provider could not be reached or returned a transport error.
    #[error("model provider error: {0}")]
    Transport(String),
    /// The call exceeded its deadline.
    #[error("model provider timed out")]
    Timeout,
    /// The provider returned a response that failed structural
    /// validation.
    #[error("model provider returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// A single model completion result.
#[derive(Debug, Clone)]
pub struct ModelCompletion {
    /// Generated text.
    pub text: String,
    /// Tokens consumed by the call, if reported by the provider.
    pub tokens_used: Option<u32>,
}

/// A parameterized request to the model provider. `tools` is stripped by
/// the sandbox before the request reaches the provider whenever the
/// caller's trust tier does not permit tool use (`spec.md` §4.5).
#[derive(Debug, Clone, Default)]
pub struct ModelRequest {
    /// Prompt text.
    pub input_text: String,
    /// Maximum tokens to generate, already clamped by the sandbox.
    pub max_tokens: u32,
    /// Names of tools/functions the caller requested be made available,
    /// corresponding to the `tools`/`tool_choice`/`functions`/
    /// `function_call` fields of an OpenAI-compatible request. Empty
    /// unless the caller's tier allows tool use.
    pub tools: Vec<String>,
}

/// The model backend the sandbox invokes, matching the contract in
/// `spec.md` §6 ("Model provider contract").
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Executes a single completion call.
    async fn complete(&self, request: ModelRequest) -> Result<ModelCompletion, ModelProviderError>;
}

/// A rule set snapshot plus its version, returned by a rule source so the
/// rule engine can detect when a reload is needed.
pub struct RuleSetSnapshot {
    /// Rules in the snapshot.
    pub rules: Vec<crate::core::model::Rule>,
    /// Version tag for cache invalidation.
    pub version: RuleSetVersion,
}
