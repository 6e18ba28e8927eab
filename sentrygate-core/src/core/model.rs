// sentrygate-core/src/core/model.rs
// ============================================================================
// Module: Request Lifecycle Data Model
// Description: Canonical types describing an inbound request, rule matches,
// pre/post-check results, audit records, and stamina/heat governor state.
// Purpose: Single source of truth for every component downstream of the
// ingress gateway.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Every component in the pipeline (rule engine, governor, sandbox, detectors,
//! escalation, audit store, queue) exchanges these types rather than
//! component-private structs. None of them carry behavior beyond simple
//! accessors; the behavior lives in the crates that consume them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::identifiers::AuditId;
use crate::core::identifiers::RequestId;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::TraceId;
use crate::core::identifiers::UserId;

// ============================================================================
// SECTION: Identity
// ============================================================================

/// Trust tier assigned to the caller, used to scale governor capacity and
/// to decide whether a caller may bypass rate limiting entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustTier {
    /// Unauthenticated or anonymous caller; the most restrictive tier.
    Anonymous,
    /// Authenticated end user under the default governor limits.
    Standard,
    /// Internal or partner service account with relaxed limits.
    Trusted,
    /// Administrative caller exempt from rate limiting but never from the
    /// rule engine or fail-closed checks.
    Privileged,
}

/// Identity of the caller attached to every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable identifier for the caller, used as the governor and misuse
    /// tracking key.
    pub user_id: UserId,
    /// Trust tier assigned at authentication time.
    pub trust_tier: TrustTier,
    /// Opaque session identifier, present only for browser-originated
    /// traffic that carries CSRF protection.
    pub session_id: Option<String>,
}

impl Identity {
    /// Builds an anonymous identity, the default when authentication
    /// degrades rather than fails outright.
    #[must_use]
    pub fn anonymous(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            trust_tier: TrustTier::Anonymous,
            session_id: None,
        }
    }
}

// ============================================================================
// SECTION: Request
// ============================================================================

/// A single inbound request entering the pipeline at the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Identifier for this specific request.
    pub request_id: RequestId,
    /// Identifier correlating this request with its queued follow-up work
    /// and eventual audit trail.
    pub trace_id: TraceId,
    /// Caller identity.
    pub identity: Identity,
    /// Raw user-supplied input text that the rule engine and governor act
    /// on.
    pub input_text: String,
    /// Arbitrary caller-supplied metadata, carried through for audit but
    /// never interpreted by the rule engine.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Wall-clock time the request entered the gateway.
    #[serde(with = "time::serde::rfc3339")]
    pub received_at: OffsetDateTime,
}

// ============================================================================
// SECTION: Rule Engine
// ============================================================================

/// How a rule's trigger condition is matched against input text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Exact or case-folded keyword membership, matched via a trie.
    Keyword,
    /// Regular expression matched via a compiled regex set.
    Regex,
    /// Embedding/semantic similarity match (evaluated outside the
    /// deterministic engine; carried here for completeness of the match
    /// record).
    Semantic,
    /// A rule composed of other rules via boolean combination.
    Composite,
}

/// Severity assigned to a rule, used both to rank concurrent matches and to
/// decide escalation/auto-suspend behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational; logged but never blocking on its own.
    Low,
    /// Escalation-worthy but not an automatic suspension trigger.
    Medium,
    /// Default auto-suspend threshold.
    High,
    /// Always blocks and always escalates.
    Critical,
}

/// Action a matched rule requests of the pre-check detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    /// Refuse the request immediately; no model call is made.
    Block,
    /// Allow the model call but escalate the match for human review.
    Escalate,
    /// Record the match in the audit trail without otherwise affecting the
    /// request.
    Log,
    /// Allow the request but mark it for heightened post-check scrutiny.
    Warn,
    /// The match itself is a canary token; always blocks and is always
    /// treated as critical regardless of the rule's declared severity.
    Canary,
}

/// A single safety rule loaded into the deterministic rule engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Stable identifier for this rule.
    pub id: RuleId,
    /// Human-readable name.
    pub name: String,
    /// Free-text category used for registry indexing and post-check
    /// severity lookup.
    pub category: String,
    /// Severity assigned to matches of this rule.
    pub severity: Severity,
    /// Action requested when this rule matches.
    pub action: RuleAction,
    /// How the rule is matched against input text.
    pub match_type: MatchType,
    /// Keyword list for [`MatchType::Keyword`] rules.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Regex pattern list for [`MatchType::Regex`] rules.
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Referenced rule IDs for [`MatchType::Composite`] rules.
    #[serde(default)]
    pub composite_rules: Vec<RuleId>,
    /// Confidence assigned to matches, `0.0..=1.0`.
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// Whether keyword/regex matching is case-sensitive.
    #[serde(default)]
    pub case_sensitive: bool,
    /// Whether this rule currently participates in evaluation.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Evaluation order among rules of equal severity; lower runs first.
    #[serde(default)]
    pub priority: i32,
}

fn default_confidence() -> f64 {
    1.0
}

const fn default_true() -> bool {
    true
}

impl Rule {
    /// Computes a stable signature for this rule's matchable surface,
    /// independent of metadata fields such as `name`, used to detect
    /// duplicate or conflicting rule definitions across reloads.
    ///
    /// # Errors
    ///
    /// Returns an error if canonical serialization of the rule fails.
    pub fn match_signature(&self) -> Result<crate::core::hashing::HashDigest, crate::core::hashing::HashError> {
        #[derive(Serialize)]
        struct Signature<'a> {
            match_type: MatchType,
            keywords: &'a [String],
            patterns: &'a [String],
            case_sensitive: bool,
        }
        crate::core::hashing::hash_canonical_json(
            crate::core::hashing::DEFAULT_HASH_ALGORITHM,
            &Signature {
                match_type: self.match_type,
                keywords: &self.keywords,
                patterns: &self.patterns,
                case_sensitive: self.case_sensitive,
            },
        )
    }
}

/// A single rule firing against a piece of text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleMatch {
    /// The rule that matched.
    pub rule_id: RuleId,
    /// Category copied from the rule at match time.
    pub category: String,
    /// Severity copied from the rule at match time.
    pub severity: Severity,
    /// Action requested by the rule.
    pub action: RuleAction,
    /// The literal substring or regex capture that triggered the match,
    /// truncated defensively before logging.
    pub matched_text: String,
    /// Confidence copied from the rule at match time.
    pub confidence: f64,
    /// Priority copied from the rule at match time; breaks ties among
    /// matches of equal severity, higher running first.
    pub priority: i32,
}

impl RuleMatch {
    /// Whether this match, on its own, requires the request to be
    /// refused: a `block`/`canary` action, or `escalate` at `high` or
    /// `critical` severity.
    #[must_use]
    pub fn blocks(&self) -> bool {
        matches!(self.action, RuleAction::Block | RuleAction::Canary)
            || (self.action == RuleAction::Escalate && self.severity >= Severity::High)
    }
}

// ============================================================================
// SECTION: Pre-check
// ============================================================================

/// Outcome of the pre-check detector (C5) evaluating a request's input
/// text before any model call is made.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreCheckResult {
    /// Whether the request is allowed to proceed to the model.
    pub allowed: bool,
    /// Machine-readable reason code; present whenever `allowed` is false
    /// or the request was flagged for heightened post-check scrutiny.
    pub reason_code: Option<ReasonCode>,
    /// Every rule match observed, including non-blocking ones kept for the
    /// audit trail.
    pub matches: Vec<RuleMatch>,
    /// Whether a canary token was observed in the input.
    pub canary_detected: bool,
}

impl PreCheckResult {
    /// Builds the trivial "nothing matched, proceed" result.
    #[must_use]
    pub fn pass() -> Self {
        Self {
            allowed: true,
            reason_code: None,
            matches: Vec::new(),
            canary_detected: false,
        }
    }

    /// Builds a blocking result with the given reason.
    #[must_use]
    pub fn block(reason_code: ReasonCode, matches: Vec<RuleMatch>) -> Self {
        Self {
            allowed: false,
            reason_code: Some(reason_code),
            matches,
            canary_detected: false,
        }
    }
}

// ============================================================================
// SECTION: Reason Codes
// ============================================================================

/// Canonical machine-readable reason attached to every non-pass outcome,
/// consolidating the category/rule-id-derived string codes the rule engine,
/// detectors, and governor each used independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    /// Input exceeded the configured maximum length.
    InputTooLong,
    /// A deterministic rule fired with a blocking action.
    RuleMatch,
    /// Input matched an entry in the dynamically maintained blocklist.
    DynamicBlocklist,
    /// A canary token was found in the input.
    SafetyCanaryDetected,
    /// Input's character-level entropy exceeded the configured threshold.
    HighEntropyPayload,
    /// A required safety component was unavailable; request denied
    /// fail-closed.
    SafetyUnavailable,
    /// Caller exceeded the sliding-window request-count limit.
    RateLimited,
    /// Caller's stamina reserve was insufficient for this request's cost.
    StaminaExhausted,
    /// Caller's heat accumulator reached the configured threshold.
    HeatThresholdExceeded,
    /// Caller is currently suspended.
    UserSuspended,
    /// Suspension status could not be determined; request denied
    /// fail-closed.
    SuspensionCheckUnavailable,
    /// Post-check heuristic pattern matched model output.
    HeuristicOutputUnsafe,
    /// Post-check detector raised an unexpected error; response withheld
    /// fail-closed.
    DetectorError,
    /// Post-check timed out; response withheld fail-closed.
    PostCheckTimeout,
    /// Pre-check passed but post-check flagged a result inconsistent with
    /// it.
    OutputCoherenceMismatch,
    /// CSRF token missing, malformed, or expired.
    CsrfValidationFailed,
    /// Request body exceeded the configured maximum size.
    RequestBodyTooLarge,
}

impl ReasonCode {
    /// Returns the wire-format string for this reason code, matching the
    /// `SCREAMING_SNAKE_CASE` convention used in refusal envelopes.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InputTooLong => "INPUT_TOO_LONG",
            Self::RuleMatch => "RULE_MATCH",
            Self::DynamicBlocklist => "DYNAMIC_BLOCKLIST",
            Self::SafetyCanaryDetected => "SAFETY_CANARY_DETECTED",
            Self::HighEntropyPayload => "HIGH_ENTROPY_PAYLOAD",
            Self::SafetyUnavailable => "SAFETY_UNAVAILABLE",
            Self::RateLimited => "RATE_LIMITED",
            Self::StaminaExhausted => "STAMINA_EXHAUSTED",
            Self::HeatThresholdExceeded => "HEAT_THRESHOLD_EXCEEDED",
            Self::UserSuspended => "USER_SUSPENDED",
            Self::SuspensionCheckUnavailable => "SUSPENSION_CHECK_UNAVAILABLE",
            Self::HeuristicOutputUnsafe => "HEURISTIC_OUTPUT_UNSAFE",
            Self::DetectorError => "DETECTOR_ERROR",
            Self::PostCheckTimeout => "POST_CHECK_TIMEOUT",
            Self::OutputCoherenceMismatch => "OUTPUT_COHERENCE_MISMATCH",
            Self::CsrfValidationFailed => "CSRF_VALIDATION_FAILED",
            Self::RequestBodyTooLarge => "REQUEST_BODY_TOO_LARGE",
        }
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Lifecycle status of an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    /// Recorded but not escalated.
    Open,
    /// Escalated to a human reviewer; awaiting a decision.
    Escalated,
    /// A reviewer resolved the escalation.
    Resolved,
}

/// Reviewer decision on an escalated audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    /// The flagged content was a false positive; release it.
    Approve,
    /// The flagged content was correctly blocked; add it to the dynamic
    /// blocklist.
    Block,
}

/// A durable record of a safety-relevant decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique identifier for this record.
    pub audit_id: AuditId,
    /// Request this record was produced for.
    pub request_id: RequestId,
    /// Trace correlating this record with queue and escalation activity.
    pub trace_id: TraceId,
    /// Caller identity at the time of the decision.
    pub user_id: UserId,
    /// Current lifecycle status.
    pub status: AuditStatus,
    /// Reason code explaining the decision, if any.
    pub reason_code: Option<ReasonCode>,
    /// Severity associated with the triggering event, if any.
    pub severity: Option<Severity>,
    /// Free-text event type (`"refusal"`, `"postcheck_flag"`,
    /// `"systematic_misuse"`, `"processing_error"`, ...).
    pub event_type: String,
    /// Normalized request input text, carried so a `block` review decision
    /// can add it to the dynamic blocklist without a second lookup.
    pub input_text: Option<String>,
    /// Model output withheld pending review, if applicable.
    pub withheld_output: Option<String>,
    /// Reviewer decision, present once `status` is [`AuditStatus::Resolved`].
    pub decision: Option<ReviewDecision>,
    /// Identity of the reviewer who resolved this record, present once
    /// `status` is [`AuditStatus::Resolved`].
    pub reviewer_id: Option<String>,
    /// Free-text note the reviewer attached to their decision.
    pub notes: Option<String>,
    /// Creation time.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Last update time.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    /// Time the `escalated -> resolved` transition was recorded, present
    /// once `status` is [`AuditStatus::Resolved`].
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub resolved_at: Option<OffsetDateTime>,
}

// ============================================================================
// SECTION: Governor State
// ============================================================================

/// Per-identity stamina/heat governor state, persisted in the coordination
/// store between requests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StaminaHeatState {
    /// Remaining stamina, bounded by `[0, stamina_max]`.
    pub stamina: f64,
    /// Current heat accumulator, bounded by `[0, 100]`.
    pub heat: f64,
    /// Count of consecutive requests that passed pre-check cleanly,
    /// driving the flow bonus to regeneration.
    pub consecutive_safe: u32,
    /// Unix timestamp (seconds) of the last state update.
    pub last_check: f64,
    /// Long-running, decayed risk score in `[0, 1]` informing canary
    /// injection decisions.
    pub risk_score: f64,
    /// Multiplier applied to the effective rate-limit capacity, tightened
    /// by the escalation subsystem after systematic misuse is detected
    /// and otherwise `1.0`.
    #[serde(default = "default_capacity_scale")]
    pub capacity_scale: f64,
}

fn default_capacity_scale() -> f64 {
    1.0
}

impl StaminaHeatState {
    /// Builds the initial state for a caller seen for the first time.
    #[must_use]
    pub fn initial(stamina_max: f64, now: f64) -> Self {
        Self {
            stamina: stamina_max,
            heat: 0.0,
            consecutive_safe: 0,
            last_check: now,
            risk_score: 0.0,
            capacity_scale: 1.0,
        }
    }
}

// ============================================================================
// SECTION: Queue
// ============================================================================

/// A message placed on the coordination store's inference stream once a
/// request has cleared the synchronous gate (C10) and pre-check (C5). The
/// worker pool (C9) is the only consumer: it invokes the sandboxed model
/// call itself rather than receiving a precomputed completion, per
/// `spec.md` §4.7 ("Call C6 -> SandboxResult").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamMessage {
    /// Request this message carries work for.
    pub request_id: RequestId,
    /// Trace correlating this message with the originating request.
    pub trace_id: TraceId,
    /// Caller identity.
    pub user_id: UserId,
    /// Trust tier at enqueue time, carried so the worker can size the
    /// sandbox call without a second identity lookup.
    pub trust_tier: TrustTier,
    /// User-supplied input text to send to the model.
    pub input_text: String,
    /// Caller-supplied metadata, carried through for the eventual audit
    /// row.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// A message placed on the response stream once a request has been
/// released to the client, or consumed by the `/status/{request_id}`
/// poller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMessage {
    /// Request this response answers.
    pub request_id: RequestId,
    /// Released model output, present only when `status` is
    /// [`ResponseStatus::Completed`].
    pub response: Option<String>,
    /// Terminal status of the request.
    pub status: ResponseStatus,
}

/// Terminal status published to the response stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    /// Post-check passed; `response` carries the released text.
    Completed,
    /// Post-check flagged the output; it was escalated instead of
    /// released.
    Escalated,
}

/// Optional behavioral trace attached to a request for downstream
/// analysis; density may legitimately be zero when the wellbeing/hook
/// detection subsystem that produces it is not deployed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BehavioralTrace {
    /// Normalized interaction density score in `[0, 1]`; `0.0` when no
    /// behavioral analysis subsystem is configured.
    pub interaction_density_score: f64,
    /// Count of sensitive-category rule matches observed for this
    /// identity in the current session.
    pub sensitive_detections: u32,
}
