// sentrygate-sandbox/src/lib.rs
// ============================================================================
// Module: Sandboxed Model Invoker
// Description: Wraps a ModelProvider call with an RPS gate, a token clamp,
// a timeout, and truncation of over-length output.
// Purpose: Implement C6 from the pipeline design.
// Dependencies: sentrygate-core, tokio
// ============================================================================

//! ## Overview
//! Every model call goes through [`Sandbox::run`], never directly through
//! a [`ModelProvider`]. This is where per-identity RPS limiting, token
//! clamping, and timeout enforcement live, independent of whatever
//! provider is plugged in underneath.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use sentrygate_core::ModelProvider;
use sentrygate_core::ModelProviderError;
use sentrygate_core::ModelRequest;
use sentrygate_core::UserId;

/// Sandbox tunables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SandboxConfig {
    /// Maximum tokens a single call may request, regardless of what the
    /// caller asked for.
    pub max_tokens: u32,
    /// Wall-clock timeout applied to every call.
    pub timeout_seconds: f64,
    /// Maximum requests per second allowed per identity.
    pub max_rps: f64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            timeout_seconds: 30.0,
            max_rps: 10.0,
        }
    }
}

/// Errors raised by the sandbox.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// The caller exceeded the per-identity requests-per-second limit.
    #[error("sandbox rps limit exceeded for identity")]
    RpsExceeded,
    /// The underlying call exceeded `timeout_seconds`.
    #[error("sandbox call timed out")]
    Timeout,
    /// The underlying provider returned an error.
    #[error(transparent)]
    Provider(#[from] ModelProviderError),
}

/// Result of a sandboxed model call.
#[derive(Debug, Clone)]
pub struct SandboxResult {
    /// Generated text, possibly truncated.
    pub text: String,
    /// Tokens the provider reported using, if any.
    pub tokens_used: Option<u32>,
    /// Whether `text` was truncated to respect `max_tokens`.
    pub truncated: bool,
}

/// Wraps a [`ModelProvider`] with RPS limiting, token clamping, and a
/// timeout.
pub struct Sandbox<P: ModelProvider> {
    provider: P,
    config: SandboxConfig,
    last_call: Mutex<HashMap<UserId, f64>>,
}

impl<P: ModelProvider> Sandbox<P> {
    /// Builds a sandbox wrapping `provider`.
    #[must_use]
    pub fn new(provider: P, config: SandboxConfig) -> Self {
        Self {
            provider,
            config,
            last_call: Mutex::new(HashMap::new()),
        }
    }

    /// Runs a single sandboxed call for `user_id`. `tools_allowed` is the
    /// caller's tier-derived permission to use tool calling; when `false`,
    /// `request.tools` is stripped unconditionally before the provider
    /// ever sees it (`spec.md` §4.5: "strip `tools`, `tool_choice`,
    /// `functions`, `function_call`").
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::RpsExceeded`] if the identity has called
    /// within the last `1.0 / max_rps` seconds, [`SandboxError::Timeout`]
    /// if the call exceeds `timeout_seconds`, or
    /// [`SandboxError::Provider`] if the underlying provider fails.
    ///
    /// # Panics
    ///
    /// Panics if the internal RPS-tracking mutex is poisoned.
    pub async fn run(
        &self,
        user_id: &UserId,
        mut request: ModelRequest,
        tools_allowed: bool,
    ) -> Result<SandboxResult, SandboxError> {
        self.check_rps(user_id)?;

        request.max_tokens = request.max_tokens.min(self.config.max_tokens);
        if !tools_allowed {
            request.tools.clear();
        }

        let timeout = Duration::from_secs_f64(self.config.timeout_seconds.max(0.0));
        let completion = tokio::time::timeout(timeout, self.provider.complete(request))
            .await
            .map_err(|_elapsed| SandboxError::Timeout)??;

        let mut truncated = false;
        let mut text = completion.text;
        if let Some(tokens_used) = completion.tokens_used {
            if tokens_used > self.config.max_tokens && !text.is_empty() {
                let ratio = f64::from(self.config.max_tokens) / f64::from(tokens_used);
                let keep_chars = ((text.chars().count() as f64) * ratio).floor() as usize;
                text = text.chars().take(keep_chars).collect();
                truncated = true;
            }
        }

        Ok(SandboxResult {
            text,
            tokens_used: completion.tokens_used,
            truncated,
        })
    }

    fn check_rps(&self, user_id: &UserId) -> Result<(), SandboxError> {
        let now = now_seconds();
        let min_interval = 1.0 / self.config.max_rps.max(f64::EPSILON);
        #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic, not a recoverable condition")]
        let mut guard = self.last_call.lock().unwrap();
        if let Some(last) = guard.get(user_id) {
            if now - last < min_interval {
                return Err(SandboxError::RpsExceeded);
            }
        }
        guard.insert(user_id.clone(), now);
        Ok(())
    }
}

fn now_seconds() -> f64 {
    use std::time::SystemTime;
    use std::time::UNIX_EPOCH;
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
