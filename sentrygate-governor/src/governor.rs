// sentrygate-governor/src/governor.rs
// ============================================================================
// Module: Governor
// Description: Applies the stamina/heat formulas atomically per identity
// via a CoordinationStore.
// Purpose: Implement C4 from the pipeline design.
// Dependencies: sentrygate-core
// ============================================================================

//! ## Overview
//! `Governor::check` is the single entry point the gateway middleware
//! calls. It delegates the atomic stamina/heat read-modify-write to the
//! configured [`CoordinationStore`], and tracks each identity's recent
//! request timestamps locally to evaluate the sliding-window request
//! count; the distributed stamina/heat state is authoritative across
//! gateway replicas, while the local window is an acceptable
//! per-replica approximation of the rate-limit count.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use sentrygate_core::CoordinationStore;
use sentrygate_core::CoordinationStoreError;
use sentrygate_core::ReasonCode;
use sentrygate_core::UserId;

use crate::config::GovernorConfig;
use crate::formulas::GovernorDecision;
use crate::formulas::StaminaReason;
use crate::formulas::apply_request;
use crate::formulas::record_severe_event;
use crate::formulas::tighten_capacity;
use crate::formulas::update_state;

/// Errors raised while checking the governor.
#[derive(Debug, thiserror::Error)]
pub enum GovernorError {
    /// The coordination store was unavailable; callers must fail closed.
    #[error("coordination store unavailable: {0}")]
    StoreUnavailable(#[from] CoordinationStoreError),
}

/// Applies stamina/heat/rate-limit accounting per identity.
pub struct Governor<S: CoordinationStore> {
    store: Arc<S>,
    config: GovernorConfig,
    request_times: Mutex<HashMap<UserId, VecDeque<f64>>>,
}

impl<S: CoordinationStore> Governor<S> {
    /// Builds a governor backed by `store` with the given `config`.
    #[must_use]
    pub fn new(store: Arc<S>, config: GovernorConfig) -> Self {
        Self {
            store,
            config,
            request_times: Mutex::new(HashMap::new()),
        }
    }

    /// Checks whether `user_id` may make a request of `input_len`
    /// characters at time `now`, applying and persisting the stamina/heat
    /// update. `was_safe` reflects whether the *previous* request from
    /// this identity passed pre-check cleanly, driving the flow bonus.
    ///
    /// # Errors
    ///
    /// Returns [`GovernorError::StoreUnavailable`] if the coordination
    /// store could not be reached; callers must treat this as a denial
    /// per the fail-closed design, not retry indefinitely.
    ///
    /// # Panics
    ///
    /// Panics if the local request-time tracking mutex is poisoned.
    pub async fn check(
        &self,
        user_id: &UserId,
        input_len: usize,
        now: f64,
        was_safe: bool,
    ) -> Result<GovernorDecision, GovernorError> {
        let recent_request_count = self.record_and_count(user_id, now);
        let config = self.config;
        let stamina_max = config.stamina_max;

        let mut rendered = None;
        let closure_config = config;
        self.store
            .update_stamina_heat(
                user_id,
                Box::new(move |state| {
                    let seeded = if state.last_check == 0.0 && state.stamina == 0.0 {
                        sentrygate_core::StaminaHeatState::initial(stamina_max, now)
                    } else {
                        state
                    };
                    let updated = update_state(seeded, now, &closure_config);
                    let (next, decision) =
                        apply_request(updated, input_len, recent_request_count, was_safe, &closure_config);
                    rendered = Some(decision);
                    next
                }),
            )
            .await?;

        #[allow(clippy::unwrap_used, reason = "the closure above always sets rendered before returning")]
        Ok(rendered.unwrap())
    }

    /// Maps a non-allowed decision's [`StaminaReason`] and heat level to a
    /// canonical reason code.
    #[must_use]
    pub fn reason_code(decision: &GovernorDecision) -> ReasonCode {
        if decision.stamina_reason == StaminaReason::Exhausted {
            ReasonCode::StaminaExhausted
        } else {
            ReasonCode::HeatThresholdExceeded
        }
    }

    /// Bumps `user_id`'s long-running risk score after a severe security
    /// event (an escalation at or above the auto-suspend severity),
    /// matching `spec.md` §4.3's "incremented per severe security event".
    ///
    /// # Errors
    ///
    /// Returns [`GovernorError::StoreUnavailable`] if the coordination
    /// store could not be reached.
    pub async fn record_severe_event(&self, user_id: &UserId) -> Result<(), GovernorError> {
        let config = self.config;
        self.store
            .update_stamina_heat(user_id, Box::new(move |state| record_severe_event(state, &config)))
            .await?;
        Ok(())
    }

    /// Reads `user_id`'s current long-running risk score without applying
    /// time decay, for callers that need it purely as an input to another
    /// decision (the worker pool's canary-injection probability,
    /// `spec.md` §4.7 step 5) rather than as part of a governor check.
    ///
    /// # Errors
    ///
    /// Returns [`GovernorError::StoreUnavailable`] if the coordination
    /// store could not be reached.
    pub async fn risk_score(&self, user_id: &UserId) -> Result<f64, GovernorError> {
        let mut observed = 0.0;
        self.store
            .update_stamina_heat(
                user_id,
                Box::new(move |state| {
                    observed = state.risk_score;
                    state
                }),
            )
            .await?;
        Ok(observed)
    }

    /// Multiplies `user_id`'s effective rate-limit capacity by `factor`,
    /// used by the escalation subsystem to tighten limits on systematic
    /// misuse (`spec.md` §4.8 step 5).
    ///
    /// # Errors
    ///
    /// Returns [`GovernorError::StoreUnavailable`] if the coordination
    /// store could not be reached.
    pub async fn tighten(&self, user_id: &UserId, factor: f64) -> Result<(), GovernorError> {
        self.store
            .update_stamina_heat(user_id, Box::new(move |state| tighten_capacity(state, factor)))
            .await?;
        Ok(())
    }

    fn record_and_count(&self, user_id: &UserId, now: f64) -> usize {
        #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic, not a recoverable condition")]
        let mut guard = self.request_times.lock().unwrap();
        let window = self.config.rate_limit_window;
        let entry = guard.entry(user_id.clone()).or_default();
        entry.push_back(now);
        while let Some(front) = entry.front() {
            if *front <= now - window {
                entry.pop_front();
            } else {
                break;
            }
        }
        entry.len()
    }
}
