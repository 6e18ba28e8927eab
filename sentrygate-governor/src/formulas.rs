// sentrygate-governor/src/formulas.rs
// ============================================================================
// Module: Stamina/Heat Formulas
// Description: Pure functions implementing the stamina/heat/rate-limit
// accounting that the governor applies atomically per identity.
// Purpose: Isolate the arithmetic from the coordination-store plumbing so
// it can be property-tested in isolation.
// Dependencies: sentrygate-core
// ============================================================================

//! ## Overview
//! These functions are pure and deterministic given `(state, now,
//! input_len, config)`; all atomicity is the caller's responsibility
//! (see [`crate::governor::Governor`]).

use sentrygate_core::StaminaHeatState;

use crate::config::GovernorConfig;

/// Reason the request did not have enough stamina, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaminaReason {
    /// Stamina was sufficient.
    Ok,
    /// Stamina reserve was too low for this request's cost.
    Exhausted,
}

/// Outcome of one governor check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GovernorDecision {
    /// Whether the request is allowed to proceed.
    pub allowed: bool,
    /// Remaining stamina after this request.
    pub stamina_remaining: f64,
    /// Current heat after this request.
    pub current_heat: f64,
    /// Seconds the caller should wait before retrying, when `allowed` is
    /// false.
    pub retry_after: f64,
    /// Updated consecutive-safe-request counter.
    pub consecutive_safe: u32,
    /// Why stamina was or was not sufficient.
    pub stamina_reason: StaminaReason,
}

/// Applies time-based regeneration/decay to `state` as of `now`, returning
/// the updated state. This must run before cost is deducted on every
/// check, including the very first one for a newly created state.
#[must_use]
pub fn update_state(state: StaminaHeatState, now: f64, config: &GovernorConfig) -> StaminaHeatState {
    let time_passed = (now - state.last_check).max(0.0);
    let effective_bonus = if state.consecutive_safe >= 5 {
        config.stamina_flow_bonus
    } else {
        1.0
    };
    let regen = config.stamina_regen_per_second * time_passed * effective_bonus;
    let stamina = (state.stamina + regen).min(config.stamina_max);
    let heat = (state.heat - config.heat_decay_rate * time_passed).max(0.0);
    let risk_score = (state.risk_score - config.risk_score_decay_per_second * time_passed).max(0.0);
    StaminaHeatState {
        stamina,
        heat,
        consecutive_safe: state.consecutive_safe,
        last_check: now,
        risk_score,
        capacity_scale: state.capacity_scale,
    }
}

/// Adds `config.severe_event_risk_increment` to `state.risk_score`,
/// clamped to `[0, 1]`. Called by the escalation subsystem whenever an
/// event crosses the auto-suspend severity threshold (`spec.md` §4.3,
/// §4.13 of `SPEC_FULL.md`).
#[must_use]
pub fn record_severe_event(state: StaminaHeatState, config: &GovernorConfig) -> StaminaHeatState {
    StaminaHeatState {
        risk_score: (state.risk_score + config.severe_event_risk_increment).min(1.0),
        ..state
    }
}

/// Tightens `state`'s effective rate-limit capacity by multiplying
/// `capacity_scale` by `factor`, floored so a capacity scale never
/// reaches exactly zero (which would make every request indistinguishable
/// from a store outage). Called by the escalation subsystem on
/// systematic misuse (`spec.md` §4.8 step 5: "tighten rate bucket to 25%
/// of current").
#[must_use]
pub fn tighten_capacity(state: StaminaHeatState, factor: f64) -> StaminaHeatState {
    StaminaHeatState {
        capacity_scale: (state.capacity_scale * factor).clamp(0.01, 1.0),
        ..state
    }
}

/// Applies the cost of one request of `input_len` characters to an
/// already time-updated `state`, returning the new state and the
/// decision rendered from it. `recent_request_count` is the number of
/// requests (including this one) observed within the sliding window,
/// computed by the caller from its own request-time tracking.
#[must_use]
pub fn apply_request(
    state: StaminaHeatState,
    input_len: usize,
    recent_request_count: usize,
    was_safe: bool,
    config: &GovernorConfig,
) -> (StaminaHeatState, GovernorDecision) {
    let input_cost = (input_len as f64 * config.stamina_cost_per_char).max(1.0);
    let has_stamina = state.stamina >= input_cost;
    let stamina = if has_stamina {
        state.stamina - input_cost
    } else {
        state.stamina
    };
    let heat = (state.heat + input_cost * 0.1).min(100.0);

    let consecutive_safe = if was_safe {
        state.consecutive_safe + 1
    } else {
        0
    };

    let effective_rate_limit_max =
        ((config.rate_limit_max as f64) * state.capacity_scale).floor().max(1.0) as usize;
    let is_rate_limited =
        recent_request_count > effective_rate_limit_max || heat >= config.heat_threshold || !has_stamina;

    let retry_after = if !has_stamina {
        config.stamina_max / config.stamina_regen_per_second.max(f64::EPSILON)
    } else if heat >= config.heat_threshold {
        config.cooldown_duration
    } else {
        config.rate_limit_window
    };

    let next_state = StaminaHeatState {
        stamina,
        heat,
        consecutive_safe,
        last_check: state.last_check,
        risk_score: state.risk_score,
        capacity_scale: state.capacity_scale,
    };

    let decision = GovernorDecision {
        allowed: !is_rate_limited,
        stamina_remaining: stamina,
        current_heat: heat,
        retry_after: if is_rate_limited { retry_after } else { 0.0 },
        consecutive_safe,
        stamina_reason: if has_stamina {
            StaminaReason::Ok
        } else {
            StaminaReason::Exhausted
        },
    };

    (next_state, decision)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> GovernorConfig {
        GovernorConfig::default()
    }

    #[test]
    fn stamina_never_exceeds_max() {
        let config = cfg();
        let state = StaminaHeatState::initial(config.stamina_max, 0.0);
        let updated = update_state(state, 10_000.0, &config);
        assert!(updated.stamina <= config.stamina_max);
    }

    #[test]
    fn heat_never_goes_negative() {
        let config = cfg();
        let mut state = StaminaHeatState::initial(config.stamina_max, 0.0);
        state.heat = 5.0;
        let updated = update_state(state, 10_000.0, &config);
        assert!(updated.heat >= 0.0);
    }

    #[test]
    fn exhausted_stamina_blocks_request() {
        let config = cfg();
        let mut state = StaminaHeatState::initial(config.stamina_max, 0.0);
        state.stamina = 0.0;
        let (_, decision) = apply_request(state, 100, 1, true, &config);
        assert!(!decision.allowed);
        assert_eq!(decision.stamina_reason, StaminaReason::Exhausted);
    }

    #[test]
    fn flow_bonus_applies_after_five_consecutive_safe_requests() {
        let config = cfg();
        let mut state = StaminaHeatState::initial(50.0, 0.0);
        state.consecutive_safe = 5;
        let boosted = update_state(state, 10.0, &config);
        state.consecutive_safe = 0;
        let plain = update_state(state, 10.0, &config);
        assert!(boosted.stamina > plain.stamina);
    }

    #[test]
    fn unsafe_request_resets_consecutive_safe_counter() {
        let config = cfg();
        let mut state = StaminaHeatState::initial(config.stamina_max, 0.0);
        state.consecutive_safe = 9;
        let (next, _) = apply_request(state, 10, 1, false, &config);
        assert_eq!(next.consecutive_safe, 0);
    }
}
