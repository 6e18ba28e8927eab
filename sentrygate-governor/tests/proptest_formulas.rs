// sentrygate-governor/tests/proptest_formulas.rs
// ============================================================================
// Module: Stamina/Heat Formula Property Tests
// Description: Property tests for the pure stamina/heat/risk-score
// arithmetic in `formulas.rs` across randomly generated states and inputs.
// Purpose: Detect bound violations (stamina/heat/risk-score escaping their
// documented ranges) across a wide range of inputs.
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
    reason = "Test-only assertions and helpers are permitted."
)]

use proptest::prelude::*;
use sentrygate_core::StaminaHeatState;
use sentrygate_governor::GovernorConfig;
use sentrygate_governor::formulas::apply_request;
use sentrygate_governor::formulas::record_severe_event;
use sentrygate_governor::formulas::tighten_capacity;
use sentrygate_governor::formulas::update_state;

fn state_strategy() -> impl Strategy<Value = StaminaHeatState> {
    (0.0..200.0f64, 0.0..100.0f64, 0u32..20, 0.0..1.0f64, 0.01..1.0f64).prop_map(
        |(stamina, heat, consecutive_safe, risk_score, capacity_scale)| StaminaHeatState {
            stamina,
            heat,
            consecutive_safe,
            last_check: 0.0,
            risk_score,
            capacity_scale,
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn update_state_never_exceeds_stamina_max(state in state_strategy(), elapsed in 0.0..1_000_000.0f64) {
        let config = GovernorConfig::default();
        let updated = update_state(state, state.last_check + elapsed, &config);
        prop_assert!(updated.stamina <= config.stamina_max);
        prop_assert!(updated.stamina >= 0.0);
    }

    #[test]
    fn update_state_heat_and_risk_score_never_go_negative(state in state_strategy(), elapsed in 0.0..1_000_000.0f64) {
        let config = GovernorConfig::default();
        let updated = update_state(state, state.last_check + elapsed, &config);
        prop_assert!(updated.heat >= 0.0);
        prop_assert!(updated.risk_score >= 0.0);
    }

    #[test]
    fn record_severe_event_keeps_risk_score_in_unit_interval(state in state_strategy()) {
        let config = GovernorConfig::default();
        let updated = record_severe_event(state, &config);
        prop_assert!(updated.risk_score >= 0.0);
        prop_assert!(updated.risk_score <= 1.0);
    }

    #[test]
    fn tighten_capacity_never_reaches_zero(state in state_strategy(), factor in 0.0..2.0f64) {
        let updated = tighten_capacity(state, factor);
        prop_assert!(updated.capacity_scale >= 0.01);
        prop_assert!(updated.capacity_scale <= 1.0);
    }

    #[test]
    fn apply_request_never_drives_stamina_negative(
        state in state_strategy(),
        input_len in 0usize..10_000,
        recent_count in 0usize..50,
        was_safe in any::<bool>(),
    ) {
        let config = GovernorConfig::default();
        let (next, decision) = apply_request(state, input_len, recent_count, was_safe, &config);
        prop_assert!(next.stamina >= 0.0);
        prop_assert_eq!(next.stamina, decision.stamina_remaining);
    }

    #[test]
    fn apply_request_denies_when_stamina_is_exhausted(
        mut state in state_strategy(),
        input_len in 1usize..10_000,
        recent_count in 0usize..50,
        was_safe in any::<bool>(),
    ) {
        state.stamina = 0.0;
        let config = GovernorConfig::default();
        let (_, decision) = apply_request(state, input_len, recent_count, was_safe, &config);
        prop_assert!(!decision.allowed);
    }

    #[test]
    fn apply_request_resets_consecutive_safe_only_when_unsafe(
        state in state_strategy(),
        input_len in 0usize..10_000,
        recent_count in 0usize..50,
    ) {
        let config = GovernorConfig::default();
        let (next, _) = apply_request(state, input_len, recent_count, false, &config);
        prop_assert_eq!(next.consecutive_safe, 0);
    }
}
