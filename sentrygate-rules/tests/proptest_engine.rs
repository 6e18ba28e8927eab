// sentrygate-rules/tests/proptest_engine.rs
// ============================================================================
// Module: Rule Engine Property Tests
// Description: Property tests for RuleEngine::evaluate/quick_check
// invariants across randomly generated keyword rule sets.
// Purpose: Detect ordering, dedup, and should_block-consistency violations
// across a wide range of rule sets and input text.
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
use sentrygate_core::MatchType;
use sentrygate_core::Rule;
use sentrygate_core::RuleAction;
use sentrygate_core::RuleId;
use sentrygate_core::Severity;
use sentrygate_rules::RuleEngine;

fn severity_strategy() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Low),
        Just(Severity::Medium),
        Just(Severity::High),
        Just(Severity::Critical),
    ]
}

fn action_strategy() -> impl Strategy<Value = RuleAction> {
    prop_oneof![
        Just(RuleAction::Block),
        Just(RuleAction::Escalate),
        Just(RuleAction::Log),
        Just(RuleAction::Warn),
        Just(RuleAction::Canary),
    ]
}

fn rule_set_strategy() -> impl Strategy<Value = Vec<Rule>> {
    prop::collection::vec(("[a-z]{3,8}", severity_strategy(), action_strategy()), 0..6).prop_map(|entries| {
        entries
            .into_iter()
            .enumerate()
            .map(|(index, (keyword, severity, action))| Rule {
                id: RuleId::from(format!("rule-{index}")),
                name: format!("rule-{index}"),
                category: "test".to_string(),
                severity,
                action,
                match_type: MatchType::Keyword,
                keywords: vec![keyword],
                patterns: Vec::new(),
                composite_rules: Vec::new(),
                confidence: 1.0,
                case_sensitive: false,
                enabled: true,
                priority: 0,
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn evaluate_never_duplicates_a_rule_id(rules in rule_set_strategy(), text in ".*") {
        let engine = RuleEngine::new();
        engine.load_rules(rules);
        let matches = engine.evaluate(&text);
        let mut seen = std::collections::HashSet::new();
        for m in &matches {
            prop_assert!(seen.insert(m.rule_id.as_str().to_string()), "duplicate rule_id in evaluate output");
        }
    }

    #[test]
    fn evaluate_is_sorted_by_descending_severity(rules in rule_set_strategy(), text in ".*") {
        let engine = RuleEngine::new();
        engine.load_rules(rules);
        let matches = engine.evaluate(&text);
        for pair in matches.windows(2) {
            prop_assert!(pair[0].severity >= pair[1].severity, "evaluate output is not sorted by descending severity");
        }
    }

    #[test]
    fn quick_check_should_block_matches_evaluate_semantics(rules in rule_set_strategy(), text in ".*") {
        let engine = RuleEngine::new();
        engine.load_rules(rules);
        let verdict = engine.quick_check(&text);
        let matches = engine.evaluate(&text);
        let expected = matches.iter().any(|m| {
            matches!(m.action, RuleAction::Block | RuleAction::Canary)
                || (m.action == RuleAction::Escalate && m.severity >= Severity::High)
        });
        prop_assert_eq!(verdict.should_block, expected);
    }

    #[test]
    fn evaluate_is_deterministic_for_the_same_text_and_rule_set(rules in rule_set_strategy(), text in ".*") {
        let engine = RuleEngine::new();
        engine.load_rules(rules);
        let first = engine.evaluate(&text);
        let second = engine.evaluate(&text);
        prop_assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            prop_assert_eq!(a.rule_id.as_str(), b.rule_id.as_str());
        }
    }
}
