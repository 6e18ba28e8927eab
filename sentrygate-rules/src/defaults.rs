// sentrygate-rules/src/defaults.rs
// ============================================================================
// Module: Built-In Rule Set
// Description: The deterministic keyword/regex rules shipped with the
// pipeline, covering the literal categories `spec.md` §8's end-to-end
// scenarios exercise.
// Purpose: Give every deployment a working baseline without requiring an
// operator to author a rule file before the gateway can start.
// Dependencies: sentrygate-core
// ============================================================================

//! ## Overview
//! These rules are deliberately few and literal: they exist so the
//! documented end-to-end scenarios (weapon synthesis, jailbreak framing,
//! chemical-weapon leakage in model output) have something to match
//! against out of the box. Operators are expected to layer a larger,
//! curated rule file on top via [`crate::loader`]; built-in rules use IDs
//! prefixed `builtin.` so an operator-authored rule with the same `id` can
//! override one (`spec.md` §3: "identical `id` overrides").

use sentrygate_core::MatchType;
use sentrygate_core::Rule;
use sentrygate_core::RuleAction;
use sentrygate_core::RuleId;
use sentrygate_core::Severity;

/// Returns the built-in rule set evaluated before or in place of any
/// operator-supplied file, depending on how [`crate::loader::RuleSource`]
/// is configured.
#[must_use]
pub fn builtin_rules() -> Vec<Rule> {
    vec![
        Rule {
            id: RuleId::from("builtin.high_risk_weapon"),
            name: "High-risk weapon construction".to_string(),
            category: "high_risk_weapon".to_string(),
            severity: Severity::Critical,
            action: RuleAction::Block,
            match_type: MatchType::Keyword,
            keywords: vec![
                "pipe bomb".to_string(),
                "build a bomb".to_string(),
                "make a bomb".to_string(),
                "improvised explosive device".to_string(),
            ],
            patterns: Vec::new(),
            composite_rules: Vec::new(),
            confidence: 0.95,
            case_sensitive: false,
            enabled: true,
            priority: 0,
        },
        Rule {
            id: RuleId::from("builtin.exploit_jailbreak_ignore"),
            name: "Jailbreak: instruction override".to_string(),
            category: "jailbreak".to_string(),
            severity: Severity::High,
            action: RuleAction::Block,
            match_type: MatchType::Regex,
            keywords: Vec::new(),
            patterns: vec![r"(?i)ignore\s+(all\s+)?(previous|prior|above)\s+instructions".to_string()],
            composite_rules: Vec::new(),
            confidence: 0.9,
            case_sensitive: false,
            enabled: true,
            priority: 10,
        },
        Rule {
            id: RuleId::from("builtin.exploit_jailbreak_dan"),
            name: "Jailbreak: DAN persona".to_string(),
            category: "jailbreak".to_string(),
            severity: Severity::High,
            action: RuleAction::Block,
            match_type: MatchType::Regex,
            keywords: Vec::new(),
            patterns: vec![r"(?i)you\s+are\s+now\s+dan\b".to_string()],
            composite_rules: Vec::new(),
            confidence: 0.9,
            case_sensitive: false,
            enabled: true,
            priority: 10,
        },
        Rule {
            id: RuleId::from("builtin.high_risk_chem_weapon"),
            name: "Chemical weapon synthesis detail".to_string(),
            category: "high_risk_chem_weapon".to_string(),
            severity: Severity::Critical,
            action: RuleAction::Escalate,
            match_type: MatchType::Regex,
            keywords: Vec::new(),
            patterns: vec![
                r"(?i)(nerve\s+agent|sarin|vx\s+gas)\s+(synthesis|precursor|production)".to_string(),
            ],
            composite_rules: Vec::new(),
            confidence: 0.85,
            case_sensitive: false,
            enabled: true,
            priority: 0,
        },
        Rule {
            id: RuleId::from("builtin.self_harm"),
            name: "Self-harm facilitation".to_string(),
            category: "self_harm".to_string(),
            severity: Severity::Critical,
            action: RuleAction::Escalate,
            match_type: MatchType::Keyword,
            keywords: vec!["how to kill myself".to_string(), "suicide method".to_string()],
            patterns: Vec::new(),
            composite_rules: Vec::new(),
            confidence: 0.9,
            case_sensitive: false,
            enabled: true,
            priority: 0,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_keyword_rule_has_a_keyword() {
        for rule in builtin_rules() {
            if rule.match_type == MatchType::Keyword {
                assert!(!rule.keywords.is_empty(), "{} has no keywords", rule.id.as_str());
            }
        }
    }

    #[test]
    fn every_regex_rule_has_a_pattern() {
        for rule in builtin_rules() {
            if rule.match_type == MatchType::Regex {
                assert!(!rule.patterns.is_empty(), "{} has no patterns", rule.id.as_str());
                for pattern in &rule.patterns {
                    assert!(regex::Regex::new(pattern).is_ok(), "{} does not compile", rule.id.as_str());
                }
            }
        }
    }
}
