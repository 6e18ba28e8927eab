// sentrygate-rules/src/registry.rs
// ============================================================================
// Module: Rule Registry
// Description: In-memory index over the currently loaded rule set.
// Purpose: Serve category/severity/enabled lookups without re-scanning the
// full rule list, and track the version used as the engine's cache key.
// Dependencies: sentrygate-core
// ============================================================================

//! ## Overview
//! The registry owns the authoritative list of rules and a monotonically
//! increasing [`RuleSetVersion`]. `register`/`unregister` bump the version;
//! the engine's match cache is keyed partly on this version so a reload
//! never serves a stale verdict.

use std::collections::HashMap;

use sentrygate_core::Rule;
use sentrygate_core::RuleId;
use sentrygate_core::RuleSetVersion;

/// In-memory index over a loaded rule set.
#[derive(Default)]
pub struct RuleRegistry {
    rules: HashMap<RuleId, Rule>,
    version: RuleSetVersion,
}

impl RuleRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: HashMap::new(),
            version: RuleSetVersion::initial(),
        }
    }

    /// Replaces the entire rule set, bumping the version.
    pub fn load(&mut self, rules: Vec<Rule>) {
        self.rules = rules.into_iter().map(|r| (r.id.clone(), r)).collect();
        self.version = self.version.next();
    }

    /// Registers or replaces a single rule, bumping the version.
    pub fn register(&mut self, rule: Rule) {
        self.rules.insert(rule.id.clone(), rule);
        self.version = self.version.next();
    }

    /// Removes a rule by id, bumping the version if it was present.
    pub fn unregister(&mut self, rule_id: &RuleId) {
        if self.rules.remove(rule_id).is_some() {
            self.version = self.version.next();
        }
    }

    /// Returns the current rule set version.
    #[must_use]
    pub fn version(&self) -> RuleSetVersion {
        self.version
    }

    /// Returns every currently enabled rule.
    #[must_use]
    pub fn enabled(&self) -> Vec<&Rule> {
        self.rules.values().filter(|r| r.enabled).collect()
    }

    /// Returns a rule by id.
    #[must_use]
    pub fn get(&self, rule_id: &RuleId) -> Option<&Rule> {
        self.rules.get(rule_id)
    }

    /// Returns the total number of registered rules, enabled or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns whether the registry has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use sentrygate_core::MatchType;
    use sentrygate_core::RuleAction;
    use sentrygate_core::Severity;

    use super::*;

    fn rule(id: &str) -> Rule {
        Rule {
            id: RuleId::from(id),
            name: id.to_string(),
            category: "test".to_string(),
            severity: Severity::Low,
            action: RuleAction::Log,
            match_type: MatchType::Keyword,
            keywords: vec!["x".to_string()],
            patterns: Vec::new(),
            composite_rules: Vec::new(),
            confidence: 1.0,
            case_sensitive: false,
            enabled: true,
            priority: 0,
        }
    }

    #[test]
    fn registering_bumps_version() {
        let mut registry = RuleRegistry::new();
        let v0 = registry.version();
        registry.register(rule("r1"));
        assert!(registry.version() > v0);
    }

    #[test]
    fn unregistering_absent_rule_does_not_bump_version() {
        let mut registry = RuleRegistry::new();
        let v0 = registry.version();
        registry.unregister(&RuleId::from("missing"));
        assert_eq!(registry.version(), v0);
    }
}
