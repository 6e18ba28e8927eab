// sentrygate-rules/src/regex_set.rs
// ============================================================================
// Module: Regex Set Matcher
// Description: Compiled-regex-per-rule matcher for pattern-based rules.
// Purpose: Evaluate every enabled regex rule against input text, reporting
// which rule(s) fired and the literal matched substring.
// Dependencies: regex
// ============================================================================

//! ## Overview
//! Unlike the keyword trie, regex rules keep one compiled [`regex::Regex`]
//! per pattern rather than a single combined automaton: Rust's `regex`
//! crate does not expose a cheap "which alternative matched" API across an
//! arbitrarily large alternation, and safety rule sets are small enough
//! (tens, not millions, of patterns) that a linear scan over compiled
//! regexes is fast enough for the pre-check hot path.

use regex::Regex;
use sentrygate_core::RuleId;

struct CompiledPattern {
    rule_id: RuleId,
    regex: Regex,
}

/// Compiled regex matcher over every enabled regex rule in a rule set.
#[derive(Default)]
pub struct RegexSetMatcher {
    patterns: Vec<CompiledPattern>,
}

impl RegexSetMatcher {
    /// Builds a matcher from `(rule_id, pattern)` pairs. Patterns that fail
    /// to compile are skipped rather than failing the whole build, since a
    /// single malformed rule should not take down the entire engine; the
    /// caller is expected to have validated rules at load time.
    #[must_use]
    pub fn build(entries: &[(RuleId, String)]) -> Self {
        let mut patterns = Vec::with_capacity(entries.len());
        for (rule_id, pattern) in entries {
            if let Ok(regex) = Regex::new(pattern) {
                patterns.push(CompiledPattern {
                    rule_id: rule_id.clone(),
                    regex,
                });
            }
        }
        Self { patterns }
    }

    /// Returns every `(rule_id, matched_text)` pair found in `text`.
    #[must_use]
    pub fn find_all(&self, text: &str) -> Vec<(RuleId, String)> {
        let mut out = Vec::new();
        for pattern in &self.patterns {
            if let Some(m) = pattern.regex.find(text) {
                out.push((pattern.rule_id.clone(), m.as_str().to_string()));
            }
        }
        out
    }

    /// Returns whether the matcher has no registered patterns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_regex_match() {
        let entries = vec![(RuleId::from("r1"), r"\d{3}-\d{2}-\d{4}".to_string())];
        let matcher = RegexSetMatcher::build(&entries);
        let hits = matcher.find_all("my ssn is 123-45-6789 ok");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].1, "123-45-6789");
    }

    #[test]
    fn malformed_pattern_is_skipped_not_fatal() {
        let entries = vec![(RuleId::from("r1"), "(".to_string())];
        let matcher = RegexSetMatcher::build(&entries);
        assert!(matcher.is_empty());
    }
}
