// sentrygate-rules/src/trie.rs
// ============================================================================
// Module: Keyword Trie Matcher
// Description: Aho-Corasick-backed multi-pattern keyword matcher.
// Purpose: Match every enabled keyword rule against input text in a single
// linear pass instead of one substring search per rule.
// Dependencies: aho-corasick
// ============================================================================

//! ## Overview
//! Each enabled [`sentrygate_core::Rule`] with [`sentrygate_core::MatchType::Keyword`]
//! contributes its keyword list to one compiled automaton. A rebuild is
//! required whenever the rule set changes; the automaton itself is
//! immutable once built, so concurrent lookups never block each other.

use std::collections::HashMap;

use aho_corasick::AhoCorasick;
use aho_corasick::AhoCorasickBuilder;
use aho_corasick::MatchKind;
use sentrygate_core::RuleId;

/// Compiled keyword matcher over every enabled keyword rule in a rule set.
pub struct TrieMatcher {
    automaton: Option<AhoCorasick>,
    /// Maps automaton pattern index to the owning rule and the literal
    /// keyword that was registered.
    pattern_owners: Vec<(RuleId, String)>,
}

impl TrieMatcher {
    /// Builds a matcher from `(rule_id, keyword, case_sensitive)` triples.
    /// Case-insensitive keywords are folded before being added to the
    /// automaton; the automaton itself is always built case-sensitively
    /// for speed, matching against already-folded input.
    #[must_use]
    pub fn build(entries: &[(RuleId, String, bool)]) -> Self {
        if entries.is_empty() {
            return Self {
                automaton: None,
                pattern_owners: Vec::new(),
            };
        }
        let mut patterns = Vec::with_capacity(entries.len());
        let mut pattern_owners = Vec::with_capacity(entries.len());
        for (rule_id, keyword, case_sensitive) in entries {
            let needle = if *case_sensitive {
                keyword.clone()
            } else {
                keyword.to_lowercase()
            };
            patterns.push(needle);
            pattern_owners.push((rule_id.clone(), keyword.clone()));
        }
        let automaton = AhoCorasickBuilder::new()
            .match_kind(MatchKind::LeftmostLongest)
            .ascii_case_insensitive(false)
            .build(&patterns)
            .ok();
        Self {
            automaton,
            pattern_owners,
        }
    }

    /// Returns every `(rule_id, matched_keyword)` pair found in `text`.
    /// Callers are responsible for case-folding `text` the same way the
    /// corresponding rule's keywords were folded at build time; rules
    /// mixing case sensitivities should be split across two matchers.
    #[must_use]
    pub fn find_all(&self, text: &str) -> Vec<(RuleId, String)> {
        let Some(automaton) = &self.automaton else {
            return Vec::new();
        };
        let mut seen: HashMap<usize, ()> = HashMap::new();
        let mut out = Vec::new();
        for m in automaton.find_iter(text) {
            let idx = m.pattern().as_usize();
            if seen.insert(idx, ()).is_none() {
                if let Some(owner) = self.pattern_owners.get(idx) {
                    out.push(owner.clone());
                }
            }
        }
        out
    }

    /// Returns whether the matcher has no registered patterns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.automaton.is_none()
    }
}
