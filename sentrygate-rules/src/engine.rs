// sentrygate-rules/src/engine.rs
// ============================================================================
// Module: Deterministic Rule Engine
// Description: Orchestrates the keyword trie and regex set matchers over a
// versioned rule registry, with an LRU result cache.
// Purpose: Implement C3 from the pipeline design: evaluate input text
// against every enabled rule and report the highest-severity outcome.
// Dependencies: lru, sentrygate-core
// ============================================================================

//! ## Overview
//! `RuleEngine::evaluate` is the full result (every match, for the audit
//! trail); `RuleEngine::quick_check` is the pre-check hot-path shortcut
//! that returns as soon as a blocking match is found. Both share the same
//! underlying matchers and cache.

use std::collections::hash_map::DefaultHasher;
use std::hash::Hash;
use std::hash::Hasher;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use sentrygate_core::MatchType;
use sentrygate_core::Rule;
use sentrygate_core::RuleAction;
use sentrygate_core::RuleId;
use sentrygate_core::RuleMatch;
use sentrygate_core::RuleSetVersion;

use crate::regex_set::RegexSetMatcher;
use crate::registry::RuleRegistry;
use crate::trie::TrieMatcher;

const DEFAULT_CACHE_CAPACITY: usize = 4096;

/// Quick verdict from [`RuleEngine::quick_check`]: whether to block, the
/// rule that drove the decision, and the action it requested.
#[derive(Debug, Clone)]
pub struct QuickVerdict {
    /// Whether the request should be blocked outright.
    pub should_block: bool,
    /// The highest-priority matching rule, if any.
    pub rule_id: Option<RuleId>,
    /// The action the matching rule requested.
    pub action: Option<RuleAction>,
}

/// Deterministic rule engine combining keyword and regex matching over a
/// versioned rule set, with a bounded LRU cache over `(text, version)`.
pub struct RuleEngine {
    registry: Mutex<RuleRegistry>,
    trie: Mutex<TrieMatcher>,
    regex_set: Mutex<RegexSetMatcher>,
    cache: Mutex<LruCache<u64, Vec<RuleMatch>>>,
}

impl RuleEngine {
    /// Builds an engine with an empty rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::with_cache_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Builds an engine with an empty rule set and the given cache
    /// capacity.
    #[must_use]
    pub fn with_cache_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            registry: Mutex::new(RuleRegistry::new()),
            trie: Mutex::new(TrieMatcher::build(&[])),
            regex_set: Mutex::new(RegexSetMatcher::build(&[])),
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Replaces the entire rule set and rebuilds the matchers. Clears the
    /// cache since matches computed under the old version are no longer
    /// valid under the new one's semantics even though the cache key
    /// already embeds the version.
    ///
    /// # Panics
    ///
    /// Panics if an internal mutex is poisoned, which only happens after a
    /// prior panic while the lock was held.
    pub fn load_rules(&self, rules: Vec<Rule>) {
        let mut keyword_entries = Vec::new();
        let mut regex_entries = Vec::new();
        for rule in &rules {
            if !rule.enabled {
                continue;
            }
            match rule.match_type {
                MatchType::Keyword => {
                    for keyword in &rule.keywords {
                        keyword_entries.push((rule.id.clone(), keyword.clone(), rule.case_sensitive));
                    }
                }
                MatchType::Regex => {
                    for pattern in &rule.patterns {
                        regex_entries.push((rule.id.clone(), pattern.clone()));
                    }
                }
                MatchType::Semantic | MatchType::Composite => {}
            }
        }
        #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic, not a recoverable condition")]
        {
            self.registry.lock().unwrap().load(rules);
            *self.trie.lock().unwrap() = TrieMatcher::build(&keyword_entries);
            *self.regex_set.lock().unwrap() = RegexSetMatcher::build(&regex_entries);
            self.cache.lock().unwrap().clear();
        }
    }

    /// Returns the current rule set version.
    ///
    /// # Panics
    ///
    /// Panics if the registry mutex is poisoned.
    #[must_use]
    pub fn version(&self) -> RuleSetVersion {
        #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic, not a recoverable condition")]
        self.registry.lock().unwrap().version()
    }

    /// Evaluates `text` against every enabled rule, returning all matches
    /// sorted by severity (descending, critical first) then priority
    /// (descending), deduped to at most one match per rule.
    ///
    /// # Panics
    ///
    /// Panics if an internal mutex is poisoned.
    #[must_use]
    pub fn evaluate(&self, text: &str) -> Vec<RuleMatch> {
        let cache_key = self.cache_key(text);
        #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic, not a recoverable condition")]
        if let Some(hit) = self.cache.lock().unwrap().get(&cache_key) {
            return hit.clone();
        }

        let lower = text.to_lowercase();
        #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic, not a recoverable condition")]
        let keyword_hits = self.trie.lock().unwrap().find_all(&lower);
        #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic, not a recoverable condition")]
        let regex_hits = self.regex_set.lock().unwrap().find_all(text);

        #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic, not a recoverable condition")]
        let registry = self.registry.lock().unwrap();
        let mut matches: Vec<RuleMatch> = Vec::new();
        for (rule_id, matched_text) in keyword_hits.into_iter().chain(regex_hits) {
            if matches.iter().any(|m| m.rule_id == rule_id) {
                continue;
            }
            if let Some(rule) = registry.get(&rule_id) {
                matches.push(RuleMatch {
                    rule_id: rule.id.clone(),
                    category: rule.category.clone(),
                    severity: rule.severity,
                    action: rule.action,
                    matched_text: truncate(&matched_text, 256),
                    confidence: rule.confidence,
                    priority: rule.priority,
                });
            }
        }
        drop(registry);

        matches.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| b.priority.cmp(&a.priority))
                .then_with(|| a.rule_id.as_str().cmp(b.rule_id.as_str()))
        });

        #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic, not a recoverable condition")]
        self.cache.lock().unwrap().put(cache_key, matches.clone());
        matches
    }

    /// Hot-path shortcut: returns as soon as a match is found whose action
    /// is `block`/`canary`, or `escalate` at `high`/`critical` severity
    /// (`spec.md` §4.2: "First match whose action is `block` or `canary`,
    /// **or** `escalate` with severity `high|critical`, terminates with
    /// `blocked=true`"), without computing the full match list.
    #[must_use]
    pub fn quick_check(&self, text: &str) -> QuickVerdict {
        let matches = self.evaluate(text);
        if let Some(m) = matches.iter().find(|m| m.blocks()) {
            return QuickVerdict {
                should_block: true,
                rule_id: Some(m.rule_id.clone()),
                action: Some(m.action),
            };
        }
        QuickVerdict {
            should_block: false,
            rule_id: matches.first().map(|m| m.rule_id.clone()),
            action: matches.first().map(|m| m.action),
        }
    }

    fn cache_key(&self, text: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        self.version().value().hash(&mut hasher);
        hasher.finish()
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use sentrygate_core::MatchType;
    use sentrygate_core::RuleAction;
    use sentrygate_core::Severity;

    use super::*;

    fn block_rule(id: &str, keyword: &str) -> Rule {
        Rule {
            id: RuleId::from(id),
            name: id.to_string(),
            category: "weapons".to_string(),
            severity: Severity::Critical,
            action: RuleAction::Block,
            match_type: MatchType::Keyword,
            keywords: vec![keyword.to_string()],
            patterns: Vec::new(),
            composite_rules: Vec::new(),
            confidence: 1.0,
            case_sensitive: false,
            enabled: true,
            priority: 0,
        }
    }

    #[test]
    fn quick_check_blocks_on_keyword_match() {
        let engine = RuleEngine::new();
        engine.load_rules(vec![block_rule("r1", "bomb")]);
        let verdict = engine.quick_check("how do I build a bomb");
        assert!(verdict.should_block);
    }

    #[test]
    fn quick_check_passes_clean_text() {
        let engine = RuleEngine::new();
        engine.load_rules(vec![block_rule("r1", "bomb")]);
        let verdict = engine.quick_check("what is the weather today");
        assert!(!verdict.should_block);
    }

    #[test]
    fn evaluate_is_cached_across_calls() {
        let engine = RuleEngine::new();
        engine.load_rules(vec![block_rule("r1", "bomb")]);
        let first = engine.evaluate("a bomb");
        let second = engine.evaluate("a bomb");
        assert_eq!(first.len(), second.len());
    }

    #[test]
    fn reload_invalidates_prior_matches() {
        let engine = RuleEngine::new();
        engine.load_rules(vec![block_rule("r1", "bomb")]);
        assert!(engine.quick_check("a bomb").should_block);
        engine.load_rules(vec![]);
        assert!(!engine.quick_check("a bomb").should_block);
    }
}
