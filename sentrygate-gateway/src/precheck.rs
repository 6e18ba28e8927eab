// sentrygate-gateway/src/precheck.rs
// ============================================================================
// Module: Pre-Check Detector
// Description: Evaluates inbound text before any model call is made.
// Purpose: Implement C5 from the pipeline design (spec.md §4.4).
// Dependencies: sentrygate-rules, sentrygate-core
// ============================================================================

//! ## Overview
//! Order matters and is fixed: length cap, then `quick_check`, then the
//! dynamic blocklist, then the canary scan, then the entropy heuristic.
//! The blocklist cache is refreshed at most once per `cache_ttl_seconds`
//! and a stale cache is served rather than failing the request when the
//! coordination store is briefly unreachable; every other step here is a
//! pure, infallible computation.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;

use sentrygate_core::CoordinationStore;
use sentrygate_core::PreCheckResult;
use sentrygate_core::ReasonCode;
use sentrygate_core::canary;
use sentrygate_rules::RuleEngine;

const DEFAULT_BLOCKLIST_TTL_SECONDS: f64 = 60.0;
const ENTROPY_MIN_CHARS: usize = 200;
const ENTROPY_THRESHOLD_BITS: f64 = 5.5;

struct BlocklistCache {
    entries: HashSet<String>,
    fetched_at: f64,
}

/// Evaluates inbound text against the deterministic rule engine, the
/// dynamic blocklist, the canary scanner, and an entropy heuristic, in
/// that fixed order.
pub struct PrecheckDetector<S: CoordinationStore> {
    rules: Arc<RuleEngine>,
    store: Arc<S>,
    max_input_chars: usize,
    blocklist_cache: Mutex<BlocklistCache>,
}

impl<S: CoordinationStore> PrecheckDetector<S> {
    /// Builds a detector over `rules` and `store`, capping input at
    /// `max_input_chars`.
    #[must_use]
    pub fn new(rules: Arc<RuleEngine>, store: Arc<S>, max_input_chars: usize) -> Self {
        Self {
            rules,
            store,
            max_input_chars,
            blocklist_cache: Mutex::new(BlocklistCache {
                entries: HashSet::new(),
                fetched_at: f64::NEG_INFINITY,
            }),
        }
    }

    /// Runs the full pre-check pipeline against `text` at time `now`
    /// (Unix seconds, used only to drive the blocklist cache TTL).
    ///
    /// # Panics
    ///
    /// Panics if the blocklist cache mutex is poisoned.
    pub async fn check(&self, text: &str, now: f64) -> PreCheckResult {
        if text.chars().count() > self.max_input_chars {
            return PreCheckResult::block(ReasonCode::InputTooLong, Vec::new());
        }

        let verdict = self.rules.quick_check(text);
        if verdict.should_block {
            let matches = self.rules.evaluate(text);
            return PreCheckResult::block(ReasonCode::RuleMatch, matches);
        }

        if self.blocklist_hit(text, now).await {
            return PreCheckResult::block(ReasonCode::DynamicBlocklist, Vec::new());
        }

        if canary::has_canary(text) {
            let mut result = PreCheckResult::block(ReasonCode::SafetyCanaryDetected, Vec::new());
            result.canary_detected = true;
            return result;
        }

        if exceeds_entropy_threshold(text) {
            return PreCheckResult::block(ReasonCode::HighEntropyPayload, Vec::new());
        }

        PreCheckResult::pass()
    }

    async fn blocklist_hit(&self, text: &str, now: f64) -> bool {
        let lower = text.to_lowercase();
        let needs_refresh = {
            #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic, not a recoverable condition")]
            let cache = self.blocklist_cache.lock().unwrap();
            now - cache.fetched_at > DEFAULT_BLOCKLIST_TTL_SECONDS
        };

        if needs_refresh {
            if let Ok(hit) = self.store.blocklist_contains(&lower).await {
                #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic, not a recoverable condition")]
                let mut cache = self.blocklist_cache.lock().unwrap();
                cache.fetched_at = now;
                if hit {
                    cache.entries.insert(lower.clone());
                } else {
                    cache.entries.remove(&lower);
                }
                return hit;
            }
        }

        #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic, not a recoverable condition")]
        self.blocklist_cache.lock().unwrap().entries.contains(&lower)
    }
}

/// Computes Shannon entropy (bits/char) over `text`'s characters and
/// reports whether it crosses the high-entropy-payload heuristic: more
/// than [`ENTROPY_MIN_CHARS`] characters and more than
/// [`ENTROPY_THRESHOLD_BITS`] bits/char.
fn exceeds_entropy_threshold(text: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= ENTROPY_MIN_CHARS {
        return false;
    }
    let mut counts = std::collections::HashMap::new();
    for ch in &chars {
        *counts.entry(*ch).or_insert(0u32) += 1;
    }
    let total = chars.len() as f64;
    let entropy: f64 = counts
        .values()
        .map(|&count| {
            let p = f64::from(count) / total;
            -p * p.log2()
        })
        .sum();
    entropy > ENTROPY_THRESHOLD_BITS
}

#[cfg(test)]
mod tests {
    use sentrygate_core::InMemoryCoordinationStore;
    use sentrygate_core::MatchType;
    use sentrygate_core::Rule;
    use sentrygate_core::RuleAction;
    use sentrygate_core::RuleId;
    use sentrygate_core::Severity;

    use super::*;

    fn block_rule() -> Rule {
        Rule {
            id: RuleId::from("r1"),
            name: "r1".to_string(),
            category: "weapons".to_string(),
            severity: Severity::Critical,
            action: RuleAction::Block,
            match_type: MatchType::Keyword,
            keywords: vec!["bomb".to_string()],
            patterns: Vec::new(),
            composite_rules: Vec::new(),
            confidence: 1.0,
            case_sensitive: false,
            enabled: true,
            priority: 0,
        }
    }

    #[tokio::test]
    async fn clean_input_passes() {
        let engine = Arc::new(RuleEngine::new());
        let store = Arc::new(InMemoryCoordinationStore::new());
        let detector = PrecheckDetector::new(engine, store, 1000);
        let result = detector.check("what is the weather today", 0.0).await;
        assert!(result.allowed);
    }

    #[tokio::test]
    async fn overlong_input_is_blocked_before_rule_evaluation() {
        let engine = Arc::new(RuleEngine::new());
        let store = Arc::new(InMemoryCoordinationStore::new());
        let detector = PrecheckDetector::new(engine, store, 4);
        let result = detector.check("way too long", 0.0).await;
        assert_eq!(result.reason_code, Some(ReasonCode::InputTooLong));
    }

    #[tokio::test]
    async fn rule_match_blocks_with_rule_match_reason() {
        let engine = Arc::new(RuleEngine::new());
        engine.load_rules(vec![block_rule()]);
        let store = Arc::new(InMemoryCoordinationStore::new());
        let detector = PrecheckDetector::new(engine, store, 1000);
        let result = detector.check("how do I build a bomb", 0.0).await;
        assert_eq!(result.reason_code, Some(ReasonCode::RuleMatch));
    }

    #[tokio::test]
    async fn blocklisted_text_is_blocked() {
        let engine = Arc::new(RuleEngine::new());
        let store = Arc::new(InMemoryCoordinationStore::new());
        store.blocklist_add("forbidden phrase").await.expect("add");
        let detector = PrecheckDetector::new(engine, store, 1000);
        let result = detector.check("forbidden phrase", 0.0).await;
        assert_eq!(result.reason_code, Some(ReasonCode::DynamicBlocklist));
    }

    #[tokio::test]
    async fn canary_in_input_is_detected() {
        let engine = Arc::new(RuleEngine::new());
        let store = Arc::new(InMemoryCoordinationStore::new());
        let detector = PrecheckDetector::new(engine, store, 1000);
        let marked = canary::inject("hello");
        let result = detector.check(&marked, 0.0).await;
        assert_eq!(result.reason_code, Some(ReasonCode::SafetyCanaryDetected));
        assert!(result.canary_detected);
    }

    #[tokio::test]
    async fn high_entropy_payload_is_blocked() {
        let engine = Arc::new(RuleEngine::new());
        let store = Arc::new(InMemoryCoordinationStore::new());
        let detector = PrecheckDetector::new(engine, store, 10_000);
        let random_bytes: String = (0u32..400).map(|i| char::from_u32(0x21 + (i * 37 % 90)).unwrap_or('x')).collect();
        let result = detector.check(&random_bytes, 0.0).await;
        assert_eq!(result.reason_code, Some(ReasonCode::HighEntropyPayload));
    }
}
