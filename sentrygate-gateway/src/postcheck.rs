// sentrygate-gateway/src/postcheck.rs
// ============================================================================
// Module: Post-Check Detector
// Description: Evaluates model output before it is released to the caller.
// Purpose: Implement C7 from the pipeline design (spec.md §4.6).
// Dependencies: regex, sentrygate-core
// ============================================================================

//! ## Overview
//! Order is fixed: regex heuristics over the output text first, then an
//! optional ML classifier call, then an optional input/output coherence
//! cross-check. Any step here that raises an unexpected error is treated
//! as a flag (`DETECTOR_ERROR`), never as a silent pass, per `spec.md`
//! §4.6 ("any internal exception -> DETECTOR_ERROR fail-closed").

use regex::RegexSet;
use sentrygate_core::ReasonCode;
use sentrygate_core::Severity;

const DEFAULT_FLAG_THRESHOLD: f64 = 0.65;

/// Outcome of a post-check evaluation.
#[derive(Debug, Clone)]
pub struct PostCheckResult {
    /// Whether the output was flagged; flagged output is never released.
    pub flagged: bool,
    /// Reason code explaining the flag, if any.
    pub reason_code: Option<ReasonCode>,
    /// Severity assigned to the flag, if any.
    pub severity: Option<Severity>,
    /// Free-text evidence describing what matched, for the audit trail.
    pub evidence: Option<String>,
}

impl PostCheckResult {
    /// Builds the trivial "nothing flagged, release" result.
    #[must_use]
    pub fn pass() -> Self {
        Self {
            flagged: false,
            reason_code: None,
            severity: None,
            evidence: None,
        }
    }

    /// Builds a flagged result.
    #[must_use]
    pub fn flag(reason_code: ReasonCode, severity: Severity, evidence: impl Into<String>) -> Self {
        Self {
            flagged: true,
            reason_code: Some(reason_code),
            severity: Some(severity),
            evidence: Some(evidence.into()),
        }
    }
}

/// Label a single-inference classifier assigns to a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierLabel {
    /// The classifier judged the output safe.
    Safe,
    /// The classifier judged the output unsafe.
    Unsafe,
}

/// A single-inference classifier result, matching `spec.md` §4.6's
/// `{score, label, confidence}` shape.
#[derive(Debug, Clone)]
pub struct ClassifierVerdict {
    /// Score in `[0, 1]`; higher means more confidently unsafe.
    pub score: f64,
    /// The classifier's categorical label.
    pub label: ClassifierLabel,
}

/// Optional single-inference output classifier, matching `spec.md` §4.6
/// step 2.
#[async_trait::async_trait]
pub trait OutputClassifier: Send + Sync {
    /// Classifies `text`, returning an error only on a genuine transport
    /// failure; callers treat that as a flag, not a pass.
    async fn classify(&self, text: &str) -> Result<ClassifierVerdict, String>;
}

/// Regex-based heuristics plus an optional classifier and coherence
/// cross-check, matching `spec.md` §4.6's ordered pipeline.
pub struct PostcheckDetector {
    heuristics: RegexSet,
    heuristic_reasons: Vec<&'static str>,
    classifier: Option<Box<dyn OutputClassifier>>,
    flag_threshold: f64,
    coherence_enabled: bool,
}

impl PostcheckDetector {
    /// Builds a detector with the built-in domain-specific leakage
    /// heuristics (synthesis steps, malware scaffolding, PII shapes).
    ///
    /// # Panics
    ///
    /// Panics if the built-in regex patterns fail to compile, which would
    /// indicate a bug in this module, not an environmental condition.
    #[must_use]
    pub fn new(classifier: Option<Box<dyn OutputClassifier>>, coherence_enabled: bool) -> Self {
        let patterns = [
            r"(?i)step\s*\d+[:.]?\s*(combine|mix|heat|synthesi[sz]e)",
            r"(?i)(payload|shellcode|exploit)\s*(generation|injection|delivery)",
            r"\b\d{3}-\d{2}-\d{4}\b",
            r"\b(?:\d[ -]*?){13,19}\b",
        ];
        #[allow(clippy::unwrap_used, reason = "built-in patterns are a fixed, tested constant")]
        let heuristics = RegexSet::new(patterns).unwrap();
        Self {
            heuristics,
            heuristic_reasons: vec!["synthesis_steps", "malware_scaffolding", "pii_ssn_shape", "pii_card_shape"],
            classifier,
            flag_threshold: DEFAULT_FLAG_THRESHOLD,
            coherence_enabled,
        }
    }

    /// Overrides the classifier flag threshold (default `0.65`).
    #[must_use]
    pub fn with_flag_threshold(mut self, threshold: f64) -> Self {
        self.flag_threshold = threshold;
        self
    }

    /// Evaluates `output_text` produced for `input_text`, whose pre-check
    /// outcome is summarized by `input_was_safe`.
    pub async fn check(&self, input_text: &str, output_text: &str, input_was_safe: bool) -> PostCheckResult {
        let matches = self.heuristics.matches(output_text);
        if let Some(index) = matches.iter().next() {
            let reason = self.heuristic_reasons.get(index).copied().unwrap_or("heuristic_match");
            return PostCheckResult::flag(ReasonCode::HeuristicOutputUnsafe, Severity::High, reason);
        }

        if let Some(classifier) = &self.classifier {
            match classifier.classify(output_text).await {
                Ok(verdict) if verdict.label == ClassifierLabel::Unsafe && verdict.score >= self.flag_threshold => {
                    return PostCheckResult::flag(
                        ReasonCode::HeuristicOutputUnsafe,
                        Severity::High,
                        format!("classifier_score={:.2}", verdict.score),
                    );
                }
                Ok(_) => {}
                Err(_) => {
                    return PostCheckResult::flag(ReasonCode::DetectorError, Severity::Medium, "classifier_unreachable");
                }
            }
        }

        if self.coherence_enabled && input_was_safe && is_borderline(output_text) {
            return PostCheckResult::flag(ReasonCode::OutputCoherenceMismatch, Severity::Medium, "input_safe_output_borderline");
        }

        let _ = input_text;
        PostCheckResult::pass()
    }
}

/// Cheap coherence proxy: output that is empty, or overwhelmingly
/// non-alphanumeric, is treated as borderline when the input was clean,
/// since a safety-trained model producing such output for a safe prompt
/// is itself an anomaly worth a human look.
fn is_borderline(text: &str) -> bool {
    if text.trim().is_empty() {
        return true;
    }
    let total = text.chars().count();
    let alnum = text.chars().filter(|ch| ch.is_alphanumeric() || ch.is_whitespace()).count();
    (alnum as f64) / (total as f64) < 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubClassifier {
        verdict: ClassifierVerdict,
    }

    #[async_trait::async_trait]
    impl OutputClassifier for StubClassifier {
        async fn classify(&self, _text: &str) -> Result<ClassifierVerdict, String> {
            Ok(self.verdict.clone())
        }
    }

    #[tokio::test]
    async fn clean_output_passes() {
        let detector = PostcheckDetector::new(None, false);
        let result = detector.check("hello", "the weather today is mild", true).await;
        assert!(!result.flagged);
    }

    #[tokio::test]
    async fn synthesis_steps_are_flagged() {
        let detector = PostcheckDetector::new(None, false);
        let result = detector.check("q", "Step 1: combine the reagents slowly", true).await;
        assert!(result.flagged);
        assert_eq!(result.reason_code, Some(ReasonCode::HeuristicOutputUnsafe));
    }

    #[tokio::test]
    async fn ssn_shape_is_flagged() {
        let detector = PostcheckDetector::new(None, false);
        let result = detector.check("q", "here is the record: 123-45-6789", true).await;
        assert!(result.flagged);
    }

    #[tokio::test]
    async fn classifier_unsafe_verdict_above_threshold_flags() {
        let classifier = StubClassifier {
            verdict: ClassifierVerdict { score: 0.9, label: ClassifierLabel::Unsafe },
        };
        let detector = PostcheckDetector::new(Some(Box::new(classifier)), false);
        let result = detector.check("q", "a perfectly ordinary sentence", true).await;
        assert!(result.flagged);
    }

    #[tokio::test]
    async fn classifier_safe_verdict_passes() {
        let classifier = StubClassifier {
            verdict: ClassifierVerdict { score: 0.9, label: ClassifierLabel::Safe },
        };
        let detector = PostcheckDetector::new(Some(Box::new(classifier)), false);
        let result = detector.check("q", "a perfectly ordinary sentence", true).await;
        assert!(!result.flagged);
    }

    #[tokio::test]
    async fn coherence_mismatch_flags_borderline_output_for_safe_input() {
        let detector = PostcheckDetector::new(None, true).with_flag_threshold(0.5);
        let result = detector.check("q", "##$$%%^^&&**(())", true).await;
        assert!(result.flagged);
        assert_eq!(result.reason_code, Some(ReasonCode::OutputCoherenceMismatch));
    }
}
