// sentrygate-gateway/src/security.rs
// ============================================================================
// Module: Gateway Security Helpers
// Description: Constant-time comparisons, CSRF/signed-request validation,
// and the security-headers response middleware.
// Purpose: Implement SPEC_FULL.md §4.14 ("Request Integrity & Response
// Headers"), carried on every response regardless of the route it answers.
// Dependencies: subtle, hmac, sha2, axum
// ============================================================================

//! ## Overview
//! Two independent concerns live here. `constant_time_eq`/
//! `constant_time_eq_str` guard secret comparisons (API keys, CSRF
//! signatures) against timing side channels. `CsrfValidator` verifies the
//! `{timestamp}:{hmac(secret, session_id+timestamp)}` token browser clients
//! attach to state-changing requests. `security_headers` is an axum
//! middleware layer applied to every response, authenticated or not.

use axum::http::HeaderValue;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use hmac::Hmac;
use hmac::Mac;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

// ============================================================================
// SECTION: Constant-Time Comparisons
// ============================================================================

/// Compares two byte slices in constant time.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Compares two strings in constant time.
#[must_use]
pub fn constant_time_eq_str(a: &str, b: &str) -> bool {
    constant_time_eq(a.as_bytes(), b.as_bytes())
}

// ============================================================================
// SECTION: CSRF Token Validation
// ============================================================================

/// Validates signed CSRF tokens of the form `{timestamp}:{signature}`,
/// where `signature = hmac(secret, session_id || timestamp)`, matching
/// `spec.md` §4.1's "signed-request validation" requirement.
pub struct CsrfValidator {
    secret: Vec<u8>,
    ttl_seconds: u64,
}

impl CsrfValidator {
    /// Builds a validator with the given HMAC secret and token freshness
    /// window.
    #[must_use]
    pub fn new(secret: Vec<u8>, ttl_seconds: u64) -> Self {
        Self { secret, ttl_seconds }
    }

    /// Issues a fresh token for `session_id` at time `now` (Unix seconds).
    ///
    /// # Panics
    ///
    /// Never panics: `HmacSha256::new_from_slice` accepts a key of any
    /// length.
    #[must_use]
    pub fn issue(&self, session_id: &str, now: u64) -> String {
        let signature = self.sign(session_id, now);
        format!("{now}:{signature}")
    }

    /// Verifies `token` was issued for `session_id` and is within the
    /// freshness window as of `now` (Unix seconds).
    #[must_use]
    pub fn verify(&self, session_id: &str, token: &str, now: u64) -> bool {
        let Some((timestamp_str, signature)) = token.split_once(':') else {
            return false;
        };
        let Ok(timestamp) = timestamp_str.parse::<u64>() else {
            return false;
        };
        if now.saturating_sub(timestamp) > self.ttl_seconds {
            return false;
        }
        let expected = self.sign(session_id, timestamp);
        constant_time_eq_str(&expected, signature)
    }

    fn sign(&self, session_id: &str, timestamp: u64) -> String {
        #[allow(clippy::unwrap_used, reason = "HMAC accepts a key of any length")]
        let mut mac = HmacSha256::new_from_slice(&self.secret).unwrap();
        mac.update(session_id.as_bytes());
        mac.update(timestamp.to_string().as_bytes());
        let bytes = mac.finalize().into_bytes();
        bytes.iter().map(|byte| format!("{byte:02x}")).collect()
    }
}

// ============================================================================
// SECTION: Security Headers Middleware
// ============================================================================

/// Applies the fixed set of security headers `spec.md` §4.14 requires on
/// every response: a restrictive CSP, HSTS, frame-deny, no-sniff,
/// referrer policy, cross-origin isolation headers, and a locked-down
/// permissions policy.
pub async fn security_headers<B>(request: Request<B>, next: Next) -> Response
where
    B: Send,
{
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );
    headers.insert(
        "strict-transport-security",
        HeaderValue::from_static("max-age=63072000; includeSubDomains"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("referrer-policy", HeaderValue::from_static("no-referrer"));
    headers.insert("cross-origin-opener-policy", HeaderValue::from_static("same-origin"));
    headers.insert("cross-origin-embedder-policy", HeaderValue::from_static("require-corp"));
    headers.insert("cross-origin-resource-policy", HeaderValue::from_static("same-origin"));
    headers.insert("permissions-policy", HeaderValue::from_static("geolocation=(), microphone=(), camera=()"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies_within_ttl() {
        let validator = CsrfValidator::new(b"secret".to_vec(), 300);
        let token = validator.issue("session-1", 1_000);
        assert!(validator.verify("session-1", &token, 1_200));
    }

    #[test]
    fn expired_token_fails_verification() {
        let validator = CsrfValidator::new(b"secret".to_vec(), 300);
        let token = validator.issue("session-1", 1_000);
        assert!(!validator.verify("session-1", &token, 2_000));
    }

    #[test]
    fn token_for_different_session_fails_verification() {
        let validator = CsrfValidator::new(b"secret".to_vec(), 300);
        let token = validator.issue("session-1", 1_000);
        assert!(!validator.verify("session-2", &token, 1_200));
    }

    #[test]
    fn malformed_token_is_rejected() {
        let validator = CsrfValidator::new(b"secret".to_vec(), 300);
        assert!(!validator.verify("session-1", "not-a-token", 1_000));
    }
}
