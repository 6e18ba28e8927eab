// sentrygate-gateway/src/identity.rs
// ============================================================================
// Module: Identity Resolution
// Description: Resolves an inbound request's caller identity from a Bearer
// token, an API key, or anonymously.
// Purpose: Implement the auth half of C10's external interface contract.
// Dependencies: hmac, sha2, subtle, sentrygate-core
// ============================================================================

//! ## Overview
//! Auth failures degrade to anonymous rather than propagating to the
//! caller (`spec.md` §6: "Auth errors degrade to anon, never throw"). A
//! Bearer token is an HMAC-signed `{sub, role}` payload; an API key is a
//! `key:tier` pair drawn from a comma-separated allowlist, compared in
//! constant time.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::Hmac;
use hmac::Mac;
use sentrygate_core::Identity;
use sentrygate_core::TrustTier;
use sentrygate_core::UserId;
use serde::Deserialize;
use sha2::Sha256;

use crate::security::constant_time_eq_str;

type HmacSha256 = Hmac<Sha256>;

/// Claims carried by a signed Bearer token.
#[derive(Debug, Deserialize)]
struct BearerClaims {
    sub: String,
    role: String,
}

/// Resolves the caller [`Identity`] for an inbound request from its
/// `Authorization` header, never failing outright: any missing, malformed,
/// or unverifiable credential degrades to a synthetic anonymous identity.
pub struct IdentityResolver {
    bearer_secret: Option<Vec<u8>>,
    api_keys: Vec<(String, TrustTier)>,
}

impl IdentityResolver {
    /// Builds a resolver. `bearer_secret` is the HMAC key used to verify
    /// Bearer tokens; `api_keys_csv` is a comma-separated `key:tier` list
    /// matching `spec.md` §6's API key contract.
    #[must_use]
    pub fn new(bearer_secret: Option<Vec<u8>>, api_keys_csv: Option<&str>) -> Self {
        let api_keys = api_keys_csv
            .map(parse_api_keys)
            .unwrap_or_default();
        Self { bearer_secret, api_keys }
    }

    /// Resolves an identity from the `Authorization` header value, if
    /// present, and an anonymous fallback identifier (e.g. the peer IP or
    /// a random token) used when no credential verifies.
    #[must_use]
    pub fn resolve(&self, authorization: Option<&str>, anon_fallback: &str) -> Identity {
        let Some(header) = authorization else {
            return Identity::anonymous(anon_fallback);
        };

        if let Some(token) = header.strip_prefix("Bearer ") {
            if let Some(identity) = self.verify_bearer(token) {
                return identity;
            }
        } else if let Some(key) = header.strip_prefix("X-API-Key: ") {
            if let Some(identity) = self.verify_api_key(key) {
                return identity;
            }
        }

        Identity::anonymous(anon_fallback)
    }

    fn verify_bearer(&self, token: &str) -> Option<Identity> {
        let secret = self.bearer_secret.as_ref()?;
        let (payload_b64, signature_b64) = token.split_once('.')?;
        let payload = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
        let signature = URL_SAFE_NO_PAD.decode(signature_b64).ok()?;

        #[allow(clippy::unwrap_used, reason = "HMAC accepts a key of any length")]
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(&payload);
        mac.verify_slice(&signature).ok()?;

        let claims: BearerClaims = serde_json::from_slice(&payload).ok()?;
        let trust_tier = role_to_tier(&claims.role);
        Some(Identity {
            user_id: UserId::from(claims.sub),
            trust_tier,
            session_id: None,
        })
    }

    fn verify_api_key(&self, key: &str) -> Option<Identity> {
        for (candidate, tier) in &self.api_keys {
            if constant_time_eq_str(candidate, key) {
                return Some(Identity {
                    user_id: UserId::from(format!("apikey:{key}")),
                    trust_tier: *tier,
                    session_id: None,
                });
            }
        }
        None
    }
}

/// Maps a Bearer token's `role` claim to a [`TrustTier`] per `spec.md`
/// §6's fixed map, defaulting unrecognized roles to [`TrustTier::Anonymous`]
/// to keep the mapping fail-closed.
fn role_to_tier(role: &str) -> TrustTier {
    match role {
        "user" => TrustTier::Standard,
        "verified" => TrustTier::Trusted,
        "privileged" | "admin" => TrustTier::Privileged,
        _ => TrustTier::Anonymous,
    }
}

fn parse_api_keys(csv: &str) -> Vec<(String, TrustTier)> {
    csv.split(',')
        .filter_map(|entry| {
            let (key, tier) = entry.trim().split_once(':')?;
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), role_to_tier(tier)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &[u8], payload: &[u8]) -> String {
        #[allow(clippy::unwrap_used, reason = "HMAC accepts a key of any length")]
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(payload);
        let signature = mac.finalize().into_bytes();
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload),
            URL_SAFE_NO_PAD.encode(signature)
        )
    }

    #[test]
    fn missing_header_resolves_to_anonymous() {
        let resolver = IdentityResolver::new(None, None);
        let identity = resolver.resolve(None, "203.0.113.1");
        assert_eq!(identity.trust_tier, TrustTier::Anonymous);
    }

    #[test]
    fn valid_bearer_token_resolves_claimed_tier() {
        let secret = b"test-secret".to_vec();
        let payload = serde_json::to_vec(&serde_json::json!({"sub": "alice", "role": "verified"})).expect("json");
        let token = sign(&secret, &payload);
        let resolver = IdentityResolver::new(Some(secret), None);
        let identity = resolver.resolve(Some(&format!("Bearer {token}")), "fallback");
        assert_eq!(identity.trust_tier, TrustTier::Trusted);
        assert_eq!(identity.user_id.as_str(), "alice");
    }

    #[test]
    fn tampered_bearer_signature_degrades_to_anonymous() {
        let secret = b"test-secret".to_vec();
        let payload = serde_json::to_vec(&serde_json::json!({"sub": "alice", "role": "admin"})).expect("json");
        let mut token = sign(&secret, &payload);
        token.push('x');
        let resolver = IdentityResolver::new(Some(secret), None);
        let identity = resolver.resolve(Some(&format!("Bearer {token}")), "fallback");
        assert_eq!(identity.trust_tier, TrustTier::Anonymous);
    }

    #[test]
    fn valid_api_key_resolves_configured_tier() {
        let resolver = IdentityResolver::new(None, Some("secret-key:privileged"));
        let identity = resolver.resolve(Some("X-API-Key: secret-key"), "fallback");
        assert_eq!(identity.trust_tier, TrustTier::Privileged);
    }

    #[test]
    fn unknown_api_key_degrades_to_anonymous() {
        let resolver = IdentityResolver::new(None, Some("secret-key:privileged"));
        let identity = resolver.resolve(Some("X-API-Key: wrong-key"), "fallback");
        assert_eq!(identity.trust_tier, TrustTier::Anonymous);
    }
}
