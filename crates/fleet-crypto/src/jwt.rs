//! Hand-rolled HS256 JWT minting and validation.
//!
//! The wire format is the usual compact serialization: three base64url
//! segments `header.claims.signature` joined by `.`. The header is always
//! `{"alg":"HS256","typ":"JWT"}`. Validation is performed in the exact order
//! the control plane's access layer depends on, so each failure mode maps to
//! a distinct, stable error variant rather than a single opaque "invalid".

use crate::base64url;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::num::NonZeroUsize;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JwtClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
    pub jti: String,
    pub role: String,
    pub username: String,
    pub email: String,
    pub token_type: TokenType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JwtHeader {
    alg: &'static str,
    typ: &'static str,
}

impl Default for JwtHeader {
    fn default() -> Self {
        Self {
            alg: "HS256",
            typ: "JWT",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JwtError {
    #[error("invalid token")]
    InvalidToken,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("failed to decode token claims")]
    DecodingFailed,
    #[error("token expired")]
    TokenExpired,
    #[error("invalid claim: {0}")]
    InvalidClaim(String),
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct JwtProviderConfig {
    pub secret: Vec<u8>,
    pub issuer: String,
    pub audience: Option<String>,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub max_revoked_tokens: usize,
}

impl Default for JwtProviderConfig {
    fn default() -> Self {
        Self {
            secret: b"change-me-in-production-please-32chars".to_vec(),
            issuer: "fleet-control-plane".to_string(),
            audience: Some("fleet-control-plane".to_string()),
            access_ttl_seconds: 3600,
            refresh_ttl_seconds: 604_800,
            max_revoked_tokens: 10_000,
        }
    }
}

pub struct NewTokenParams<'a> {
    pub user_id: Uuid,
    pub username: &'a str,
    pub email: &'a str,
    pub role: &'a str,
}

/// Mints and validates JWTs, tracking revoked token ids in a bounded LRU.
///
/// The LRU's "oldest entry evicted when full" behavior is the spec's
/// documented approximation for unbounded revocation-set growth: an evicted
/// jti will still fail validation once its token naturally expires.
pub struct JwtProvider {
    config: JwtProviderConfig,
    revoked: Mutex<LruCache<String, ()>>,
}

impl JwtProvider {
    pub fn new(config: JwtProviderConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_revoked_tokens.max(1)).unwrap();
        Self {
            config,
            revoked: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn generate_token_pair(&self, params: NewTokenParams<'_>) -> TokenPair {
        let now = Utc::now();
        let access_exp = now + chrono::Duration::seconds(self.config.access_ttl_seconds);
        let refresh_exp = now + chrono::Duration::seconds(self.config.refresh_ttl_seconds);

        let access_claims = self.build_claims(&params, now, access_exp, TokenType::Access);
        let refresh_claims = self.build_claims(&params, now, refresh_exp, TokenType::Refresh);

        TokenPair {
            access_token: self.encode(&access_claims),
            refresh_token: self.encode(&refresh_claims),
            access_expires_at: access_exp,
            refresh_expires_at: refresh_exp,
        }
    }

    fn build_claims(
        &self,
        params: &NewTokenParams<'_>,
        iat: DateTime<Utc>,
        exp: DateTime<Utc>,
        token_type: TokenType,
    ) -> JwtClaims {
        JwtClaims {
            iss: self.config.issuer.clone(),
            sub: params.user_id.to_string(),
            aud: self.config.audience.clone().unwrap_or_default(),
            exp: exp.timestamp(),
            iat: iat.timestamp(),
            nbf: iat.timestamp(),
            jti: Uuid::new_v4().to_string(),
            role: params.role.to_string(),
            username: params.username.to_string(),
            email: params.email.to_string(),
            token_type,
        }
    }

    fn encode(&self, claims: &JwtClaims) -> String {
        let header = base64url::encode(
            &serde_json::to_vec(&JwtHeader::default()).expect("header always serializes"),
        );
        let payload =
            base64url::encode(&serde_json::to_vec(claims).expect("claims always serialize"));
        let signing_input = format!("{}.{}", header, payload);
        let signature = self.sign(signing_input.as_bytes());
        format!("{}.{}", signing_input, base64url::encode(&signature))
    }

    fn sign(&self, data: &[u8]) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.config.secret).expect("HMAC accepts any key length");
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }

    /// Validates a compact JWT against every check the access layer relies
    /// on, in the exact order specified: structure, signature, decoding,
    /// revocation, expiry, not-before, issuer, audience.
    pub fn validate(&self, token: &str) -> Result<JwtClaims, JwtError> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(JwtError::InvalidToken);
        }
        let (header_b64, payload_b64, signature_b64) = (parts[0], parts[1], parts[2]);

        let signing_input = format!("{}.{}", header_b64, payload_b64);
        let expected_signature = self.sign(signing_input.as_bytes());
        let provided_signature =
            base64url::decode(signature_b64).map_err(|_| JwtError::InvalidSignature)?;
        let mut mac =
            HmacSha256::new_from_slice(&self.config.secret).expect("HMAC accepts any key length");
        mac.update(signing_input.as_bytes());
        if mac.verify_slice(&provided_signature).is_err() {
            let _ = expected_signature;
            return Err(JwtError::InvalidSignature);
        }

        let payload_bytes = base64url::decode(payload_b64).map_err(|_| JwtError::DecodingFailed)?;
        let claims: JwtClaims =
            serde_json::from_slice(&payload_bytes).map_err(|_| JwtError::DecodingFailed)?;

        if self.is_revoked(&claims.jti) {
            return Err(JwtError::InvalidToken);
        }

        let now = Utc::now().timestamp();
        if claims.exp <= now {
            return Err(JwtError::TokenExpired);
        }
        if now < claims.nbf {
            return Err(JwtError::InvalidToken);
        }
        if claims.iss != self.config.issuer {
            return Err(JwtError::InvalidClaim("iss".to_string()));
        }
        if let Some(expected_aud) = &self.config.audience {
            if &claims.aud != expected_aud {
                return Err(JwtError::InvalidClaim("aud".to_string()));
            }
        }

        Ok(claims)
    }

    /// Single-use refresh: validates the refresh token, revokes its jti,
    /// then mints a fresh access/refresh pair.
    pub fn refresh(
        &self,
        refresh_token: &str,
        params: NewTokenParams<'_>,
    ) -> Result<TokenPair, JwtError> {
        let claims = self.validate(refresh_token)?;
        if claims.token_type != TokenType::Refresh {
            return Err(JwtError::InvalidToken);
        }
        self.revoke_jti(&claims.jti);
        Ok(self.generate_token_pair(params))
    }

    pub fn revoke_jti(&self, jti: &str) {
        self.revoked.lock().put(jti.to_string(), ());
    }

    /// Revokes the jti carried by `token`, decoding its claims without
    /// re-validating signature/expiry first (a caller revoking a token it
    /// already holds doesn't need it to still be valid).
    pub fn revoke_token(&self, token: &str) -> Result<(), JwtError> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(JwtError::InvalidToken);
        }
        let payload_bytes = base64url::decode(parts[1]).map_err(|_| JwtError::DecodingFailed)?;
        let claims: JwtClaims =
            serde_json::from_slice(&payload_bytes).map_err(|_| JwtError::DecodingFailed)?;
        self.revoke_jti(&claims.jti);
        Ok(())
    }

    pub fn is_revoked(&self, jti: &str) -> bool {
        self.revoked.lock().contains(jti)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> JwtProvider {
        JwtProvider::new(JwtProviderConfig {
            access_ttl_seconds: 3600,
            refresh_ttl_seconds: 86_400,
            ..JwtProviderConfig::default()
        })
    }

    fn params(id: Uuid) -> NewTokenParams<'static> {
        NewTokenParams {
            user_id: id,
            username: "alice",
            email: "alice@example.com",
            role: "operator",
        }
    }

    #[test]
    fn mints_three_segment_token() {
        let provider = provider();
        let pair = provider.generate_token_pair(params(Uuid::new_v4()));
        assert_eq!(pair.access_token.split('.').count(), 3);
    }

    #[test]
    fn validate_round_trips_claims() {
        let provider = provider();
        let id = Uuid::new_v4();
        let pair = provider.generate_token_pair(params(id));
        let claims = provider.validate(&pair.access_token).unwrap();
        assert_eq!(claims.sub, id.to_string());
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.role, "operator");
    }

    #[test]
    fn malformed_structure_is_invalid_token() {
        let provider = provider();
        assert_eq!(
            provider.validate("not-a-jwt").unwrap_err(),
            JwtError::InvalidToken
        );
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let provider = provider();
        let pair = provider.generate_token_pair(params(Uuid::new_v4()));
        let mut segments: Vec<&str> = pair.access_token.split('.').collect();
        let corrupted_sig = format!("{}x", segments[2]);
        segments[2] = &corrupted_sig;
        let tampered = segments.join(".");
        assert_eq!(
            provider.validate(&tampered).unwrap_err(),
            JwtError::InvalidSignature
        );
    }

    #[test]
    fn expired_token_fails_with_token_expired() {
        let provider = JwtProvider::new(JwtProviderConfig {
            access_ttl_seconds: 1,
            ..JwtProviderConfig::default()
        });
        let pair = provider.generate_token_pair(params(Uuid::new_v4()));
        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert_eq!(
            provider.validate(&pair.access_token).unwrap_err(),
            JwtError::TokenExpired
        );
    }

    #[test]
    fn revoked_token_is_rejected() {
        let provider = provider();
        let pair = provider.generate_token_pair(params(Uuid::new_v4()));
        provider.revoke_token(&pair.access_token).unwrap();
        assert_eq!(
            provider.validate(&pair.access_token).unwrap_err(),
            JwtError::InvalidToken
        );
    }

    #[test]
    fn wrong_issuer_rejected() {
        let provider = provider();
        let pair = provider.generate_token_pair(params(Uuid::new_v4()));
        let other = JwtProvider::new(JwtProviderConfig {
            issuer: "someone-else".to_string(),
            ..JwtProviderConfig::default()
        });
        // Forge by re-signing with the same secret but a different issuer:
        // the access_token itself was signed with `provider`'s issuer, so
        // validating against `other` (different issuer) must fail on iss,
        // not signature, since the secret is shared here.
        let claims = other.validate(&pair.access_token);
        assert!(matches!(
            claims.unwrap_err(),
            JwtError::InvalidClaim(ref c) if c == "iss"
        ));
    }

    #[test]
    fn refresh_rotates_and_revokes_old_token() {
        let provider = provider();
        let id = Uuid::new_v4();
        let pair = provider.generate_token_pair(params(id));
        let new_pair = provider.refresh(&pair.refresh_token, params(id)).unwrap();
        assert_ne!(new_pair.access_token, pair.access_token);
        assert_eq!(
            provider.validate(&pair.refresh_token).unwrap_err(),
            JwtError::InvalidToken
        );
    }

    #[test]
    fn access_token_cannot_be_used_to_refresh() {
        let provider = provider();
        let id = Uuid::new_v4();
        let pair = provider.generate_token_pair(params(id));
        assert_eq!(
            provider.refresh(&pair.access_token, params(id)).unwrap_err(),
            JwtError::InvalidToken
        );
    }
}
