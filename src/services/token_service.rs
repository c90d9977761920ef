//! Signed, time-limited email confirmation tokens.
//!
//! A token is `base64url(claims) "." base64url(mac)` where the claims are a
//! small JSON document `{email, iat, ctx}` and the MAC is HMAC-SHA256 over the
//! context label and the encoded claims. Nothing is stored server side, so a
//! token stays usable until it ages out.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Context label bound into every confirmation token.
pub const EMAIL_CONFIRM_CONTEXT: &str = "email-confirm";

/// Confirmation links stop working one hour after they were issued.
pub const EMAIL_CONFIRM_MAX_AGE: i64 = 3600;

#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    email: String,
    iat: i64,
    ctx: String,
}

/// Outcome of checking a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenVerification {
    /// Signature, context and age all check out; carries the bound email.
    Valid(String),
    Expired,
    /// Malformed, forged, signed with another key or issued for another context.
    Invalid,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Failed to encode token claims: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("Invalid signing key")]
    InvalidKey,
}

pub struct EmailTokenSigner {
    key: Vec<u8>,
    context: String,
}

impl EmailTokenSigner {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self::with_context(key, EMAIL_CONFIRM_CONTEXT)
    }

    pub fn with_context(key: impl Into<Vec<u8>>, context: &str) -> Self {
        Self {
            key: key.into(),
            context: context.to_string(),
        }
    }

    pub fn issue(&self, email: &str) -> Result<String, TokenError> {
        self.issue_at(email, chrono::Utc::now().timestamp())
    }

    pub fn issue_at(&self, email: &str, issued_at: i64) -> Result<String, TokenError> {
        let claims = TokenClaims {
            email: email.to_string(),
            iat: issued_at,
            ctx: self.context.clone(),
        };
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);

        let signature = self.mac_for(&payload)?.finalize().into_bytes();

        Ok(format!("{}.{}", payload, URL_SAFE_NO_PAD.encode(signature)))
    }

    pub fn verify(&self, token: &str, max_age: i64) -> TokenVerification {
        self.verify_at(token, max_age, chrono::Utc::now().timestamp())
    }

    /// Checks `token` as of `now` (unix seconds). A token issued at `T` is
    /// accepted for `T <= now < T + max_age`.
    pub fn verify_at(&self, token: &str, max_age: i64, now: i64) -> TokenVerification {
        let Some((payload, signature)) = token.split_once('.') else {
            return TokenVerification::Invalid;
        };

        let Ok(signature) = URL_SAFE_NO_PAD.decode(signature) else {
            return TokenVerification::Invalid;
        };

        let Ok(mac) = self.mac_for(payload) else {
            return TokenVerification::Invalid;
        };
        if mac.verify_slice(&signature).is_err() {
            return TokenVerification::Invalid;
        }

        let claims: TokenClaims = match URL_SAFE_NO_PAD
            .decode(payload)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        {
            Some(claims) => claims,
            None => return TokenVerification::Invalid,
        };

        if claims.ctx != self.context {
            return TokenVerification::Invalid;
        }

        let age = now - claims.iat;
        if age < 0 {
            return TokenVerification::Invalid;
        }
        if age >= max_age {
            return TokenVerification::Expired;
        }

        TokenVerification::Valid(claims.email)
    }

    fn mac_for(&self, payload: &str) -> Result<HmacSha256, TokenError> {
        let mut mac = HmacSha256::new_from_slice(&self.key).map_err(|_| TokenError::InvalidKey)?;
        mac.update(self.context.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        Ok(mac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"test-signing-key-with-enough-entropy";
    const T: i64 = 1_700_000_000;

    #[test]
    fn test_valid_within_window() {
        let signer = EmailTokenSigner::new(KEY);
        let token = signer.issue_at("a@x.com", T).unwrap();

        for now in [T, T + 1, T + 1800, T + EMAIL_CONFIRM_MAX_AGE - 1] {
            assert_eq!(
                signer.verify_at(&token, EMAIL_CONFIRM_MAX_AGE, now),
                TokenVerification::Valid("a@x.com".to_string()),
                "token should be valid at offset {}",
                now - T
            );
        }
    }

    #[test]
    fn test_expired_at_and_after_max_age() {
        let signer = EmailTokenSigner::new(KEY);
        let token = signer.issue_at("a@x.com", T).unwrap();

        for now in [T + EMAIL_CONFIRM_MAX_AGE, T + EMAIL_CONFIRM_MAX_AGE + 1, T + 86_400] {
            assert_eq!(
                signer.verify_at(&token, EMAIL_CONFIRM_MAX_AGE, now),
                TokenVerification::Expired
            );
        }
    }

    #[test]
    fn test_other_key_is_invalid_regardless_of_age() {
        let signer = EmailTokenSigner::new(KEY);
        let other = EmailTokenSigner::new(b"another-key".to_vec());
        let token = other.issue_at("a@x.com", T).unwrap();

        assert_eq!(
            signer.verify_at(&token, EMAIL_CONFIRM_MAX_AGE, T),
            TokenVerification::Invalid
        );
        assert_eq!(
            signer.verify_at(&token, EMAIL_CONFIRM_MAX_AGE, T + 10 * EMAIL_CONFIRM_MAX_AGE),
            TokenVerification::Invalid
        );
    }

    #[test]
    fn test_other_context_is_invalid() {
        let signer = EmailTokenSigner::new(KEY);
        let reset = EmailTokenSigner::with_context(KEY, "password-reset");
        let token = reset.issue_at("a@x.com", T).unwrap();

        assert_eq!(
            signer.verify_at(&token, EMAIL_CONFIRM_MAX_AGE, T + 5),
            TokenVerification::Invalid
        );
    }

    #[test]
    fn test_tampered_claims_are_invalid() {
        let signer = EmailTokenSigner::new(KEY);
        let token = signer.issue_at("a@x.com", T).unwrap();
        let (_, signature) = token.split_once('.').unwrap();

        let forged_claims = serde_json::json!({
            "email": "victim@x.com",
            "iat": T,
            "ctx": EMAIL_CONFIRM_CONTEXT,
        });
        let forged_payload = URL_SAFE_NO_PAD.encode(forged_claims.to_string());
        let forged = format!("{}.{}", forged_payload, signature);

        assert_eq!(
            signer.verify_at(&forged, EMAIL_CONFIRM_MAX_AGE, T),
            TokenVerification::Invalid
        );
    }

    #[test]
    fn test_malformed_tokens() {
        let signer = EmailTokenSigner::new(KEY);
        for token in ["", "no-dot-here", "abc.def", "!!!.???", "."] {
            assert_eq!(
                signer.verify_at(token, EMAIL_CONFIRM_MAX_AGE, T),
                TokenVerification::Invalid,
                "{:?} should be rejected",
                token
            );
        }
    }

    #[test]
    fn test_token_from_the_future_is_invalid() {
        let signer = EmailTokenSigner::new(KEY);
        let token = signer.issue_at("a@x.com", T + 60).unwrap();
        assert_eq!(
            signer.verify_at(&token, EMAIL_CONFIRM_MAX_AGE, T),
            TokenVerification::Invalid
        );
    }

    #[test]
    fn test_token_is_url_safe() {
        let signer = EmailTokenSigner::new(KEY);
        let token = signer.issue("someone+tag@example.com").unwrap();
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'));
        assert_eq!(
            signer.verify(&token, EMAIL_CONFIRM_MAX_AGE),
            TokenVerification::Valid("someone+tag@example.com".to_string())
        );
    }
}
