//! Password hashing and bearer token issuance
//!
//! Passwords are stored as bcrypt hashes. Sessions are stateless HS256
//! JWTs: a short-lived `access` token authorizes API calls and a longer
//! `refresh` token can only be exchanged for a new access token.
//!
//! No HTTP framework dependencies here; extraction of the `Authorization`
//! header lives in the service crate.

use crate::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Token purpose, carried in the `kind` claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i64,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

/// Token verification failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token is expired")]
    Expired,

    #[error("Token has wrong type")]
    WrongKind,

    #[error("Token is invalid: {0}")]
    Invalid(String),
}

/// Signs and verifies tokens, hashes and checks passwords
pub struct Authenticator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
    bcrypt_cost: u32,
}

impl Authenticator {
    pub fn new(secret: &str, access_minutes: i64, refresh_days: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl: Duration::minutes(access_minutes),
            refresh_ttl: Duration::days(refresh_days),
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }

    /// Override the bcrypt work factor (tests use the minimum)
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    pub fn hash_password(&self, password: &str) -> Result<String> {
        Ok(bcrypt::hash(password, self.bcrypt_cost)?)
    }

    /// Check a password against a stored hash
    ///
    /// An empty or malformed stored hash never matches.
    pub fn verify_password(&self, password: &str, hash: &str) -> bool {
        if hash.is_empty() {
            return false;
        }
        bcrypt::verify(password, hash).unwrap_or(false)
    }

    pub fn issue(&self, user_id: i64, kind: TokenKind) -> Result<String> {
        let now = Utc::now();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            sub: user_id,
            kind,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// Verify signature, expiry and token kind
    pub fn verify(&self, token: &str, expected: TokenKind) -> std::result::Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            }
        })?;

        if data.claims.kind != expected {
            return Err(TokenError::WrongKind);
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator() -> Authenticator {
        Authenticator::new("test-secret", 5, 1).with_bcrypt_cost(4)
    }

    #[test]
    fn test_password_roundtrip() {
        let auth = authenticator();
        let hash = auth.hash_password("s3cret!").unwrap();
        assert_ne!(hash, "s3cret!");
        assert!(auth.verify_password("s3cret!", &hash));
        assert!(!auth.verify_password("wrong", &hash));
    }

    #[test]
    fn test_empty_hash_never_matches() {
        let auth = authenticator();
        assert!(!auth.verify_password("", ""));
        assert!(!auth.verify_password("anything", "not-a-bcrypt-hash"));
    }

    #[test]
    fn test_access_token_verifies() {
        let auth = authenticator();
        let token = auth.issue(42, TokenKind::Access).unwrap();
        let claims = auth.verify(&token, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, 42);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_refresh_token_rejected_as_access() {
        let auth = authenticator();
        let token = auth.issue(7, TokenKind::Refresh).unwrap();
        assert_eq!(auth.verify(&token, TokenKind::Access).unwrap_err(), TokenError::WrongKind);
        assert!(auth.verify(&token, TokenKind::Refresh).is_ok());
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let token = Authenticator::new("other", 5, 1)
            .issue(1, TokenKind::Access)
            .unwrap();
        assert!(matches!(
            authenticator().verify(&token, TokenKind::Access),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let auth = Authenticator::new("test-secret", -5, 1);
        let token = auth.issue(1, TokenKind::Access).unwrap();
        assert_eq!(auth.verify(&token, TokenKind::Access).unwrap_err(), TokenError::Expired);
    }
}
