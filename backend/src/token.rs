use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{AccountId, Role};

/// Lifetime of every session token. One global value, not adjustable per call.
pub const SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// Claims
///
/// Payload signed into every session token. `sub` is the account id in decimal form,
/// as JWT subjects are strings. `role` is only present on admin-service tokens. `aud`
/// names the service that issued the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    /// Issued At, seconds since the epoch.
    pub iat: u64,
    /// Expiration Time, seconds since the epoch. Inclusive: valid while `now <= exp`.
    pub exp: u64,
}

impl Claims {
    pub fn account_id(&self) -> Option<AccountId> {
        self.sub.parse().ok()
    }
}

/// Grant
///
/// What the session issuer asks the codec to vouch for. Timestamps are added at issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub subject: AccountId,
    pub username: String,
    pub role: Option<Role>,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature does not verify")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token was issued for another service")]
    WrongAudience,
    #[error("token is malformed")]
    Malformed,
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// TokenCodec
///
/// HS256-signed JWTs (base64url segments, safe in headers and URLs). Holds the
/// process-wide signing key, derived once from the configured secret and read-only
/// afterwards, so it can be shared behind an `Arc` without locking.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
    audience: Option<String>,
}

impl TokenCodec {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against an explicit clock in `parse_at`, after the signature.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
            audience: None,
        }
    }

    /// with_audience
    ///
    /// Stamps `aud = audience` on issued tokens and rejects tokens whose `aud` differs
    /// or is missing.
    pub fn with_audience(mut self, audience: &str) -> Self {
        self.validation.set_audience(&[audience]);
        self.validation.validate_aud = true;
        self.audience = Some(audience.to_string());
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, grant: Grant) -> Result<IssuedToken, TokenError> {
        self.issue_at(grant, Utc::now())
    }

    /// issue_at
    ///
    /// Signs `grant` with `iat = now` and `exp = now + ttl`.
    pub fn issue_at(&self, grant: Grant, now: DateTime<Utc>) -> Result<IssuedToken, TokenError> {
        let iat = unix_seconds(now);
        let claims = Claims {
            sub: grant.subject.to_string(),
            username: grant.username,
            role: grant.role,
            aud: self.audience.clone(),
            iat,
            exp: iat.saturating_add(self.ttl.as_secs()),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken { token, claims })
    }

    pub fn parse(&self, token: &str) -> Result<Claims, TokenError> {
        self.parse_at(token, Utc::now())
    }

    /// parse_at
    ///
    /// Verifies the signature first; only a token that verifies can be reported as
    /// `Expired`. Anything that is not a well-formed HS256 JWT is `Malformed`.
    pub fn parse_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    TokenError::InvalidSignature
                }
                ErrorKind::InvalidAudience => TokenError::WrongAudience,
                _ => TokenError::Malformed,
            }
        })?;

        let claims = data.claims;
        if claims.account_id().is_none() {
            return Err(TokenError::Malformed);
        }
        if self.audience.is_some() && claims.aud != self.audience {
            return Err(TokenError::WrongAudience);
        }
        if unix_seconds(now) > claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

fn unix_seconds(at: DateTime<Utc>) -> u64 {
    u64::try_from(at.timestamp()).unwrap_or(0)
}
