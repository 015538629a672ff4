//! HS256 token issuing and verification.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use uuid::Uuid;

use adminkit_core::UserId;

use crate::claims::{TokenClaims, TokenKind, TokenPair, TokenValidationError, validate_claims};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed or unsigned token: {0}")]
    Malformed(String),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),

    #[error("failed to encode token: {0}")]
    Encoding(String),
}

/// Verifies a bearer token and returns its claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, expected: TokenKind, now: DateTime<Utc>) -> Result<TokenClaims, TokenError>;
}

/// Symmetric-key issuer and validator.
///
/// Time-window checks are done by [`validate_claims`] against the
/// `issued_at`/`expires_at` claims, not by the registered `exp` claim.
#[derive(Clone)]
pub struct Hs256JwtValidator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl Hs256JwtValidator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(1),
        }
    }

    pub fn with_ttls(mut self, access: Duration, refresh: Duration) -> Self {
        self.access_ttl = access;
        self.refresh_ttl = refresh;
        self
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn issue(&self, sub: UserId, kind: TokenKind, now: DateTime<Utc>) -> Result<(String, TokenClaims), TokenError> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = TokenClaims {
            sub,
            kind,
            jti: Uuid::now_v7(),
            issued_at: now,
            expires_at: now + ttl,
        };
        let token = self.encode(&claims)?;
        Ok((token, claims))
    }

    /// Sign arbitrary claims. Useful for minting tokens with a custom window.
    pub fn encode(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    pub fn issue_pair(&self, sub: UserId, now: DateTime<Utc>) -> Result<TokenPair, TokenError> {
        let (access, _) = self.issue(sub, TokenKind::Access, now)?;
        let (refresh, _) = self.issue(sub, TokenKind::Refresh, now)?;
        Ok(TokenPair { access, refresh })
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, expected: TokenKind, now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;

        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding, &validation)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;
        validate_claims(&data.claims, expected, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_validate() {
        let jwt = Hs256JwtValidator::new("secret");
        let now = Utc::now();
        let pair = jwt.issue_pair(UserId::new(4), now).unwrap();

        let access = jwt.validate(&pair.access, TokenKind::Access, now).unwrap();
        assert_eq!(access.sub, UserId::new(4));
        let refresh = jwt.validate(&pair.refresh, TokenKind::Refresh, now).unwrap();
        assert_ne!(access.jti, refresh.jti);
    }

    #[test]
    fn kinds_are_not_interchangeable() {
        let jwt = Hs256JwtValidator::new("secret");
        let now = Utc::now();
        let pair = jwt.issue_pair(UserId::new(4), now).unwrap();
        assert!(matches!(
            jwt.validate(&pair.access, TokenKind::Refresh, now),
            Err(TokenError::Claims(TokenValidationError::WrongKind { .. }))
        ));
        assert!(jwt.validate(&pair.refresh, TokenKind::Access, now).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let now = Utc::now();
        let (token, _) = Hs256JwtValidator::new("a").issue(UserId::new(1), TokenKind::Access, now).unwrap();
        assert!(matches!(
            Hs256JwtValidator::new("b").validate(&token, TokenKind::Access, now),
            Err(TokenError::Malformed(_))
        ));
        assert!(Hs256JwtValidator::new("a").validate("not-a-jwt", TokenKind::Access, now).is_err());
    }

    #[test]
    fn expiry_follows_configured_ttl() {
        let jwt = Hs256JwtValidator::new("secret").with_ttls(Duration::seconds(30), Duration::hours(1));
        let now = Utc::now();
        let (token, _) = jwt.issue(UserId::new(1), TokenKind::Access, now).unwrap();
        assert!(jwt.validate(&token, TokenKind::Access, now + Duration::seconds(29)).is_ok());
        assert!(matches!(
            jwt.validate(&token, TokenKind::Access, now + Duration::seconds(30)),
            Err(TokenError::Claims(TokenValidationError::Expired))
        ));
    }
}
