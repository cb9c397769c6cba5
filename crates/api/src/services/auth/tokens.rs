//! Signed access and refresh tokens.
//!
//! Both kinds are HS256 JWTs signed with separate secrets, so a refresh token
//! can never pass as an access token and vice versa.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use toybox_core::{Role, UserId};

use crate::config::AuthConfig;
use crate::models::{CurrentUser, User};

/// Errors from issuing or verifying tokens.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token's `exp` is in the past.
    #[error("token expired")]
    Expired,

    /// Bad signature, malformed token, or wrong token kind.
    #[error("invalid token")]
    Invalid,

    /// Signing failed.
    #[error("token encoding failed: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Invalid,
        }
    }
}

/// Which secret a token is signed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims carried by both token kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub email: String,
    pub role: Role,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Issues and verifies tokens.
#[derive(Clone)]
pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    /// Build keys from configuration.
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        let access = config.jwt_secret.expose_secret().as_bytes();
        let refresh = config.jwt_refresh_secret.expose_secret().as_bytes();

        Self {
            access_encoding: EncodingKey::from_secret(access),
            access_decoding: DecodingKey::from_secret(access),
            refresh_encoding: EncodingKey::from_secret(refresh),
            refresh_decoding: DecodingKey::from_secret(refresh),
            access_ttl: Duration::minutes(config.access_ttl_minutes),
            refresh_ttl: Duration::days(config.refresh_ttl_days),
        }
    }

    /// Access token lifetime, also used as the cookie max-age.
    #[must_use]
    pub const fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Refresh token lifetime, also used as the cookie max-age.
    #[must_use]
    pub const fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Issue both tokens for `user`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encoding` if signing fails.
    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.issue(user, TokenKind::Access)?,
            refresh: self.issue(user, TokenKind::Refresh)?,
        })
    }

    /// Issue a single token of `kind` for `user`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encoding` if signing fails.
    pub fn issue(&self, user: &User, kind: TokenKind) -> Result<String, TokenError> {
        let now = Utc::now();
        let (key, ttl) = match kind {
            TokenKind::Access => (&self.access_encoding, self.access_ttl),
            TokenKind::Refresh => (&self.refresh_encoding, self.refresh_ttl),
        };

        let claims = Claims {
            sub: user.id,
            email: user.email.as_str().to_owned(),
            role: user.role,
            kind,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::default(), &claims, key).map_err(TokenError::Encoding)
    }

    /// Verify a token of `kind` and return its claims.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Expired` or `TokenError::Invalid`.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        let key = match kind {
            TokenKind::Access => &self.access_decoding,
            TokenKind::Refresh => &self.refresh_decoding,
        };

        let mut validation = Validation::default();
        validation.leeway = 0;

        let claims = decode::<Claims>(token, key, &validation)?.claims;
        if claims.kind != kind {
            return Err(TokenError::Invalid);
        }

        Ok(claims)
    }

    /// Verify an access token and resolve the caller.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Expired` or `TokenError::Invalid`.
    pub fn authenticate(&self, access_token: &str) -> Result<CurrentUser, TokenError> {
        let claims = self.verify(access_token, TokenKind::Access)?;
        Ok(CurrentUser {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;
    use toybox_core::Email;

    use super::*;

    fn auth_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: SecretString::from("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%"),
            jwt_refresh_secret: SecretString::from("Zq8!vN2@wE5#tR7$yU1%iO3^pA6&sD9*"),
            access_ttl_minutes: 15,
            refresh_ttl_days: 7,
            cookie_secure: false,
        }
    }

    fn user(role: Role) -> User {
        User {
            id: UserId::generate(),
            name: "Asha".to_string(),
            email: Email::parse("asha@example.com").unwrap(),
            role,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_access_token_roundtrip() {
        let tokens = TokenService::new(&auth_config());
        let user = user(Role::Admin);
        let pair = tokens.issue_pair(&user).unwrap();

        let current = tokens.authenticate(&pair.access).unwrap();
        assert_eq!(current.id, user.id);
        assert_eq!(current.email, "asha@example.com");
        assert!(current.is_admin());
    }

    #[test]
    fn test_kinds_are_not_interchangeable() {
        let tokens = TokenService::new(&auth_config());
        let pair = tokens.issue_pair(&user(Role::Customer)).unwrap();

        assert!(matches!(
            tokens.authenticate(&pair.refresh),
            Err(TokenError::Invalid)
        ));
        assert!(matches!(
            tokens.verify(&pair.access, TokenKind::Refresh),
            Err(TokenError::Invalid)
        ));
        assert!(tokens.verify(&pair.refresh, TokenKind::Refresh).is_ok());
    }

    #[test]
    fn test_expired_token() {
        let mut config = auth_config();
        config.access_ttl_minutes = -1;
        let tokens = TokenService::new(&config);
        let token = tokens.issue(&user(Role::Customer), TokenKind::Access).unwrap();

        assert!(matches!(tokens.authenticate(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn test_garbage_token() {
        let tokens = TokenService::new(&auth_config());
        assert!(matches!(
            tokens.authenticate("not.a.jwt"),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let tokens = TokenService::new(&auth_config());
        let mut other = auth_config();
        other.jwt_secret = SecretString::from("Qw9@eR4#tY7$uI2%oP5^aS8&dF1*gH3!");
        let forged = TokenService::new(&other)
            .issue(&user(Role::Admin), TokenKind::Access)
            .unwrap();

        assert!(tokens.authenticate(&forged).is_err());
    }
}
