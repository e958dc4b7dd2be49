//! Session token issuing and verification.
//!
//! Checkout re-verifies the caller's session at commit time, not just when the
//! page loaded. Tokens are HS256 JWTs whose subject is the user id.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CheckoutError, CheckoutResult};

/// Session token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user id)
    pub sub: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// Token id
    pub jti: String,
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct SessionAuthority {
    secret: String,
    lifetime_secs: i64,
}

impl std::fmt::Debug for SessionAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAuthority")
            .field("lifetime_secs", &self.lifetime_secs)
            .finish_non_exhaustive()
    }
}

impl SessionAuthority {
    pub fn new(secret: impl Into<String>, lifetime_secs: i64) -> Self {
        SessionAuthority {
            secret: secret.into(),
            lifetime_secs,
        }
    }

    /// Issues a session token for `user_id`.
    pub fn issue(&self, user_id: &str) -> CheckoutResult<String> {
        self.issue_with_lifetime(user_id, self.lifetime_secs)
    }

    fn issue_with_lifetime(&self, user_id: &str, lifetime_secs: i64) -> CheckoutResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(lifetime_secs);

        let claims = SessionClaims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| CheckoutError::Auth(format!("Failed to issue session token: {}", e)))
    }

    /// Verifies signature and expiry.
    pub fn verify(&self, token: &str) -> CheckoutResult<SessionClaims> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        let token_data: TokenData<SessionClaims> = decode(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| CheckoutError::Auth(format!("Invalid session: {}", e)))?;

        Ok(token_data.claims)
    }

    /// Verifies the token and that it belongs to `user_id`.
    pub fn authorize(&self, token: &str, user_id: &str) -> CheckoutResult<SessionClaims> {
        let claims = self.verify(token)?;

        if claims.sub != user_id {
            return Err(CheckoutError::Auth("Session does not belong to this user".to_string()));
        }

        Ok(claims)
    }
}

/// Extracts the token from an `Authorization: Bearer ...` header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
