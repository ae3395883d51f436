//! Session token issuance and verification.
//!
//! Tokens are HS256 JWTs carrying a [`SessionClaims`] snapshot of the user
//! plus `iat`/`exp`. Verification never explains why a token was rejected.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::{Role, Stored, UserRecord};

/// Identity and profile-completion snapshot embedded in every session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Missing roles decode as [`Role::User`]
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub design_complete: bool,
    #[serde(default)]
    pub information_complete: bool,
}

impl From<&Stored<UserRecord>> for SessionClaims {
    fn from(user: &Stored<UserRecord>) -> Self {
        Self {
            id: user.id.clone(),
            name: user.data.name.clone(),
            email: user.data.email.clone(),
            role: user.data.role,
            design_complete: user.data.design_complete,
            information_complete: user.data.information_complete,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    #[serde(flatten)]
    session: SessionClaims,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    /// Bad signature, malformed input or expired
    #[error("Invalid or expired token")]
    Invalid,
    #[error("Failed to encode token: {0}")]
    Encode(String),
}

/// Signs and verifies session tokens with a process-wide secret.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token valid for the configured lifetime.
    pub fn issue(&self, claims: &SessionClaims) -> Result<String, TokenError> {
        self.issue_with_ttl(claims, self.ttl)
    }

    pub fn issue_with_ttl(&self, claims: &SessionClaims, ttl: Duration) -> Result<String, TokenError> {
        self.encode_at(claims, Utc::now().timestamp(), ttl)
    }

    pub(crate) fn encode_at(
        &self,
        claims: &SessionClaims,
        issued_at: i64,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let ttl_secs = i64::try_from(ttl.as_secs()).map_err(|e| TokenError::Encode(e.to_string()))?;
        let claims = TokenClaims {
            session: claims.clone(),
            iat: issued_at,
            exp: issued_at.saturating_add(ttl_secs),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encode(e.to_string()))
    }

    /// Check signature and expiry, returning the embedded claims.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims.session)
            .map_err(|e| {
                tracing::debug!("Token rejected: {}", e);
                TokenError::Invalid
            })
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
