//! Token Codec
//!
//! Issues and verifies the signed, self-contained claim tokens that carry a
//! session across requests. Three kinds exist: `access` authorizes ordinary
//! requests, `refresh` is accepted only by the rotation endpoint, `partial`
//! only by the step-up verification endpoint.
//!
//! The codec itself is kind-agnostic; callers enforce the expected kind via
//! [`Claims::require_kind`]. Accepting one kind where another is expected is
//! a token-confusion defect.

use std::time::Duration;

use chrono::Utc;
use derive_more::Display;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entity::principal::Principal;

/// Token verification / issuance errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Bad signature or shape
    #[error("Token is malformed")]
    Malformed,

    /// `exp` is in the past
    #[error("Token has expired")]
    Expired,

    /// Kind discriminator does not match the caller's expectation
    #[error("Token type mismatch")]
    TypeMismatch,

    /// Signing failed (key/algorithm misconfiguration)
    #[error("Token signing failed: {0}")]
    Signing(String),
}

/// Token kind discriminator, stored in the `type` claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived, authorizes ordinary requests
    #[display("access")]
    Access,
    /// Long-lived, accepted only by the rotation endpoint
    #[display("refresh")]
    Refresh,
    /// Very short-lived, issued when primary credentials passed but the
    /// second factor is still pending; role is pinned to none
    #[display("partial")]
    Partial,
}

/// Claim set carried by every token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: user name
    pub sub: String,
    /// User id
    pub uid: Uuid,
    /// Email
    pub email: Option<String>,
    /// Display name
    pub full_name: Option<String>,
    /// Role reference; `None` on partial tokens (guest)
    pub role: Option<Uuid>,
    /// Whether the second factor is enabled for the subject
    #[serde(default)]
    pub otp_enabled: bool,
    /// Issued-at (unix seconds)
    pub iat: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
    /// Kind discriminator
    #[serde(rename = "type")]
    pub kind: TokenKind,
}

impl Claims {
    /// Enforce the kind expected by the calling endpoint
    pub fn require_kind(&self, expected: TokenKind) -> Result<(), TokenError> {
        if self.kind == expected {
            Ok(())
        } else {
            Err(TokenError::TypeMismatch)
        }
    }
}

/// Signs and verifies claim tokens with a configured secret and algorithm.
///
/// Constructed once at startup from `AuthConfig` and shared by reference;
/// holds no mutable state.
pub struct TokenCodec {
    header: Header,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &[u8], algorithm: Algorithm) -> Self {
        let mut validation = Validation::new(algorithm);
        // Zero leeway keeps Expired and Malformed distinguishable in logs
        // and makes expiry checks deterministic.
        validation.leeway = 0;
        validation.validate_exp = true;

        Self {
            header: Header::new(algorithm),
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Issue a token of the given kind for a principal.
    ///
    /// Sets `iat = now` and `exp = now + ttl`.
    pub fn issue(
        &self,
        principal: &Principal,
        ttl: Duration,
        kind: TokenKind,
    ) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: principal.username.clone(),
            uid: principal.user_id,
            email: principal.email.clone(),
            full_name: principal.full_name.clone(),
            role: principal.role,
            otp_enabled: principal.otp_enabled,
            iat: now,
            exp: now + ttl.as_secs() as i64,
            kind,
        };

        encode(&self.header, &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify signature and expiry, returning the claims.
    ///
    /// Two calls on the same unexpired token return identical claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            })
    }

    /// Issue a token with explicit timestamps (for expiry tests)
    #[cfg(test)]
    pub fn issue_at(
        &self,
        principal: &Principal,
        iat: i64,
        exp: i64,
        kind: TokenKind,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            sub: principal.username.clone(),
            uid: principal.user_id,
            email: principal.email.clone(),
            full_name: principal.full_name.clone(),
            role: principal.role,
            otp_enabled: principal.otp_enabled,
            iat,
            exp,
            kind,
        };

        encode(&self.header, &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}
