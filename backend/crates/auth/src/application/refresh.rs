//! Token Rotation Use Case
//!
//! Exchanges a still-valid refresh token for a fresh access token. Refresh
//! tokens are accepted here and nowhere else; they never authorize business
//! operations directly.

use std::sync::Arc;

use crate::application::config::AuthConfig;
use crate::domain::entity::principal::Principal;
use crate::domain::token::{TokenCodec, TokenKind};
use crate::error::AuthResult;

/// Rotation output
pub struct RefreshOutput {
    /// Newly minted access token
    pub access_token: String,
    /// Principal carried over from the refresh claims
    pub principal: Principal,
}

/// Token rotation use case. Pure computation, no persistence I/O.
pub struct RefreshUseCase {
    config: Arc<AuthConfig>,
    codec: Arc<TokenCodec>,
}

impl RefreshUseCase {
    pub fn new(config: Arc<AuthConfig>, codec: Arc<TokenCodec>) -> Self {
        Self { config, codec }
    }

    pub fn execute(&self, refresh_token: &str) -> AuthResult<RefreshOutput> {
        let claims = self.codec.verify(refresh_token)?;
        claims.require_kind(TokenKind::Refresh)?;

        let principal = Principal::from(&claims);
        let access_token =
            self.codec
                .issue(&principal, self.config.access_ttl, TokenKind::Access)?;

        tracing::debug!(username = %principal.username, "Access token rotated");

        Ok(RefreshOutput {
            access_token,
            principal,
        })
    }
}
