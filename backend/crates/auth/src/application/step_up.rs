//! Step-Up Verification Use Case
//!
//! Exchanges a partial token plus a correct TOTP code for the full token
//! pair. A failed check comes back as `InvalidOtpCode` whether the token or
//! the code was at fault; the distinction is only logged.

use std::sync::Arc;

use kernel::id::UserId;

use crate::application::config::AuthConfig;
use crate::application::sign_in::{TokenPair, issue_pair};
use crate::domain::entity::principal::Principal;
use crate::domain::repository::UserRepository;
use crate::domain::token::{TokenCodec, TokenKind};
use crate::error::{AuthError, AuthResult};

/// Step-up verification use case
pub struct StepUpUseCase<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
    config: Arc<AuthConfig>,
    codec: Arc<TokenCodec>,
}

impl<U> StepUpUseCase<U>
where
    U: UserRepository,
{
    pub fn new(user_repo: Arc<U>, config: Arc<AuthConfig>, codec: Arc<TokenCodec>) -> Self {
        Self {
            user_repo,
            config,
            codec,
        }
    }

    pub async fn execute(&self, temp_token: &str, otp_code: &str) -> AuthResult<TokenPair> {
        let claims = match self.codec.verify(temp_token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "Step-up token rejected");
                return Err(AuthError::InvalidOtpCode);
            }
        };

        if claims.require_kind(TokenKind::Partial).is_err() {
            tracing::warn!(kind = %claims.kind, "Non-partial token at step-up endpoint");
            return Err(AuthError::InvalidOtpCode);
        }

        // Re-resolve the user; the partial token only proves the password
        // check, state may have changed since.
        let user = self
            .user_repo
            .find_by_id(&UserId::from_uuid(claims.uid))
            .await?
            .ok_or(AuthError::InvalidOtpCode)?;

        if !user.otp_enabled {
            // Second factor was disabled between sign-in and verification
            return Err(AuthError::OtpNotEnabled);
        }

        let secret = user.otp_secret.as_ref().ok_or(AuthError::OtpNotEnabled)?;

        if !secret.verify(otp_code, &user.username) {
            return Err(AuthError::InvalidOtpCode);
        }

        let principal = Principal::from_user(&user);
        let pair = issue_pair(
            &self.codec,
            &principal,
            self.config.access_ttl,
            self.config.refresh_ttl,
        )?;

        tracing::info!(username = %user.username, "Second factor verified, full session issued");

        Ok(pair)
    }
}
