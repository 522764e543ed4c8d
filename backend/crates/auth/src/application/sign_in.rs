//! Sign In Use Case
//!
//! Verifies primary credentials and issues either a full token pair or,
//! when the second factor is enabled, a restricted partial token that is
//! only accepted by the step-up verification endpoint.

use std::sync::Arc;
use std::time::Duration;

use crate::application::config::AuthConfig;
use crate::domain::entity::principal::Principal;
use crate::domain::repository::UserRepository;
use crate::domain::token::{TokenCodec, TokenKind};
use crate::error::{AuthError, AuthResult};

/// Sign in input
pub struct SignInInput {
    pub username: String,
    pub password: String,
}

/// Access + refresh token pair
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Sign in outcome
pub enum SignInOutcome {
    /// Credentials verified, no second factor required
    Full(TokenPair),
    /// Credentials verified, step-up required before any access is granted
    StepUpRequired { temp_token: String },
}

/// Issue an access + refresh pair for a principal
pub(crate) fn issue_pair(
    codec: &TokenCodec,
    principal: &Principal,
    access_ttl: Duration,
    refresh_ttl: Duration,
) -> AuthResult<TokenPair> {
    let access_token = codec.issue(principal, access_ttl, TokenKind::Access)?;
    let refresh_token = codec.issue(principal, refresh_ttl, TokenKind::Refresh)?;
    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Sign in use case
pub struct SignInUseCase<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
    config: Arc<AuthConfig>,
    codec: Arc<TokenCodec>,
}

impl<U> SignInUseCase<U>
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

    pub async fn execute(&self, input: SignInInput) -> AuthResult<SignInOutcome> {
        let user = self
            .user_repo
            .find_by_username(&input.username)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !user.can_login() {
            return Err(AuthError::AccountDisabled);
        }

        let password_valid = user
            .password_hash
            .verify(&input.password, self.config.pepper());

        if !password_valid {
            return Err(AuthError::InvalidCredentials);
        }

        if user.otp_enabled {
            // Primary credentials passed but the second factor is pending.
            // The partial token carries no role, so it cannot resolve any
            // permission even if replayed against a business endpoint.
            let principal = Principal::step_up(&user);
            let temp_token =
                self.codec
                    .issue(&principal, self.config.partial_ttl, TokenKind::Partial)?;

            tracing::info!(username = %user.username, "Sign-in pending second factor");

            return Ok(SignInOutcome::StepUpRequired { temp_token });
        }

        let principal = Principal::from_user(&user);
        let pair = issue_pair(
            &self.codec,
            &principal,
            self.config.access_ttl,
            self.config.refresh_ttl,
        )?;

        tracing::info!(username = %user.username, "User signed in");

        Ok(SignInOutcome::Full(pair))
    }
}
