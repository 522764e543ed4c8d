//! TOTP Setup Use Case
//!
//! Set up, enable and disable the TOTP second factor.
//!
//! Setup only generates material; nothing touches the database until the
//! user proves possession by submitting a correct code at enable time.

use std::sync::Arc;

use kernel::id::UserId;

use crate::application::config::AuthConfig;
use crate::domain::repository::UserRepository;
use crate::domain::value_object::totp_secret::TotpSecret;
use crate::error::{AuthError, AuthResult};

/// TOTP setup output
pub struct TotpSetupOutput {
    /// Secret for manual entry
    pub secret: String,
    /// QR code as base64-encoded PNG
    pub qr_code: String,
    /// otpauth:// URL
    pub otpauth_url: String,
}

/// TOTP setup use case
pub struct TotpSetupUseCase<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
    config: Arc<AuthConfig>,
}

impl<U> TotpSetupUseCase<U>
where
    U: UserRepository,
{
    pub fn new(user_repo: Arc<U>, config: Arc<AuthConfig>) -> Self {
        Self { user_repo, config }
    }

    /// Start TOTP setup: generate a secret and its provisioning artifacts.
    /// The secret is NOT persisted here.
    pub async fn setup(&self, user_id: &UserId) -> AuthResult<TotpSetupOutput> {
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let secret = TotpSecret::generate();

        let qr_code = secret.qr_code_base64(&self.config.totp_issuer, &user.username)?;
        let otpauth_url = secret.provisioning_uri(&self.config.totp_issuer, &user.username)?;

        tracing::info!(user_id = %user_id, "TOTP setup initiated");

        Ok(TotpSetupOutput {
            secret: secret.as_base32().to_string(),
            qr_code,
            otpauth_url,
        })
    }

    /// Enable the second factor: verify the submitted code against the
    /// submitted secret and persist both only on success.
    pub async fn enable(&self, user_id: &UserId, secret: &str, code: &str) -> AuthResult<()> {
        let mut user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let secret = TotpSecret::from_base32(secret).map_err(|_| AuthError::InvalidOtpCode)?;

        if !secret.verify(code, &user.username) {
            return Err(AuthError::InvalidOtpCode);
        }

        user.enable_otp(secret);
        self.user_repo.update(&user).await?;

        tracing::info!(user_id = %user_id, "TOTP enabled");

        Ok(())
    }

    /// Disable the second factor, clearing the stored secret.
    pub async fn disable(&self, user_id: &UserId) -> AuthResult<()> {
        let mut user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        user.disable_otp();
        self.user_repo.update(&user).await?;

        tracing::info!(user_id = %user_id, "TOTP disabled");

        Ok(())
    }
}
