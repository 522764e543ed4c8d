//! TOTP Secret Value Object
//!
//! Wraps the base32 secret for time-based one-time passwords.
//! Uses Google Authenticator compatible settings.

use serde::{Deserialize, Serialize};
use totp_rs::{Algorithm, Secret, TOTP};

use crate::error::{AuthError, AuthResult};

/// TOTP configuration constants
const TOTP_DIGITS: usize = 6;
const TOTP_STEP: u64 = 30;
/// Steps of clock-skew tolerance on either side of the current one
const TOTP_SKEW: u8 = 1;

/// TOTP secret for the second factor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotpSecret {
    /// Base32-encoded secret
    secret_base32: String,
}

impl TotpSecret {
    /// Generate a new cryptographically random secret
    pub fn generate() -> Self {
        let secret = Secret::generate_secret();
        Self {
            secret_base32: secret.to_encoded().to_string(),
        }
    }

    /// Create from a base32-encoded string (from database or enable request)
    pub fn from_base32(secret: impl Into<String>) -> AuthResult<Self> {
        let secret_str = secret.into();
        // Validate by trying to decode
        Secret::Encoded(secret_str.clone())
            .to_bytes()
            .map_err(|e| AuthError::Internal(format!("Invalid TOTP secret: {}", e)))?;

        Ok(Self {
            secret_base32: secret_str,
        })
    }

    /// Get the base32-encoded secret for storage
    pub fn as_base32(&self) -> &str {
        &self.secret_base32
    }

    /// Create a TOTP instance for this secret
    fn to_totp(&self, issuer: Option<&str>, account_name: &str) -> AuthResult<TOTP> {
        let secret = Secret::Encoded(self.secret_base32.clone());

        TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            TOTP_SKEW,
            TOTP_STEP,
            secret
                .to_bytes()
                .map_err(|e| AuthError::Internal(format!("Invalid TOTP secret: {}", e)))?,
            issuer.map(String::from),
            account_name.to_string(),
        )
        .map_err(|e| AuthError::Internal(format!("Failed to create TOTP: {}", e)))
    }

    /// Verify a code against this secret.
    ///
    /// Accepts the current time step plus one step of skew on either side.
    /// Malformed secrets or codes yield `false`, never an error.
    pub fn verify(&self, code: &str, account_name: &str) -> bool {
        match self.to_totp(None, account_name) {
            Ok(totp) => totp.check_current(code).unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Generate current TOTP code (for testing)
    #[cfg(test)]
    pub fn generate_current(&self, account_name: &str) -> AuthResult<String> {
        let totp = self.to_totp(None, account_name)?;
        totp.generate_current()
            .map_err(|e| AuthError::Internal(format!("Failed to generate TOTP: {}", e)))
    }

    /// Generate the QR provisioning image as base64-encoded PNG
    pub fn qr_code_base64(&self, issuer: &str, account_name: &str) -> AuthResult<String> {
        let totp = self.to_totp(Some(issuer), account_name)?;
        totp.get_qr_base64()
            .map_err(|e| AuthError::Internal(format!("Failed to generate QR code: {}", e)))
    }

    /// Get the otpauth:// provisioning URI for manual entry
    pub fn provisioning_uri(&self, issuer: &str, account_name: &str) -> AuthResult<String> {
        let totp = self.to_totp(Some(issuer), account_name)?;
        Ok(totp.get_url())
    }
}
