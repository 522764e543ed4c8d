//! API DTOs (Data Transfer Objects)
//!
//! Wire format follows the snake_case JSON shape of the token endpoints
//! (`access_token`, `temp_token`, `require_2fa`, ...).

use serde::{Deserialize, Serialize};

use crate::domain::entity::user::User;

// ============================================================================
// Sign In / Step-Up
// ============================================================================

/// Sign in request
#[derive(Debug, Clone, Deserialize)]
pub struct SignInRequest {
    pub username: String,
    pub password: String,
}

/// Full token pair response (sign-in, step-up verification)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

/// Step-up required response (HTTP 202)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepUpRequiredResponse {
    pub message: String,
    pub temp_token: String,
    pub require_2fa: bool,
}

/// Step-up verification request
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OtpVerifyRequest {
    pub temp_token: String,
    pub otp_code: String,
}

// ============================================================================
// Rotation
// ============================================================================

/// Rotation response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
}

// ============================================================================
// Second factor management
// ============================================================================

/// TOTP setup response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpSetupResponse {
    /// Secret for manual entry
    pub secret: String,
    /// QR code as base64-encoded PNG
    pub qr_code: String,
    /// otpauth:// URL
    pub otpauth_url: String,
}

/// TOTP enable request; the secret from setup comes back with the first code
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OtpEnableRequest {
    pub secret: String,
    pub otp_code: String,
}

/// Generic message response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

// ============================================================================
// Sign Up / User view
// ============================================================================

/// Sign up request
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignUpRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    pub full_name: String,
}

/// Password-free user view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub uid: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub otp_enabled: bool,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            uid: user.user_id.to_string(),
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role: user.role_ref.to_string(),
            otp_enabled: user.otp_enabled,
        }
    }
}
