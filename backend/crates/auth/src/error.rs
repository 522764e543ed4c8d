//! Auth Error Types
//!
//! This module provides auth-specific error variants that integrate
//! with the unified `kernel::error::AppError` system.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

use crate::domain::token::TokenError;

/// Auth-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Auth-specific error variants
///
/// Post-authentication failures are collapsed by the gate middleware into a
/// single caller-visible outcome; the variants below exist so the internal
/// distinctions can be logged.
#[derive(Debug, Error)]
pub enum AuthError {
    /// User not found
    #[error("User not found")]
    UserNotFound,

    /// Role not found (dangling role reference)
    #[error("Role not found")]
    RoleNotFound,

    /// User name already exists
    #[error("User name already exists")]
    UserNameTaken,

    /// Invalid credentials (wrong password)
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Account is disabled
    #[error("Account is disabled")]
    AccountDisabled,

    /// Token failed signature or shape checks
    #[error("Token is malformed")]
    TokenMalformed,

    /// Token expired
    #[error("Token has expired")]
    TokenExpired,

    /// Token kind does not match the endpoint's expectation
    #[error("Token type mismatch")]
    TokenTypeMismatch,

    /// Invalid one-time password code
    #[error("Invalid one-time password code")]
    InvalidOtpCode,

    /// Two-factor authentication is not enabled for this user
    #[error("Two-factor authentication not enabled")]
    OtpNotEnabled,

    /// Permission denied
    #[error("User unauthorized")]
    Unauthorized,

    /// No permission record exists for a declared operation
    #[error("No permission record for operation '{0}'")]
    MissingPermissionRecord(String),

    /// Password policy violation (sign-up / credential change)
    #[error("Password validation failed: {0}")]
    PasswordValidation(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::UserNotFound | AuthError::RoleNotFound => StatusCode::NOT_FOUND,
            AuthError::UserNameTaken => StatusCode::CONFLICT,
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::AccountDisabled => StatusCode::FORBIDDEN,
            AuthError::TokenMalformed
            | AuthError::TokenExpired
            | AuthError::TokenTypeMismatch
            | AuthError::InvalidOtpCode
            | AuthError::Unauthorized
            | AuthError::MissingPermissionRecord(_) => StatusCode::UNAUTHORIZED,
            AuthError::OtpNotEnabled => StatusCode::BAD_REQUEST,
            AuthError::PasswordValidation(_) => StatusCode::BAD_REQUEST,
            AuthError::Database(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::UserNotFound | AuthError::RoleNotFound => ErrorKind::NotFound,
            AuthError::UserNameTaken => ErrorKind::Conflict,
            AuthError::InvalidCredentials
            | AuthError::TokenMalformed
            | AuthError::TokenExpired
            | AuthError::TokenTypeMismatch
            | AuthError::InvalidOtpCode
            | AuthError::Unauthorized
            | AuthError::MissingPermissionRecord(_) => ErrorKind::Unauthorized,
            AuthError::AccountDisabled => ErrorKind::Forbidden,
            AuthError::OtpNotEnabled | AuthError::PasswordValidation(_) => ErrorKind::BadRequest,
            AuthError::Database(_) | AuthError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Convert to AppError
    ///
    /// Token and permission failures share one outward message so callers
    /// cannot distinguish them (information disclosure).
    pub fn to_app_error(&self) -> AppError {
        match self {
            AuthError::TokenMalformed
            | AuthError::TokenExpired
            | AuthError::TokenTypeMismatch
            | AuthError::Unauthorized
            | AuthError::MissingPermissionRecord(_) => {
                AppError::new(self.kind(), "Unauthorized")
            }
            _ => AppError::new(self.kind(), self.to_string()),
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Auth database error");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Auth internal error");
            }
            AuthError::InvalidCredentials => {
                tracing::warn!("Invalid login attempt");
            }
            AuthError::MissingPermissionRecord(op) => {
                tracing::warn!(operation = %op, "No permission record, denying by default");
            }
            _ => {
                tracing::debug!(error = %self, "Auth error");
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        self.to_app_error().into_response()
    }
}

impl From<AppError> for AuthError {
    fn from(err: AppError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Malformed => AuthError::TokenMalformed,
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::TypeMismatch => AuthError::TokenTypeMismatch,
            TokenError::Signing(msg) => AuthError::Internal(msg),
        }
    }
}

impl From<platform::password::PasswordPolicyError> for AuthError {
    fn from(err: platform::password::PasswordPolicyError) -> Self {
        AuthError::PasswordValidation(err.to_string())
    }
}

impl From<platform::password::PasswordHashError> for AuthError {
    fn from(err: platform::password::PasswordHashError) -> Self {
        AuthError::Internal(err.to_string())
    }
}
