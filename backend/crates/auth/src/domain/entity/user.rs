//! User Entity
//!
//! Account record: credentials, role reference and second-factor state.
//! The TOTP secret lives on the user record and is only ever persisted
//! after the first correct code has been verified.

use chrono::{DateTime, Utc};
use kernel::id::{RoleId, UserId};

use crate::domain::value_object::{totp_secret::TotpSecret, user_password::UserPassword};

/// User entity
#[derive(Debug, Clone)]
pub struct User {
    /// Internal UUID identifier
    pub user_id: UserId,
    /// User name (unique, for login)
    pub username: String,
    /// Email address
    pub email: String,
    /// Display name
    pub full_name: String,
    /// Hashed password
    pub password_hash: UserPassword,
    /// Role reference
    pub role_ref: RoleId,
    /// TOTP secret; present only once the second factor has been enabled
    pub otp_secret: Option<TotpSecret>,
    /// Whether the second factor is enabled and verified
    pub otp_enabled: bool,
    /// Soft-disable flag
    pub disabled: bool,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        full_name: impl Into<String>,
        password_hash: UserPassword,
        role_ref: RoleId,
    ) -> Self {
        let now = Utc::now();
        Self {
            user_id: UserId::new(),
            username: username.into(),
            email: email.into(),
            full_name: full_name.into(),
            password_hash,
            role_ref,
            otp_secret: None,
            otp_enabled: false,
            disabled: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if user can login
    pub fn can_login(&self) -> bool {
        !self.disabled
    }

    /// Enable the second factor with a verified secret
    pub fn enable_otp(&mut self, secret: TotpSecret) {
        self.otp_secret = Some(secret);
        self.otp_enabled = true;
        self.updated_at = Utc::now();
    }

    /// Disable the second factor, clearing the secret
    pub fn disable_otp(&mut self) {
        self.otp_secret = None;
        self.otp_enabled = false;
        self.updated_at = Utc::now();
    }

    /// Update role reference
    pub fn set_role(&mut self, role_ref: RoleId) {
        self.role_ref = role_ref;
        self.updated_at = Utc::now();
    }
}
