//! Principal
//!
//! The authenticated identity attached to a request. Built per request from
//! verified token claims (or from a freshly authenticated user at sign-in)
//! and discarded at request end; never persisted.

use uuid::Uuid;

use crate::domain::entity::user::User;
use crate::domain::token::Claims;

/// Runtime identity derived from a verified token
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    /// User id
    pub user_id: Uuid,
    /// User name (token subject)
    pub username: String,
    /// Email
    pub email: Option<String>,
    /// Display name
    pub full_name: Option<String>,
    /// Role reference; `None` for a step-up (guest) principal
    pub role: Option<Uuid>,
    /// Whether the second factor is enabled
    pub otp_enabled: bool,
}

impl Principal {
    /// Full principal for an authenticated user
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.user_id.into_uuid(),
            username: user.username.clone(),
            email: Some(user.email.clone()),
            full_name: Some(user.full_name.clone()),
            role: Some(user.role_ref.into_uuid()),
            otp_enabled: user.otp_enabled,
        }
    }

    /// Restricted principal for the step-up window: primary credentials
    /// passed but the second factor is pending. Role is pinned to none so
    /// the resulting partial token can never resolve a permission.
    pub fn step_up(user: &User) -> Self {
        Self {
            role: None,
            ..Self::from_user(user)
        }
    }
}

impl From<&Claims> for Principal {
    fn from(claims: &Claims) -> Self {
        Self {
            user_id: claims.uid,
            username: claims.sub.clone(),
            email: claims.email.clone(),
            full_name: claims.full_name.clone(),
            role: claims.role,
            otp_enabled: claims.otp_enabled,
        }
    }
}
