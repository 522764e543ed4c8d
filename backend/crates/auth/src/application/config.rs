//! Application Configuration
//!
//! Configuration for the auth application layer. Constructed once at
//! startup and passed by reference into every component; there is no
//! process-wide mutable singleton.

use std::time::Duration;

use jsonwebtoken::Algorithm;
use platform::cookie::CookieConfig;

/// Re-export SameSite from platform
pub use platform::cookie::SameSite;

use crate::domain::token::TokenCodec;

/// Bootstrap account credentials for a baseline role
#[derive(Debug, Clone)]
pub struct BootstrapUser {
    pub username: String,
    pub password: String,
    pub email: String,
}

impl BootstrapUser {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            email: email.into(),
        }
    }
}

/// Auth application configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Token signing secret
    pub jwt_secret: Vec<u8>,
    /// Token signing algorithm
    pub jwt_algorithm: Algorithm,
    /// Access token TTL (20 minutes)
    pub access_ttl: Duration,
    /// Refresh token TTL (7 days)
    pub refresh_ttl: Duration,
    /// Partial (step-up) token TTL (5 minutes)
    pub partial_ttl: Duration,
    /// Development mode: bypasses authorization entirely.
    /// Must be disabled in any non-development deployment.
    pub dev_mode: bool,
    /// Whether to require Secure cookie
    pub cookie_secure: bool,
    /// SameSite policy
    pub cookie_same_site: SameSite,
    /// Access token cookie name
    pub access_cookie_name: String,
    /// Refresh token cookie name
    pub refresh_cookie_name: String,
    /// Path scope of the refresh cookie (the rotation endpoint)
    pub refresh_cookie_path: String,
    /// Where the web surface redirects on deny
    pub sign_in_location: String,
    /// Issuer embedded in TOTP provisioning URIs
    pub totp_issuer: String,
    /// Password pepper (optional, application-wide secret)
    pub password_pepper: Option<Vec<u8>>,
    /// Bootstrap owner account (full access)
    pub owner: BootstrapUser,
    /// Bootstrap subscriber account (no access)
    pub subscriber: BootstrapUser,
    /// Bootstrap observer account (metrics only)
    pub observer: BootstrapUser,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: Vec::new(),
            jwt_algorithm: Algorithm::HS256,
            access_ttl: Duration::from_secs(20 * 60),
            refresh_ttl: Duration::from_secs(7 * 24 * 3600),
            partial_ttl: Duration::from_secs(5 * 60),
            dev_mode: false,
            cookie_secure: true,
            cookie_same_site: SameSite::Lax,
            access_cookie_name: "access_token".to_string(),
            refresh_cookie_name: "refresh_token".to_string(),
            refresh_cookie_path: "/auth/refresh".to_string(),
            sign_in_location: "/admin/sign-in".to_string(),
            totp_issuer: "Gatehouse".to_string(),
            password_pepper: None,
            owner: BootstrapUser::new("admin", "change_this_password", "admin@example.com"),
            subscriber: BootstrapUser::new(
                "subscriber",
                "change_this_password",
                "subscriber@example.com",
            ),
            observer: BootstrapUser::new("observer", "observer", "observer@example.com"),
        }
    }
}

impl AuthConfig {
    /// Create config with a random signing secret (for development)
    pub fn with_random_secret() -> Self {
        use rand::RngCore;
        let mut secret = vec![0u8; 32];
        rand::rng().fill_bytes(&mut secret);
        Self {
            jwt_secret: secret,
            ..Default::default()
        }
    }

    /// Create config for development (insecure cookie, authorization bypass)
    pub fn development() -> Self {
        Self {
            dev_mode: true,
            cookie_secure: false,
            ..Self::with_random_secret()
        }
    }

    /// Build the token codec for this configuration
    pub fn codec(&self) -> TokenCodec {
        TokenCodec::new(&self.jwt_secret, self.jwt_algorithm)
    }

    /// Get password pepper as slice
    pub fn pepper(&self) -> Option<&[u8]> {
        self.password_pepper.as_deref()
    }

    /// Cookie configuration for the access token (site-wide)
    pub fn access_cookie(&self) -> CookieConfig {
        CookieConfig {
            secure: self.cookie_secure,
            same_site: self.cookie_same_site,
            ..CookieConfig::access_token(
                self.access_cookie_name.clone(),
                self.access_ttl.as_secs() as i64,
            )
        }
    }

    /// Cookie configuration for the refresh token, path-scoped to the
    /// rotation endpoint.
    pub fn refresh_cookie(&self) -> CookieConfig {
        CookieConfig {
            secure: self.cookie_secure,
            same_site: self.cookie_same_site,
            ..CookieConfig::refresh_token(
                self.refresh_cookie_name.clone(),
                self.refresh_cookie_path.clone(),
                self.refresh_ttl.as_secs() as i64,
            )
        }
    }
}
