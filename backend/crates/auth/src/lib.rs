//! Auth (Authentication & Authorization) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, token codec, operation registry,
//!   repository traits
//! - `application/` - Use cases and application services
//! - `infra/` - Database implementations
//! - `presentation/` - HTTP handlers, DTOs, router, gate middleware
//!
//! ## Features
//! - Sign-in with username + password issuing signed access/refresh tokens
//! - TOTP-based step-up 2FA (Google Authenticator compatible) via a
//!   restricted partial token
//! - In-band access token rotation from a still-valid refresh token
//! - Role-based authorization over declared operations, per surface
//!   (bearer API vs. cookie admin), deny-by-default
//! - Idempotent startup reconciliation of permissions, baseline roles and
//!   bootstrap users
//!
//! ## Security Model
//! - Passwords hashed with Argon2id (NIST SP 800-63B compliant)
//! - Tokens are self-contained signed claims with a kind discriminator;
//!   cross-kind acceptance is rejected everywhere
//! - TOTP secrets are persisted only after the first correct code
//! - Post-authentication failure reasons are logged, never leaked

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use application::config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use infra::postgres::PgAuthRepository;
pub use presentation::router::auth_router;

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

// Convenience re-exports
pub mod config {
    pub use crate::application::config::*;
}

pub mod models {
    pub use crate::domain::entity::permission::Permission;
    pub use crate::domain::entity::principal::Principal;
    pub use crate::domain::entity::role::Role;
    pub use crate::domain::entity::user::User;
    pub use crate::presentation::dto::*;
}

pub mod handlers {
    pub use crate::presentation::handlers::*;
}

pub mod store {
    pub use crate::infra::postgres::PgAuthRepository as AuthStore;
}

pub mod router {
    pub use crate::presentation::router::*;
}

pub mod middleware {
    pub use crate::presentation::middleware::*;
}
