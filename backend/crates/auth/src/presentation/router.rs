//! Auth Router
//!
//! Public token-lifecycle endpoints. These routes sit outside the gate
//! middleware; they are the explicitly allowlisted entry points.

use axum::{
    Router,
    routing::{get, post},
};
use http::Method;
use std::sync::Arc;

use crate::application::config::AuthConfig;
use crate::domain::operation::{Operation, Surface};
use crate::domain::repository::{RoleRepository, UserRepository};
use crate::domain::token::TokenCodec;
use crate::infra::postgres::PgAuthRepository;
use crate::presentation::handlers::{self, AuthAppState};

/// Create the Auth router with the PostgreSQL repository
pub fn auth_router(
    repo: PgAuthRepository,
    config: Arc<AuthConfig>,
    codec: Arc<TokenCodec>,
) -> Router {
    auth_router_generic(repo, config, codec)
}

/// Create a generic Auth router for any repository implementation
pub fn auth_router_generic<R>(
    repo: R,
    config: Arc<AuthConfig>,
    codec: Arc<TokenCodec>,
) -> Router
where
    R: UserRepository + RoleRepository + Clone + Send + Sync + 'static,
{
    let state = AuthAppState {
        repo: Arc::new(repo),
        config,
        codec,
    };

    Router::new()
        .route("/sign-in", post(handlers::sign_in::<R>))
        .route("/sign-out", post(handlers::sign_out::<R>))
        .route("/sign-up", post(handlers::sign_up::<R>))
        .route("/refresh", post(handlers::refresh_token::<R>))
        .route("/verify-otp", post(handlers::verify_otp::<R>))
        .route("/2fa/setup", get(handlers::otp_setup::<R>))
        .route("/2fa/enable", post(handlers::otp_enable::<R>))
        .route("/2fa/disable", post(handlers::otp_disable::<R>))
        .with_state(state)
}

/// Declared operations for the auth endpoints themselves: all public.
/// The sign-in endpoint (and friends) carry no permission requirement by
/// explicit allowlist, not by absence of a record.
pub fn auth_operations() -> Vec<Operation> {
    vec![
        Operation::public("sign_in", Method::POST, "/auth/sign-in", Surface::Api),
        Operation::public("sign_out", Method::POST, "/auth/sign-out", Surface::Api),
        Operation::public("sign_up", Method::POST, "/auth/sign-up", Surface::Api),
        Operation::public("refresh_token", Method::POST, "/auth/refresh", Surface::Api),
        Operation::public("verify_otp", Method::POST, "/auth/verify-otp", Surface::Api),
        Operation::public("otp_setup", Method::GET, "/auth/2fa/setup", Surface::Api),
        Operation::public("otp_enable", Method::POST, "/auth/2fa/enable", Surface::Api),
        Operation::public("otp_disable", Method::POST, "/auth/2fa/disable", Surface::Api),
    ]
}
