//! HTTP Handlers

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{AppendHeaders, IntoResponse, Response};
use std::sync::Arc;

use kernel::id::UserId;
use platform::cookie::extract_cookie;

use crate::application::config::AuthConfig;
use crate::application::{
    RefreshUseCase, SignInInput, SignInOutcome, SignInUseCase, SignUpInput, SignUpUseCase,
    StepUpUseCase, TokenPair, TotpSetupUseCase,
};
use crate::domain::entity::principal::Principal;
use crate::domain::repository::{RoleRepository, UserRepository};
use crate::domain::token::{TokenCodec, TokenKind};
use crate::error::{AuthError, AuthResult};
use crate::presentation::dto::{
    MessageResponse, OtpEnableRequest, OtpSetupResponse, OtpVerifyRequest, RefreshResponse,
    SignInRequest, SignUpRequest, StepUpRequiredResponse, TokenPairResponse, UserResponse,
};
use crate::presentation::middleware::{REFRESH_TOKEN_HEADER, bearer_token};

/// Shared state for auth handlers
pub struct AuthAppState<R>
where
    R: UserRepository + RoleRepository + Clone + Send + Sync + 'static,
{
    pub repo: Arc<R>,
    pub config: Arc<AuthConfig>,
    pub codec: Arc<TokenCodec>,
}

impl<R> Clone for AuthAppState<R>
where
    R: UserRepository + RoleRepository + Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            config: self.config.clone(),
            codec: self.codec.clone(),
        }
    }
}

// ============================================================================
// Sign In
// ============================================================================

/// POST /auth/sign-in
pub async fn sign_in<R>(
    State(state): State<AuthAppState<R>>,
    Json(req): Json<SignInRequest>,
) -> AuthResult<Response>
where
    R: UserRepository + RoleRepository + Clone + Send + Sync + 'static,
{
    let use_case = SignInUseCase::new(state.repo.clone(), state.config.clone(), state.codec.clone());

    let outcome = use_case
        .execute(SignInInput {
            username: req.username,
            password: req.password,
        })
        .await?;

    match outcome {
        SignInOutcome::StepUpRequired { temp_token } => Ok((
            StatusCode::ACCEPTED,
            Json(StepUpRequiredResponse {
                message: "OTP required".to_string(),
                temp_token,
                require_2fa: true,
            }),
        )
            .into_response()),
        SignInOutcome::Full(pair) => Ok(token_pair_response(&state.config, pair)),
    }
}

// ============================================================================
// Step-Up Verification
// ============================================================================

/// POST /auth/verify-otp
pub async fn verify_otp<R>(
    State(state): State<AuthAppState<R>>,
    Json(req): Json<OtpVerifyRequest>,
) -> AuthResult<Response>
where
    R: UserRepository + RoleRepository + Clone + Send + Sync + 'static,
{
    let use_case = StepUpUseCase::new(state.repo.clone(), state.config.clone(), state.codec.clone());

    let pair = use_case.execute(&req.temp_token, &req.otp_code).await?;

    Ok(token_pair_response(&state.config, pair))
}

// ============================================================================
// Rotation
// ============================================================================

/// POST /auth/refresh
///
/// Web surface presents the path-scoped cookie, the API surface the
/// `refresh-token` header. The two transports are not interchangeable with
/// the access transports.
pub async fn refresh_token<R>(
    State(state): State<AuthAppState<R>>,
    headers: HeaderMap,
) -> AuthResult<Response>
where
    R: UserRepository + RoleRepository + Clone + Send + Sync + 'static,
{
    let token = extract_cookie(&headers, &state.config.refresh_cookie_name)
        .or_else(|| {
            headers
                .get(REFRESH_TOKEN_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        })
        .ok_or(AuthError::Unauthorized)?;

    let use_case = RefreshUseCase::new(state.config.clone(), state.codec.clone());
    let output = use_case.execute(&token)?;

    let access_cookie = state
        .config
        .access_cookie()
        .build_set_cookie(&output.access_token);

    Ok((
        StatusCode::OK,
        AppendHeaders([(header::SET_COOKIE, access_cookie)]),
        Json(RefreshResponse {
            access_token: output.access_token,
            token_type: "bearer".to_string(),
        }),
    )
        .into_response())
}

// ============================================================================
// Sign Out
// ============================================================================

/// POST /auth/sign-out
///
/// Tokens are stateless, so signing out is clearing the browser's cookies;
/// bearer clients simply drop their tokens.
pub async fn sign_out<R>(State(state): State<AuthAppState<R>>) -> Response
where
    R: UserRepository + RoleRepository + Clone + Send + Sync + 'static,
{
    let clear_access = state.config.access_cookie().build_delete_cookie();
    let clear_refresh = state.config.refresh_cookie().build_delete_cookie();

    (
        StatusCode::NO_CONTENT,
        AppendHeaders([
            (header::SET_COOKIE, clear_access),
            (header::SET_COOKIE, clear_refresh),
        ]),
    )
        .into_response()
}

// ============================================================================
// Second factor management (requires an access token)
// ============================================================================

/// GET /auth/2fa/setup
pub async fn otp_setup<R>(
    State(state): State<AuthAppState<R>>,
    headers: HeaderMap,
) -> AuthResult<Json<OtpSetupResponse>>
where
    R: UserRepository + RoleRepository + Clone + Send + Sync + 'static,
{
    let principal = current_principal(&state, &headers)?;

    let use_case = TotpSetupUseCase::new(state.repo.clone(), state.config.clone());
    let output = use_case
        .setup(&UserId::from_uuid(principal.user_id))
        .await?;

    Ok(Json(OtpSetupResponse {
        secret: output.secret,
        qr_code: output.qr_code,
        otpauth_url: output.otpauth_url,
    }))
}

/// POST /auth/2fa/enable
pub async fn otp_enable<R>(
    State(state): State<AuthAppState<R>>,
    headers: HeaderMap,
    Json(req): Json<OtpEnableRequest>,
) -> AuthResult<Json<MessageResponse>>
where
    R: UserRepository + RoleRepository + Clone + Send + Sync + 'static,
{
    let principal = current_principal(&state, &headers)?;

    let use_case = TotpSetupUseCase::new(state.repo.clone(), state.config.clone());
    use_case
        .enable(&UserId::from_uuid(principal.user_id), &req.secret, &req.otp_code)
        .await?;

    Ok(Json(MessageResponse {
        message: "2FA enabled successfully".to_string(),
    }))
}

/// POST /auth/2fa/disable
pub async fn otp_disable<R>(
    State(state): State<AuthAppState<R>>,
    headers: HeaderMap,
) -> AuthResult<Json<MessageResponse>>
where
    R: UserRepository + RoleRepository + Clone + Send + Sync + 'static,
{
    let principal = current_principal(&state, &headers)?;

    let use_case = TotpSetupUseCase::new(state.repo.clone(), state.config.clone());
    use_case
        .disable(&UserId::from_uuid(principal.user_id))
        .await?;

    Ok(Json(MessageResponse {
        message: "2FA disabled successfully".to_string(),
    }))
}

// ============================================================================
// Sign Up
// ============================================================================

/// POST /auth/sign-up
pub async fn sign_up<R>(
    State(state): State<AuthAppState<R>>,
    Json(req): Json<SignUpRequest>,
) -> AuthResult<Json<UserResponse>>
where
    R: UserRepository + RoleRepository + Clone + Send + Sync + 'static,
{
    let use_case = SignUpUseCase::new(state.repo.clone(), state.config.clone());

    let output = use_case
        .execute(SignUpInput {
            username: req.username,
            password: req.password,
            email: req.email,
            full_name: req.full_name,
        })
        .await?;

    Ok(Json(UserResponse::from(&output.user)))
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolve the calling principal from a verified access token, read from
/// the bearer header or the access cookie.
fn current_principal<R>(state: &AuthAppState<R>, headers: &HeaderMap) -> AuthResult<Principal>
where
    R: UserRepository + RoleRepository + Clone + Send + Sync + 'static,
{
    let token = bearer_token(headers)
        .or_else(|| extract_cookie(headers, &state.config.access_cookie_name))
        .ok_or(AuthError::Unauthorized)?;

    let claims = state.codec.verify(&token)?;
    claims.require_kind(TokenKind::Access)?;

    Ok(Principal::from(&claims))
}

/// 200 response carrying the full pair in the body plus the two cookies:
/// site-wide access token and path-scoped refresh token.
fn token_pair_response(config: &AuthConfig, pair: TokenPair) -> Response {
    let access_cookie = config.access_cookie().build_set_cookie(&pair.access_token);
    let refresh_cookie = config
        .refresh_cookie()
        .build_set_cookie(&pair.refresh_token);

    (
        StatusCode::OK,
        AppendHeaders([
            (header::SET_COOKIE, access_cookie),
            (header::SET_COOKIE, refresh_cookie),
        ]),
        Json(TokenPairResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "bearer".to_string(),
        }),
    )
        .into_response()
}
