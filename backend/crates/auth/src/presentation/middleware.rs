//! Gate Middleware (Session Orchestrator)
//!
//! Per-request state machine guarding the protected routers:
//!
//! `START -> VALIDATE_ACCESS -> {VALID -> RESOLVE, INVALID -> VALIDATE_REFRESH}
//!  -> {VALID -> ROTATE -> RESOLVE, INVALID -> DENY} -> {ALLOW, DENY}`
//!
//! Two surface-specific entry points share the machine: the API surface
//! reads bearer/header tokens and answers 401 with a challenge header, the
//! admin surface reads cookies and answers with a redirect to sign-in.
//! The surfaces are deliberately not interchangeable so an API caller can
//! never come to depend on browser cookie jars.
//!
//! Refresh fallback is in-band and best-effort: the request proceeds in the
//! same call and the rotated access token rides back on the response. A
//! failed refresh is terminal for the request. Internal failure reasons are
//! logged, never surfaced.

use axum::Json;
use axum::body::Body;
use axum::extract::{MatchedPath, State};
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use platform::cookie::{extract_cookie, set_cookie_header};

use crate::application::authorize::AuthorizeUseCase;
use crate::application::config::AuthConfig;
use crate::domain::entity::principal::Principal;
use crate::domain::operation::{OperationRegistry, Surface};
use crate::domain::token::{TokenCodec, TokenKind};
use crate::domain::repository::{PermissionRepository, RoleRepository};
use crate::error::{AuthError, AuthResult};

/// Refresh token request header for the API surface
pub const REFRESH_TOKEN_HEADER: &str = "refresh-token";
/// Response header carrying an in-band rotated access token (API surface)
pub const NEW_ACCESS_TOKEN_HEADER: &str = "new-access-token";

/// Shared state for the gate middleware
pub struct GateState<R>
where
    R: RoleRepository + PermissionRepository + Clone + Send + Sync + 'static,
{
    pub repo: Arc<R>,
    pub config: Arc<AuthConfig>,
    pub codec: Arc<TokenCodec>,
    pub registry: Arc<OperationRegistry>,
}

impl<R> Clone for GateState<R>
where
    R: RoleRepository + PermissionRepository + Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            config: self.config.clone(),
            codec: self.codec.clone(),
            registry: self.registry.clone(),
        }
    }
}

/// Gate for the bearer-token API surface
pub async fn require_permission_api<R>(
    State(state): State<GateState<R>>,
    req: Request<Body>,
    next: Next,
) -> Response
where
    R: RoleRepository + PermissionRepository + Clone + Send + Sync + 'static,
{
    gate(state, Surface::Api, req, next).await
}

/// Gate for the browser/cookie admin surface
pub async fn require_permission_web<R>(
    State(state): State<GateState<R>>,
    req: Request<Body>,
    next: Next,
) -> Response
where
    R: RoleRepository + PermissionRepository + Clone + Send + Sync + 'static,
{
    gate(state, Surface::Admin, req, next).await
}

async fn gate<R>(
    state: GateState<R>,
    surface: Surface,
    mut req: Request<Body>,
    next: Next,
) -> Response
where
    R: RoleRepository + PermissionRepository + Clone + Send + Sync + 'static,
{
    let method = req.method().clone();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    // A route absent from the declared registry is denied outright; the
    // allowlist is explicit, absence-of-record is not an open door.
    let Some(operation) = state.registry.find(surface, &method, &path).cloned() else {
        tracing::warn!(%method, %path, surface = %surface, "Unmapped operation denied");
        return deny(&state.config, surface);
    };

    if state.config.dev_mode {
        tracing::debug!(operation = %operation.name, "Development mode, gate bypassed");
        return next.run(req).await;
    }

    if operation.public {
        return next.run(req).await;
    }

    let (principal, rotated) = match authenticate(&state, surface, req.headers()) {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::debug!(error = %e, operation = %operation.name, "Authentication failed");
            return deny(&state.config, surface);
        }
    };

    // RESOLVE
    let authorize = AuthorizeUseCase::new(state.repo.clone(), state.config.clone());
    if let Err(e) = authorize.execute(&principal, &operation).await {
        tracing::warn!(
            error = %e,
            username = %principal.username,
            operation = %operation.name,
            "Authorization denied"
        );
        return deny(&state.config, surface);
    }

    // ALLOW: principal rides in the request extensions
    req.extensions_mut().insert(principal);

    let mut response = next.run(req).await;

    // Attach the rotated token, surface-appropriately. Rotation is not
    // transactional with the decision above; a token handed out here grants
    // nothing by itself.
    if let Some(token) = rotated {
        attach_rotated(&state.config, surface, &mut response, &token);
    }

    response
}

/// VALIDATE_ACCESS -> VALIDATE_REFRESH -> ROTATE
///
/// Pure token work, no persistence I/O.
fn authenticate<R>(
    state: &GateState<R>,
    surface: Surface,
    headers: &HeaderMap,
) -> AuthResult<(Principal, Option<String>)>
where
    R: RoleRepository + PermissionRepository + Clone + Send + Sync + 'static,
{
    // VALIDATE_ACCESS: surface-appropriate transport
    let access_token = match surface {
        Surface::Api => bearer_token(headers),
        Surface::Admin => extract_cookie(headers, &state.config.access_cookie_name),
    };

    if let Some(token) = access_token {
        match state
            .codec
            .verify(&token)
            .and_then(|claims| claims.require_kind(TokenKind::Access).map(|_| claims))
        {
            Ok(claims) => return Ok((Principal::from(&claims), None)),
            Err(e) => {
                tracing::debug!(error = %e, "Access token invalid, trying refresh");
            }
        }
    }

    // VALIDATE_REFRESH: only reached when access validation failed
    let refresh_token = match surface {
        Surface::Api => headers
            .get(REFRESH_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        Surface::Admin => extract_cookie(headers, &state.config.refresh_cookie_name),
    };

    let refresh_token = refresh_token.ok_or(AuthError::Unauthorized)?;

    let claims = state.codec.verify(&refresh_token)?;
    claims.require_kind(TokenKind::Refresh)?;

    // ROTATE: mint a replacement access token in-band
    let principal = Principal::from(&claims);
    let new_access =
        state
            .codec
            .issue(&principal, state.config.access_ttl, TokenKind::Access)?;

    tracing::debug!(username = %principal.username, "Access token rotated in-band");

    Ok((principal, Some(new_access)))
}

/// Single caller-visible deny outcome per surface
fn deny(config: &AuthConfig, surface: Surface) -> Response {
    match surface {
        Surface::Api => (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Bearer")],
            Json(serde_json::json!({ "detail": "Unauthorized" })),
        )
            .into_response(),
        Surface::Admin => (
            StatusCode::FOUND,
            [(header::LOCATION, config.sign_in_location.clone())],
        )
            .into_response(),
    }
}

fn attach_rotated(config: &AuthConfig, surface: Surface, response: &mut Response, token: &str) {
    match surface {
        Surface::Api => {
            if let Ok(value) = HeaderValue::from_str(token) {
                response
                    .headers_mut()
                    .insert(NEW_ACCESS_TOKEN_HEADER, value);
            }
        }
        Surface::Admin => {
            response.headers_mut().append(
                header::SET_COOKIE,
                set_cookie_header(&config.access_cookie(), token),
            );
        }
    }
}

/// Extract a bearer token from the Authorization header
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(String::from)
}
