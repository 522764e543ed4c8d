//! Sample gated routes and the declared operation table
//!
//! One permission-mapped operation per surface keeps both orchestrator
//! paths exercised end-to-end; the inbound webhook echo is the allowlisted
//! public case. The full CRUD controllers live elsewhere.

use axum::extract::State;
use axum::http::Method;
use axum::{Extension, Json};

use auth::domain::operation::{Operation, Surface};
use auth::error::AuthResult;
use auth::models::{Principal, UserResponse};
use auth::router::auth_operations;
use auth::store::AuthStore;
use auth::domain::repository::UserRepository;

/// State for the sample handlers
#[derive(Clone)]
pub struct ApiState {
    pub repo: AuthStore,
}

/// The complete declared operation table consumed by the reconciler and
/// the gate middleware. Adding a route means adding a row here; the
/// reconciler persists the matching permission at next startup.
pub fn declared_operations() -> Vec<Operation> {
    let mut operations = auth_operations();

    operations.extend([
        Operation::protected("list_users", Method::GET, "/api/users", Surface::Api),
        Operation::protected("dashboard", Method::GET, "/admin/dashboard", Surface::Admin),
        Operation::public(
            "webhook_in_test",
            Method::POST,
            "/api/webhooks/in/test",
            Surface::Api,
        ),
    ]);

    operations
}

/// GET /api/users (API surface, permission-mapped)
pub async fn list_users(State(state): State<ApiState>) -> AuthResult<Json<Vec<UserResponse>>> {
    let users = state.repo.list().await?;

    Ok(Json(users.iter().map(UserResponse::from).collect()))
}

/// GET /admin/dashboard (admin surface, permission-mapped)
///
/// The principal is attached by the gate; in development mode the gate is
/// bypassed and none is present.
pub async fn dashboard(principal: Option<Extension<Principal>>) -> Json<serde_json::Value> {
    let username = principal.as_ref().map(|p| p.username.clone());

    Json(serde_json::json!({
        "message": "admin dashboard",
        "user": username,
    }))
}

/// POST /api/webhooks/in/test (public, allowlisted)
pub async fn webhook_echo(Json(payload): Json<serde_json::Value>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "received": payload }))
}
