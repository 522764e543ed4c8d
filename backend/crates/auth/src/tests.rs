//! Scenario tests for the auth crate
//!
//! Driven through the real routers and gate middleware with an in-memory
//! repository, so the full token lifecycle is exercised without a database.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::application::config::AuthConfig;
use crate::domain::entity::{permission::Permission, role::Role, user::User};
use crate::domain::operation::Surface;
use crate::domain::repository::{PermissionRepository, RoleRepository, UserRepository};
use crate::error::AuthResult;
use kernel::id::{PermissionId, RoleId, UserId};

// ============================================================================
// In-memory repository
// ============================================================================

#[derive(Clone, Default)]
struct InMemoryRepository {
    inner: Arc<Mutex<Store>>,
}

#[derive(Default)]
struct Store {
    users: HashMap<Uuid, User>,
    roles: HashMap<Uuid, Role>,
    permissions: HashMap<Uuid, Permission>,
    role_permissions: HashSet<(Uuid, Uuid)>,
}

impl UserRepository for InMemoryRepository {
    async fn create(&self, user: &User) -> AuthResult<()> {
        let mut store = self.inner.lock().unwrap();
        store.users.insert(user.user_id.into_uuid(), user.clone());
        Ok(())
    }

    async fn find_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>> {
        let store = self.inner.lock().unwrap();
        Ok(store.users.get(user_id.as_uuid()).cloned())
    }

    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>> {
        let store = self.inner.lock().unwrap();
        Ok(store
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn exists_by_username(&self, username: &str) -> AuthResult<bool> {
        let store = self.inner.lock().unwrap();
        Ok(store.users.values().any(|u| u.username == username))
    }

    async fn update(&self, user: &User) -> AuthResult<()> {
        let mut store = self.inner.lock().unwrap();
        store.users.insert(user.user_id.into_uuid(), user.clone());
        Ok(())
    }

    async fn list(&self) -> AuthResult<Vec<User>> {
        let store = self.inner.lock().unwrap();
        Ok(store.users.values().cloned().collect())
    }
}

impl RoleRepository for InMemoryRepository {
    async fn create(&self, role: &Role) -> AuthResult<()> {
        let mut store = self.inner.lock().unwrap();
        store.roles.insert(role.role_id.into_uuid(), role.clone());
        Ok(())
    }

    async fn find_role(&self, role_id: &RoleId) -> AuthResult<Option<Role>> {
        let store = self.inner.lock().unwrap();
        Ok(store
            .roles
            .get(role_id.as_uuid())
            .filter(|r| r.deleted_at.is_none())
            .cloned())
    }

    async fn find_role_by_name(&self, name: &str) -> AuthResult<Option<Role>> {
        let store = self.inner.lock().unwrap();
        Ok(store
            .roles
            .values()
            .find(|r| r.name == name && r.deleted_at.is_none())
            .cloned())
    }

    async fn add_permission(
        &self,
        role_id: &RoleId,
        permission_id: &PermissionId,
    ) -> AuthResult<()> {
        let mut store = self.inner.lock().unwrap();
        store
            .role_permissions
            .insert((role_id.into_uuid(), permission_id.into_uuid()));
        // Write the embedded cache through, like the Postgres transaction
        if let Some(role) = store.roles.get_mut(role_id.as_uuid()) {
            role.cache_grant(permission_id);
        }
        Ok(())
    }

    async fn remove_permission(
        &self,
        role_id: &RoleId,
        permission_id: &PermissionId,
    ) -> AuthResult<()> {
        let mut store = self.inner.lock().unwrap();
        store
            .role_permissions
            .remove(&(role_id.into_uuid(), permission_id.into_uuid()));
        if let Some(role) = store.roles.get_mut(role_id.as_uuid()) {
            role.cache_revoke(permission_id);
        }
        Ok(())
    }

    async fn has_permission(
        &self,
        role_id: &RoleId,
        permission_id: &PermissionId,
    ) -> AuthResult<bool> {
        let store = self.inner.lock().unwrap();
        Ok(store
            .role_permissions
            .contains(&(role_id.into_uuid(), permission_id.into_uuid())))
    }
}

impl PermissionRepository for InMemoryRepository {
    async fn create_permissions(&self, permissions: &[Permission]) -> AuthResult<u64> {
        let mut store = self.inner.lock().unwrap();
        let mut inserted = 0u64;

        for permission in permissions {
            let duplicate = store.permissions.values().any(|p| {
                p.name == permission.name
                    && p.action == permission.action
                    && p.surface == permission.surface
            });
            if !duplicate {
                store
                    .permissions
                    .insert(permission.permission_id.into_uuid(), permission.clone());
                inserted += 1;
            }
        }

        Ok(inserted)
    }

    async fn find_required(
        &self,
        name: &str,
        action: &str,
        surface: Surface,
    ) -> AuthResult<Option<Permission>> {
        let store = self.inner.lock().unwrap();
        Ok(store
            .permissions
            .values()
            .find(|p| p.name == name && p.action == action && p.surface == surface && p.is_active())
            .cloned())
    }

    async fn permission_names(&self, surface: Surface) -> AuthResult<HashSet<String>> {
        let store = self.inner.lock().unwrap();
        Ok(store
            .permissions
            .values()
            .filter(|p| p.surface == surface && p.deleted_at.is_none())
            .map(|p| p.name.clone())
            .collect())
    }

    async fn all_permission_ids(&self) -> AuthResult<Vec<PermissionId>> {
        let store = self.inner.lock().unwrap();
        Ok(store
            .permissions
            .values()
            .filter(|p| p.deleted_at.is_none())
            .map(|p| p.permission_id)
            .collect())
    }

    async fn count_permissions(&self) -> AuthResult<i64> {
        let store = self.inner.lock().unwrap();
        Ok(store
            .permissions
            .values()
            .filter(|p| p.deleted_at.is_none())
            .count() as i64)
    }
}

// ============================================================================
// Fixtures
// ============================================================================

mod fixtures {
    use super::*;
    use crate::domain::operation::{Operation, OperationRegistry};
    use crate::domain::token::TokenCodec;
    use crate::domain::value_object::user_password::UserPassword;
    use http::Method;

    pub fn test_config() -> Arc<AuthConfig> {
        Arc::new(AuthConfig {
            cookie_secure: false,
            ..AuthConfig::with_random_secret()
        })
    }

    pub fn test_codec(config: &AuthConfig) -> Arc<TokenCodec> {
        Arc::new(config.codec())
    }

    pub fn test_registry() -> Arc<OperationRegistry> {
        Arc::new(OperationRegistry::new(vec![
            Operation::protected("list_users", Method::GET, "/api/users", Surface::Api),
            Operation::protected("dashboard", Method::GET, "/admin/dashboard", Surface::Admin),
            Operation::public(
                "webhook_in_test",
                Method::POST,
                "/api/webhooks/in/test",
                Surface::Api,
            ),
        ]))
    }

    pub async fn seed_role(repo: &InMemoryRepository, name: &str, level: i32) -> Role {
        let role = Role::new(name, format!("{name} role"), level);
        RoleRepository::create(repo, &role).await.unwrap();
        role
    }

    pub async fn seed_user(
        repo: &InMemoryRepository,
        username: &str,
        password: &str,
        role: &Role,
    ) -> User {
        let user = User::new(
            username,
            format!("{username}@example.com"),
            username,
            UserPassword::from_raw_unchecked(password.to_string(), None).unwrap(),
            role.role_id,
        );
        UserRepository::create(repo, &user).await.unwrap();
        user
    }
}

// ============================================================================
// Resolver: association set drives authorize
// ============================================================================

mod resolver_tests {
    use super::fixtures::*;
    use super::*;
    use crate::application::authorize::AuthorizeUseCase;
    use crate::domain::entity::principal::Principal;
    use crate::domain::operation::Operation;
    use crate::error::AuthError;
    use http::Method;

    fn list_users_op() -> Operation {
        Operation::protected("list_users", Method::GET, "/api/users", Surface::Api)
    }

    #[tokio::test]
    async fn test_authorize_follows_association_set() {
        let repo = InMemoryRepository::default();
        let config = test_config();

        let role = seed_role(&repo, "staff", 10).await;
        let user = seed_user(&repo, "alice", "password123", &role).await;
        let principal = Principal::from_user(&user);

        let permission = Permission::new("list_users", "GET", "/api/users", Surface::Api);
        repo.create_permissions(std::slice::from_ref(&permission))
            .await
            .unwrap();

        let authorize = AuthorizeUseCase::new(Arc::new(repo.clone()), config);
        let op = list_users_op();

        // No association yet
        assert!(matches!(
            authorize.execute(&principal, &op).await,
            Err(AuthError::Unauthorized)
        ));

        // Inserted pair authorizes
        repo.add_permission(&role.role_id, &permission.permission_id)
            .await
            .unwrap();
        assert!(authorize.execute(&principal, &op).await.is_ok());

        // Removed pair denies immediately
        repo.remove_permission(&role.role_id, &permission.permission_id)
            .await
            .unwrap();
        assert!(matches!(
            authorize.execute(&principal, &op).await,
            Err(AuthError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_missing_permission_record_denies() {
        let repo = InMemoryRepository::default();
        let config = test_config();

        let role = seed_role(&repo, "staff", 10).await;
        let user = seed_user(&repo, "alice", "password123", &role).await;
        let principal = Principal::from_user(&user);

        let authorize = AuthorizeUseCase::new(Arc::new(repo), config);

        assert!(matches!(
            authorize.execute(&principal, &list_users_op()).await,
            Err(AuthError::MissingPermissionRecord(_))
        ));
    }

    #[tokio::test]
    async fn test_roleless_principal_denied() {
        let repo = InMemoryRepository::default();
        let config = test_config();

        let role = seed_role(&repo, "staff", 10).await;
        let user = seed_user(&repo, "alice", "password123", &role).await;
        // Step-up principal has no role
        let principal = Principal::step_up(&user);

        let permission = Permission::new("list_users", "GET", "/api/users", Surface::Api);
        repo.create_permissions(std::slice::from_ref(&permission))
            .await
            .unwrap();
        repo.add_permission(&role.role_id, &permission.permission_id)
            .await
            .unwrap();

        let authorize = AuthorizeUseCase::new(Arc::new(repo), config);

        assert!(matches!(
            authorize.execute(&principal, &list_users_op()).await,
            Err(AuthError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_disabled_role_denied() {
        let repo = InMemoryRepository::default();
        let config = test_config();

        let mut role = seed_role(&repo, "staff", 10).await;
        let user = seed_user(&repo, "alice", "password123", &role).await;
        let principal = Principal::from_user(&user);

        let permission = Permission::new("list_users", "GET", "/api/users", Surface::Api);
        repo.create_permissions(std::slice::from_ref(&permission))
            .await
            .unwrap();
        repo.add_permission(&role.role_id, &permission.permission_id)
            .await
            .unwrap();

        role.disabled = true;
        RoleRepository::create(&repo, &role).await.unwrap();

        let authorize = AuthorizeUseCase::new(Arc::new(repo), config);

        assert!(matches!(
            authorize.execute(&principal, &list_users_op()).await,
            Err(AuthError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_dev_mode_bypasses_authorization() {
        let repo = InMemoryRepository::default();
        let config = Arc::new(AuthConfig {
            dev_mode: true,
            ..AuthConfig::with_random_secret()
        });

        let role = seed_role(&repo, "staff", 10).await;
        let user = seed_user(&repo, "alice", "password123", &role).await;
        let principal = Principal::from_user(&user);

        let authorize = AuthorizeUseCase::new(Arc::new(repo), config);

        // No permission records at all, still allowed
        assert!(authorize.execute(&principal, &list_users_op()).await.is_ok());
    }

    #[tokio::test]
    async fn test_write_through_cache_tracks_associations() {
        let repo = InMemoryRepository::default();

        let role = seed_role(&repo, "staff", 10).await;
        let permission = Permission::new("list_users", "GET", "/api/users", Surface::Api);
        repo.create_permissions(std::slice::from_ref(&permission))
            .await
            .unwrap();

        repo.add_permission(&role.role_id, &permission.permission_id)
            .await
            .unwrap();
        let cached = repo.find_role(&role.role_id).await.unwrap().unwrap();
        assert!(cached.permissions.contains(permission.permission_id.as_uuid()));

        repo.remove_permission(&role.role_id, &permission.permission_id)
            .await
            .unwrap();
        let cached = repo.find_role(&role.role_id).await.unwrap().unwrap();
        assert!(!cached.permissions.contains(permission.permission_id.as_uuid()));
    }
}

// ============================================================================
// Reconciler: idempotent startup sync
// ============================================================================

mod reconciler_tests {
    use super::fixtures::*;
    use super::*;
    use crate::application::reconcile::{ReconcileReport, ReconcileUseCase};
    use crate::domain::operation::{Operation, OperationRegistry};
    use http::Method;

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let repo = InMemoryRepository::default();
        let config = test_config();
        let registry = test_registry();

        let reconcile = ReconcileUseCase::new(Arc::new(repo.clone()), config);

        let first = reconcile.run(&registry).await.unwrap();
        assert_eq!(first.permissions_inserted, 2); // list_users + dashboard
        assert_eq!(first.roles_created, 3);
        assert_eq!(first.users_created, 3);

        let count_after_first = repo.count_permissions().await.unwrap();

        // Unchanged registry: zero work the second time
        let second = reconcile.run(&registry).await.unwrap();
        assert_eq!(second, ReconcileReport::default());
        assert_eq!(repo.count_permissions().await.unwrap(), count_after_first);
    }

    #[tokio::test]
    async fn test_public_operations_get_no_permission_rows() {
        let repo = InMemoryRepository::default();
        let config = test_config();
        let registry = test_registry();

        ReconcileUseCase::new(Arc::new(repo.clone()), config)
            .run(&registry)
            .await
            .unwrap();

        assert!(
            repo.find_required("webhook_in_test", "POST", Surface::Api)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_owner_holds_every_permission() {
        let repo = InMemoryRepository::default();
        let config = test_config();
        let registry = test_registry();

        ReconcileUseCase::new(Arc::new(repo.clone()), config)
            .run(&registry)
            .await
            .unwrap();

        let owner = repo.find_role_by_name("owner").await.unwrap().unwrap();
        for permission_id in repo.all_permission_ids().await.unwrap() {
            assert!(
                repo.has_permission(&owner.role_id, &permission_id)
                    .await
                    .unwrap()
            );
        }
    }

    #[tokio::test]
    async fn test_registry_growth_reconciles_incrementally() {
        let repo = InMemoryRepository::default();
        let config = test_config();

        let reconcile = ReconcileUseCase::new(Arc::new(repo.clone()), config);
        reconcile.run(&test_registry()).await.unwrap();

        // A new operation appears in a later deployment
        let mut ops: Vec<Operation> = test_registry().operations().to_vec();
        ops.push(Operation::protected(
            "delete_users",
            Method::DELETE,
            "/api/users",
            Surface::Api,
        ));
        let grown = OperationRegistry::new(ops);

        let report = reconcile.run(&grown).await.unwrap();
        assert_eq!(report.permissions_inserted, 1);
        assert_eq!(report.roles_created, 0);
        assert_eq!(report.users_created, 0);
        // Owner keeps full access as the registry grows
        assert_eq!(report.owner_grants_added, 1);
    }

    #[tokio::test]
    async fn test_baseline_users_exist_per_role() {
        let repo = InMemoryRepository::default();
        let config = test_config();

        ReconcileUseCase::new(Arc::new(repo.clone()), config.clone())
            .run(&test_registry())
            .await
            .unwrap();

        for bootstrap in [&config.owner, &config.subscriber, &config.observer] {
            let user = repo
                .find_by_username(&bootstrap.username)
                .await
                .unwrap()
                .expect("bootstrap user should exist");
            assert!(user.password_hash.verify(&bootstrap.password, None));
        }
    }
}

// ============================================================================
// HTTP scenarios through the routers
// ============================================================================

mod http_scenarios {
    use super::fixtures::*;
    use super::*;
    use crate::application::reconcile::ReconcileUseCase;
    use crate::domain::entity::principal::Principal;
    use crate::domain::token::{TokenCodec, TokenKind};
    use crate::domain::value_object::totp_secret::TotpSecret;
    use crate::presentation::middleware::{
        GateState, NEW_ACCESS_TOKEN_HEADER, REFRESH_TOKEN_HEADER, require_permission_api,
        require_permission_web,
    };
    use crate::presentation::router::auth_router_generic;
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, Response, StatusCode, header};
    use axum::routing::get;
    use chrono::Utc;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn ok_handler() -> &'static str {
        "ok"
    }

    struct TestApp {
        repo: InMemoryRepository,
        config: Arc<AuthConfig>,
        codec: Arc<TokenCodec>,
    }

    impl TestApp {
        async fn new() -> Self {
            let repo = InMemoryRepository::default();
            let config = test_config();
            let codec = test_codec(&config);

            ReconcileUseCase::new(Arc::new(repo.clone()), config.clone())
                .run(&test_registry())
                .await
                .unwrap();

            Self {
                repo,
                config,
                codec,
            }
        }

        fn auth_router(&self) -> Router {
            Router::new().nest(
                "/auth",
                auth_router_generic(self.repo.clone(), self.config.clone(), self.codec.clone()),
            )
        }

        fn gated_router(&self) -> Router {
            let state = GateState {
                repo: Arc::new(self.repo.clone()),
                config: self.config.clone(),
                codec: self.codec.clone(),
                registry: test_registry(),
            };

            let api = Router::new()
                .route("/api/users", get(ok_handler))
                .route_layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    require_permission_api::<InMemoryRepository>,
                ));

            let admin = Router::new()
                .route("/admin/dashboard", get(ok_handler))
                .route_layer(axum::middleware::from_fn_with_state(
                    state,
                    require_permission_web::<InMemoryRepository>,
                ));

            Router::new().merge(api).merge(admin)
        }

        async fn owner_principal(&self) -> Principal {
            let owner = self
                .repo
                .find_by_username(&self.config.owner.username)
                .await
                .unwrap()
                .unwrap();
            Principal::from_user(&owner)
        }
    }

    async fn post_json(router: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
        router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn body_json(response: Response<Body>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    // ------------------------------------------------------------------
    // Scenario A: sign-in without second factor
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_sign_in_without_second_factor() {
        let app = TestApp::new().await;

        let response = post_json(
            app.auth_router(),
            "/auth/sign-in",
            serde_json::json!({
                "username": app.config.owner.username.clone(),
                "password": app.config.owner.password.clone(),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);

        let cookies: Vec<String> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();

        assert!(cookies.iter().any(|c| c.starts_with("access_token=")));
        // Refresh cookie is path-scoped to the rotation endpoint
        assert!(
            cookies
                .iter()
                .any(|c| c.starts_with("refresh_token=") && c.contains("Path=/auth/refresh"))
        );
        assert!(cookies.iter().all(|c| c.contains("HttpOnly")));

        let body = body_json(response).await;
        let access = body["access_token"].as_str().unwrap();
        let refresh = body["refresh_token"].as_str().unwrap();
        assert!(!access.is_empty());
        assert!(!refresh.is_empty());

        // The pair carries the right kinds
        let claims = app.codec.verify(access).unwrap();
        assert!(claims.require_kind(TokenKind::Access).is_ok());
        let claims = app.codec.verify(refresh).unwrap();
        assert!(claims.require_kind(TokenKind::Refresh).is_ok());
    }

    #[tokio::test]
    async fn test_sign_in_wrong_password_is_401() {
        let app = TestApp::new().await;

        let response = post_json(
            app.auth_router(),
            "/auth/sign-in",
            serde_json::json!({
                "username": app.config.owner.username.clone(),
                "password": "definitely-wrong",
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_sign_in_unknown_user_is_404() {
        let app = TestApp::new().await;

        let response = post_json(
            app.auth_router(),
            "/auth/sign-in",
            serde_json::json!({ "username": "ghost", "password": "whatever" }),
        )
        .await;

        // Unknown-user and wrong-password may differ at sign-in; post-auth
        // outcomes must not
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    // ------------------------------------------------------------------
    // Scenario B: sign-in with second factor, step-up verification
    // ------------------------------------------------------------------

    async fn enable_otp_for_owner(app: &TestApp) -> TotpSecret {
        let mut owner = app
            .repo
            .find_by_username(&app.config.owner.username)
            .await
            .unwrap()
            .unwrap();
        let secret = TotpSecret::generate();
        owner.enable_otp(secret.clone());
        app.repo.update(&owner).await.unwrap();
        secret
    }

    #[tokio::test]
    async fn test_step_up_flow() {
        let app = TestApp::new().await;
        let secret = enable_otp_for_owner(&app).await;

        // Step 1: credentials alone yield 202 + partial token
        let response = post_json(
            app.auth_router(),
            "/auth/sign-in",
            serde_json::json!({
                "username": app.config.owner.username.clone(),
                "password": app.config.owner.password.clone(),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = body_json(response).await;
        assert_eq!(body["require_2fa"], serde_json::json!(true));
        let temp_token = body["temp_token"].as_str().unwrap().to_string();

        let claims = app.codec.verify(&temp_token).unwrap();
        assert!(claims.require_kind(TokenKind::Partial).is_ok());
        assert_eq!(claims.role, None);

        // Wrong code: 401, token not consumed
        let response = post_json(
            app.auth_router(),
            "/auth/verify-otp",
            serde_json::json!({ "temp_token": temp_token, "otp_code": "000000" }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // Retry with the current code: full pair
        let code = secret
            .generate_current(&app.config.owner.username)
            .unwrap();
        let response = post_json(
            app.auth_router(),
            "/auth/verify-otp",
            serde_json::json!({ "temp_token": temp_token, "otp_code": code }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(!body["access_token"].as_str().unwrap().is_empty());
        assert!(!body["refresh_token"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_step_up_rejects_non_partial_tokens() {
        let app = TestApp::new().await;
        let secret = enable_otp_for_owner(&app).await;

        let principal = app.owner_principal().await;
        let access = app
            .codec
            .issue(&principal, app.config.access_ttl, TokenKind::Access)
            .unwrap();

        let code = secret
            .generate_current(&app.config.owner.username)
            .unwrap();

        // An access token at the step-up endpoint must fail even with a
        // correct code (token-confusion)
        let response = post_json(
            app.auth_router(),
            "/auth/verify-otp",
            serde_json::json!({ "temp_token": access, "otp_code": code }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // ------------------------------------------------------------------
    // Rotation endpoint
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_refresh_endpoint_rotates() {
        let app = TestApp::new().await;
        let principal = app.owner_principal().await;

        let refresh = app
            .codec
            .issue(&principal, app.config.refresh_ttl, TokenKind::Refresh)
            .unwrap();

        let response = app
            .auth_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/refresh")
                    .header(REFRESH_TOKEN_HEADER, &refresh)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let access = body["access_token"].as_str().unwrap();
        let claims = app.codec.verify(access).unwrap();
        assert!(claims.require_kind(TokenKind::Access).is_ok());
    }

    #[tokio::test]
    async fn test_refresh_endpoint_rejects_access_token() {
        let app = TestApp::new().await;
        let principal = app.owner_principal().await;

        let access = app
            .codec
            .issue(&principal, app.config.access_ttl, TokenKind::Access)
            .unwrap();

        let response = app
            .auth_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/refresh")
                    .header(REFRESH_TOKEN_HEADER, &access)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // ------------------------------------------------------------------
    // Scenario C: gate middleware with refresh fallback
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_api_gate_allows_valid_access_token() {
        let app = TestApp::new().await;
        let principal = app.owner_principal().await;

        let access = app
            .codec
            .issue(&principal, app.config.access_ttl, TokenKind::Access)
            .unwrap();

        let response = app
            .gated_router()
            .oneshot(
                Request::builder()
                    .uri("/api/users")
                    .header(header::AUTHORIZATION, format!("Bearer {access}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        // No rotation happened
        assert!(response.headers().get(NEW_ACCESS_TOKEN_HEADER).is_none());
    }

    #[tokio::test]
    async fn test_api_gate_rotates_on_expired_access() {
        let app = TestApp::new().await;
        let principal = app.owner_principal().await;

        let now = Utc::now().timestamp();
        let expired = app
            .codec
            .issue_at(&principal, now - 3600, now - 1800, TokenKind::Access)
            .unwrap();
        let refresh = app
            .codec
            .issue(&principal, app.config.refresh_ttl, TokenKind::Refresh)
            .unwrap();

        let response = app
            .gated_router()
            .oneshot(
                Request::builder()
                    .uri("/api/users")
                    .header(header::AUTHORIZATION, format!("Bearer {expired}"))
                    .header(REFRESH_TOKEN_HEADER, &refresh)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        // The in-band rotated token rides back in the response header
        let rotated = response
            .headers()
            .get(NEW_ACCESS_TOKEN_HEADER)
            .expect("rotated token header")
            .to_str()
            .unwrap();
        let claims = app.codec.verify(rotated).unwrap();
        assert!(claims.require_kind(TokenKind::Access).is_ok());
    }

    #[tokio::test]
    async fn test_api_gate_denies_expired_access_without_refresh() {
        let app = TestApp::new().await;
        let principal = app.owner_principal().await;

        let now = Utc::now().timestamp();
        let expired = app
            .codec
            .issue_at(&principal, now - 3600, now - 1800, TokenKind::Access)
            .unwrap();

        let response = app
            .gated_router()
            .oneshot(
                Request::builder()
                    .uri("/api/users")
                    .header(header::AUTHORIZATION, format!("Bearer {expired}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }

    #[tokio::test]
    async fn test_api_gate_rejects_refresh_token_as_access() {
        let app = TestApp::new().await;
        let principal = app.owner_principal().await;

        // A refresh token presented as a bearer access token must not
        // authorize business operations
        let refresh = app
            .codec
            .issue(&principal, app.config.refresh_ttl, TokenKind::Refresh)
            .unwrap();

        let response = app
            .gated_router()
            .oneshot(
                Request::builder()
                    .uri("/api/users")
                    .header(header::AUTHORIZATION, format!("Bearer {refresh}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_api_gate_rejects_partial_token_as_access() {
        let app = TestApp::new().await;
        let owner = app
            .repo
            .find_by_username(&app.config.owner.username)
            .await
            .unwrap()
            .unwrap();

        let partial = app
            .codec
            .issue(
                &Principal::step_up(&owner),
                app.config.partial_ttl,
                TokenKind::Partial,
            )
            .unwrap();

        let response = app
            .gated_router()
            .oneshot(
                Request::builder()
                    .uri("/api/users")
                    .header(header::AUTHORIZATION, format!("Bearer {partial}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_web_gate_redirects_without_session() {
        let app = TestApp::new().await;

        let response = app
            .gated_router()
            .oneshot(
                Request::builder()
                    .uri("/admin/dashboard")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            app.config.sign_in_location.as_str()
        );
    }

    #[tokio::test]
    async fn test_web_gate_rotates_from_refresh_cookie() {
        let app = TestApp::new().await;
        let principal = app.owner_principal().await;

        let now = Utc::now().timestamp();
        let expired = app
            .codec
            .issue_at(&principal, now - 3600, now - 1800, TokenKind::Access)
            .unwrap();
        let refresh = app
            .codec
            .issue(&principal, app.config.refresh_ttl, TokenKind::Refresh)
            .unwrap();

        let response = app
            .gated_router()
            .oneshot(
                Request::builder()
                    .uri("/admin/dashboard")
                    .header(
                        header::COOKIE,
                        format!("access_token={expired}; refresh_token={refresh}"),
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        // Rotated token comes back as a cookie on the web surface
        let cookies: Vec<String> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert!(cookies.iter().any(|c| c.starts_with("access_token=")));
    }

    #[tokio::test]
    async fn test_api_gate_ignores_cookies() {
        let app = TestApp::new().await;
        let principal = app.owner_principal().await;

        // The two surfaces must not be interchangeable: a cookie session
        // does nothing on the bearer API surface
        let access = app
            .codec
            .issue(&principal, app.config.access_ttl, TokenKind::Access)
            .unwrap();

        let response = app
            .gated_router()
            .oneshot(
                Request::builder()
                    .uri("/api/users")
                    .header(header::COOKIE, format!("access_token={access}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unmapped_operation_denied_by_default() {
        let app = TestApp::new().await;
        let principal = app.owner_principal().await;

        let access = app
            .codec
            .issue(&principal, app.config.access_ttl, TokenKind::Access)
            .unwrap();

        // Routable but undeclared: still denied
        let gated = {
            let state = GateState {
                repo: Arc::new(app.repo.clone()),
                config: app.config.clone(),
                codec: app.codec.clone(),
                registry: test_registry(),
            };
            Router::new()
                .route("/api/undeclared", get(ok_handler))
                .route_layer(axum::middleware::from_fn_with_state(
                    state,
                    require_permission_api::<InMemoryRepository>,
                ))
        };

        let response = gated
            .oneshot(
                Request::builder()
                    .uri("/api/undeclared")
                    .header(header::AUTHORIZATION, format!("Bearer {access}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // ------------------------------------------------------------------
    // Scenario D: role with zero permissions
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_empty_role_denied_everywhere() {
        let app = TestApp::new().await;

        // Subscriber has no permission associations
        let subscriber = app
            .repo
            .find_by_username(&app.config.subscriber.username)
            .await
            .unwrap()
            .unwrap();
        let principal = Principal::from_user(&subscriber);

        let access = app
            .codec
            .issue(&principal, app.config.access_ttl, TokenKind::Access)
            .unwrap();

        let response = app
            .gated_router()
            .oneshot(
                Request::builder()
                    .uri("/api/users")
                    .header(header::AUTHORIZATION, format!("Bearer {access}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .gated_router()
            .oneshot(
                Request::builder()
                    .uri("/admin/dashboard")
                    .header(header::COOKIE, format!("access_token={access}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
    }

    // ------------------------------------------------------------------
    // Second-factor management endpoints
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_otp_setup_persists_nothing_until_enable() {
        let app = TestApp::new().await;
        let principal = app.owner_principal().await;

        let access = app
            .codec
            .issue(&principal, app.config.access_ttl, TokenKind::Access)
            .unwrap();

        let response = app
            .auth_router()
            .oneshot(
                Request::builder()
                    .uri("/auth/2fa/setup")
                    .header(header::AUTHORIZATION, format!("Bearer {access}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let secret = body["secret"].as_str().unwrap().to_string();
        assert!(!secret.is_empty());
        assert!(!body["qr_code"].as_str().unwrap().is_empty());
        assert!(body["otpauth_url"].as_str().unwrap().starts_with("otpauth://"));

        // Nothing persisted yet
        let owner = app
            .repo
            .find_by_username(&app.config.owner.username)
            .await
            .unwrap()
            .unwrap();
        assert!(owner.otp_secret.is_none());
        assert!(!owner.otp_enabled);

        // Enable with a wrong code: still nothing persisted
        let response = app
            .auth_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/2fa/enable")
                    .header(header::AUTHORIZATION, format!("Bearer {access}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        serde_json::json!({ "secret": secret, "otp_code": "000000" }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let owner = app
            .repo
            .find_by_username(&app.config.owner.username)
            .await
            .unwrap()
            .unwrap();
        assert!(owner.otp_secret.is_none());

        // Enable with the correct code persists secret + flag
        let code = TotpSecret::from_base32(secret.clone())
            .unwrap()
            .generate_current(&app.config.owner.username)
            .unwrap();

        let response = app
            .auth_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/2fa/enable")
                    .header(header::AUTHORIZATION, format!("Bearer {access}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        serde_json::json!({ "secret": secret, "otp_code": code }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let owner = app
            .repo
            .find_by_username(&app.config.owner.username)
            .await
            .unwrap()
            .unwrap();
        assert!(owner.otp_enabled);
        assert_eq!(owner.otp_secret.unwrap().as_base32(), secret);
    }

    #[tokio::test]
    async fn test_otp_disable_clears_secret() {
        let app = TestApp::new().await;
        enable_otp_for_owner(&app).await;
        let principal = app.owner_principal().await;

        let access = app
            .codec
            .issue(&principal, app.config.access_ttl, TokenKind::Access)
            .unwrap();

        let response = app
            .auth_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/2fa/disable")
                    .header(header::AUTHORIZATION, format!("Bearer {access}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let owner = app
            .repo
            .find_by_username(&app.config.owner.username)
            .await
            .unwrap()
            .unwrap();
        assert!(owner.otp_secret.is_none());
        assert!(!owner.otp_enabled);
    }

    // ------------------------------------------------------------------
    // Sign-out
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_sign_out_clears_cookies() {
        let app = TestApp::new().await;

        let response = app
            .auth_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/sign-out")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let cookies: Vec<String> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();

        assert!(
            cookies
                .iter()
                .any(|c| c.starts_with("access_token=;") && c.contains("Max-Age=0"))
        );
        assert!(
            cookies
                .iter()
                .any(|c| c.starts_with("refresh_token=;") && c.contains("Max-Age=0"))
        );
    }

    // ------------------------------------------------------------------
    // Sign-up
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_sign_up_lands_on_subscriber_role() {
        let app = TestApp::new().await;

        let response = post_json(
            app.auth_router(),
            "/auth/sign-up",
            serde_json::json!({
                "username": "newcomer",
                "password": "a-perfectly-fine-password",
                "email": "newcomer@example.com",
                "full_name": "New Comer",
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["username"], serde_json::json!("newcomer"));

        let subscriber = app
            .repo
            .find_role_by_name("subscriber")
            .await
            .unwrap()
            .unwrap();
        let user = app
            .repo
            .find_by_username("newcomer")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.role_ref.as_uuid(), subscriber.role_id.as_uuid());
    }

    #[tokio::test]
    async fn test_sign_up_duplicate_username_conflicts() {
        let app = TestApp::new().await;

        let payload = serde_json::json!({
            "username": "newcomer",
            "password": "a-perfectly-fine-password",
            "email": "newcomer@example.com",
            "full_name": "New Comer",
        });

        let response = post_json(app.auth_router(), "/auth/sign-up", payload.clone()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = post_json(app.auth_router(), "/auth/sign-up", payload).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
