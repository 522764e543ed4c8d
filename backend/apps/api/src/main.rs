//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

mod routes;

use auth::config::AuthConfig;
use auth::domain::operation::OperationRegistry;
use auth::middleware::{GateState, require_permission_api, require_permission_web};
use auth::router::auth_router;
use auth::{PgAuthRepository, application::ReconcileUseCase};
use axum::{
    Router, http,
    http::{Method, header},
    routing::{get, post},
};
use sqlx::postgres::PgPoolOptions;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Re-export unified error types for use in handlers
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,auth=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Database connection
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set in environment");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    // Auth configuration
    let auth_config = Arc::new(load_auth_config());
    if auth_config.dev_mode {
        tracing::warn!("Development mode active, authorization is BYPASSED");
    }

    let codec = Arc::new(auth_config.codec());
    let repo = PgAuthRepository::new(pool.clone());

    // Declared operation table, shared by the gate and the reconciler
    let registry = Arc::new(OperationRegistry::new(routes::declared_operations()));

    // Reconcile permissions, baseline roles and bootstrap users in the
    // background. Until it completes, deny-by-default covers the gap;
    // failure must not prevent server startup.
    {
        let reconcile = ReconcileUseCase::new(Arc::new(repo.clone()), auth_config.clone());
        let registry = registry.clone();
        tokio::spawn(async move {
            match reconcile.run(&registry).await {
                Ok(report) => {
                    tracing::info!(
                        permissions_inserted = report.permissions_inserted,
                        roles_created = report.roles_created,
                        users_created = report.users_created,
                        "Startup reconciliation completed"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Startup reconciliation failed, continuing with deny-by-default"
                    );
                }
            }
        });
    }

    // CORS configuration
    let frontend_origins = env::var("FRONTEND_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:40922,http://127.0.0.1:40922".to_string());

    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
        .allow_credentials(true);

    // Gate state for the protected surfaces
    let gate = GateState {
        repo: Arc::new(repo.clone()),
        config: auth_config.clone(),
        codec: codec.clone(),
        registry,
    };

    let api_state = routes::ApiState { repo: repo.clone() };

    // Bearer-token API surface
    let api_routes = Router::new()
        .route("/api/users", get(routes::list_users))
        .route("/api/webhooks/in/test", post(routes::webhook_echo))
        .with_state(api_state)
        .route_layer(axum::middleware::from_fn_with_state(
            gate.clone(),
            require_permission_api::<PgAuthRepository>,
        ));

    // Browser/cookie admin surface
    let admin_routes = Router::new()
        .route("/admin/dashboard", get(routes::dashboard))
        .route_layer(axum::middleware::from_fn_with_state(
            gate,
            require_permission_web::<PgAuthRepository>,
        ));

    // Build router
    let app = Router::new()
        .nest("/auth", auth_router(repo, auth_config, codec))
        .merge(api_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], 8000));
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Assemble the auth configuration from the environment.
///
/// Debug builds fall back to a generated secret and the authorization
/// bypass; release builds require an explicit secret and run locked down.
fn load_auth_config() -> AuthConfig {
    let mut config = if cfg!(debug_assertions) {
        match env::var("AUTH_JWT_SECRET") {
            Ok(secret) => AuthConfig {
                jwt_secret: secret.into_bytes(),
                cookie_secure: false,
                ..AuthConfig::default()
            },
            Err(_) => AuthConfig::development(),
        }
    } else {
        let secret =
            env::var("AUTH_JWT_SECRET").expect("AUTH_JWT_SECRET must be set in production");
        AuthConfig {
            jwt_secret: secret.into_bytes(),
            ..AuthConfig::default()
        }
    };

    // MODE=DEVELOPMENT bypasses authorization entirely
    if let Ok(mode) = env::var("MODE") {
        config.dev_mode = mode.eq_ignore_ascii_case("development");
    }

    // Bootstrap credential overrides
    if let Ok(v) = env::var("OWNER_USER") {
        config.owner.username = v;
    }
    if let Ok(v) = env::var("OWNER_PASS") {
        config.owner.password = v;
    }
    if let Ok(v) = env::var("OWNER_EMAIL") {
        config.owner.email = v;
    }
    if let Ok(v) = env::var("OBSERVER_USER") {
        config.observer.username = v;
    }
    if let Ok(v) = env::var("OBSERVER_PASS") {
        config.observer.password = v;
    }
    if let Ok(v) = env::var("OBSERVER_EMAIL") {
        config.observer.email = v;
    }

    config
}
