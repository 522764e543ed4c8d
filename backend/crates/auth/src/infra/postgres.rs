//! PostgreSQL Repository Implementations

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entity::{permission::Permission, role::Role, user::User};
use crate::domain::operation::Surface;
use crate::domain::repository::{PermissionRepository, RoleRepository, UserRepository};
use crate::domain::value_object::{totp_secret::TotpSecret, user_password::UserPassword};
use crate::error::{AuthError, AuthResult};
use kernel::id::{PermissionId, RoleId, UserId};

/// PostgreSQL-backed auth repository
///
/// Holds only the pool; every call acquires a short-lived connection so
/// concurrent requests never share a session.
#[derive(Clone)]
pub struct PgAuthRepository {
    pool: PgPool,
}

impl PgAuthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// User Repository Implementation
// ============================================================================

impl UserRepository for PgAuthRepository {
    async fn create(&self, user: &User) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                user_id,
                username,
                email,
                full_name,
                password_hash,
                role_ref,
                otp_secret,
                otp_enabled,
                disabled,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(user.user_id.as_uuid())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(user.password_hash.as_str())
        .bind(user.role_ref.as_uuid())
        .bind(user.otp_secret.as_ref().map(|s| s.as_base32()))
        .bind(user.otp_enabled)
        .bind(user.disabled)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT
                user_id,
                username,
                email,
                full_name,
                password_hash,
                role_ref,
                otp_secret,
                otp_enabled,
                disabled,
                created_at,
                updated_at
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT
                user_id,
                username,
                email,
                full_name,
                password_hash,
                role_ref,
                otp_secret,
                otp_enabled,
                disabled,
                created_at,
                updated_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn exists_by_username(&self, username: &str) -> AuthResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn update(&self, user: &User) -> AuthResult<()> {
        sqlx::query(
            r#"
            UPDATE users SET
                email = $2,
                full_name = $3,
                password_hash = $4,
                role_ref = $5,
                otp_secret = $6,
                otp_enabled = $7,
                disabled = $8,
                updated_at = $9
            WHERE user_id = $1
            "#,
        )
        .bind(user.user_id.as_uuid())
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(user.password_hash.as_str())
        .bind(user.role_ref.as_uuid())
        .bind(user.otp_secret.as_ref().map(|s| s.as_base32()))
        .bind(user.otp_enabled)
        .bind(user.disabled)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self) -> AuthResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT
                user_id,
                username,
                email,
                full_name,
                password_hash,
                role_ref,
                otp_secret,
                otp_enabled,
                disabled,
                created_at,
                updated_at
            FROM users
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_user()).collect()
    }
}

// ============================================================================
// Role Repository Implementation
// ============================================================================

impl RoleRepository for PgAuthRepository {
    async fn create(&self, role: &Role) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO roles (
                role_id,
                name,
                description,
                level,
                permissions,
                disabled,
                created_at,
                updated_at,
                deleted_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(role.role_id.as_uuid())
        .bind(&role.name)
        .bind(&role.description)
        .bind(role.level)
        .bind(&role.permissions)
        .bind(role.disabled)
        .bind(role.created_at)
        .bind(role.updated_at)
        .bind(role.deleted_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_role(&self, role_id: &RoleId) -> AuthResult<Option<Role>> {
        let row = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT
                role_id,
                name,
                description,
                level,
                permissions,
                disabled,
                created_at,
                updated_at,
                deleted_at
            FROM roles
            WHERE role_id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_role()))
    }

    async fn find_role_by_name(&self, name: &str) -> AuthResult<Option<Role>> {
        let row = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT
                role_id,
                name,
                description,
                level,
                permissions,
                disabled,
                created_at,
                updated_at,
                deleted_at
            FROM roles
            WHERE name = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_role()))
    }

    async fn add_permission(
        &self,
        role_id: &RoleId,
        permission_id: &PermissionId,
    ) -> AuthResult<()> {
        // Association row and embedded cache move together
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission_id, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (role_id, permission_id) DO NOTHING
            "#,
        )
        .bind(role_id.as_uuid())
        .bind(permission_id.as_uuid())
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE roles SET
                permissions = array_append(permissions, $2),
                updated_at = $3
            WHERE role_id = $1 AND NOT ($2 = ANY(permissions))
            "#,
        )
        .bind(role_id.as_uuid())
        .bind(permission_id.as_uuid())
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    async fn remove_permission(
        &self,
        role_id: &RoleId,
        permission_id: &PermissionId,
    ) -> AuthResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = $2",
        )
        .bind(role_id.as_uuid())
        .bind(permission_id.as_uuid())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE roles SET
                permissions = array_remove(permissions, $2),
                updated_at = $3
            WHERE role_id = $1
            "#,
        )
        .bind(role_id.as_uuid())
        .bind(permission_id.as_uuid())
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    async fn has_permission(
        &self,
        role_id: &RoleId,
        permission_id: &PermissionId,
    ) -> AuthResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM role_permissions
                WHERE role_id = $1 AND permission_id = $2
            )
            "#,
        )
        .bind(role_id.as_uuid())
        .bind(permission_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}

// ============================================================================
// Permission Repository Implementation
// ============================================================================

impl PermissionRepository for PgAuthRepository {
    async fn create_permissions(&self, permissions: &[Permission]) -> AuthResult<u64> {
        let mut inserted = 0u64;
        let mut tx = self.pool.begin().await?;

        for permission in permissions {
            let result = sqlx::query(
                r#"
                INSERT INTO permissions (
                    permission_id,
                    name,
                    action,
                    description,
                    surface,
                    created_at,
                    updated_at,
                    deleted_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (name, action, surface) DO NOTHING
                "#,
            )
            .bind(permission.permission_id.as_uuid())
            .bind(&permission.name)
            .bind(&permission.action)
            .bind(&permission.description)
            .bind(permission.surface.as_str())
            .bind(permission.created_at)
            .bind(permission.updated_at)
            .bind(permission.deleted_at)
            .execute(&mut *tx)
            .await?;

            inserted += result.rows_affected();
        }

        tx.commit().await?;

        Ok(inserted)
    }

    async fn find_required(
        &self,
        name: &str,
        action: &str,
        surface: Surface,
    ) -> AuthResult<Option<Permission>> {
        let row = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT
                permission_id,
                name,
                action,
                description,
                surface,
                created_at,
                updated_at,
                deleted_at
            FROM permissions
            WHERE name = $1 AND action = $2 AND surface = $3 AND deleted_at IS NULL
            "#,
        )
        .bind(name)
        .bind(action)
        .bind(surface.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_permission()).transpose()
    }

    async fn permission_names(&self, surface: Surface) -> AuthResult<HashSet<String>> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT name FROM permissions WHERE surface = $1 AND deleted_at IS NULL",
        )
        .bind(surface.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(names.into_iter().collect())
    }

    async fn all_permission_ids(&self) -> AuthResult<Vec<PermissionId>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT permission_id FROM permissions WHERE deleted_at IS NULL",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(PermissionId::from_uuid).collect())
    }

    async fn count_permissions(&self) -> AuthResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM permissions WHERE deleted_at IS NULL",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

// ============================================================================
// Row Types for sqlx mapping
// ============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: Uuid,
    username: String,
    email: String,
    full_name: String,
    password_hash: String,
    role_ref: Uuid,
    otp_secret: Option<String>,
    otp_enabled: bool,
    disabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> AuthResult<User> {
        let otp_secret = self
            .otp_secret
            .map(TotpSecret::from_base32)
            .transpose()
            .map_err(|e| AuthError::Internal(format!("Invalid stored TOTP secret: {}", e)))?;

        Ok(User {
            user_id: UserId::from_uuid(self.user_id),
            username: self.username,
            email: self.email,
            full_name: self.full_name,
            password_hash: UserPassword::from_db(self.password_hash)?,
            role_ref: RoleId::from_uuid(self.role_ref),
            otp_secret,
            otp_enabled: self.otp_enabled,
            disabled: self.disabled,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RoleRow {
    role_id: Uuid,
    name: String,
    description: String,
    level: i32,
    permissions: Vec<Uuid>,
    disabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl RoleRow {
    fn into_role(self) -> Role {
        Role {
            role_id: RoleId::from_uuid(self.role_id),
            name: self.name,
            description: self.description,
            level: self.level,
            permissions: self.permissions,
            disabled: self.disabled,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PermissionRow {
    permission_id: Uuid,
    name: String,
    action: String,
    description: String,
    surface: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl PermissionRow {
    fn into_permission(self) -> AuthResult<Permission> {
        let surface = Surface::from_str(&self.surface)
            .ok_or_else(|| AuthError::Internal(format!("Invalid surface tag: {}", self.surface)))?;

        Ok(Permission {
            permission_id: PermissionId::from_uuid(self.permission_id),
            name: self.name,
            action: self.action,
            description: self.description,
            surface,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        })
    }
}
