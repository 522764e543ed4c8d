//! Repository Traits
//!
//! Interfaces for data persistence. Implementation is in infrastructure layer.

use std::collections::HashSet;

use crate::domain::entity::{permission::Permission, role::Role, user::User};
use crate::domain::operation::Surface;
use crate::error::AuthResult;
use kernel::id::{PermissionId, RoleId, UserId};

/// User repository trait
#[trait_variant::make(UserRepository: Send)]
pub trait LocalUserRepository {
    /// Create a new user
    async fn create(&self, user: &User) -> AuthResult<()>;

    /// Find user by ID
    async fn find_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>>;

    /// Find user by user name
    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>>;

    /// Check if user name exists
    async fn exists_by_username(&self, username: &str) -> AuthResult<bool>;

    /// Update user (second-factor fields, role reference, ...)
    async fn update(&self, user: &User) -> AuthResult<()>;

    /// List all users
    async fn list(&self) -> AuthResult<Vec<User>>;
}

/// Role repository trait
///
/// `add_permission` / `remove_permission` maintain both representations of
/// the permission set in one transaction: the authoritative association row
/// and the embedded display cache on the role record. `has_permission`
/// reads the association rows only.
#[trait_variant::make(RoleRepository: Send)]
pub trait LocalRoleRepository {
    /// Create a new role
    async fn create(&self, role: &Role) -> AuthResult<()>;

    /// Find role by ID (excludes soft-deleted)
    async fn find_role(&self, role_id: &RoleId) -> AuthResult<Option<Role>>;

    /// Find role by name (excludes soft-deleted)
    async fn find_role_by_name(&self, name: &str) -> AuthResult<Option<Role>>;

    /// Grant a permission: insert the association row and write the cache
    /// through. Idempotent.
    async fn add_permission(
        &self,
        role_id: &RoleId,
        permission_id: &PermissionId,
    ) -> AuthResult<()>;

    /// Revoke a permission: delete the association row and write the cache
    /// through.
    async fn remove_permission(
        &self,
        role_id: &RoleId,
        permission_id: &PermissionId,
    ) -> AuthResult<()>;

    /// Authoritative membership check against the association rows
    async fn has_permission(
        &self,
        role_id: &RoleId,
        permission_id: &PermissionId,
    ) -> AuthResult<bool>;
}

/// Permission repository trait
#[trait_variant::make(PermissionRepository: Send)]
pub trait LocalPermissionRepository {
    /// Bulk-insert permissions; returns the number inserted
    async fn create_permissions(&self, permissions: &[Permission]) -> AuthResult<u64>;

    /// Resolve the permission required by an operation, by the unique
    /// (name, action, surface) triple. Soft-deleted rows are excluded.
    async fn find_required(
        &self,
        name: &str,
        action: &str,
        surface: Surface,
    ) -> AuthResult<Option<Permission>>;

    /// Names of all live permissions on one surface (reconciliation diff)
    async fn permission_names(&self, surface: Surface) -> AuthResult<HashSet<String>>;

    /// Ids of all live permissions
    async fn all_permission_ids(&self) -> AuthResult<Vec<PermissionId>>;

    /// Count of live permission rows
    async fn count_permissions(&self) -> AuthResult<i64>;
}
