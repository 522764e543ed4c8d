//! Role Entity
//!
//! A role holds its permission set in two representations: the normalized
//! role_permissions association rows (authoritative for every authorization
//! decision) and the embedded `permissions` id list kept on the record as a
//! write-through display cache. The cache is updated on every mutation and
//! never read for decisions.

use chrono::{DateTime, Utc};
use kernel::id::{PermissionId, RoleId};
use uuid::Uuid;

/// Baseline role levels created at bootstrap
pub const OWNER_LEVEL: i32 = 100;
pub const OBSERVER_LEVEL: i32 = 50;
pub const SUBSCRIBER_LEVEL: i32 = 0;

/// Role entity
///
/// Roles are never hard-deleted, only soft-deleted.
#[derive(Debug, Clone)]
pub struct Role {
    /// Internal UUID identifier
    pub role_id: RoleId,
    /// Role name (owner, subscriber, observer, ...)
    pub name: String,
    /// Description
    pub description: String,
    /// Numeric privilege level
    pub level: i32,
    /// Embedded permission id list - display cache only
    pub permissions: Vec<Uuid>,
    /// Disabled flag
    pub disabled: bool,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Role {
    /// Create a new role
    pub fn new(name: impl Into<String>, description: impl Into<String>, level: i32) -> Self {
        let now = Utc::now();
        Self {
            role_id: RoleId::new(),
            name: name.into(),
            description: description.into(),
            level,
            permissions: Vec::new(),
            disabled: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Whether this role may authorize anything at all
    pub fn is_active(&self) -> bool {
        !self.disabled && self.deleted_at.is_none()
    }

    /// Add a permission id to the embedded cache (idempotent)
    pub fn cache_grant(&mut self, permission_id: &PermissionId) {
        let id = permission_id.into_uuid();
        if !self.permissions.contains(&id) {
            self.permissions.push(id);
            self.updated_at = Utc::now();
        }
    }

    /// Remove a permission id from the embedded cache
    pub fn cache_revoke(&mut self, permission_id: &PermissionId) {
        let id = permission_id.into_uuid();
        if let Some(pos) = self.permissions.iter().position(|p| *p == id) {
            self.permissions.remove(pos);
            self.updated_at = Utc::now();
        }
    }

    /// Soft-delete this role
    pub fn soft_delete(&mut self) {
        let now = Utc::now();
        self.deleted_at = Some(now);
        self.updated_at = now;
    }
}
