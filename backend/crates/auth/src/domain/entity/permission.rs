//! Permission Entity
//!
//! One permission per declared operation: the name maps 1:1 to an operation
//! identifier, the action is the HTTP verb, and the surface tag keeps
//! identical operation names on different surfaces from colliding.
//! The triple (name, action, surface) is unique.

use chrono::{DateTime, Utc};
use kernel::id::PermissionId;

use crate::domain::operation::Surface;

/// Permission entity
///
/// Soft-deleted only; deleted rows are excluded from resolution.
#[derive(Debug, Clone)]
pub struct Permission {
    /// Internal UUID identifier
    pub permission_id: PermissionId,
    /// Operation identifier (route name)
    pub name: String,
    /// HTTP verb
    pub action: String,
    /// Description (route path)
    pub description: String,
    /// Surface tag
    pub surface: Surface,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Permission {
    /// Create a new permission
    pub fn new(
        name: impl Into<String>,
        action: impl Into<String>,
        description: impl Into<String>,
        surface: Surface,
    ) -> Self {
        let now = Utc::now();
        Self {
            permission_id: PermissionId::new(),
            name: name.into(),
            action: action.into(),
            description: description.into(),
            surface,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Whether this permission is live
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}
