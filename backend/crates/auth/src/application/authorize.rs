//! Authorization Use Case (Role/Permission Resolver)
//!
//! Maps a declared operation to its required permission record and checks
//! whether the principal's role holds it. The association rows are the
//! single source of truth; the role's embedded permission list is never
//! consulted here.
//!
//! Policy: public operations are explicitly allowlisted in the operation
//! registry; every other operation without a permission record is denied
//! (a missing record is treated as a reconciliation gap, not an open door).

use std::sync::Arc;

use kernel::id::RoleId;

use crate::application::config::AuthConfig;
use crate::domain::entity::principal::Principal;
use crate::domain::operation::Operation;
use crate::domain::repository::{PermissionRepository, RoleRepository};
use crate::error::{AuthError, AuthResult};

/// Authorization use case
pub struct AuthorizeUseCase<R>
where
    R: RoleRepository + PermissionRepository,
{
    repo: Arc<R>,
    config: Arc<AuthConfig>,
}

impl<R> AuthorizeUseCase<R>
where
    R: RoleRepository + PermissionRepository,
{
    pub fn new(repo: Arc<R>, config: Arc<AuthConfig>) -> Self {
        Self { repo, config }
    }

    /// Decide whether `principal` may perform `operation`.
    ///
    /// `Ok(())` is the only allow outcome; every error is a deny.
    pub async fn execute(&self, principal: &Principal, operation: &Operation) -> AuthResult<()> {
        if self.config.dev_mode {
            tracing::debug!(operation = %operation.name, "Development mode, authorization bypassed");
            return Ok(());
        }

        if operation.public {
            return Ok(());
        }

        let permission = self
            .repo
            .find_required(
                &operation.name,
                operation.method.as_str(),
                operation.surface,
            )
            .await?
            .ok_or_else(|| AuthError::MissingPermissionRecord(operation.name.clone()))?;

        // A step-up (partial) principal carries no role and resolves nothing
        let role_uuid = principal.role.ok_or(AuthError::Unauthorized)?;
        let role_id = RoleId::from_uuid(role_uuid);

        let role = self
            .repo
            .find_role(&role_id)
            .await?
            .ok_or(AuthError::RoleNotFound)?;

        if !role.is_active() {
            tracing::warn!(role = %role.name, "Disabled role denied");
            return Err(AuthError::Unauthorized);
        }

        if self
            .repo
            .has_permission(&role_id, &permission.permission_id)
            .await?
        {
            Ok(())
        } else {
            tracing::debug!(
                username = %principal.username,
                role = %role.name,
                operation = %operation.name,
                "Permission denied"
            );
            Err(AuthError::Unauthorized)
        }
    }
}
