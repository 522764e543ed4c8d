//! Permission Reconciler
//!
//! Startup routine that diffs the declared operation registry against the
//! persisted permission records and inserts whatever is missing, then makes
//! sure the three baseline roles and their bootstrap users exist.
//!
//! Idempotent: re-running against an unchanged registry inserts zero rows.
//! Runs concurrently with request serving; until it completes, the
//! deny-by-default policy is the only protection against an empty
//! permission table, which is exactly why missing records deny.

use std::sync::Arc;

use kernel::id::RoleId;

use crate::application::config::{AuthConfig, BootstrapUser};
use crate::domain::entity::{
    permission::Permission,
    role::{OBSERVER_LEVEL, OWNER_LEVEL, Role, SUBSCRIBER_LEVEL},
    user::User,
};
use crate::domain::operation::{OperationRegistry, Surface};
use crate::domain::repository::{PermissionRepository, RoleRepository, UserRepository};
use crate::domain::value_object::user_password::UserPassword;
use crate::error::AuthResult;

/// What a reconciliation run actually changed
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Permission rows inserted
    pub permissions_inserted: u64,
    /// Roles created
    pub roles_created: u64,
    /// Owner grants added
    pub owner_grants_added: u64,
    /// Bootstrap users created
    pub users_created: u64,
}

/// Permission reconciler
pub struct ReconcileUseCase<R>
where
    R: UserRepository + RoleRepository + PermissionRepository,
{
    repo: Arc<R>,
    config: Arc<AuthConfig>,
}

impl<R> ReconcileUseCase<R>
where
    R: UserRepository + RoleRepository + PermissionRepository,
{
    pub fn new(repo: Arc<R>, config: Arc<AuthConfig>) -> Self {
        Self { repo, config }
    }

    /// Run the full reconciliation pass.
    pub async fn run(&self, registry: &OperationRegistry) -> AuthResult<ReconcileReport> {
        let mut report = ReconcileReport::default();

        report.permissions_inserted = self.sync_permissions(registry).await?;

        let owner = self
            .ensure_role(
                "owner",
                "Owner role with full system access",
                OWNER_LEVEL,
                &mut report,
            )
            .await?;
        let subscriber = self
            .ensure_role(
                "subscriber",
                "Subscriber role with limited access",
                SUBSCRIBER_LEVEL,
                &mut report,
            )
            .await?;
        let observer = self
            .ensure_role(
                "observer",
                "Observer role with metrics access only",
                OBSERVER_LEVEL,
                &mut report,
            )
            .await?;

        // Owner holds every current permission id; re-grant whatever is
        // missing so the invariant survives registry growth.
        report.owner_grants_added = self.sync_owner_grants(&owner.role_id).await?;

        self.ensure_user(&self.config.owner, &owner.role_id, &mut report)
            .await?;
        self.ensure_user(&self.config.subscriber, &subscriber.role_id, &mut report)
            .await?;
        self.ensure_user(&self.config.observer, &observer.role_id, &mut report)
            .await?;

        tracing::info!(
            permissions_inserted = report.permissions_inserted,
            roles_created = report.roles_created,
            owner_grants_added = report.owner_grants_added,
            users_created = report.users_created,
            "Permission reconciliation completed"
        );

        Ok(report)
    }

    /// Insert permission rows for declared operations that have none yet.
    /// Unique by name within a surface.
    async fn sync_permissions(&self, registry: &OperationRegistry) -> AuthResult<u64> {
        let mut inserted = 0u64;

        for surface in [Surface::Api, Surface::Admin] {
            let existing = self.repo.permission_names(surface).await?;

            let missing: Vec<Permission> = registry
                .protected_for(surface)
                .filter(|op| !existing.contains(&op.name))
                .map(|op| {
                    Permission::new(
                        op.name.clone(),
                        op.method.as_str(),
                        op.path.clone(),
                        surface,
                    )
                })
                .collect();

            if !missing.is_empty() {
                inserted += self.repo.create_permissions(&missing).await?;
            }
        }

        Ok(inserted)
    }

    /// Fetch or create one baseline role.
    async fn ensure_role(
        &self,
        name: &str,
        description: &str,
        level: i32,
        report: &mut ReconcileReport,
    ) -> AuthResult<Role> {
        if let Some(role) = self.repo.find_role_by_name(name).await? {
            return Ok(role);
        }

        let role = Role::new(name, description, level);
        RoleRepository::create(self.repo.as_ref(), &role).await?;
        report.roles_created += 1;

        tracing::info!(role = name, level, "Created baseline role");

        Ok(role)
    }

    /// Grant the owner role every permission it does not hold yet.
    async fn sync_owner_grants(&self, owner_id: &RoleId) -> AuthResult<u64> {
        let mut added = 0u64;

        for permission_id in self.repo.all_permission_ids().await? {
            if !self.repo.has_permission(owner_id, &permission_id).await? {
                self.repo.add_permission(owner_id, &permission_id).await?;
                added += 1;
            }
        }

        Ok(added)
    }

    /// Create the bootstrap user for a role if absent.
    async fn ensure_user(
        &self,
        bootstrap: &BootstrapUser,
        role_id: &RoleId,
        report: &mut ReconcileReport,
    ) -> AuthResult<()> {
        if self.repo.exists_by_username(&bootstrap.username).await? {
            return Ok(());
        }

        // Bootstrap passwords come from configuration, not user input;
        // the policy does not apply to them.
        let password_hash =
            UserPassword::from_raw_unchecked(bootstrap.password.clone(), self.config.pepper())?;

        let user = User::new(
            bootstrap.username.clone(),
            bootstrap.email.clone(),
            bootstrap.username.clone(),
            password_hash,
            *role_id,
        );

        UserRepository::create(self.repo.as_ref(), &user).await?;
        report.users_created += 1;

        tracing::info!(username = %bootstrap.username, "Created bootstrap user");

        Ok(())
    }
}
