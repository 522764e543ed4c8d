//! Sign Up Use Case
//!
//! Creates a user under the baseline subscriber role.

use std::sync::Arc;

use crate::application::config::AuthConfig;
use crate::domain::entity::{role::Role, role::SUBSCRIBER_LEVEL, user::User};
use crate::domain::repository::{RoleRepository, UserRepository};
use crate::domain::value_object::user_password::UserPassword;
use crate::error::{AuthError, AuthResult};

/// Sign up input
pub struct SignUpInput {
    pub username: String,
    pub password: String,
    pub email: String,
    pub full_name: String,
}

/// Sign up output
pub struct SignUpOutput {
    pub user: User,
}

/// Sign up use case
pub struct SignUpUseCase<R>
where
    R: UserRepository + RoleRepository,
{
    repo: Arc<R>,
    config: Arc<AuthConfig>,
}

impl<R> SignUpUseCase<R>
where
    R: UserRepository + RoleRepository,
{
    pub fn new(repo: Arc<R>, config: Arc<AuthConfig>) -> Self {
        Self { repo, config }
    }

    pub async fn execute(&self, input: SignUpInput) -> AuthResult<SignUpOutput> {
        if self.repo.exists_by_username(&input.username).await? {
            return Err(AuthError::UserNameTaken);
        }

        let password_hash = UserPassword::from_raw(input.password, self.config.pepper())?;

        // New accounts land on the subscriber role; create it if the
        // reconciler has not run yet.
        let subscriber = match self.repo.find_role_by_name("subscriber").await? {
            Some(role) => role,
            None => {
                let role = Role::new(
                    "subscriber",
                    "Subscriber role with limited access",
                    SUBSCRIBER_LEVEL,
                );
                RoleRepository::create(self.repo.as_ref(), &role).await?;
                role
            }
        };

        let user = User::new(
            input.username,
            input.email,
            input.full_name,
            password_hash,
            subscriber.role_id,
        );

        UserRepository::create(self.repo.as_ref(), &user).await?;

        tracing::info!(username = %user.username, "User signed up");

        Ok(SignUpOutput { user })
    }
}
