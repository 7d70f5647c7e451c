//! Account administration and the startup admin bootstrap.

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;

use crate::config::Config;
use crate::error::AppError;
use crate::models::user::{
    CreateUserRequest, ResetPasswordRequest, UpdatePasswordRequest, UpdateUserRequest, User,
    UserListQuery, UserRole,
};
use crate::repositories::{UserRepository, UserRepositoryTrait};
use crate::services::auth::enforce_password_policy;
use crate::state::AppState;
use crate::types::UserId;
use crate::utils::{hash_password, verify_password};

pub struct UserService {
    pool: PgPool,
    users: Arc<dyn UserRepositoryTrait>,
}

fn parse_role(raw: &str) -> Result<UserRole, AppError> {
    UserRole::parse(raw)
        .ok_or_else(|| AppError::validation("role: must be one of admin, editor, viewer"))
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl UserService {
    pub fn from_state(state: &AppState) -> Self {
        Self::with_repository(state.pool.clone(), Arc::new(UserRepository::new()))
    }

    pub fn with_repository(pool: PgPool, users: Arc<dyn UserRepositoryTrait>) -> Self {
        Self { pool, users }
    }

    async fn load(&self, id: UserId) -> Result<User, AppError> {
        self.users
            .find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))
    }

    pub async fn list(&self, query: &UserListQuery) -> Result<Vec<User>, AppError> {
        if let Some(role) = query.role.as_deref().filter(|r| !r.trim().is_empty()) {
            parse_role(role)?;
        }
        self.users.list(&self.pool, query).await
    }

    pub async fn get(&self, id: UserId) -> Result<User, AppError> {
        self.load(id).await
    }

    pub async fn create(&self, payload: CreateUserRequest) -> Result<User, AppError> {
        let role = parse_role(&payload.role)?;
        enforce_password_policy("password", &payload.password)?;
        let email = payload.email.trim().to_lowercase();
        if self.users.email_exists(&self.pool, &email, None).await? {
            return Err(AppError::Conflict("Email is already registered".into()));
        }

        let mut user = User::new(
            email,
            hash_password(&payload.password)?,
            payload.name.trim().to_string(),
            role,
        );
        user.employee_number = trimmed(payload.employee_number);
        user.department = trimmed(payload.department);
        let user = self.users.create(&self.pool, &user).await?;
        tracing::info!(user_id = %user.id, role = role.as_str(), "User created");
        Ok(user)
    }

    pub async fn update(&self, id: UserId, payload: UpdateUserRequest) -> Result<User, AppError> {
        let role = parse_role(&payload.role)?;
        let mut user = self.load(id).await?;
        let email = payload.email.trim().to_lowercase();
        if self.users.email_exists(&self.pool, &email, Some(id)).await? {
            return Err(AppError::Conflict("Email is already registered".into()));
        }
        if user.role == UserRole::Admin && role != UserRole::Admin && user.is_active {
            self.ensure_other_active_admin().await?;
        }

        user.email = email;
        user.name = payload.name.trim().to_string();
        user.role = role;
        user.employee_number = trimmed(payload.employee_number);
        user.department = trimmed(payload.department);
        user.updated_at = Utc::now();
        self.users.update(&self.pool, &user).await
    }

    /// Only the account owner may change their password.
    pub async fn update_password(
        &self,
        actor: &User,
        id: UserId,
        payload: UpdatePasswordRequest,
    ) -> Result<(), AppError> {
        if actor.id != id {
            return Err(AppError::Forbidden(
                "You can only change your own password".into(),
            ));
        }
        let user = self.load(id).await?;
        if !verify_password(&payload.old_password, &user.password_hash)? {
            return Err(AppError::Unauthorized("Current password is incorrect".into()));
        }
        enforce_password_policy("new_password", &payload.new_password)?;
        let password_hash = hash_password(&payload.new_password)?;
        self.users.update_password(&self.pool, id, &password_hash).await?;
        tracing::info!(user_id = %id, "Password changed");
        Ok(())
    }

    pub async fn reset_password(
        &self,
        id: UserId,
        payload: ResetPasswordRequest,
    ) -> Result<(), AppError> {
        enforce_password_policy("new_password", &payload.new_password)?;
        self.load(id).await?;
        let password_hash = hash_password(&payload.new_password)?;
        self.users.update_password(&self.pool, id, &password_hash).await?;
        tracing::info!(user_id = %id, "Password reset by administrator");
        Ok(())
    }

    pub async fn delete(&self, actor: &User, id: UserId) -> Result<(), AppError> {
        if actor.id == id {
            return Err(AppError::BadRequest("You cannot delete your own account".into()));
        }
        let user = self.load(id).await?;
        if user.role == UserRole::Admin && user.is_active {
            self.ensure_other_active_admin().await?;
        }
        self.users.soft_delete(&self.pool, id).await?;
        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    /// Flips `is_active` and returns the updated account.
    pub async fn toggle_active(&self, actor: &User, id: UserId) -> Result<User, AppError> {
        let mut user = self.load(id).await?;
        if user.is_active {
            if actor.id == id {
                return Err(AppError::BadRequest(
                    "You cannot deactivate your own account".into(),
                ));
            }
            if user.role == UserRole::Admin {
                self.ensure_other_active_admin().await?;
            }
        }
        user.is_active = !user.is_active;
        self.users.set_active(&self.pool, id, user.is_active).await?;
        tracing::info!(user_id = %id, is_active = user.is_active, "User active flag toggled");
        Ok(user)
    }

    async fn ensure_other_active_admin(&self) -> Result<(), AppError> {
        if self.users.count_active_admins(&self.pool).await? <= 1 {
            return Err(AppError::BadRequest(
                "At least one active administrator is required".into(),
            ));
        }
        Ok(())
    }

    /// Creates the configured admin when the users table is empty.
    pub async fn bootstrap_admin(&self, config: &Config) -> anyhow::Result<Option<User>> {
        let Some((email, password, name)) = config.initial_admin() else {
            return Ok(None);
        };
        if self.users.count_all(&self.pool).await? > 0 {
            return Ok(None);
        }
        if let Err(err) = check_initial_password(password) {
            tracing::warn!(error = %err, "Initial admin password does not meet the policy");
        }
        let user = User::new(
            email.trim().to_lowercase(),
            hash_password(password)?,
            name.to_string(),
            UserRole::Admin,
        );
        let user = self.users.create(&self.pool, &user).await?;
        tracing::info!(user_id = %user.id, "Initial admin created");
        Ok(Some(user))
    }
}

fn check_initial_password(password: &str) -> Result<(), AppError> {
    enforce_password_policy("INITIAL_ADMIN_PASSWORD", password)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::repositories::user::MockUserRepositoryTrait;
    use crate::services::test_support::{lazy_pool, user};

    fn service(users: MockUserRepositoryTrait) -> UserService {
        UserService::with_repository(lazy_pool(), Arc::new(users))
    }

    fn returning_user(users: &mut MockUserRepositoryTrait, stored: &User) {
        let stored = stored.clone();
        users
            .expect_find_by_id()
            .returning(move |_, _| Ok(Some(stored.clone())));
    }

    #[tokio::test]
    async fn last_active_admin_cannot_be_deactivated() {
        let actor = user(UserRole::Admin);
        let target = user(UserRole::Admin);
        let mut users = MockUserRepositoryTrait::new();
        returning_user(&mut users, &target);
        users.expect_count_active_admins().returning(|_| Ok(1));

        let result = service(users).toggle_active(&actor, target.id).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn users_cannot_deactivate_themselves() {
        let actor = user(UserRole::Admin);
        let mut users = MockUserRepositoryTrait::new();
        returning_user(&mut users, &actor);
        let result = service(users).toggle_active(&actor, actor.id).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn toggle_reactivates_inactive_user() {
        let actor = user(UserRole::Admin);
        let mut target = user(UserRole::Viewer);
        target.is_active = false;
        let mut users = MockUserRepositoryTrait::new();
        returning_user(&mut users, &target);
        users
            .expect_set_active()
            .withf(|_, _, active| *active)
            .returning(|_, _, _| Ok(()));

        let updated = service(users)
            .toggle_active(&actor, target.id)
            .await
            .expect("toggle");
        assert!(updated.is_active);
    }

    #[tokio::test]
    async fn admin_cannot_delete_self() {
        let actor = user(UserRole::Admin);
        let result = service(MockUserRepositoryTrait::new())
            .delete(&actor, actor.id)
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn password_change_is_self_only_and_checks_old_password() {
        let owner = {
            let mut u = user(UserRole::Viewer);
            u.password_hash = hash_password("0ldPassword").expect("hash");
            u
        };
        let other = user(UserRole::Admin);
        let payload = || UpdatePasswordRequest {
            old_password: "0ldPassword".into(),
            new_password: "N3wPassword".into(),
        };

        let result = service(MockUserRepositoryTrait::new())
            .update_password(&other, owner.id, payload())
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        let mut users = MockUserRepositoryTrait::new();
        returning_user(&mut users, &owner);
        let result = service(users)
            .update_password(
                &owner,
                owner.id,
                UpdatePasswordRequest {
                    old_password: "WrongPass1".into(),
                    new_password: "N3wPassword".into(),
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));

        let mut users = MockUserRepositoryTrait::new();
        returning_user(&mut users, &owner);
        users
            .expect_update_password()
            .times(1)
            .returning(|_, _, _| Ok(()));
        service(users)
            .update_password(&owner, owner.id, payload())
            .await
            .expect("password change");
    }

    #[tokio::test]
    async fn create_validates_role_and_policy() {
        let result = service(MockUserRepositoryTrait::new())
            .create(CreateUserRequest {
                email: "x@example.com".into(),
                password: "Str0ngPass".into(),
                name: "X".into(),
                role: "owner".into(),
                employee_number: None,
                department: None,
            })
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = service(MockUserRepositoryTrait::new())
            .reset_password(
                UserId::new(),
                ResetPasswordRequest {
                    new_password: "short".into(),
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn bootstrap_only_runs_on_empty_table() {
        let mut config = test_config();
        config.initial_admin_email = Some("root@example.com".into());
        config.initial_admin_password = Some("R00tPassword".into());
        config.initial_admin_name = Some("Root".into());

        let mut users = MockUserRepositoryTrait::new();
        users.expect_count_all().returning(|_| Ok(3));
        assert!(service(users)
            .bootstrap_admin(&config)
            .await
            .expect("bootstrap")
            .is_none());

        let mut users = MockUserRepositoryTrait::new();
        users.expect_count_all().returning(|_| Ok(0));
        users
            .expect_create()
            .withf(|_, user| user.role == UserRole::Admin && user.is_active)
            .returning(|_, user| Ok(user.clone()));
        let created = service(users)
            .bootstrap_admin(&config)
            .await
            .expect("bootstrap")
            .expect("admin created");
        assert_eq!(created.email, "root@example.com");
    }
}
