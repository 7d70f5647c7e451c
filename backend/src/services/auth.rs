use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::error::AppError;
use crate::models::user::{AuthResponse, LoginRequest, RegisterRequest, User, UserRole};
use crate::repositories::{UserRepository, UserRepositoryTrait};
use crate::state::AppState;
use crate::utils::{check_password_policy, create_access_token, hash_password, verify_password};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

pub struct AuthService {
    pool: PgPool,
    config: Config,
    users: Arc<dyn UserRepositoryTrait>,
}

/// Applies the password policy, reporting failures as validation errors.
pub fn enforce_password_policy(field: &str, password: &str) -> Result<(), AppError> {
    check_password_policy(password)
        .map_err(|err| AppError::validation(format!("{}: {}", field, err)))
}

impl AuthService {
    pub fn from_state(state: &AppState) -> Self {
        Self::with_repository(
            state.pool.clone(),
            state.config.clone(),
            Arc::new(UserRepository::new()),
        )
    }

    pub fn with_repository(
        pool: PgPool,
        config: Config,
        users: Arc<dyn UserRepositoryTrait>,
    ) -> Self {
        Self { pool, config, users }
    }

    fn issue_token(&self, user: User) -> Result<AuthResponse, AppError> {
        let token = create_access_token(
            user.id,
            user.role,
            &self.config.jwt_secret,
            self.config.jwt_expiration_hours,
        )?;
        Ok(AuthResponse { token, user })
    }

    pub async fn register(&self, payload: RegisterRequest) -> Result<AuthResponse, AppError> {
        enforce_password_policy("password", &payload.password)?;
        let email = payload.email.trim().to_lowercase();
        if self.users.email_exists(&self.pool, &email, None).await? {
            return Err(AppError::Conflict("Email is already registered".into()));
        }

        let password_hash = hash_password(&payload.password)?;
        let user = User::new(
            email,
            password_hash,
            payload.name.trim().to_string(),
            UserRole::Viewer,
        );
        let user = self.users.create(&self.pool, &user).await?;
        tracing::info!(user_id = %user.id, "User registered");
        self.issue_token(user)
    }

    pub async fn login(&self, payload: LoginRequest) -> Result<AuthResponse, AppError> {
        let user = self
            .users
            .find_by_email(&self.pool, payload.email.trim())
            .await?
            .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.into()))?;

        if !verify_password(&payload.password, &user.password_hash)? {
            tracing::debug!(user_id = %user.id, "Password mismatch");
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
        }
        if !user.is_active {
            return Err(AppError::Forbidden("Account is deactivated".into()));
        }
        tracing::info!(user_id = %user.id, "User logged in");
        self.issue_token(user)
    }
}
