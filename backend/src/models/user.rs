//! Models that represent users, authentication payloads, and role metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::types::UserId;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
/// Database representation of an Incidex account.
pub struct User {
    /// Unique identifier for the user.
    pub id: UserId,
    /// Login e-mail address, unique across accounts.
    pub email: String,
    /// Argon2 hash of the user's password.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Display name.
    pub name: String,
    pub employee_number: Option<String>,
    pub department: Option<String>,
    /// Role describing the user's privileges.
    pub role: UserRole,
    /// Inactive users cannot sign in.
    pub is_active: bool,
    /// Set when the account has been soft deleted.
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: String, password_hash: String, name: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            email,
            password_hash,
            name,
            employee_number: None,
            department: None,
            role,
            is_active: true,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }

    /// Editors and admins may create and change incident data.
    pub fn can_edit(&self) -> bool {
        matches!(self.role, UserRole::Admin | UserRole::Editor)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary::from(self)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema, Default,
)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
/// Supported user roles stored in the database.
pub enum UserRole {
    /// Full access, including deletes and user management.
    Admin,
    /// May create incidents and edit their own.
    Editor,
    /// Read-only access plus comments.
    #[default]
    Viewer,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Editor => "editor",
            UserRole::Viewer => "viewer",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(UserRole::Admin),
            "editor" => Some(UserRole::Editor),
            "viewer" => Some(UserRole::Viewer),
            _ => None,
        }
    }
}

/// Compact user projection embedded in other resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
/// Self-service registration payload.
pub struct RegisterRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
/// Credentials submitted by a user attempting to authenticate.
pub struct LoginRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
/// Token and account returned after login or registration.
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
/// Admin payload for creating an account.
pub struct CreateUserRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub name: String,
    pub role: String,
    pub employee_number: Option<String>,
    pub department: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
/// Admin payload for updating an account profile.
pub struct UpdateUserRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub name: String,
    pub role: String,
    pub employee_number: Option<String>,
    pub department: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
/// Payload submitted when a user changes their own password.
pub struct UpdatePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
/// Payload for an administrator-driven password reset.
pub struct ResetPasswordRequest {
    pub new_password: String,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct UserListQuery {
    pub role: Option<String>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}
