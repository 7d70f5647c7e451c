//! User repository.
//!
//! Soft-deleted rows stay in the table; every lookup except
//! [`UserRepositoryTrait::email_exists`] ignores them.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::error::AppError;
use crate::models::user::{User, UserListQuery, UserRole, UserSummary};
use crate::repositories::common::push_clause;
use crate::types::UserId;

const SELECT_COLUMNS: &str = "id, email, password_hash, name, employee_number, department, role, \
     is_active, deleted_at, created_at, updated_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepositoryTrait: Send + Sync {
    async fn find_by_id(&self, db: &PgPool, id: UserId) -> Result<Option<User>, AppError>;

    async fn find_by_email(&self, db: &PgPool, email: &str) -> Result<Option<User>, AppError>;

    /// Includes soft-deleted rows because the unique index does.
    async fn email_exists(
        &self,
        db: &PgPool,
        email: &str,
        exclude: Option<UserId>,
    ) -> Result<bool, AppError>;

    async fn create(&self, db: &PgPool, user: &User) -> Result<User, AppError>;

    async fn update(&self, db: &PgPool, user: &User) -> Result<User, AppError>;

    async fn update_password(
        &self,
        db: &PgPool,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), AppError>;

    async fn set_active(&self, db: &PgPool, id: UserId, is_active: bool) -> Result<(), AppError>;

    async fn soft_delete(&self, db: &PgPool, id: UserId) -> Result<(), AppError>;

    async fn list(&self, db: &PgPool, query: &UserListQuery) -> Result<Vec<User>, AppError>;

    async fn count_all(&self, db: &PgPool) -> Result<i64, AppError>;

    async fn count_active_admins(&self, db: &PgPool) -> Result<i64, AppError>;

    async fn find_summaries(
        &self,
        db: &PgPool,
        ids: &[UserId],
    ) -> Result<Vec<UserSummary>, AppError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UserRepository;

impl UserRepository {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl UserRepositoryTrait for UserRepository {
    async fn find_by_id(&self, db: &PgPool, id: UserId) -> Result<Option<User>, AppError> {
        let query = format!(
            "SELECT {} FROM users WHERE id = $1 AND deleted_at IS NULL",
            SELECT_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, db: &PgPool, email: &str) -> Result<Option<User>, AppError> {
        let query = format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1) AND deleted_at IS NULL",
            SELECT_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email.trim())
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    async fn email_exists(
        &self,
        db: &PgPool,
        email: &str,
        exclude: Option<UserId>,
    ) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1) \
             AND ($2::TEXT IS NULL OR id <> $2))",
        )
        .bind(email.trim())
        .bind(exclude)
        .fetch_one(db)
        .await?;
        Ok(exists)
    }

    async fn create(&self, db: &PgPool, user: &User) -> Result<User, AppError> {
        let query = format!(
            "INSERT INTO users (id, email, password_hash, name, employee_number, department, \
             role, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {}",
            SELECT_COLUMNS
        );
        let created = sqlx::query_as::<_, User>(&query)
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.name)
            .bind(&user.employee_number)
            .bind(&user.department)
            .bind(user.role)
            .bind(user.is_active)
            .bind(user.created_at)
            .bind(user.updated_at)
            .fetch_one(db)
            .await?;
        Ok(created)
    }

    async fn update(&self, db: &PgPool, user: &User) -> Result<User, AppError> {
        let query = format!(
            "UPDATE users SET email = $2, name = $3, employee_number = $4, department = $5, \
             role = $6, is_active = $7, updated_at = $8 \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
            SELECT_COLUMNS
        );
        let updated = sqlx::query_as::<_, User>(&query)
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.employee_number)
            .bind(&user.department)
            .bind(user.role)
            .bind(user.is_active)
            .bind(Utc::now())
            .fetch_optional(db)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;
        Ok(updated)
    }

    async fn update_password(
        &self,
        db: &PgPool,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .bind(Utc::now())
            .execute(db)
            .await?;
        Ok(())
    }

    async fn set_active(&self, db: &PgPool, id: UserId, is_active: bool) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET is_active = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(is_active)
            .bind(Utc::now())
            .execute(db)
            .await?;
        Ok(())
    }

    async fn soft_delete(&self, db: &PgPool, id: UserId) -> Result<(), AppError> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE users SET deleted_at = $2, is_active = FALSE, updated_at = $2 \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(now)
        .execute(db)
        .await?;
        Ok(())
    }

    async fn list(&self, db: &PgPool, query: &UserListQuery) -> Result<Vec<User>, AppError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM users WHERE deleted_at IS NULL",
            SELECT_COLUMNS
        ));
        let mut has_clause = true;
        if let Some(role) = query.role.as_deref().and_then(UserRole::parse) {
            push_clause(&mut builder, &mut has_clause);
            builder.push("role = ").push_bind(role);
        }
        if let Some(is_active) = query.is_active {
            push_clause(&mut builder, &mut has_clause);
            builder.push("is_active = ").push_bind(is_active);
        }
        if let Some(search) = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            let pattern = format!("%{}%", search);
            push_clause(&mut builder, &mut has_clause);
            builder
                .push("(name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR email ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        builder.push(" ORDER BY created_at DESC");

        let users = builder.build_query_as::<User>().fetch_all(db).await?;
        Ok(users)
    }

    async fn count_all(&self, db: &PgPool) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(db)
            .await?;
        Ok(count)
    }

    async fn count_active_admins(&self, db: &PgPool) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users \
             WHERE role = 'admin' AND is_active = TRUE AND deleted_at IS NULL",
        )
        .fetch_one(db)
        .await?;
        Ok(count)
    }

    async fn find_summaries(
        &self,
        db: &PgPool,
        ids: &[UserId],
    ) -> Result<Vec<UserSummary>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw_ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
        let summaries = sqlx::query_as::<_, UserSummary>(
            "SELECT id, name, email, role FROM users WHERE id = ANY($1)",
        )
        .bind(raw_ids)
        .fetch_all(db)
        .await?;
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_columns_cover_soft_delete_fields() {
        assert!(SELECT_COLUMNS.contains("deleted_at"));
        assert!(SELECT_COLUMNS.contains("is_active"));
        assert!(SELECT_COLUMNS.contains("password_hash"));
    }

    #[test]
    fn mock_user_repository_is_send_sync() {
        fn check_send_sync<T: Send + Sync>() {}
        check_send_sync::<MockUserRepositoryTrait>();
    }
}
