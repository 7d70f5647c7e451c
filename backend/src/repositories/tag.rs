use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::tag::Tag;
use crate::types::TagId;

const SELECT_COLUMNS: &str = "id, name, color, created_at, updated_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TagRepositoryTrait: Send + Sync {
    async fn list(&self, db: &PgPool) -> Result<Vec<Tag>, AppError>;

    async fn find_by_id(&self, db: &PgPool, id: TagId) -> Result<Option<Tag>, AppError>;

    async fn find_by_ids(&self, db: &PgPool, ids: &[TagId]) -> Result<Vec<Tag>, AppError>;

    async fn create(&self, db: &PgPool, tag: &Tag) -> Result<Tag, AppError>;

    async fn update(&self, db: &PgPool, tag: &Tag) -> Result<Tag, AppError>;

    /// Returns false when no row matched.
    async fn delete(&self, db: &PgPool, id: TagId) -> Result<bool, AppError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TagRepository;

impl TagRepository {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TagRepositoryTrait for TagRepository {
    async fn list(&self, db: &PgPool) -> Result<Vec<Tag>, AppError> {
        let query = format!("SELECT {} FROM tags ORDER BY name ASC", SELECT_COLUMNS);
        let tags = sqlx::query_as::<_, Tag>(&query).fetch_all(db).await?;
        Ok(tags)
    }

    async fn find_by_id(&self, db: &PgPool, id: TagId) -> Result<Option<Tag>, AppError> {
        let query = format!("SELECT {} FROM tags WHERE id = $1", SELECT_COLUMNS);
        let tag = sqlx::query_as::<_, Tag>(&query)
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(tag)
    }

    async fn find_by_ids(&self, db: &PgPool, ids: &[TagId]) -> Result<Vec<Tag>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw_ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
        let query = format!(
            "SELECT {} FROM tags WHERE id = ANY($1) ORDER BY name ASC",
            SELECT_COLUMNS
        );
        let tags = sqlx::query_as::<_, Tag>(&query)
            .bind(raw_ids)
            .fetch_all(db)
            .await?;
        Ok(tags)
    }

    async fn create(&self, db: &PgPool, tag: &Tag) -> Result<Tag, AppError> {
        let query = format!(
            "INSERT INTO tags (id, name, color, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            SELECT_COLUMNS
        );
        let created = sqlx::query_as::<_, Tag>(&query)
            .bind(tag.id)
            .bind(&tag.name)
            .bind(&tag.color)
            .bind(tag.created_at)
            .bind(tag.updated_at)
            .fetch_one(db)
            .await?;
        Ok(created)
    }

    async fn update(&self, db: &PgPool, tag: &Tag) -> Result<Tag, AppError> {
        let query = format!(
            "UPDATE tags SET name = $2, color = $3, updated_at = $4 WHERE id = $1 RETURNING {}",
            SELECT_COLUMNS
        );
        let updated = sqlx::query_as::<_, Tag>(&query)
            .bind(tag.id)
            .bind(&tag.name)
            .bind(&tag.color)
            .bind(tag.updated_at)
            .fetch_optional(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Tag not found".into()))?;
        Ok(updated)
    }

    async fn delete(&self, db: &PgPool, id: TagId) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
