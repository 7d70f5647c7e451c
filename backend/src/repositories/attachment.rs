use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::attachment::Attachment;
use crate::types::{AttachmentId, IncidentId};

const SELECT_COLUMNS: &str =
    "id, incident_id, user_id, file_name, file_size, mime_type, storage_key, created_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttachmentRepositoryTrait: Send + Sync {
    async fn create(&self, db: &PgPool, attachment: &Attachment) -> Result<Attachment, AppError>;

    async fn find_by_id(
        &self,
        db: &PgPool,
        id: AttachmentId,
    ) -> Result<Option<Attachment>, AppError>;

    async fn list_by_incident(
        &self,
        db: &PgPool,
        incident_id: IncidentId,
    ) -> Result<Vec<Attachment>, AppError>;

    async fn delete(&self, db: &PgPool, id: AttachmentId) -> Result<(), AppError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AttachmentRepository;

impl AttachmentRepository {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AttachmentRepositoryTrait for AttachmentRepository {
    async fn create(&self, db: &PgPool, attachment: &Attachment) -> Result<Attachment, AppError> {
        let query = format!(
            "INSERT INTO attachments \
             (id, incident_id, user_id, file_name, file_size, mime_type, storage_key, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, Attachment>(&query)
            .bind(attachment.id)
            .bind(attachment.incident_id)
            .bind(attachment.user_id)
            .bind(&attachment.file_name)
            .bind(attachment.file_size)
            .bind(&attachment.mime_type)
            .bind(&attachment.storage_key)
            .bind(attachment.created_at)
            .fetch_one(db)
            .await?;
        Ok(row)
    }

    async fn find_by_id(
        &self,
        db: &PgPool,
        id: AttachmentId,
    ) -> Result<Option<Attachment>, AppError> {
        let query = format!("SELECT {} FROM attachments WHERE id = $1", SELECT_COLUMNS);
        let row = sqlx::query_as::<_, Attachment>(&query)
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }

    async fn list_by_incident(
        &self,
        db: &PgPool,
        incident_id: IncidentId,
    ) -> Result<Vec<Attachment>, AppError> {
        let query = format!(
            "SELECT {} FROM attachments WHERE incident_id = $1 ORDER BY created_at DESC",
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, Attachment>(&query)
            .bind(incident_id)
            .fetch_all(db)
            .await?;
        Ok(rows)
    }

    async fn delete(&self, db: &PgPool, id: AttachmentId) -> Result<(), AppError> {
        sqlx::query("DELETE FROM attachments WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }
}
