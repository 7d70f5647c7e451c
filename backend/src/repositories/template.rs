use async_trait::async_trait;
use sqlx::{FromRow, PgConnection, PgPool};

use crate::error::AppError;
use crate::models::{tag::Tag, template::IncidentTemplate};
use crate::repositories::transaction::{begin_transaction, commit_transaction};
use crate::types::{TagId, TemplateId, UserId};

const SELECT_COLUMNS: &str = "id, name, description, title, content, severity, impact_scope, \
     creator_id, is_public, usage_count, created_at, updated_at";

#[derive(Debug, FromRow)]
struct TemplateTagRow {
    template_id: TemplateId,
    #[sqlx(flatten)]
    tag: Tag,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TemplateRepositoryTrait: Send + Sync {
    /// Public templates plus the caller's own; everything when `include_all`.
    async fn list_visible(
        &self,
        db: &PgPool,
        user_id: UserId,
        include_all: bool,
    ) -> Result<Vec<IncidentTemplate>, AppError>;

    async fn find_by_id(
        &self,
        db: &PgPool,
        id: TemplateId,
    ) -> Result<Option<IncidentTemplate>, AppError>;

    async fn tag_links(
        &self,
        db: &PgPool,
        ids: &[TemplateId],
    ) -> Result<Vec<(TemplateId, Tag)>, AppError>;

    async fn create(
        &self,
        db: &PgPool,
        template: &IncidentTemplate,
        tag_ids: &[TagId],
    ) -> Result<(), AppError>;

    async fn update(
        &self,
        db: &PgPool,
        template: &IncidentTemplate,
        tag_ids: &[TagId],
    ) -> Result<(), AppError>;

    async fn delete(&self, db: &PgPool, id: TemplateId) -> Result<bool, AppError>;

    async fn increment_usage(&self, db: &PgPool, id: TemplateId) -> Result<(), AppError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateRepository;

impl TemplateRepository {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TemplateRepositoryTrait for TemplateRepository {
    async fn list_visible(
        &self,
        db: &PgPool,
        user_id: UserId,
        include_all: bool,
    ) -> Result<Vec<IncidentTemplate>, AppError> {
        let query = format!(
            "SELECT {} FROM incident_templates \
             WHERE $2 OR is_public = TRUE OR creator_id = $1 \
             ORDER BY usage_count DESC, name ASC",
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, IncidentTemplate>(&query)
            .bind(user_id)
            .bind(include_all)
            .fetch_all(db)
            .await?;
        Ok(rows)
    }

    async fn find_by_id(
        &self,
        db: &PgPool,
        id: TemplateId,
    ) -> Result<Option<IncidentTemplate>, AppError> {
        let query = format!(
            "SELECT {} FROM incident_templates WHERE id = $1",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, IncidentTemplate>(&query)
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }

    async fn tag_links(
        &self,
        db: &PgPool,
        ids: &[TemplateId],
    ) -> Result<Vec<(TemplateId, Tag)>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw_ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
        let rows = sqlx::query_as::<_, TemplateTagRow>(
            "SELECT tt.template_id, t.id, t.name, t.color, t.created_at, t.updated_at \
             FROM template_tags tt JOIN tags t ON t.id = tt.tag_id \
             WHERE tt.template_id = ANY($1) ORDER BY t.name ASC",
        )
        .bind(raw_ids)
        .fetch_all(db)
        .await?;
        Ok(rows.into_iter().map(|row| (row.template_id, row.tag)).collect())
    }

    async fn create(
        &self,
        db: &PgPool,
        template: &IncidentTemplate,
        tag_ids: &[TagId],
    ) -> Result<(), AppError> {
        let mut tx = begin_transaction(db).await?;
        sqlx::query(
            "INSERT INTO incident_templates (id, name, description, title, content, severity, \
             impact_scope, creator_id, is_public, usage_count, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(template.id)
        .bind(&template.name)
        .bind(&template.description)
        .bind(&template.title)
        .bind(&template.content)
        .bind(template.severity)
        .bind(&template.impact_scope)
        .bind(template.creator_id)
        .bind(template.is_public)
        .bind(template.usage_count)
        .bind(template.created_at)
        .bind(template.updated_at)
        .execute(&mut *tx)
        .await?;
        replace_template_tags(&mut *tx, template.id, tag_ids).await?;
        commit_transaction(tx).await
    }

    async fn update(
        &self,
        db: &PgPool,
        template: &IncidentTemplate,
        tag_ids: &[TagId],
    ) -> Result<(), AppError> {
        let mut tx = begin_transaction(db).await?;
        let result = sqlx::query(
            "UPDATE incident_templates SET name = $2, description = $3, title = $4, \
             content = $5, severity = $6, impact_scope = $7, is_public = $8, updated_at = $9 \
             WHERE id = $1",
        )
        .bind(template.id)
        .bind(&template.name)
        .bind(&template.description)
        .bind(&template.title)
        .bind(&template.content)
        .bind(template.severity)
        .bind(&template.impact_scope)
        .bind(template.is_public)
        .bind(template.updated_at)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Template not found".into()));
        }
        replace_template_tags(&mut *tx, template.id, tag_ids).await?;
        commit_transaction(tx).await
    }

    async fn delete(&self, db: &PgPool, id: TemplateId) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM incident_templates WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn increment_usage(&self, db: &PgPool, id: TemplateId) -> Result<(), AppError> {
        sqlx::query("UPDATE incident_templates SET usage_count = usage_count + 1 WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }
}

async fn replace_template_tags(
    conn: &mut PgConnection,
    template_id: TemplateId,
    tag_ids: &[TagId],
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM template_tags WHERE template_id = $1")
        .bind(template_id)
        .execute(&mut *conn)
        .await?;
    for tag_id in tag_ids {
        sqlx::query(
            "INSERT INTO template_tags (template_id, tag_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(template_id)
        .bind(tag_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}
