use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::error::AppError;
use crate::models::{
    post_mortem::{PostMortem, PostMortemStatus},
    SortOrder,
};
use crate::repositories::common::push_clause;
use crate::types::{IncidentId, PostMortemId, UserId};

const SELECT_COLUMNS: &str = "id, incident_id, author_id, status, root_cause, impact_analysis, \
     what_went_well, what_went_wrong, lessons_learned, five_whys_analysis, \
     ai_root_cause_suggestion, published_at, created_at, updated_at";

pub const SORTABLE_COLUMNS: [&str; 3] = ["created_at", "updated_at", "published_at"];

#[derive(Debug, Clone)]
pub struct PostMortemFilters {
    pub status: Option<PostMortemStatus>,
    pub author_id: Option<UserId>,
    pub incident_id: Option<IncidentId>,
    /// Matched against root cause, impact analysis and lessons learned.
    pub search: Option<String>,
    pub sort: &'static str,
    pub order: SortOrder,
}

impl Default for PostMortemFilters {
    fn default() -> Self {
        Self {
            status: None,
            author_id: None,
            incident_id: None,
            search: None,
            sort: "created_at",
            order: SortOrder::Desc,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PostMortemRepositoryTrait: Send + Sync {
    async fn create(&self, db: &PgPool, post_mortem: &PostMortem) -> Result<PostMortem, AppError>;

    async fn find_by_id(
        &self,
        db: &PgPool,
        id: PostMortemId,
    ) -> Result<Option<PostMortem>, AppError>;

    async fn find_by_incident(
        &self,
        db: &PgPool,
        incident_id: IncidentId,
    ) -> Result<Option<PostMortem>, AppError>;

    async fn list(
        &self,
        db: &PgPool,
        filters: &PostMortemFilters,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PostMortem>, AppError>;

    async fn count(&self, db: &PgPool, filters: &PostMortemFilters) -> Result<i64, AppError>;

    /// Persists the text fields and the five-whys analysis.
    async fn update_content(
        &self,
        db: &PgPool,
        post_mortem: &PostMortem,
    ) -> Result<PostMortem, AppError>;

    async fn set_status(
        &self,
        db: &PgPool,
        id: PostMortemId,
        status: PostMortemStatus,
        published_at: Option<DateTime<Utc>>,
    ) -> Result<PostMortem, AppError>;

    async fn update_ai_suggestion(
        &self,
        db: &PgPool,
        id: PostMortemId,
        suggestion: &str,
    ) -> Result<(), AppError>;

    async fn delete(&self, db: &PgPool, id: PostMortemId) -> Result<bool, AppError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PostMortemRepository;

impl PostMortemRepository {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PostMortemRepositoryTrait for PostMortemRepository {
    async fn create(&self, db: &PgPool, post_mortem: &PostMortem) -> Result<PostMortem, AppError> {
        let query = format!(
            "INSERT INTO post_mortems (id, incident_id, author_id, status, root_cause, \
             impact_analysis, what_went_well, what_went_wrong, lessons_learned, \
             five_whys_analysis, ai_root_cause_suggestion, published_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) RETURNING {}",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, PostMortem>(&query)
            .bind(post_mortem.id)
            .bind(post_mortem.incident_id)
            .bind(post_mortem.author_id)
            .bind(post_mortem.status)
            .bind(&post_mortem.root_cause)
            .bind(&post_mortem.impact_analysis)
            .bind(&post_mortem.what_went_well)
            .bind(&post_mortem.what_went_wrong)
            .bind(&post_mortem.lessons_learned)
            .bind(&post_mortem.five_whys_analysis)
            .bind(&post_mortem.ai_root_cause_suggestion)
            .bind(post_mortem.published_at)
            .bind(post_mortem.created_at)
            .bind(post_mortem.updated_at)
            .fetch_one(db)
            .await?;
        Ok(row)
    }

    async fn find_by_id(
        &self,
        db: &PgPool,
        id: PostMortemId,
    ) -> Result<Option<PostMortem>, AppError> {
        let query = format!("SELECT {} FROM post_mortems WHERE id = $1", SELECT_COLUMNS);
        let row = sqlx::query_as::<_, PostMortem>(&query)
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }

    async fn find_by_incident(
        &self,
        db: &PgPool,
        incident_id: IncidentId,
    ) -> Result<Option<PostMortem>, AppError> {
        let query = format!(
            "SELECT {} FROM post_mortems WHERE incident_id = $1",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, PostMortem>(&query)
            .bind(incident_id)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }

    async fn list(
        &self,
        db: &PgPool,
        filters: &PostMortemFilters,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PostMortem>, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM post_mortems", SELECT_COLUMNS));
        let mut has_clause = false;
        apply_post_mortem_filters(&mut builder, &mut has_clause, filters);
        builder.push(format!(
            " ORDER BY {} {order} NULLS LAST, id {order}",
            filters.sort,
            order = filters.order.as_sql()
        ));
        builder
            .push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = builder.build_query_as::<PostMortem>().fetch_all(db).await?;
        Ok(rows)
    }

    async fn count(&self, db: &PgPool, filters: &PostMortemFilters) -> Result<i64, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM post_mortems");
        let mut has_clause = false;
        apply_post_mortem_filters(&mut builder, &mut has_clause, filters);
        let total = builder.build_query_scalar::<i64>().fetch_one(db).await?;
        Ok(total)
    }

    async fn update_content(
        &self,
        db: &PgPool,
        post_mortem: &PostMortem,
    ) -> Result<PostMortem, AppError> {
        let query = format!(
            "UPDATE post_mortems SET root_cause = $2, impact_analysis = $3, what_went_well = $4, \
             what_went_wrong = $5, lessons_learned = $6, five_whys_analysis = $7, \
             updated_at = $8 WHERE id = $1 RETURNING {}",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, PostMortem>(&query)
            .bind(post_mortem.id)
            .bind(&post_mortem.root_cause)
            .bind(&post_mortem.impact_analysis)
            .bind(&post_mortem.what_went_well)
            .bind(&post_mortem.what_went_wrong)
            .bind(&post_mortem.lessons_learned)
            .bind(&post_mortem.five_whys_analysis)
            .bind(Utc::now())
            .fetch_optional(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Post-mortem not found".into()))?;
        Ok(row)
    }

    async fn set_status(
        &self,
        db: &PgPool,
        id: PostMortemId,
        status: PostMortemStatus,
        published_at: Option<DateTime<Utc>>,
    ) -> Result<PostMortem, AppError> {
        let query = format!(
            "UPDATE post_mortems SET status = $2, published_at = $3, updated_at = $4 \
             WHERE id = $1 RETURNING {}",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, PostMortem>(&query)
            .bind(id)
            .bind(status)
            .bind(published_at)
            .bind(Utc::now())
            .fetch_optional(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Post-mortem not found".into()))?;
        Ok(row)
    }

    async fn update_ai_suggestion(
        &self,
        db: &PgPool,
        id: PostMortemId,
        suggestion: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE post_mortems SET ai_root_cause_suggestion = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(suggestion)
        .bind(Utc::now())
        .execute(db)
        .await?;
        Ok(())
    }

    async fn delete(&self, db: &PgPool, id: PostMortemId) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM post_mortems WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn apply_post_mortem_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    has_clause: &mut bool,
    filters: &PostMortemFilters,
) {
    if let Some(status) = filters.status {
        push_clause(builder, has_clause);
        builder.push("status = ").push_bind(status);
    }
    if let Some(author_id) = filters.author_id {
        push_clause(builder, has_clause);
        builder.push("author_id = ").push_bind(author_id);
    }
    if let Some(incident_id) = filters.incident_id {
        push_clause(builder, has_clause);
        builder.push("incident_id = ").push_bind(incident_id);
    }
    if let Some(search) = filters
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        let pattern = format!("%{}%", search);
        push_clause(builder, has_clause);
        builder
            .push("(root_cause ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR impact_analysis ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR lessons_learned ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}
