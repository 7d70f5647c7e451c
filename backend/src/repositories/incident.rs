//! Incident repository.
//!
//! Writes that touch the incident row together with its tag links or
//! activity rows run inside a single transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};

use crate::error::AppError;
use crate::models::{
    activity::IncidentActivity,
    incident::{Incident, IncidentStatus, Severity},
    tag::Tag,
    SortOrder,
};
use crate::repositories::{
    activity::insert_activity,
    common::push_clause,
    transaction::{begin_transaction, commit_transaction},
};
use crate::types::{IncidentId, TagId, UserId};

const SELECT_COLUMNS: &str = "incidents.id, incidents.title, incidents.description, \
     incidents.summary, incidents.severity, incidents.status, incidents.impact_scope, \
     incidents.detected_at, incidents.resolved_at, incidents.creator_id, incidents.assignee_id, \
     incidents.sla_target_hours, incidents.sla_deadline, incidents.sla_violated, \
     incidents.created_at, incidents.updated_at";

pub const SORTABLE_COLUMNS: [&str; 8] = [
    "id",
    "title",
    "severity",
    "status",
    "detected_at",
    "resolved_at",
    "created_at",
    "updated_at",
];
pub const DEFAULT_SORT_COLUMN: &str = "created_at";

/// Filters shared by the incident list and the CSV export.
#[derive(Debug, Clone)]
pub struct IncidentFilters {
    pub severity: Option<Severity>,
    pub status: Option<IncidentStatus>,
    /// Matches incidents carrying any of these tags.
    pub tag_ids: Vec<TagId>,
    pub search: Option<String>,
    /// Must be one of [`SORTABLE_COLUMNS`].
    pub sort: &'static str,
    pub order: SortOrder,
}

impl Default for IncidentFilters {
    fn default() -> Self {
        Self {
            severity: None,
            status: None,
            tag_ids: Vec::new(),
            search: None,
            sort: DEFAULT_SORT_COLUMN,
            order: SortOrder::Desc,
        }
    }
}

#[derive(Debug, FromRow)]
struct IncidentTagRow {
    incident_id: IncidentId,
    #[sqlx(flatten)]
    tag: Tag,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IncidentRepositoryTrait: Send + Sync {
    async fn find_by_id(&self, db: &PgPool, id: IncidentId) -> Result<Option<Incident>, AppError>;

    async fn list(
        &self,
        db: &PgPool,
        filters: &IncidentFilters,
        page: Option<(i64, i64)>,
    ) -> Result<Vec<Incident>, AppError>;

    async fn count(&self, db: &PgPool, filters: &IncidentFilters) -> Result<i64, AppError>;

    /// Every incident, newest detection first. Feeds the dashboard aggregations.
    async fn find_all(&self, db: &PgPool) -> Result<Vec<Incident>, AppError>;

    async fn find_created_between(
        &self,
        db: &PgPool,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Incident>, AppError>;

    async fn tag_links(
        &self,
        db: &PgPool,
        ids: &[IncidentId],
    ) -> Result<Vec<(IncidentId, Tag)>, AppError>;

    async fn create_with_activity(
        &self,
        db: &PgPool,
        incident: &Incident,
        tag_ids: &[TagId],
        activity: &IncidentActivity,
    ) -> Result<(), AppError>;

    async fn update_with_activities(
        &self,
        db: &PgPool,
        incident: &Incident,
        tag_ids: &[TagId],
        activities: &[IncidentActivity],
    ) -> Result<(), AppError>;

    async fn update_assignee(
        &self,
        db: &PgPool,
        id: IncidentId,
        assignee_id: Option<UserId>,
        activity: &IncidentActivity,
    ) -> Result<(), AppError>;

    async fn update_summary(&self, db: &PgPool, id: IncidentId, summary: &str)
        -> Result<(), AppError>;

    /// Returns false when no row matched.
    async fn delete(&self, db: &PgPool, id: IncidentId) -> Result<bool, AppError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IncidentRepository;

impl IncidentRepository {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl IncidentRepositoryTrait for IncidentRepository {
    async fn find_by_id(&self, db: &PgPool, id: IncidentId) -> Result<Option<Incident>, AppError> {
        let query = format!("SELECT {} FROM incidents WHERE id = $1", SELECT_COLUMNS);
        let incident = sqlx::query_as::<_, Incident>(&query)
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(incident)
    }

    async fn list(
        &self,
        db: &PgPool,
        filters: &IncidentFilters,
        page: Option<(i64, i64)>,
    ) -> Result<Vec<Incident>, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM incidents", SELECT_COLUMNS));
        let mut has_clause = false;
        apply_incident_filters(&mut builder, &mut has_clause, filters);
        builder.push(format!(
            " ORDER BY incidents.{} {order} NULLS LAST, incidents.id {order}",
            filters.sort,
            order = filters.order.as_sql()
        ));
        if let Some((limit, offset)) = page {
            builder
                .push(" LIMIT ")
                .push_bind(limit)
                .push(" OFFSET ")
                .push_bind(offset);
        }

        let incidents = builder.build_query_as::<Incident>().fetch_all(db).await?;
        Ok(incidents)
    }

    async fn count(&self, db: &PgPool, filters: &IncidentFilters) -> Result<i64, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM incidents");
        let mut has_clause = false;
        apply_incident_filters(&mut builder, &mut has_clause, filters);
        let total = builder.build_query_scalar::<i64>().fetch_one(db).await?;
        Ok(total)
    }

    async fn find_all(&self, db: &PgPool) -> Result<Vec<Incident>, AppError> {
        let query = format!(
            "SELECT {} FROM incidents ORDER BY detected_at DESC",
            SELECT_COLUMNS
        );
        let incidents = sqlx::query_as::<_, Incident>(&query).fetch_all(db).await?;
        Ok(incidents)
    }

    async fn find_created_between(
        &self,
        db: &PgPool,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Incident>, AppError> {
        let query = format!(
            "SELECT {} FROM incidents WHERE created_at >= $1 AND created_at <= $2 \
             ORDER BY created_at ASC",
            SELECT_COLUMNS
        );
        let incidents = sqlx::query_as::<_, Incident>(&query)
            .bind(start)
            .bind(end)
            .fetch_all(db)
            .await?;
        Ok(incidents)
    }

    async fn tag_links(
        &self,
        db: &PgPool,
        ids: &[IncidentId],
    ) -> Result<Vec<(IncidentId, Tag)>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw_ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
        let rows = sqlx::query_as::<_, IncidentTagRow>(
            "SELECT it.incident_id, t.id, t.name, t.color, t.created_at, t.updated_at \
             FROM incident_tags it JOIN tags t ON t.id = it.tag_id \
             WHERE it.incident_id = ANY($1) ORDER BY t.name ASC",
        )
        .bind(raw_ids)
        .fetch_all(db)
        .await?;
        Ok(rows.into_iter().map(|row| (row.incident_id, row.tag)).collect())
    }

    async fn create_with_activity(
        &self,
        db: &PgPool,
        incident: &Incident,
        tag_ids: &[TagId],
        activity: &IncidentActivity,
    ) -> Result<(), AppError> {
        let mut tx = begin_transaction(db).await?;
        sqlx::query(
            "INSERT INTO incidents (id, title, description, summary, severity, status, \
             impact_scope, detected_at, resolved_at, creator_id, assignee_id, sla_target_hours, \
             sla_deadline, sla_violated, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(incident.id)
        .bind(&incident.title)
        .bind(&incident.description)
        .bind(&incident.summary)
        .bind(incident.severity)
        .bind(incident.status)
        .bind(&incident.impact_scope)
        .bind(incident.detected_at)
        .bind(incident.resolved_at)
        .bind(incident.creator_id)
        .bind(incident.assignee_id)
        .bind(incident.sla_target_hours)
        .bind(incident.sla_deadline)
        .bind(incident.sla_violated)
        .bind(incident.created_at)
        .bind(incident.updated_at)
        .execute(&mut *tx)
        .await?;
        replace_tag_links(&mut *tx, incident.id, tag_ids).await?;
        insert_activity(&mut *tx, activity).await?;
        commit_transaction(tx).await
    }

    async fn update_with_activities(
        &self,
        db: &PgPool,
        incident: &Incident,
        tag_ids: &[TagId],
        activities: &[IncidentActivity],
    ) -> Result<(), AppError> {
        let mut tx = begin_transaction(db).await?;
        let result = sqlx::query(
            "UPDATE incidents SET title = $2, description = $3, severity = $4, status = $5, \
             impact_scope = $6, detected_at = $7, resolved_at = $8, assignee_id = $9, \
             sla_target_hours = $10, sla_deadline = $11, sla_violated = $12, updated_at = $13 \
             WHERE id = $1",
        )
        .bind(incident.id)
        .bind(&incident.title)
        .bind(&incident.description)
        .bind(incident.severity)
        .bind(incident.status)
        .bind(&incident.impact_scope)
        .bind(incident.detected_at)
        .bind(incident.resolved_at)
        .bind(incident.assignee_id)
        .bind(incident.sla_target_hours)
        .bind(incident.sla_deadline)
        .bind(incident.sla_violated)
        .bind(incident.updated_at)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Incident not found".into()));
        }
        replace_tag_links(&mut *tx, incident.id, tag_ids).await?;
        for activity in activities {
            insert_activity(&mut *tx, activity).await?;
        }
        commit_transaction(tx).await
    }

    async fn update_assignee(
        &self,
        db: &PgPool,
        id: IncidentId,
        assignee_id: Option<UserId>,
        activity: &IncidentActivity,
    ) -> Result<(), AppError> {
        let mut tx = begin_transaction(db).await?;
        let result =
            sqlx::query("UPDATE incidents SET assignee_id = $2, updated_at = $3 WHERE id = $1")
                .bind(id)
                .bind(assignee_id)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Incident not found".into()));
        }
        insert_activity(&mut *tx, activity).await?;
        commit_transaction(tx).await
    }

    async fn update_summary(
        &self,
        db: &PgPool,
        id: IncidentId,
        summary: &str,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE incidents SET summary = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(summary)
            .bind(Utc::now())
            .execute(db)
            .await?;
        Ok(())
    }

    async fn delete(&self, db: &PgPool, id: IncidentId) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM incidents WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

async fn replace_tag_links(
    conn: &mut PgConnection,
    incident_id: IncidentId,
    tag_ids: &[TagId],
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM incident_tags WHERE incident_id = $1")
        .bind(incident_id)
        .execute(&mut *conn)
        .await?;
    for tag_id in tag_ids {
        sqlx::query(
            "INSERT INTO incident_tags (incident_id, tag_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(incident_id)
        .bind(tag_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

fn apply_incident_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    has_clause: &mut bool,
    filters: &IncidentFilters,
) {
    if let Some(severity) = filters.severity {
        push_clause(builder, has_clause);
        builder.push("incidents.severity = ").push_bind(severity);
    }
    if let Some(status) = filters.status {
        push_clause(builder, has_clause);
        builder.push("incidents.status = ").push_bind(status);
    }
    if !filters.tag_ids.is_empty() {
        let raw_ids: Vec<String> = filters.tag_ids.iter().map(ToString::to_string).collect();
        push_clause(builder, has_clause);
        builder
            .push(
                "EXISTS (SELECT 1 FROM incident_tags it \
                 WHERE it.incident_id = incidents.id AND it.tag_id = ANY(",
            )
            .push_bind(raw_ids)
            .push("))");
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
            .push("(incidents.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR incidents.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}
