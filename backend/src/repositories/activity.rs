use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgExecutor, PgPool};

use crate::error::AppError;
use crate::models::activity::IncidentActivity;
use crate::types::IncidentId;

const SELECT_COLUMNS: &str =
    "id, incident_id, user_id, activity_type, comment, old_value, new_value, created_at";

#[derive(Debug, FromRow)]
struct FirstResponseRow {
    incident_id: IncidentId,
    responded_at: DateTime<Utc>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActivityRepositoryTrait: Send + Sync {
    async fn create(&self, db: &PgPool, activity: &IncidentActivity) -> Result<(), AppError>;

    /// Newest first.
    async fn list_recent(
        &self,
        db: &PgPool,
        incident_id: IncidentId,
        limit: i64,
    ) -> Result<Vec<IncidentActivity>, AppError>;

    /// Oldest first, used to rebuild the incident timeline.
    async fn list_chronological(
        &self,
        db: &PgPool,
        incident_id: IncidentId,
        limit: i64,
    ) -> Result<Vec<IncidentActivity>, AppError>;

    /// Time of the first activity other than `created` for each incident that has one.
    async fn first_responses(
        &self,
        db: &PgPool,
        ids: &[IncidentId],
    ) -> Result<Vec<(IncidentId, DateTime<Utc>)>, AppError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ActivityRepository;

impl ActivityRepository {
    pub fn new() -> Self {
        Self
    }
}

pub(crate) async fn insert_activity<'e, E>(
    executor: E,
    activity: &IncidentActivity,
) -> Result<(), AppError>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO incident_activities \
         (id, incident_id, user_id, activity_type, comment, old_value, new_value, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(activity.id)
    .bind(activity.incident_id)
    .bind(activity.user_id)
    .bind(activity.activity_type)
    .bind(&activity.comment)
    .bind(&activity.old_value)
    .bind(&activity.new_value)
    .bind(activity.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl ActivityRepositoryTrait for ActivityRepository {
    async fn create(&self, db: &PgPool, activity: &IncidentActivity) -> Result<(), AppError> {
        insert_activity(db, activity).await
    }

    async fn list_recent(
        &self,
        db: &PgPool,
        incident_id: IncidentId,
        limit: i64,
    ) -> Result<Vec<IncidentActivity>, AppError> {
        let query = format!(
            "SELECT {} FROM incident_activities WHERE incident_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2",
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, IncidentActivity>(&query)
            .bind(incident_id)
            .bind(limit)
            .fetch_all(db)
            .await?;
        Ok(rows)
    }

    async fn list_chronological(
        &self,
        db: &PgPool,
        incident_id: IncidentId,
        limit: i64,
    ) -> Result<Vec<IncidentActivity>, AppError> {
        let query = format!(
            "SELECT {} FROM incident_activities WHERE incident_id = $1 \
             ORDER BY created_at ASC, id ASC LIMIT $2",
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, IncidentActivity>(&query)
            .bind(incident_id)
            .bind(limit)
            .fetch_all(db)
            .await?;
        Ok(rows)
    }

    async fn first_responses(
        &self,
        db: &PgPool,
        ids: &[IncidentId],
    ) -> Result<Vec<(IncidentId, DateTime<Utc>)>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw_ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
        let rows = sqlx::query_as::<_, FirstResponseRow>(
            "SELECT incident_id, MIN(created_at) AS responded_at FROM incident_activities \
             WHERE incident_id = ANY($1) AND activity_type <> 'created' \
             GROUP BY incident_id",
        )
        .bind(raw_ids)
        .fetch_all(db)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.incident_id, row.responded_at))
            .collect())
    }
}
