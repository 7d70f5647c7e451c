use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::error::AppError;
use crate::models::audit_log::AuditLog;
use crate::repositories::common::push_clause;
use crate::types::{AuditLogId, UserId};

const SELECT_COLUMNS: &str = "id, user_id, user_name, user_email, action, resource_type, \
     resource_id, method, path, ip_address, user_agent, status_code, details, request_id, \
     created_at";

#[derive(Debug, Clone, Default)]
pub struct AuditLogFilters {
    pub user_id: Option<UserId>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditLogRepositoryTrait: Send + Sync {
    async fn insert(&self, db: &PgPool, log: &AuditLog) -> Result<(), AppError>;

    async fn find_by_id(&self, db: &PgPool, id: AuditLogId)
        -> Result<Option<AuditLog>, AppError>;

    async fn list(
        &self,
        db: &PgPool,
        filters: &AuditLogFilters,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditLog>, AppError>;

    async fn count(&self, db: &PgPool, filters: &AuditLogFilters) -> Result<i64, AppError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AuditLogRepository;

impl AuditLogRepository {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditLogRepositoryTrait for AuditLogRepository {
    async fn insert(&self, db: &PgPool, log: &AuditLog) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO audit_logs (id, user_id, user_name, user_email, action, resource_type, \
             resource_id, method, path, ip_address, user_agent, status_code, details, \
             request_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(log.id)
        .bind(log.user_id)
        .bind(&log.user_name)
        .bind(&log.user_email)
        .bind(&log.action)
        .bind(&log.resource_type)
        .bind(&log.resource_id)
        .bind(&log.method)
        .bind(&log.path)
        .bind(&log.ip_address)
        .bind(&log.user_agent)
        .bind(log.status_code)
        .bind(&log.details)
        .bind(&log.request_id)
        .bind(log.created_at)
        .execute(db)
        .await?;
        Ok(())
    }

    async fn find_by_id(
        &self,
        db: &PgPool,
        id: AuditLogId,
    ) -> Result<Option<AuditLog>, AppError> {
        let query = format!("SELECT {} FROM audit_logs WHERE id = $1", SELECT_COLUMNS);
        let row = sqlx::query_as::<_, AuditLog>(&query)
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }

    async fn list(
        &self,
        db: &PgPool,
        filters: &AuditLogFilters,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditLog>, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM audit_logs", SELECT_COLUMNS));
        let mut has_clause = false;
        apply_audit_log_filters(&mut builder, &mut has_clause, filters);
        builder
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = builder.build_query_as::<AuditLog>().fetch_all(db).await?;
        Ok(rows)
    }

    async fn count(&self, db: &PgPool, filters: &AuditLogFilters) -> Result<i64, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM audit_logs");
        let mut has_clause = false;
        apply_audit_log_filters(&mut builder, &mut has_clause, filters);
        let total = builder.build_query_scalar::<i64>().fetch_one(db).await?;
        Ok(total)
    }
}

fn apply_audit_log_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    has_clause: &mut bool,
    filters: &AuditLogFilters,
) {
    if let Some(user_id) = filters.user_id {
        push_clause(builder, has_clause);
        builder.push("user_id = ").push_bind(user_id);
    }
    if let Some(action) = filters.action.as_ref() {
        push_clause(builder, has_clause);
        builder.push("action = ").push_bind(action.clone());
    }
    if let Some(resource_type) = filters.resource_type.as_ref() {
        push_clause(builder, has_clause);
        builder
            .push("resource_type = ")
            .push_bind(resource_type.clone());
    }
    if let Some(from) = filters.from {
        push_clause(builder, has_clause);
        builder.push("created_at >= ").push_bind(from);
    }
    if let Some(to) = filters.to {
        push_clause(builder, has_clause);
        builder.push("created_at <= ").push_bind(to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_chain_with_and() {
        let filters = AuditLogFilters {
            user_id: Some(UserId::new()),
            action: Some("login".into()),
            from: Some(Utc::now()),
            ..AuditLogFilters::default()
        };
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM audit_logs");
        let mut has_clause = false;
        apply_audit_log_filters(&mut builder, &mut has_clause, &filters);
        assert_eq!(
            builder.sql(),
            "SELECT COUNT(*) FROM audit_logs WHERE user_id = $1 AND action = $2 \
             AND created_at >= $3"
        );
    }

    #[test]
    fn empty_filters_leave_query_untouched() {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM audit_logs");
        let mut has_clause = false;
        apply_audit_log_filters(&mut builder, &mut has_clause, &AuditLogFilters::default());
        assert!(!has_clause);
    }
}
