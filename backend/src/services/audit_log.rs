use std::sync::{Arc, Mutex};

use sqlx::PgPool;

use crate::error::AppError;
use crate::models::{
    audit_log::{AuditLog, AuditLogListResponse, AuditLogQuery},
    PageQuery, Pagination,
};
use crate::repositories::{
    audit_log::AuditLogFilters, AuditLogRepository, AuditLogRepositoryTrait,
};
use crate::services::worker_pool::WorkerPool;
use crate::types::AuditLogId;

const DEFAULT_AUDIT_PAGE_LIMIT: i64 = 50;

/// Accepts finished audit entries without blocking the request.
pub trait AuditLogDispatcher: Send + Sync {
    /// Returns false when the entry was dropped.
    fn submit(&self, log: AuditLog) -> bool;
}

/// Persists audit entries from a bounded worker pool.
pub struct PooledAuditLogDispatcher {
    workers: WorkerPool<AuditLog>,
}

impl PooledAuditLogDispatcher {
    pub fn spawn(pool: PgPool, workers: usize, capacity: usize) -> Self {
        Self::spawn_with_repository(pool, Arc::new(AuditLogRepository::new()), workers, capacity)
    }

    pub fn spawn_with_repository(
        pool: PgPool,
        repo: Arc<dyn AuditLogRepositoryTrait>,
        workers: usize,
        capacity: usize,
    ) -> Self {
        let workers = WorkerPool::spawn("audit_log", workers, capacity, move |log: AuditLog| {
            let pool = pool.clone();
            let repo = Arc::clone(&repo);
            async move {
                if let Err(err) = repo.insert(&pool, &log).await {
                    tracing::warn!(
                        error = %err,
                        method = %log.method,
                        path = %log.path,
                        "Failed to record audit log"
                    );
                }
            }
        });
        Self { workers }
    }
}

impl AuditLogDispatcher for PooledAuditLogDispatcher {
    fn submit(&self, log: AuditLog) -> bool {
        self.workers.submit(log)
    }
}

/// Keeps submitted entries in memory for inspection.
#[derive(Default)]
pub struct RecordingAuditLogDispatcher {
    entries: Mutex<Vec<AuditLog>>,
}

impl RecordingAuditLogDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditLog> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl AuditLogDispatcher for RecordingAuditLogDispatcher {
    fn submit(&self, log: AuditLog) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(log);
        true
    }
}

/// Read side of the audit trail for administrators.
pub struct AuditLogService {
    pool: PgPool,
    repo: Arc<dyn AuditLogRepositoryTrait>,
}

impl AuditLogService {
    pub fn new(pool: PgPool) -> Self {
        Self::with_repository(pool, Arc::new(AuditLogRepository::new()))
    }

    pub fn with_repository(pool: PgPool, repo: Arc<dyn AuditLogRepositoryTrait>) -> Self {
        Self { pool, repo }
    }

    pub async fn list(&self, query: &AuditLogQuery) -> Result<AuditLogListResponse, AppError> {
        if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
            if end < start {
                return Err(AppError::validation("end_date must not be before start_date"));
            }
        }
        let filters = AuditLogFilters {
            user_id: query.user_id,
            action: query.action.clone().filter(|value| !value.trim().is_empty()),
            resource_type: query
                .resource_type
                .clone()
                .filter(|value| !value.trim().is_empty()),
            from: query.start_date,
            to: query.end_date,
        };
        let paging = PageQuery::new(query.page, query.limit);
        let limit = paging.limit_or(DEFAULT_AUDIT_PAGE_LIMIT);
        let offset = paging.offset_for(limit);

        let total = self.repo.count(&self.pool, &filters).await?;
        let audit_logs = self.repo.list(&self.pool, &filters, limit, offset).await?;
        Ok(AuditLogListResponse {
            audit_logs,
            pagination: Pagination::new(paging.page(), limit, total),
        })
    }

    pub async fn get(&self, id: AuditLogId) -> Result<AuditLog, AppError> {
        self.repo
            .find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Audit log not found".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::audit_log::MockAuditLogRepositoryTrait;
    use crate::services::test_support::lazy_pool;

    #[tokio::test]
    async fn list_uses_audit_page_defaults() {
        let mut repo = MockAuditLogRepositoryTrait::new();
        repo.expect_count().returning(|_, _| Ok(120));
        repo.expect_list()
            .withf(|_, _, limit, offset| *limit == 50 && *offset == 50)
            .returning(|_, _, _, _| Ok(Vec::new()));

        let service = AuditLogService::with_repository(lazy_pool(), Arc::new(repo));
        let response = service
            .list(&AuditLogQuery {
                page: Some(2),
                ..AuditLogQuery::default()
            })
            .await
            .expect("list");
        assert_eq!(response.pagination.total_pages, 3);
        assert_eq!(response.pagination.limit, 50);
    }

    #[tokio::test]
    async fn missing_entry_is_not_found() {
        let mut repo = MockAuditLogRepositoryTrait::new();
        repo.expect_find_by_id().returning(|_, _| Ok(None));
        let service = AuditLogService::with_repository(lazy_pool(), Arc::new(repo));
        let err = service.get(AuditLogId::new()).await.expect_err("missing");
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
