use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::{
    error::AppError,
    handlers::common::parse_id,
    models::audit_log::{AuditLog, AuditLogListResponse, AuditLogQuery},
    services::audit_log::AuditLogService,
    state::AppState,
    types::AuditLogId,
};

pub async fn list_audit_logs(
    State(state): State<AppState>,
    Query(query): Query<AuditLogQuery>,
) -> Result<Json<AuditLogListResponse>, AppError> {
    Ok(Json(AuditLogService::new(state.pool.clone()).list(&query).await?))
}

pub async fn get_audit_log(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AuditLog>, AppError> {
    let id: AuditLogId = parse_id("id", &id)?;
    Ok(Json(AuditLogService::new(state.pool.clone()).get(id).await?))
}
