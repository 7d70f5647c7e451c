use axum::{
    extract::{Query, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::incident::IncidentListQuery,
    services::export::{ExportService, EXPORT_FILE_NAME},
    state::AppState,
};

pub async fn export_incidents(
    State(state): State<AppState>,
    Query(query): Query<IncidentListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let body = ExportService::from_state(&state)
        .incidents_csv(&query)
        .await?;
    Ok((
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename={EXPORT_FILE_NAME}"),
            ),
        ],
        body,
    ))
}
