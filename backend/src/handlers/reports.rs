use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    error::AppError,
    models::report::{CustomReportQuery, IncidentReport, MonthlyReportQuery},
    services::report::ReportService,
    state::AppState,
};

pub async fn monthly_report(
    State(state): State<AppState>,
    Query(query): Query<MonthlyReportQuery>,
) -> Result<Json<IncidentReport>, AppError> {
    Ok(Json(ReportService::from_state(&state).monthly(&query).await?))
}

pub async fn custom_report(
    State(state): State<AppState>,
    Query(query): Query<CustomReportQuery>,
) -> Result<Json<IncidentReport>, AppError> {
    Ok(Json(ReportService::from_state(&state).custom(&query).await?))
}
