use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    error::AppError,
    models::stats::{DashboardQuery, DashboardStats, SlaMetrics, TagStat, TrendPeriod},
    services::stats::StatsService,
    state::AppState,
};

pub async fn dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardStats>, AppError> {
    let period = TrendPeriod::parse(query.period.as_deref());
    Ok(Json(StatsService::from_state(&state).dashboard(period).await?))
}

pub async fn sla(State(state): State<AppState>) -> Result<Json<SlaMetrics>, AppError> {
    Ok(Json(StatsService::from_state(&state).sla().await?))
}

pub async fn tags(State(state): State<AppState>) -> Result<Json<Vec<TagStat>>, AppError> {
    Ok(Json(StatsService::from_state(&state).tags().await?))
}
