use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppError,
    handlers::common::{parse_id, MessageResponse},
    models::{
        activity::{
            ActivityListQuery, CreateCommentRequest, CreateTimelineEventRequest, IncidentActivity,
        },
        incident::{
            AssignIncidentRequest, CreateIncidentRequest, Incident, IncidentListQuery,
            IncidentListResponse, UpdateIncidentRequest,
        },
        user::User,
    },
    services::{activity::ActivityService, incident::IncidentService},
    state::AppState,
    validation::ValidatedJson,
    types::IncidentId,
};

pub async fn list_incidents(
    State(state): State<AppState>,
    Query(query): Query<IncidentListQuery>,
) -> Result<Json<IncidentListResponse>, AppError> {
    let response = IncidentService::from_state(&state).list(&query).await?;
    Ok(Json(response))
}

pub async fn get_incident(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Incident>, AppError> {
    let id: IncidentId = parse_id("id", &id)?;
    Ok(Json(IncidentService::from_state(&state).get(id).await?))
}

pub async fn create_incident(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ValidatedJson(payload): ValidatedJson<CreateIncidentRequest>,
) -> Result<(StatusCode, Json<Incident>), AppError> {
    let incident = IncidentService::from_state(&state)
        .create(&user, payload)
        .await?;
    tracing::info!(incident_id = %incident.id, user_id = %user.id, "Incident created");
    Ok((StatusCode::CREATED, Json(incident)))
}

pub async fn update_incident(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<UpdateIncidentRequest>,
) -> Result<Json<Incident>, AppError> {
    let id: IncidentId = parse_id("id", &id)?;
    let incident = IncidentService::from_state(&state)
        .update(&user, id, payload)
        .await?;
    Ok(Json(incident))
}

pub async fn delete_incident(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id: IncidentId = parse_id("id", &id)?;
    IncidentService::from_state(&state).delete(&user, id).await?;
    Ok(Json(MessageResponse::new("Incident deleted successfully")))
}

pub async fn regenerate_summary(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<Incident>, AppError> {
    let id: IncidentId = parse_id("id", &id)?;
    let incident = IncidentService::from_state(&state)
        .regenerate_summary(&user, id)
        .await?;
    Ok(Json(incident))
}

pub async fn assign_incident(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    Json(payload): Json<AssignIncidentRequest>,
) -> Result<Json<Incident>, AppError> {
    let id: IncidentId = parse_id("id", &id)?;
    let incident = IncidentService::from_state(&state)
        .assign(&user, id, payload)
        .await?;
    Ok(Json(incident))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<CreateCommentRequest>,
) -> Result<(StatusCode, Json<IncidentActivity>), AppError> {
    let id: IncidentId = parse_id("id", &id)?;
    let activity = ActivityService::from_state(&state)
        .add_comment(&user, id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

pub async fn add_timeline_event(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<CreateTimelineEventRequest>,
) -> Result<(StatusCode, Json<IncidentActivity>), AppError> {
    let id: IncidentId = parse_id("id", &id)?;
    let activity = ActivityService::from_state(&state)
        .add_timeline_event(&user, id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

pub async fn list_activities(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ActivityListQuery>,
) -> Result<Json<Vec<IncidentActivity>>, AppError> {
    let id: IncidentId = parse_id("id", &id)?;
    let activities = ActivityService::from_state(&state).list(id, &query).await?;
    Ok(Json(activities))
}
