use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppError,
    handlers::common::{parse_id, MessageResponse},
    models::{
        incident::Incident,
        template::{CreateIncidentFromTemplateRequest, IncidentTemplate, TemplatePayload},
        user::User,
    },
    services::template::TemplateService,
    state::AppState,
    validation::ValidatedJson,
    types::TemplateId,
};

pub async fn list_templates(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<IncidentTemplate>>, AppError> {
    Ok(Json(TemplateService::from_state(&state).list(&user).await?))
}

pub async fn get_template(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<IncidentTemplate>, AppError> {
    let id: TemplateId = parse_id("id", &id)?;
    Ok(Json(TemplateService::from_state(&state).get(&user, id).await?))
}

pub async fn create_template(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ValidatedJson(payload): ValidatedJson<TemplatePayload>,
) -> Result<(StatusCode, Json<IncidentTemplate>), AppError> {
    let template = TemplateService::from_state(&state)
        .create(&user, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(template)))
}

pub async fn update_template(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<TemplatePayload>,
) -> Result<Json<IncidentTemplate>, AppError> {
    let id: TemplateId = parse_id("id", &id)?;
    let template = TemplateService::from_state(&state)
        .update(&user, id, payload)
        .await?;
    Ok(Json(template))
}

pub async fn delete_template(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id: TemplateId = parse_id("id", &id)?;
    TemplateService::from_state(&state).delete(&user, id).await?;
    Ok(Json(MessageResponse::new("Template deleted successfully")))
}

pub async fn create_incident_from_template(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<CreateIncidentFromTemplateRequest>,
) -> Result<(StatusCode, Json<Incident>), AppError> {
    let incident = TemplateService::from_state(&state)
        .create_incident(&user, payload)
        .await?;
    tracing::info!(
        incident_id = %incident.id,
        user_id = %user.id,
        "Incident created from template"
    );
    Ok((StatusCode::CREATED, Json(incident)))
}
