use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppError,
    handlers::common::{parse_id, MessageResponse},
    models::tag::{Tag, TagPayload},
    services::tag::TagService,
    state::AppState,
    validation::ValidatedJson,
    types::TagId,
};

pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<Tag>>, AppError> {
    Ok(Json(TagService::from_state(&state).list().await?))
}

pub async fn create_tag(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<TagPayload>,
) -> Result<(StatusCode, Json<Tag>), AppError> {
    let tag = TagService::from_state(&state).create(payload).await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

pub async fn update_tag(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<TagPayload>,
) -> Result<Json<Tag>, AppError> {
    let id: TagId = parse_id("id", &id)?;
    Ok(Json(TagService::from_state(&state).update(id, payload).await?))
}

pub async fn delete_tag(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id: TagId = parse_id("id", &id)?;
    TagService::from_state(&state).delete(id).await?;
    Ok(Json(MessageResponse::new("Tag deleted successfully")))
}
