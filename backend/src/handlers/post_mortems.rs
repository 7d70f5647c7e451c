use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppError,
    handlers::common::{parse_id, MessageResponse},
    models::{
        post_mortem::{
            CreatePostMortemRequest, PostMortem, PostMortemListQuery, PostMortemListResponse,
            RootCauseSuggestionResponse, UpdatePostMortemRequest,
        },
        user::User,
    },
    services::post_mortem::PostMortemService,
    state::AppState,
    types::{IncidentId, PostMortemId},
};

pub async fn list_post_mortems(
    State(state): State<AppState>,
    Query(query): Query<PostMortemListQuery>,
) -> Result<Json<PostMortemListResponse>, AppError> {
    Ok(Json(PostMortemService::from_state(&state).list(&query).await?))
}

pub async fn get_post_mortem(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PostMortem>, AppError> {
    let id: PostMortemId = parse_id("id", &id)?;
    Ok(Json(PostMortemService::from_state(&state).get(id).await?))
}

pub async fn get_post_mortem_by_incident(
    State(state): State<AppState>,
    Path(incident_id): Path<String>,
) -> Result<Json<PostMortem>, AppError> {
    let incident_id: IncidentId = parse_id("incident_id", &incident_id)?;
    let post_mortem = PostMortemService::from_state(&state)
        .get_by_incident(incident_id)
        .await?;
    Ok(Json(post_mortem))
}

pub async fn create_post_mortem(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<CreatePostMortemRequest>,
) -> Result<(StatusCode, Json<PostMortem>), AppError> {
    let post_mortem = PostMortemService::from_state(&state)
        .create(&user, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(post_mortem)))
}

pub async fn update_post_mortem(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    Json(payload): Json<UpdatePostMortemRequest>,
) -> Result<Json<PostMortem>, AppError> {
    let id: PostMortemId = parse_id("id", &id)?;
    let post_mortem = PostMortemService::from_state(&state)
        .update(&user, id, payload)
        .await?;
    Ok(Json(post_mortem))
}

pub async fn publish_post_mortem(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<PostMortem>, AppError> {
    let id: PostMortemId = parse_id("id", &id)?;
    Ok(Json(
        PostMortemService::from_state(&state)
            .publish(&user, id)
            .await?,
    ))
}

pub async fn unpublish_post_mortem(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<PostMortem>, AppError> {
    let id: PostMortemId = parse_id("id", &id)?;
    Ok(Json(
        PostMortemService::from_state(&state)
            .unpublish(&user, id)
            .await?,
    ))
}

pub async fn delete_post_mortem(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id: PostMortemId = parse_id("id", &id)?;
    PostMortemService::from_state(&state).delete(&user, id).await?;
    Ok(Json(MessageResponse::new("Post-mortem deleted successfully")))
}

pub async fn generate_ai_suggestion(
    State(state): State<AppState>,
    Path(incident_id): Path<String>,
) -> Result<Json<RootCauseSuggestionResponse>, AppError> {
    let incident_id: IncidentId = parse_id("incident_id", &incident_id)?;
    let suggestion = PostMortemService::from_state(&state)
        .generate_ai_suggestion(incident_id)
        .await?;
    Ok(Json(suggestion))
}
