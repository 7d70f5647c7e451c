use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppError,
    handlers::common::{parse_id, MessageResponse},
    models::{
        action_item::{
            ActionItem, ActionItemListQuery, ActionItemListResponse, CreateActionItemRequest,
            UpdateActionItemRequest,
        },
        user::User,
    },
    services::action_item::ActionItemService,
    state::AppState,
    validation::ValidatedJson,
    types::{ActionItemId, PostMortemId},
};

pub async fn list_action_items(
    State(state): State<AppState>,
    Query(query): Query<ActionItemListQuery>,
) -> Result<Json<ActionItemListResponse>, AppError> {
    Ok(Json(ActionItemService::from_state(&state).list(&query).await?))
}

pub async fn list_action_items_by_post_mortem(
    State(state): State<AppState>,
    Path(post_mortem_id): Path<String>,
) -> Result<Json<Vec<ActionItem>>, AppError> {
    let post_mortem_id: PostMortemId = parse_id("post_mortem_id", &post_mortem_id)?;
    let items = ActionItemService::from_state(&state)
        .list_by_post_mortem(post_mortem_id)
        .await?;
    Ok(Json(items))
}

pub async fn get_action_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActionItem>, AppError> {
    let id: ActionItemId = parse_id("id", &id)?;
    Ok(Json(ActionItemService::from_state(&state).get(id).await?))
}

pub async fn create_action_item(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ValidatedJson(payload): ValidatedJson<CreateActionItemRequest>,
) -> Result<(StatusCode, Json<ActionItem>), AppError> {
    let item = ActionItemService::from_state(&state)
        .create(&user, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update_action_item(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<UpdateActionItemRequest>,
) -> Result<Json<ActionItem>, AppError> {
    let id: ActionItemId = parse_id("id", &id)?;
    let item = ActionItemService::from_state(&state)
        .update(&user, id, payload)
        .await?;
    Ok(Json(item))
}

pub async fn delete_action_item(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id: ActionItemId = parse_id("id", &id)?;
    ActionItemService::from_state(&state).delete(&user, id).await?;
    Ok(Json(MessageResponse::new("Action item deleted successfully")))
}
