use axum::{
    extract::{Extension, Path, State},
    Json,
};

use crate::{
    error::AppError,
    handlers::common::parse_id,
    models::{
        notification::{NotificationSetting, UpdateNotificationSettingRequest},
        user::User,
    },
    services::notification_setting::NotificationSettingService,
    state::AppState,
    types::UserId,
};

pub async fn get_my_settings(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<NotificationSetting>, AppError> {
    Ok(Json(
        NotificationSettingService::from_state(&state)
            .get(user.id)
            .await?,
    ))
}

pub async fn update_my_settings(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<UpdateNotificationSettingRequest>,
) -> Result<Json<NotificationSetting>, AppError> {
    let settings = NotificationSettingService::from_state(&state)
        .update(user.id, payload)
        .await?;
    Ok(Json(settings))
}

pub async fn get_user_settings(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<NotificationSetting>, AppError> {
    let user_id: UserId = parse_id("user_id", &user_id)?;
    Ok(Json(
        NotificationSettingService::from_state(&state)
            .get_for_user(user_id)
            .await?,
    ))
}
