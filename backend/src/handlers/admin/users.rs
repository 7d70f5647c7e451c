use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppError,
    handlers::common::{parse_id, MessageResponse},
    models::user::{
        CreateUserRequest, ResetPasswordRequest, UpdatePasswordRequest, UpdateUserRequest, User,
        UserListQuery,
    },
    services::user::UserService,
    state::AppState,
    validation::ValidatedJson,
    types::UserId,
};

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(UserService::from_state(&state).list(&query).await?))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>, AppError> {
    let id: UserId = parse_id("id", &id)?;
    Ok(Json(UserService::from_state(&state).get(id).await?))
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    ValidatedJson(payload): ValidatedJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = UserService::from_state(&state).create(payload).await?;
    tracing::info!(
        user_id = %user.id,
        admin_id = %admin.id,
        role = user.role.as_str(),
        "User created"
    );
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<UpdateUserRequest>,
) -> Result<Json<User>, AppError> {
    let id: UserId = parse_id("id", &id)?;
    Ok(Json(UserService::from_state(&state).update(id, payload).await?))
}

/// Self-service; the service rejects any id other than the caller's.
pub async fn update_password(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    Json(payload): Json<UpdatePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let id: UserId = parse_id("id", &id)?;
    UserService::from_state(&state)
        .update_password(&user, id, payload)
        .await?;
    Ok(Json(MessageResponse::new("Password updated successfully")))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    Path(id): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let id: UserId = parse_id("id", &id)?;
    UserService::from_state(&state)
        .reset_password(id, payload)
        .await?;
    tracing::info!(user_id = %id, admin_id = %admin.id, "Password reset by administrator");
    Ok(Json(MessageResponse::new("Password reset successfully")))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id: UserId = parse_id("id", &id)?;
    UserService::from_state(&state).delete(&admin, id).await?;
    Ok(Json(MessageResponse::new("User deleted successfully")))
}

pub async fn toggle_user_active(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<User>, AppError> {
    let id: UserId = parse_id("id", &id)?;
    Ok(Json(
        UserService::from_state(&state)
            .toggle_active(&admin, id)
            .await?,
    ))
}
