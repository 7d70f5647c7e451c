use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppError,
    models::user::{AuthResponse, LoginRequest, RegisterRequest, User},
    services::auth::AuthService,
    state::AppState,
    validation::ValidatedJson,
};

pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let response = AuthService::from_state(&state).register(payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let response = AuthService::from_state(&state).login(payload).await?;
    Ok(Json(response))
}

pub async fn me(Extension(user): Extension<User>) -> Json<User> {
    Json(user)
}
