use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::{
    error::AppError,
    models::user::User,
    repositories::{UserRepository, UserRepositoryTrait},
    state::AppState,
    utils::jwt::{verify_access_token, Claims},
};

pub async fn auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (claims, user) = authenticate_request(request.headers(), &state).await?;
    request.extensions_mut().insert(claims);
    request.extensions_mut().insert(user.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(user);
    Ok(response)
}

/// Must run after [`auth`]; lets editors and admins through.
pub async fn require_editor(request: Request, next: Next) -> Result<Response, AppError> {
    let user = current_user(&request)?;
    if !user.can_edit() {
        return Err(AppError::Forbidden("Editor role required".into()));
    }
    Ok(next.run(request).await)
}

/// Must run after [`auth`].
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let user = current_user(&request)?;
    if !user.is_admin() {
        return Err(AppError::Forbidden("Administrator role required".into()));
    }
    Ok(next.run(request).await)
}

fn current_user(request: &Request) -> Result<&User, AppError> {
    request
        .extensions()
        .get::<User>()
        .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))
}

fn parse_bearer_token(header: &str) -> Option<&str> {
    let (scheme, rest) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    (!token.is_empty()).then_some(token)
}

async fn authenticate_request(
    headers: &HeaderMap,
    state: &AppState,
) -> Result<(Claims, User), AppError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer_token)
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".into()))?;

    let claims = verify_access_token(token, &state.config.jwt_secret).map_err(|err| {
        tracing::debug!(error = %err, "Rejected access token");
        AppError::Unauthorized("Invalid or expired token".into())
    })?;

    let user = UserRepository::new()
        .find_by_id(&state.pool, claims.user_id)
        .await?
        .filter(|user| !user.is_deleted())
        .ok_or_else(|| AppError::Unauthorized("User no longer exists".into()))?;
    if !user.is_active {
        return Err(AppError::Forbidden("Account is deactivated".into()));
    }

    Ok((claims, user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(parse_bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(parse_bearer_token("bearer   abc"), Some("abc"));
        assert_eq!(parse_bearer_token("Basic abc"), None);
        assert_eq!(parse_bearer_token("Bearer "), None);
        assert_eq!(parse_bearer_token("Bearer"), None);
    }
}
