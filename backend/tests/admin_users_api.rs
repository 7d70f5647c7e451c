use axum::http::StatusCode;
use incidex_backend::models::user::UserRole;
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

mod support;

use support::{
    bearer_token, get_request, json_request, read_json, seed_user, test_app, test_pool,
    TEST_PASSWORD,
};

#[tokio::test]
async fn admin_creates_user_who_can_then_log_in() {
    let pool = test_pool().await;
    let admin = seed_user(&pool, UserRole::Admin).await;
    let app = test_app(pool).router;
    let email = format!("created_{}@example.com", Uuid::new_v4());

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/users",
            Some(&bearer_token(&admin)),
            &json!({
                "email": email,
                "password": TEST_PASSWORD,
                "name": "On Call",
                "role": "editor",
                "department": "SRE"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = read_json(response).await;
    assert_eq!(created["role"], "editor");
    assert_eq!(created["department"], "SRE");

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            None,
            &json!({ "email": email, "password": TEST_PASSWORD }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn user_management_is_admin_only() {
    let pool = test_pool().await;
    let admin = seed_user(&pool, UserRole::Admin).await;
    let editor = seed_user(&pool, UserRole::Editor).await;
    let app = test_app(pool).router;

    let response = app
        .clone()
        .oneshot(get_request("/api/users", Some(&bearer_token(&editor))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(get_request(
            &format!("/api/users?search={}", editor.email),
            Some(&bearer_token(&admin)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let users = read_json(response).await;
    let ids: Vec<&str> = users
        .as_array()
        .expect("users array")
        .iter()
        .filter_map(|u| u["id"].as_str())
        .collect();
    assert_eq!(ids, vec![editor.id.to_string().as_str()]);
}

#[tokio::test]
async fn admin_cannot_deactivate_or_delete_self() {
    let pool = test_pool().await;
    let admin = seed_user(&pool, UserRole::Admin).await;
    let app = test_app(pool).router;
    let auth = bearer_token(&admin);

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/users/{}/toggle-active", admin.id),
            Some(&auth),
            &json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(json_request(
            "DELETE",
            &format!("/api/users/{}", admin.id),
            Some(&auth),
            &json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn toggled_off_user_loses_access() {
    let pool = test_pool().await;
    let admin = seed_user(&pool, UserRole::Admin).await;
    let viewer = seed_user(&pool, UserRole::Viewer).await;
    let app = test_app(pool).router;

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/users/{}/toggle-active", viewer.id),
            Some(&bearer_token(&admin)),
            &json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["is_active"], false);

    let response = app
        .oneshot(get_request("/api/auth/me", Some(&bearer_token(&viewer))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
