use axum::http::StatusCode;
use chrono::Utc;
use incidex_backend::models::user::UserRole;
use serde_json::json;
use tower::ServiceExt;

mod support;

use support::{
    bearer_token, get_request, json_request, read_json, seed_user, test_app, test_pool,
    TEST_PASSWORD,
};

#[tokio::test]
async fn authenticated_write_is_recorded_with_actor_and_resource() {
    let pool = test_pool().await;
    let editor = seed_user(&pool, UserRole::Editor).await;
    let app = test_app(pool);

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/incidents",
            Some(&bearer_token(&editor)),
            &json!({
                "title": "Audit me",
                "description": "Recorded by the audit middleware",
                "severity": "low",
                "detected_at": Utc::now().to_rfc3339(),
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let entries = app.audit.entries();
    let entry = entries
        .iter()
        .find(|entry| entry.path == "/api/incidents" && entry.method == "POST")
        .expect("audit entry for incident create");
    assert_eq!(entry.action, "create");
    assert_eq!(entry.resource_type, "incident");
    assert_eq!(entry.status_code, 201);
    assert_eq!(entry.user_id, Some(editor.id));
    assert_eq!(entry.user_email, editor.email);
    assert!(entry.request_id.is_some());
    let body = entry
        .details
        .as_ref()
        .and_then(|details| details.0["request_body"].as_str())
        .expect("request body recorded");
    assert!(body.contains("Audit me"));
}

#[tokio::test]
async fn login_is_recorded_with_password_redacted() {
    let pool = test_pool().await;
    let user = seed_user(&pool, UserRole::Viewer).await;
    let app = test_app(pool);

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            None,
            &json!({ "email": user.email, "password": TEST_PASSWORD }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let entries = app.audit.entries();
    let entry = entries
        .iter()
        .find(|entry| entry.path == "/api/auth/login")
        .expect("audit entry for login");
    assert_eq!(entry.action, "login");
    assert_eq!(entry.resource_type, "auth");
    let body = entry
        .details
        .as_ref()
        .and_then(|details| details.0["request_body"].as_str())
        .expect("request body recorded");
    assert!(!body.contains(TEST_PASSWORD));
    assert!(body.contains("***REDACTED***"));
}

#[tokio::test]
async fn rejected_requests_are_recorded_and_health_is_skipped() {
    let pool = test_pool().await;
    let viewer = seed_user(&pool, UserRole::Viewer).await;
    let app = test_app(pool);

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/health", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/users", Some(&bearer_token(&viewer))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(read_json(response).await["code"], "FORBIDDEN");

    let entries = app.audit.entries();
    assert!(entries.iter().all(|entry| entry.path != "/api/health"));
    let entry = entries
        .iter()
        .find(|entry| entry.path == "/api/users")
        .expect("audit entry for rejected request");
    assert_eq!(entry.action, "read");
    assert_eq!(entry.status_code, 403);
}
