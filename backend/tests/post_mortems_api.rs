use axum::http::StatusCode;
use chrono::{Duration, Utc};
use incidex_backend::models::user::UserRole;
use serde_json::{json, Value};
use tower::{Service, ServiceExt};

mod support;

use support::{
    bearer_token, get_request, json_request, read_json, seed_user, test_app, test_pool,
};

async fn send(
    app: &mut axum::Router,
    request: axum::http::Request<axum::body::Body>,
) -> (StatusCode, Value) {
    let response = <axum::Router as ServiceExt<axum::http::Request<axum::body::Body>>>::ready(app)
        .await
        .expect("router ready")
        .call(request)
        .await
        .expect("call router");
    let status = response.status();
    let body = read_json(response).await;
    (status, body)
}

#[tokio::test]
async fn post_mortem_lifecycle_with_action_items() {
    let pool = test_pool().await;
    let editor = seed_user(&pool, UserRole::Editor).await;
    let viewer = seed_user(&pool, UserRole::Viewer).await;
    let mut app = test_app(pool).router;
    let auth = bearer_token(&editor);

    let (status, incident) = send(
        &mut app,
        json_request(
            "POST",
            "/api/incidents",
            Some(&auth),
            &json!({
                "title": "Database failover",
                "description": "Primary lost quorum",
                "severity": "critical",
                "status": "resolved",
                "detected_at": (Utc::now() - Duration::hours(3)).to_rfc3339(),
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let incident_id = incident["id"].as_str().expect("incident id").to_string();

    let (status, _) = send(
        &mut app,
        json_request(
            "POST",
            "/api/post-mortems",
            Some(&bearer_token(&viewer)),
            &json!({ "incident_id": incident_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, post_mortem) = send(
        &mut app,
        json_request(
            "POST",
            "/api/post-mortems",
            Some(&auth),
            &json!({ "incident_id": incident_id, "root_cause": "Split brain" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(post_mortem["status"], "draft");
    let post_mortem_id = post_mortem["id"].as_str().expect("post-mortem id").to_string();

    let (status, _) = send(
        &mut app,
        json_request(
            "POST",
            "/api/post-mortems",
            Some(&auth),
            &json!({ "incident_id": incident_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, by_incident) = send(
        &mut app,
        get_request(
            &format!("/api/post-mortems/incident/{}", incident_id),
            Some(&auth),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_incident["id"], post_mortem_id.as_str());

    let publish_uri = format!("/api/post-mortems/{}/publish", post_mortem_id);
    let (status, published) =
        send(&mut app, json_request("POST", &publish_uri, Some(&auth), &json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(published["status"], "published");
    assert!(published["published_at"].is_string());

    let (status, _) =
        send(&mut app, json_request("POST", &publish_uri, Some(&auth), &json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, item) = send(
        &mut app,
        json_request(
            "POST",
            "/api/action-items",
            Some(&auth),
            &json!({ "post_mortem_id": post_mortem_id, "title": "Add quorum alert" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(item["status"], "pending");
    assert_eq!(item["priority"], "medium");

    let (status, items) = send(
        &mut app,
        get_request(
            &format!("/api/action-items/post-mortem/{}", post_mortem_id),
            Some(&auth),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(items.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn tags_are_unique_and_editor_managed() {
    let pool = test_pool().await;
    let editor = seed_user(&pool, UserRole::Editor).await;
    let viewer = seed_user(&pool, UserRole::Viewer).await;
    let app = test_app(pool).router;
    let name = format!("db-{}", uuid::Uuid::new_v4().simple());

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/tags",
            Some(&bearer_token(&viewer)),
            &json!({ "name": name }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/tags",
            Some(&bearer_token(&editor)),
            &json!({ "name": name }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(read_json(response).await["color"], "#808080");

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/tags",
            Some(&bearer_token(&editor)),
            &json!({ "name": name }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
