use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::from_fn,
    routing::get,
    Extension, Router,
};
use incidex_backend::middleware::request_id::{request_id, RequestId};
use tower::ServiceExt;
use uuid::Uuid;

fn app() -> Router {
    Router::new()
        .route(
            "/test",
            get(|Extension(id): Extension<RequestId>| async move { id.0 }),
        )
        .layer(from_fn(request_id))
}

#[tokio::test]
async fn request_id_is_minted_when_absent() {
    let response = app()
        .oneshot(Request::builder().uri("/test").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let id = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(Uuid::parse_str(&id).is_ok());

    let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
    assert_eq!(String::from_utf8_lossy(&body), id);
}

#[tokio::test]
async fn client_request_id_is_echoed() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/test")
                .header("x-request-id", "client-req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers().get("x-request-id").unwrap(), "client-req-123");
}

#[tokio::test]
async fn unprintable_request_id_is_replaced() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/test")
                .header("x-request-id", "has space")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let id = response.headers().get("x-request-id").unwrap().to_str().unwrap();
    assert!(Uuid::parse_str(id).is_ok());
}
