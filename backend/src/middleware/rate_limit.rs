use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, HeaderValue, Response, StatusCode};
use governor::middleware::StateInformationMiddleware;
use std::sync::Arc;
use std::time::Duration;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorError,
    GovernorLayer,
};

use crate::config::Config;

pub type AuthRateLimitLayer =
    GovernorLayer<SmartIpKeyExtractor, StateInformationMiddleware, Body>;

/// IP-keyed limiter for the public auth routes. `None` when disabled or misconfigured.
pub fn create_auth_rate_limiter(config: &Config) -> Option<AuthRateLimitLayer> {
    if !config.rate_limit_enabled {
        return None;
    }
    let burst_size = config.rate_limit_auth_max_requests.max(1);
    let window = Duration::from_secs(config.rate_limit_auth_window_seconds.max(1));
    // governor refills one token per period; spread the window over the burst.
    let replenish = (window / burst_size).max(Duration::from_millis(1));

    let governor_conf = GovernorConfigBuilder::default()
        .period(replenish)
        .burst_size(burst_size)
        .key_extractor(SmartIpKeyExtractor)
        .use_headers()
        .finish();
    let Some(governor_conf) = governor_conf else {
        tracing::warn!(
            burst_size,
            window_seconds = window.as_secs(),
            "Invalid auth rate limit configuration; limiter disabled"
        );
        return None;
    };

    Some(GovernorLayer::new(Arc::new(governor_conf)).error_handler(rate_limit_error_handler))
}

fn rate_limit_error_handler(error: GovernorError) -> Response<Body> {
    match error {
        GovernorError::TooManyRequests { wait_time, headers } => {
            tracing::warn!(wait_time, "Auth rate limit exceeded");
            let mut response = rate_limit_response(
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                "Too many requests. Please try again later.",
                Some(wait_time),
            );
            if let Some(headers) = headers {
                response.headers_mut().extend(headers);
            }
            response
        }
        GovernorError::UnableToExtractKey => rate_limit_response(
            StatusCode::BAD_REQUEST,
            "BAD_REQUEST",
            "Unable to determine client address",
            None,
        ),
        GovernorError::Other { code, msg, headers } => {
            let mut response = rate_limit_response(
                code,
                "RATE_LIMITED",
                msg.as_deref().unwrap_or("Rate limit error"),
                None,
            );
            if let Some(headers) = headers {
                response.headers_mut().extend(headers);
            }
            response
        }
    }
}

/// Same `{error, code}` shape as `AppError`, plus `retry_after` seconds.
fn rate_limit_response(
    status: StatusCode,
    code: &str,
    message: &str,
    retry_after: Option<u64>,
) -> Response<Body> {
    let mut body = serde_json::json!({
        "error": message,
        "code": code,
    });
    if let Some(retry_after) = retry_after {
        body["retry_after"] = retry_after.into();
    }

    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(retry_after) = retry_after {
        if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
            response.headers_mut().insert("retry-after", value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use http_body_util::BodyExt;

    #[test]
    fn disabled_limiter_yields_no_layer() {
        let mut config = test_config();
        config.rate_limit_enabled = false;
        assert!(create_auth_rate_limiter(&config).is_none());
    }

    #[test]
    fn zero_values_are_clamped() {
        let mut config = test_config();
        config.rate_limit_enabled = true;
        config.rate_limit_auth_max_requests = 0;
        config.rate_limit_auth_window_seconds = 0;
        assert!(create_auth_rate_limiter(&config).is_some());
    }

    #[tokio::test]
    async fn too_many_requests_renders_json_with_retry_after() {
        let response = rate_limit_error_handler(GovernorError::TooManyRequests {
            wait_time: 42,
            headers: None,
        });
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get("retry-after").and_then(|v| v.to_str().ok()),
            Some("42")
        );
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(json["code"], "RATE_LIMITED");
        assert_eq!(json["retry_after"], 42);
    }
}
