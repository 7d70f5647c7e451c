use axum::{
    body::{to_bytes, Body, Bytes},
    http::{header::CONTENT_LENGTH, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::middleware::request_id::RequestId;
use crate::models::user::User;

const MAX_BUFFERED_BODY_BYTES: usize = 64 * 1024;
const MAX_LOGGED_BODY_BYTES: usize = 2048;

/// Logs 4xx/5xx responses with their body; the body is buffered and passed on unchanged.
pub async fn log_error_responses(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    let started = Instant::now();

    let response = next.run(req).await;
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let latency_ms = started.elapsed().as_millis() as u64;
    let user_id = response
        .extensions()
        .get::<User>()
        .map(|user| user.id.to_string())
        .unwrap_or_default();
    let (mut parts, body) = response.into_parts();
    let (body, preview) = match to_bytes(body, MAX_BUFFERED_BODY_BYTES).await {
        Ok(bytes) => {
            let preview = preview(&bytes);
            (Body::from(bytes), preview)
        }
        Err(err) => {
            parts.headers.remove(CONTENT_LENGTH);
            (Body::empty(), format!("<unreadable body: {}>", err))
        }
    };

    let event = ErrorEvent {
        status,
        method: method.as_str(),
        path: &path,
        request_id: &request_id,
        user_id: &user_id,
        latency_ms,
        body: &preview,
    };
    event.emit();
    Response::from_parts(parts, body)
}

fn preview(bytes: &Bytes) -> String {
    if bytes.len() > MAX_LOGGED_BODY_BYTES {
        format!(
            "{}... (truncated, {} bytes total)",
            String::from_utf8_lossy(&bytes[..MAX_LOGGED_BODY_BYTES]),
            bytes.len()
        )
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

struct ErrorEvent<'a> {
    status: StatusCode,
    method: &'a str,
    path: &'a str,
    request_id: &'a str,
    user_id: &'a str,
    latency_ms: u64,
    body: &'a str,
}

impl ErrorEvent<'_> {
    fn emit(&self) {
        let status = self.status.as_u16();
        if self.status.is_server_error() {
            tracing::error!(
                status,
                method = self.method,
                path = self.path,
                request_id = self.request_id,
                user_id = self.user_id,
                latency_ms = self.latency_ms,
                body = self.body,
                "Request failed"
            );
        } else {
            tracing::warn!(
                status,
                method = self.method,
                path = self.path,
                request_id = self.request_id,
                user_id = self.user_id,
                latency_ms = self.latency_ms,
                body = self.body,
                "Request rejected"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_long_bodies() {
        let long = Bytes::from(vec![b'a'; MAX_LOGGED_BODY_BYTES + 10]);
        let text = preview(&long);
        let suffix = format!("(truncated, {} bytes total)", MAX_LOGGED_BODY_BYTES + 10);
        assert!(text.ends_with(&suffix));
        assert_eq!(preview(&Bytes::from_static(b"{\"error\":\"x\"}")), "{\"error\":\"x\"}");
    }
}
