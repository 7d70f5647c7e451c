use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, Request, State},
    http::{header::USER_AGENT, HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use http_body::{Body as HttpBody, Frame};
use http_body_util::BodyExt;
use serde_json::{Map, Value};
use sqlx::types::Json;
use std::collections::VecDeque;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::task::{Context, Poll};
use uuid::Uuid;

use crate::{
    middleware::request_id::RequestId,
    models::{audit_log::AuditAction, audit_log::AuditLog, user::User},
    state::AppState,
    types::AuditLogId,
};

const MAX_BUFFERED_BODY_BYTES: usize = 64 * 1024;
const MAX_RECORDED_BODY_CHARS: usize = 1000;
const REDACTED: &str = "***REDACTED***";
const REDACTED_KEYS: [&str; 3] = ["password", "old_password", "new_password"];
const SKIPPED_PREFIXES: [&str; 3] = ["/api/health", "/api/docs", "/api-doc"];

/// Ordered keyword table; the first segment match wins.
const RESOURCE_KEYWORDS: [(&str, &str); 16] = [
    ("attachments", "attachment"),
    ("comments", "comment"),
    ("timeline", "timeline"),
    ("activities", "activity"),
    ("post-mortems", "post_mortem"),
    ("action-items", "action_item"),
    ("incidents", "incident"),
    ("users", "user"),
    ("tags", "tag"),
    ("templates", "template"),
    ("notifications", "notification"),
    ("reports", "report"),
    ("stats", "stats"),
    ("export", "export"),
    ("audit-logs", "audit_log"),
    ("auth", "auth"),
];

/// Records every API request to the audit dispatcher once the handler has answered.
pub async fn audit_log(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if is_skipped(&path) {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let headers = request.headers().clone();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone());
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let (request, body_bytes) = if carries_body(&method) {
        buffer_request_body(request).await
    } else {
        (request, None)
    };

    let response = next.run(request).await;

    let actor = response.extensions().get::<User>().cloned();
    let details = body_bytes
        .as_ref()
        .and_then(redacted_body_snippet)
        .map(|body| {
            let mut details = Map::new();
            details.insert("request_body".to_string(), Value::String(body));
            Json(Value::Object(details))
        });

    let entry = AuditLog {
        id: AuditLogId::new(),
        user_id: actor.as_ref().map(|user| user.id),
        user_name: actor
            .as_ref()
            .map(|user| user.name.clone())
            .unwrap_or_default(),
        user_email: actor
            .as_ref()
            .map(|user| user.email.clone())
            .unwrap_or_default(),
        action: classify_action(&method, &path).as_str().to_string(),
        resource_type: classify_resource(&path).to_string(),
        resource_id: extract_resource_id(&path),
        method: method.to_string(),
        path,
        ip_address: extract_ip(&headers, peer),
        user_agent: extract_user_agent(&headers),
        status_code: i32::from(response.status().as_u16()),
        details,
        request_id,
        created_at: Utc::now(),
    };

    // The dispatcher logs drops itself.
    let _ = state.audit.submit(entry);
    response
}

fn is_skipped(path: &str) -> bool {
    SKIPPED_PREFIXES
        .iter()
        .any(|prefix| path == *prefix || path.starts_with(&format!("{prefix}/")))
}

fn carries_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::DELETE)
}

/// Replays the frames already read before handing the rest of the stream on.
struct BufferedBody {
    buffered: VecDeque<Frame<Bytes>>,
    inner: Body,
    pending_error: Option<axum::Error>,
}

impl HttpBody for BufferedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if let Some(frame) = this.buffered.pop_front() {
            return Poll::Ready(Some(Ok(frame)));
        }
        if let Some(err) = this.pending_error.take() {
            this.inner = Body::empty();
            return Poll::Ready(Some(Err(err)));
        }
        Pin::new(&mut this.inner).poll_frame(cx)
    }

    fn size_hint(&self) -> http_body::SizeHint {
        let buffered: u64 = self
            .buffered
            .iter()
            .filter_map(|frame| frame.data_ref().map(|data| data.len() as u64))
            .sum();
        let mut hint = self.inner.size_hint();
        hint.set_lower(hint.lower().saturating_add(buffered));
        if let Some(upper) = hint.upper() {
            hint.set_upper(upper.saturating_add(buffered));
        }
        hint
    }

    fn is_end_stream(&self) -> bool {
        self.buffered.is_empty() && self.pending_error.is_none() && self.inner.is_end_stream()
    }
}

/// Reads up to the buffer limit. Oversized or failed bodies are still replayed
/// to the handler but yield no bytes for the audit entry.
async fn buffer_request_body(request: Request) -> (Request, Option<Bytes>) {
    let (parts, mut body) = request.into_parts();
    let mut frames = VecDeque::new();
    let mut collected = Vec::new();
    let mut overflowed = false;
    let mut pending_error = None;

    while let Some(frame) = body.frame().await {
        match frame {
            Ok(frame) => {
                if let Some(data) = frame.data_ref() {
                    if collected.len() + data.len() > MAX_BUFFERED_BODY_BYTES {
                        overflowed = true;
                    } else {
                        collected.extend_from_slice(data);
                    }
                }
                frames.push_back(frame);
                if overflowed {
                    break;
                }
            }
            Err(err) => {
                pending_error = Some(err);
                break;
            }
        }
    }

    let bytes = (!overflowed && pending_error.is_none()).then(|| Bytes::from(collected));
    let replay = BufferedBody {
        buffered: frames,
        inner: body,
        pending_error,
    };
    (Request::from_parts(parts, Body::new(replay)), bytes)
}

/// JSON bodies only; `None` when empty, unparsable or too long to keep.
fn redacted_body_snippet(bytes: &Bytes) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    let mut value: Value = serde_json::from_slice(bytes).ok()?;
    redact(&mut value);
    let serialized = serde_json::to_string(&value).ok()?;
    (serialized.chars().count() < MAX_RECORDED_BODY_CHARS).then_some(serialized)
}

fn redact(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, entry) in map.iter_mut() {
                if REDACTED_KEYS.contains(&key.as_str()) {
                    *entry = Value::String(REDACTED.to_string());
                } else {
                    redact(entry);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact),
        _ => {}
    }
}

fn classify_action(method: &Method, path: &str) -> AuditAction {
    match *method {
        Method::POST if path.trim_end_matches('/') == "/api/auth/login" => AuditAction::Login,
        Method::POST => {
            let is_state_change = path.split('/').any(|segment| {
                matches!(segment, "summarize" | "assign" | "publish" | "unpublish")
            });
            if is_state_change {
                AuditAction::Update
            } else {
                AuditAction::Create
            }
        }
        Method::PUT | Method::PATCH => AuditAction::Update,
        Method::DELETE => AuditAction::Delete,
        _ => AuditAction::Read,
    }
}

fn classify_resource(path: &str) -> &'static str {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    RESOURCE_KEYWORDS
        .iter()
        .find(|(keyword, _)| segments.contains(keyword))
        .map(|(_, resource)| *resource)
        .unwrap_or("unknown")
}

fn extract_resource_id(path: &str) -> Option<String> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if let Some(uuid) = segments
        .iter()
        .rev()
        .find(|segment| Uuid::parse_str(segment).is_ok())
    {
        return Some((*uuid).to_string());
    }
    segments
        .iter()
        .position(|segment| *segment == "incidents")
        .and_then(|idx| segments.get(idx + 1))
        .map(|segment| (*segment).to_string())
}

/// Proxy headers first, then the socket peer.
fn extract_ip(headers: &HeaderMap, peer: Option<IpAddr>) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    forwarded
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        })
        .map(str::to_string)
        .or_else(|| peer.map(|ip| ip.to_string()))
}

fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
