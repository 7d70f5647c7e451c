use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
    Router,
};
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    config::Config,
    docs::ApiDoc,
    handlers,
    middleware::{
        audit_log, auth, create_auth_rate_limiter, log_error_responses, request_id,
        require_admin, require_editor,
    },
    models::attachment::MAX_ATTACHMENT_BYTES,
    state::AppState,
};

/// Multipart framing on top of the largest accepted file.
const UPLOAD_BODY_LIMIT: usize = MAX_ATTACHMENT_BYTES + 1024 * 1024;

pub fn public_routes(config: &Config) -> Router<AppState> {
    let auth_routes = Router::new()
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login));
    let auth_routes = match create_auth_rate_limiter(config) {
        Some(limiter) => auth_routes.layer(limiter),
        None => auth_routes,
    };

    Router::new()
        .route("/api/health", get(handlers::health::health))
        .merge(auth_routes)
}

/// Routes open to every authenticated role; finer checks live in the services.
pub fn user_routes(state: &AppState) -> Router<AppState> {
    use handlers::{
        action_items, admin, attachments, auth as auth_handlers, export, incidents,
        notifications, post_mortems, reports, stats, tags, templates,
    };

    Router::new()
        .route("/api/auth/me", get(auth_handlers::me))
        .route("/api/incidents", get(incidents::list_incidents))
        .route(
            "/api/incidents/{id}",
            get(incidents::get_incident).put(incidents::update_incident),
        )
        .route(
            "/api/incidents/{id}/summarize",
            post(incidents::regenerate_summary),
        )
        .route("/api/incidents/{id}/comments", post(incidents::add_comment))
        .route(
            "/api/incidents/{id}/activities",
            get(incidents::list_activities),
        )
        .route(
            "/api/incidents/{id}/attachments",
            get(attachments::list_attachments),
        )
        .route(
            "/api/incidents/{id}/attachments/{attachment_id}",
            get(attachments::download_attachment).delete(attachments::delete_attachment),
        )
        .route("/api/tags", get(tags::list_tags))
        .route(
            "/api/templates",
            get(templates::list_templates).post(templates::create_template),
        )
        .route(
            "/api/templates/{id}",
            get(templates::get_template)
                .put(templates::update_template)
                .delete(templates::delete_template),
        )
        .route(
            "/api/post-mortems",
            get(post_mortems::list_post_mortems).post(post_mortems::create_post_mortem),
        )
        .route(
            "/api/post-mortems/{id}",
            get(post_mortems::get_post_mortem)
                .put(post_mortems::update_post_mortem)
                .delete(post_mortems::delete_post_mortem),
        )
        .route(
            "/api/post-mortems/{id}/publish",
            post(post_mortems::publish_post_mortem),
        )
        .route(
            "/api/post-mortems/{id}/unpublish",
            post(post_mortems::unpublish_post_mortem),
        )
        .route(
            "/api/post-mortems/incident/{incident_id}",
            get(post_mortems::get_post_mortem_by_incident),
        )
        .route(
            "/api/action-items",
            get(action_items::list_action_items).post(action_items::create_action_item),
        )
        .route(
            "/api/action-items/{id}",
            get(action_items::get_action_item)
                .put(action_items::update_action_item)
                .delete(action_items::delete_action_item),
        )
        .route(
            "/api/action-items/post-mortem/{post_mortem_id}",
            get(action_items::list_action_items_by_post_mortem),
        )
        .route("/api/stats/dashboard", get(stats::dashboard))
        .route("/api/stats/sla", get(stats::sla))
        .route("/api/stats/tags", get(stats::tags))
        .route("/api/export/incidents", get(export::export_incidents))
        .route("/api/reports/monthly", get(reports::monthly_report))
        .route("/api/reports/custom", get(reports::custom_report))
        .route(
            "/api/notifications/settings",
            get(notifications::get_my_settings).put(notifications::update_my_settings),
        )
        .route("/api/users/{id}/password", put(admin::update_password))
        .route_layer(from_fn_with_state(state.clone(), auth))
}

pub fn editor_routes(state: &AppState) -> Router<AppState> {
    use handlers::{attachments, incidents, post_mortems, tags, templates};

    Router::new()
        .route("/api/incidents", post(incidents::create_incident))
        .route("/api/incidents/{id}/assign", put(incidents::assign_incident))
        .route(
            "/api/incidents/{id}/timeline",
            post(incidents::add_timeline_event),
        )
        .route(
            "/api/incidents/{id}/attachments",
            post(attachments::upload_attachment).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/tags", post(tags::create_tag))
        .route(
            "/api/tags/{id}",
            put(tags::update_tag).delete(tags::delete_tag),
        )
        .route(
            "/api/templates/create-incident",
            post(templates::create_incident_from_template),
        )
        .route(
            "/api/post-mortems/incident/{incident_id}/ai-suggestion",
            post(post_mortems::generate_ai_suggestion),
        )
        .route_layer(from_fn(require_editor))
        .route_layer(from_fn_with_state(state.clone(), auth))
}

pub fn admin_routes(state: &AppState) -> Router<AppState> {
    use handlers::{admin, incidents, notifications};

    Router::new()
        .route("/api/incidents/{id}", delete(incidents::delete_incident))
        .route(
            "/api/notifications/settings/{user_id}",
            get(notifications::get_user_settings),
        )
        .route(
            "/api/users",
            get(admin::list_users).post(admin::create_user),
        )
        .route(
            "/api/users/{id}",
            get(admin::get_user)
                .put(admin::update_user)
                .delete(admin::delete_user),
        )
        .route("/api/users/{id}/reset-password", put(admin::reset_password))
        .route(
            "/api/users/{id}/toggle-active",
            put(admin::toggle_user_active),
        )
        .route("/api/audit-logs", get(admin::list_audit_logs))
        .route("/api/audit-logs/{id}", get(admin::get_audit_log))
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state.clone(), auth))
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_allow_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(24 * 60 * 60))
}

/// The full application; the outermost layer is listed last.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(public_routes(&state.config))
        .merge(user_routes(&state))
        .merge(editor_routes(&state))
        .merge(admin_routes(&state))
        .merge(SwaggerUi::new("/api/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(from_fn_with_state(state.clone(), audit_log))
        .layer(from_fn(log_error_responses))
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(request_id))
        .with_state(state)
}
