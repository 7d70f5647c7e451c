#![allow(dead_code)] // Path stubs exist only for the utoipa macros.

use crate::{
    error::ErrorResponse,
    handlers::{common::MessageResponse, health::HealthResponse},
    models::{
        action_item::{
            ActionItem, ActionItemListQuery, ActionItemListResponse, ActionItemPriority,
            ActionItemStatus, CreateActionItemRequest, UpdateActionItemRequest,
        },
        activity::{
            ActivityListQuery, ActivityType, CreateCommentRequest, CreateTimelineEventRequest,
            IncidentActivity,
        },
        attachment::Attachment,
        audit_log::{AuditLog, AuditLogListResponse, AuditLogQuery},
        incident::{
            AssignIncidentRequest, CreateIncidentRequest, Incident, IncidentListQuery,
            IncidentListResponse, UpdateIncidentRequest,
        },
        notification::{NotificationSetting, UpdateNotificationSettingRequest},
        post_mortem::{
            CreatePostMortemRequest, FiveWhysAnalysis, PostMortem, PostMortemListQuery,
            PostMortemListResponse, PostMortemStatus, RootCauseSuggestionResponse,
            UpdatePostMortemRequest,
        },
        report::{
            CustomReportQuery, IncidentReport, MonthlyReportQuery, PerformanceMetrics,
            PeriodComparison, ReportPeriod, ReportSummary, TagCount,
        },
        stats::{DashboardQuery, DashboardStats, SlaMetrics, TagStat, TrendPeriod, TrendPoint},
        tag::{Tag, TagPayload},
        template::{CreateIncidentFromTemplateRequest, IncidentTemplate, TemplatePayload},
        user::{
            AuthResponse, CreateUserRequest, LoginRequest, RegisterRequest, ResetPasswordRequest,
            UpdatePasswordRequest, UpdateUserRequest, User, UserListQuery, UserRole, UserSummary,
        },
        Pagination,
    },
};
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    info(title = "Incidex API", description = "Incident management REST API"),
    paths(
        health_doc,
        register_doc,
        login_doc,
        me_doc,
        list_incidents_doc,
        create_incident_doc,
        get_incident_doc,
        update_incident_doc,
        delete_incident_doc,
        summarize_incident_doc,
        assign_incident_doc,
        add_comment_doc,
        add_timeline_event_doc,
        list_activities_doc,
        upload_attachment_doc,
        list_attachments_doc,
        list_tags_doc,
        create_tag_doc,
        list_templates_doc,
        create_template_doc,
        create_incident_from_template_doc,
        list_post_mortems_doc,
        create_post_mortem_doc,
        update_post_mortem_doc,
        publish_post_mortem_doc,
        ai_suggestion_doc,
        list_action_items_doc,
        create_action_item_doc,
        update_action_item_doc,
        dashboard_doc,
        sla_doc,
        tag_stats_doc,
        export_incidents_doc,
        monthly_report_doc,
        custom_report_doc,
        get_notification_settings_doc,
        update_notification_settings_doc,
        list_users_doc,
        create_user_doc,
        update_password_doc,
        reset_password_doc,
        list_audit_logs_doc
    ),
    components(
        schemas(
            // common
            ErrorResponse,
            MessageResponse,
            HealthResponse,
            Pagination,
            // auth & users
            RegisterRequest,
            LoginRequest,
            AuthResponse,
            User,
            UserRole,
            UserSummary,
            CreateUserRequest,
            UpdateUserRequest,
            UpdatePasswordRequest,
            ResetPasswordRequest,
            // incidents
            Incident,
            CreateIncidentRequest,
            UpdateIncidentRequest,
            AssignIncidentRequest,
            IncidentListResponse,
            IncidentActivity,
            ActivityType,
            CreateCommentRequest,
            CreateTimelineEventRequest,
            Attachment,
            // tags & templates
            Tag,
            TagPayload,
            IncidentTemplate,
            TemplatePayload,
            CreateIncidentFromTemplateRequest,
            // post-mortems
            PostMortem,
            PostMortemStatus,
            FiveWhysAnalysis,
            CreatePostMortemRequest,
            UpdatePostMortemRequest,
            PostMortemListResponse,
            RootCauseSuggestionResponse,
            ActionItem,
            ActionItemPriority,
            ActionItemStatus,
            CreateActionItemRequest,
            UpdateActionItemRequest,
            ActionItemListResponse,
            // stats & reports
            DashboardStats,
            TrendPeriod,
            TrendPoint,
            SlaMetrics,
            TagStat,
            IncidentReport,
            ReportPeriod,
            ReportSummary,
            TagCount,
            PerformanceMetrics,
            PeriodComparison,
            // notifications & audit
            NotificationSetting,
            UpdateNotificationSettingRequest,
            AuditLog,
            AuditLogListResponse
        )
    ),
    modifiers(&SecuritySchemes),
    tags(
        (name = "System", description = "Health"),
        (name = "Auth", description = "Registration, login and the current user"),
        (name = "Incidents", description = "Incidents, activities and attachments"),
        (name = "Catalog", description = "Tags and incident templates"),
        (name = "PostMortems", description = "Post-mortems and action items"),
        (name = "Insights", description = "Dashboard stats, reports and CSV export"),
        (name = "Notifications", description = "Per-user notification settings"),
        (name = "Admin", description = "User administration and audit logs")
    ),
    security(("BearerAuth" = []))
)]
pub struct ApiDoc;

struct SecuritySchemes;

impl Modify for SecuritySchemes {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();

        let mut bearer = Http::new(HttpAuthScheme::Bearer);
        bearer.bearer_format = Some("JWT".to_string());

        components.add_security_scheme("BearerAuth", SecurityScheme::Http(bearer));
    }
}

#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    ),
    tag = "System",
    security(())
)]
fn health_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, body = AuthResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    ),
    tag = "Auth",
    security(())
)]
fn register_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 429, description = "Rate limited")
    ),
    tag = "Auth",
    security(())
)]
fn login_doc() {}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses((status = 200, body = User)),
    tag = "Auth"
)]
fn me_doc() {}

#[utoipa::path(
    get,
    path = "/api/incidents",
    params(IncidentListQuery),
    responses((status = 200, body = IncidentListResponse)),
    tag = "Incidents"
)]
fn list_incidents_doc() {}

#[utoipa::path(
    post,
    path = "/api/incidents",
    request_body = CreateIncidentRequest,
    responses(
        (status = 201, body = Incident),
        (status = 400, body = ErrorResponse),
        (status = 403, body = ErrorResponse)
    ),
    tag = "Incidents"
)]
fn create_incident_doc() {}

#[utoipa::path(
    get,
    path = "/api/incidents/{id}",
    params(("id" = String, Path, description = "Incident id")),
    responses((status = 200, body = Incident), (status = 404, body = ErrorResponse)),
    tag = "Incidents"
)]
fn get_incident_doc() {}

#[utoipa::path(
    put,
    path = "/api/incidents/{id}",
    params(("id" = String, Path, description = "Incident id")),
    request_body = UpdateIncidentRequest,
    responses((status = 200, body = Incident), (status = 403, body = ErrorResponse)),
    tag = "Incidents"
)]
fn update_incident_doc() {}

#[utoipa::path(
    delete,
    path = "/api/incidents/{id}",
    params(("id" = String, Path, description = "Incident id")),
    responses((status = 200, body = MessageResponse)),
    tag = "Incidents"
)]
fn delete_incident_doc() {}

#[utoipa::path(
    post,
    path = "/api/incidents/{id}/summarize",
    params(("id" = String, Path, description = "Incident id")),
    responses(
        (status = 200, body = Incident),
        (status = 502, description = "AI service not configured", body = ErrorResponse)
    ),
    tag = "Incidents"
)]
fn summarize_incident_doc() {}

#[utoipa::path(
    put,
    path = "/api/incidents/{id}/assign",
    params(("id" = String, Path, description = "Incident id")),
    request_body = AssignIncidentRequest,
    responses((status = 200, body = Incident)),
    tag = "Incidents"
)]
fn assign_incident_doc() {}

#[utoipa::path(
    post,
    path = "/api/incidents/{id}/comments",
    params(("id" = String, Path, description = "Incident id")),
    request_body = CreateCommentRequest,
    responses((status = 201, body = IncidentActivity)),
    tag = "Incidents"
)]
fn add_comment_doc() {}

#[utoipa::path(
    post,
    path = "/api/incidents/{id}/timeline",
    params(("id" = String, Path, description = "Incident id")),
    request_body = CreateTimelineEventRequest,
    responses((status = 201, body = IncidentActivity)),
    tag = "Incidents"
)]
fn add_timeline_event_doc() {}

#[utoipa::path(
    get,
    path = "/api/incidents/{id}/activities",
    params(("id" = String, Path, description = "Incident id"), ActivityListQuery),
    responses((status = 200, body = [IncidentActivity])),
    tag = "Incidents"
)]
fn list_activities_doc() {}

#[utoipa::path(
    post,
    path = "/api/incidents/{id}/attachments",
    params(("id" = String, Path, description = "Incident id")),
    request_body(content_type = "multipart/form-data", description = "Field `file`"),
    responses((status = 201, body = Attachment)),
    tag = "Incidents"
)]
fn upload_attachment_doc() {}

#[utoipa::path(
    get,
    path = "/api/incidents/{id}/attachments",
    params(("id" = String, Path, description = "Incident id")),
    responses((status = 200, body = [Attachment])),
    tag = "Incidents"
)]
fn list_attachments_doc() {}

#[utoipa::path(
    get,
    path = "/api/tags",
    responses((status = 200, body = [Tag])),
    tag = "Catalog"
)]
fn list_tags_doc() {}

#[utoipa::path(
    post,
    path = "/api/tags",
    request_body = TagPayload,
    responses((status = 201, body = Tag), (status = 409, body = ErrorResponse)),
    tag = "Catalog"
)]
fn create_tag_doc() {}

#[utoipa::path(
    get,
    path = "/api/templates",
    responses((status = 200, body = [IncidentTemplate])),
    tag = "Catalog"
)]
fn list_templates_doc() {}

#[utoipa::path(
    post,
    path = "/api/templates",
    request_body = TemplatePayload,
    responses((status = 201, body = IncidentTemplate)),
    tag = "Catalog"
)]
fn create_template_doc() {}

#[utoipa::path(
    post,
    path = "/api/templates/create-incident",
    request_body = CreateIncidentFromTemplateRequest,
    responses((status = 201, body = Incident)),
    tag = "Catalog"
)]
fn create_incident_from_template_doc() {}

#[utoipa::path(
    get,
    path = "/api/post-mortems",
    params(PostMortemListQuery),
    responses((status = 200, body = PostMortemListResponse)),
    tag = "PostMortems"
)]
fn list_post_mortems_doc() {}

#[utoipa::path(
    post,
    path = "/api/post-mortems",
    request_body = CreatePostMortemRequest,
    responses((status = 201, body = PostMortem), (status = 409, body = ErrorResponse)),
    tag = "PostMortems"
)]
fn create_post_mortem_doc() {}

#[utoipa::path(
    put,
    path = "/api/post-mortems/{id}",
    params(("id" = String, Path, description = "Post-mortem id")),
    request_body = UpdatePostMortemRequest,
    responses((status = 200, body = PostMortem)),
    tag = "PostMortems"
)]
fn update_post_mortem_doc() {}

#[utoipa::path(
    post,
    path = "/api/post-mortems/{id}/publish",
    params(("id" = String, Path, description = "Post-mortem id")),
    responses((status = 200, body = PostMortem)),
    tag = "PostMortems"
)]
fn publish_post_mortem_doc() {}

#[utoipa::path(
    post,
    path = "/api/post-mortems/incident/{incident_id}/ai-suggestion",
    params(("incident_id" = String, Path, description = "Incident id")),
    responses(
        (status = 200, body = RootCauseSuggestionResponse),
        (status = 502, body = ErrorResponse)
    ),
    tag = "PostMortems"
)]
fn ai_suggestion_doc() {}

#[utoipa::path(
    get,
    path = "/api/action-items",
    params(ActionItemListQuery),
    responses((status = 200, body = ActionItemListResponse)),
    tag = "PostMortems"
)]
fn list_action_items_doc() {}

#[utoipa::path(
    post,
    path = "/api/action-items",
    request_body = CreateActionItemRequest,
    responses((status = 201, body = ActionItem)),
    tag = "PostMortems"
)]
fn create_action_item_doc() {}

#[utoipa::path(
    put,
    path = "/api/action-items/{id}",
    params(("id" = String, Path, description = "Action item id")),
    request_body = UpdateActionItemRequest,
    responses((status = 200, body = ActionItem)),
    tag = "PostMortems"
)]
fn update_action_item_doc() {}

#[utoipa::path(
    get,
    path = "/api/stats/dashboard",
    params(DashboardQuery),
    responses((status = 200, body = DashboardStats)),
    tag = "Insights"
)]
fn dashboard_doc() {}

#[utoipa::path(
    get,
    path = "/api/stats/sla",
    responses((status = 200, body = SlaMetrics)),
    tag = "Insights"
)]
fn sla_doc() {}

#[utoipa::path(
    get,
    path = "/api/stats/tags",
    responses((status = 200, body = [TagStat])),
    tag = "Insights"
)]
fn tag_stats_doc() {}

#[utoipa::path(
    get,
    path = "/api/export/incidents",
    params(IncidentListQuery),
    responses((status = 200, description = "UTF-8 CSV with BOM", content_type = "text/csv")),
    tag = "Insights"
)]
fn export_incidents_doc() {}

#[utoipa::path(
    get,
    path = "/api/reports/monthly",
    params(MonthlyReportQuery),
    responses((status = 200, body = IncidentReport)),
    tag = "Insights"
)]
fn monthly_report_doc() {}

#[utoipa::path(
    get,
    path = "/api/reports/custom",
    params(CustomReportQuery),
    responses((status = 200, body = IncidentReport), (status = 400, body = ErrorResponse)),
    tag = "Insights"
)]
fn custom_report_doc() {}

#[utoipa::path(
    get,
    path = "/api/notifications/settings",
    responses((status = 200, body = NotificationSetting)),
    tag = "Notifications"
)]
fn get_notification_settings_doc() {}

#[utoipa::path(
    put,
    path = "/api/notifications/settings",
    request_body = UpdateNotificationSettingRequest,
    responses((status = 200, body = NotificationSetting)),
    tag = "Notifications"
)]
fn update_notification_settings_doc() {}

#[utoipa::path(
    get,
    path = "/api/users",
    params(UserListQuery),
    responses((status = 200, body = [User])),
    tag = "Admin"
)]
fn list_users_doc() {}

#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserRequest,
    responses((status = 201, body = User), (status = 409, body = ErrorResponse)),
    tag = "Admin"
)]
fn create_user_doc() {}

#[utoipa::path(
    put,
    path = "/api/users/{id}/password",
    params(("id" = String, Path, description = "Must be the caller's own id")),
    request_body = UpdatePasswordRequest,
    responses((status = 200, body = MessageResponse)),
    tag = "Admin"
)]
fn update_password_doc() {}

#[utoipa::path(
    put,
    path = "/api/users/{id}/reset-password",
    params(("id" = String, Path, description = "User id")),
    request_body = ResetPasswordRequest,
    responses((status = 200, body = MessageResponse)),
    tag = "Admin"
)]
fn reset_password_doc() {}

#[utoipa::path(
    get,
    path = "/api/audit-logs",
    params(AuditLogQuery),
    responses((status = 200, body = AuditLogListResponse)),
    tag = "Admin"
)]
fn list_audit_logs_doc() {}
