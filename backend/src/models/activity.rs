//! Append-only incident timeline entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::models::user::UserSummary;
use crate::types::{ActivityId, IncidentId, UserId};

pub const DEFAULT_ACTIVITY_LIMIT: i64 = 50;
pub const MAX_ACTIVITY_LIMIT: i64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Created,
    Comment,
    StatusChange,
    SeverityChange,
    AssigneeChange,
    Resolved,
    Reopened,
    Detected,
    InvestigationStarted,
    RootCauseIdentified,
    Mitigation,
    TimelineResolved,
    Other,
}

impl ActivityType {
    /// Event kinds a user may add manually through the timeline endpoint.
    pub const TIMELINE_EVENTS: [ActivityType; 6] = [
        ActivityType::Detected,
        ActivityType::InvestigationStarted,
        ActivityType::RootCauseIdentified,
        ActivityType::Mitigation,
        ActivityType::TimelineResolved,
        ActivityType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Created => "created",
            ActivityType::Comment => "comment",
            ActivityType::StatusChange => "status_change",
            ActivityType::SeverityChange => "severity_change",
            ActivityType::AssigneeChange => "assignee_change",
            ActivityType::Resolved => "resolved",
            ActivityType::Reopened => "reopened",
            ActivityType::Detected => "detected",
            ActivityType::InvestigationStarted => "investigation_started",
            ActivityType::RootCauseIdentified => "root_cause_identified",
            ActivityType::Mitigation => "mitigation",
            ActivityType::TimelineResolved => "timeline_resolved",
            ActivityType::Other => "other",
        }
    }

    pub fn parse_timeline_event(raw: &str) -> Option<Self> {
        Self::TIMELINE_EVENTS
            .into_iter()
            .find(|event| event.as_str() == raw.trim())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct IncidentActivity {
    pub id: ActivityId,
    pub incident_id: IncidentId,
    pub user_id: UserId,
    pub activity_type: ActivityType,
    pub comment: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub created_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub user: Option<UserSummary>,
}

impl IncidentActivity {
    pub fn new(incident_id: IncidentId, user_id: UserId, activity_type: ActivityType) -> Self {
        Self {
            id: ActivityId::new(),
            incident_id,
            user_id,
            activity_type,
            comment: None,
            old_value: None,
            new_value: None,
            created_at: Utc::now(),
            user: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_values(mut self, old_value: Option<String>, new_value: Option<String>) -> Self {
        self.old_value = old_value;
        self.new_value = new_value;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, max = 10000, message = "must be 1-10000 characters"))]
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateTimelineEventRequest {
    pub event_type: String,
    pub event_time: DateTime<Utc>,
    #[validate(length(min = 1, max = 10000, message = "must be 1-10000 characters"))]
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct ActivityListQuery {
    pub limit: Option<i64>,
}

impl ActivityListQuery {
    pub fn limit(&self) -> i64 {
        match self.limit {
            Some(limit) if limit >= 1 => limit.min(MAX_ACTIVITY_LIMIT),
            _ => DEFAULT_ACTIVITY_LIMIT,
        }
    }
}
