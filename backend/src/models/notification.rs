use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::types::{NotificationSettingId, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
/// Per-user delivery channels and event toggles.
pub struct NotificationSetting {
    pub id: NotificationSettingId,
    pub user_id: UserId,
    pub email_enabled: bool,
    pub slack_enabled: bool,
    pub slack_webhook: Option<String>,
    pub notify_on_incident_created: bool,
    pub notify_on_assigned: bool,
    pub notify_on_comment: bool,
    pub notify_on_status_change: bool,
    pub notify_on_severity_change: bool,
    pub notify_on_resolved: bool,
    pub notify_on_escalation: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationSetting {
    /// Settings used when the user has never saved any.
    pub fn defaults_for(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: NotificationSettingId::new(),
            user_id,
            email_enabled: true,
            slack_enabled: false,
            slack_webhook: None,
            notify_on_incident_created: true,
            notify_on_assigned: true,
            notify_on_comment: true,
            notify_on_status_change: true,
            notify_on_severity_change: true,
            notify_on_resolved: true,
            notify_on_escalation: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn wants(&self, kind: NotificationKind) -> bool {
        match kind {
            NotificationKind::IncidentCreated => self.notify_on_incident_created,
            NotificationKind::Assigned => self.notify_on_assigned,
            NotificationKind::Comment => self.notify_on_comment,
            NotificationKind::StatusChange => self.notify_on_status_change,
            NotificationKind::SeverityChange => self.notify_on_severity_change,
            NotificationKind::Resolved => self.notify_on_resolved,
        }
    }

    pub fn slack_target(&self) -> Option<&str> {
        if !self.slack_enabled {
            return None;
        }
        self.slack_webhook
            .as_deref()
            .filter(|webhook| !webhook.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateNotificationSettingRequest {
    pub email_enabled: bool,
    pub slack_enabled: bool,
    pub slack_webhook: Option<String>,
    pub notify_on_incident_created: bool,
    pub notify_on_assigned: bool,
    pub notify_on_comment: bool,
    pub notify_on_status_change: bool,
    pub notify_on_severity_change: bool,
    pub notify_on_resolved: bool,
    pub notify_on_escalation: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    IncidentCreated,
    Assigned,
    Comment,
    StatusChange,
    SeverityChange,
    Resolved,
}
