use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::notification::NotificationSetting;
use crate::types::UserId;

const SELECT_COLUMNS: &str = "id, user_id, email_enabled, slack_enabled, slack_webhook, \
     notify_on_incident_created, notify_on_assigned, notify_on_comment, notify_on_status_change, \
     notify_on_severity_change, notify_on_resolved, notify_on_escalation, created_at, updated_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSettingRepositoryTrait: Send + Sync {
    async fn find_by_user(
        &self,
        db: &PgPool,
        user_id: UserId,
    ) -> Result<Option<NotificationSetting>, AppError>;

    /// Inserts or replaces the row keyed by `user_id`.
    async fn upsert(
        &self,
        db: &PgPool,
        setting: &NotificationSetting,
    ) -> Result<NotificationSetting, AppError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NotificationSettingRepository;

impl NotificationSettingRepository {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationSettingRepositoryTrait for NotificationSettingRepository {
    async fn find_by_user(
        &self,
        db: &PgPool,
        user_id: UserId,
    ) -> Result<Option<NotificationSetting>, AppError> {
        let query = format!(
            "SELECT {} FROM notification_settings WHERE user_id = $1",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, NotificationSetting>(&query)
            .bind(user_id)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }

    async fn upsert(
        &self,
        db: &PgPool,
        setting: &NotificationSetting,
    ) -> Result<NotificationSetting, AppError> {
        let query = format!(
            "INSERT INTO notification_settings (id, user_id, email_enabled, slack_enabled, \
             slack_webhook, notify_on_incident_created, notify_on_assigned, notify_on_comment, \
             notify_on_status_change, notify_on_severity_change, notify_on_resolved, \
             notify_on_escalation, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             ON CONFLICT (user_id) DO UPDATE SET email_enabled = EXCLUDED.email_enabled, \
             slack_enabled = EXCLUDED.slack_enabled, slack_webhook = EXCLUDED.slack_webhook, \
             notify_on_incident_created = EXCLUDED.notify_on_incident_created, \
             notify_on_assigned = EXCLUDED.notify_on_assigned, \
             notify_on_comment = EXCLUDED.notify_on_comment, \
             notify_on_status_change = EXCLUDED.notify_on_status_change, \
             notify_on_severity_change = EXCLUDED.notify_on_severity_change, \
             notify_on_resolved = EXCLUDED.notify_on_resolved, \
             notify_on_escalation = EXCLUDED.notify_on_escalation, \
             updated_at = EXCLUDED.updated_at \
             RETURNING {}",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, NotificationSetting>(&query)
            .bind(setting.id)
            .bind(setting.user_id)
            .bind(setting.email_enabled)
            .bind(setting.slack_enabled)
            .bind(&setting.slack_webhook)
            .bind(setting.notify_on_incident_created)
            .bind(setting.notify_on_assigned)
            .bind(setting.notify_on_comment)
            .bind(setting.notify_on_status_change)
            .bind(setting.notify_on_severity_change)
            .bind(setting.notify_on_resolved)
            .bind(setting.notify_on_escalation)
            .bind(setting.created_at)
            .bind(setting.updated_at)
            .fetch_one(db)
            .await?;
        Ok(row)
    }
}
