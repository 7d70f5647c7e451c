use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::notification::{NotificationSetting, UpdateNotificationSettingRequest};
use crate::repositories::{
    NotificationSettingRepository, NotificationSettingRepositoryTrait, UserRepository,
    UserRepositoryTrait,
};
use crate::state::AppState;
use crate::types::UserId;
use crate::validation::rules::validate_webhook_url;

pub struct NotificationSettingService {
    pool: PgPool,
    settings: Arc<dyn NotificationSettingRepositoryTrait>,
    users: Arc<dyn UserRepositoryTrait>,
}

impl NotificationSettingService {
    pub fn from_state(state: &AppState) -> Self {
        Self::with_repositories(
            state.pool.clone(),
            Arc::new(NotificationSettingRepository::new()),
            Arc::new(UserRepository::new()),
        )
    }

    pub fn with_repositories(
        pool: PgPool,
        settings: Arc<dyn NotificationSettingRepositoryTrait>,
        users: Arc<dyn UserRepositoryTrait>,
    ) -> Self {
        Self {
            pool,
            settings,
            users,
        }
    }

    /// Stored settings, or the defaults when the user never saved any.
    pub async fn get(&self, user_id: UserId) -> Result<NotificationSetting, AppError> {
        Ok(self
            .settings
            .find_by_user(&self.pool, user_id)
            .await?
            .unwrap_or_else(|| NotificationSetting::defaults_for(user_id)))
    }

    /// Admin lookup of another user's settings.
    pub async fn get_for_user(&self, user_id: UserId) -> Result<NotificationSetting, AppError> {
        self.users
            .find_by_id(&self.pool, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;
        self.get(user_id).await
    }

    pub async fn update(
        &self,
        user_id: UserId,
        payload: UpdateNotificationSettingRequest,
    ) -> Result<NotificationSetting, AppError> {
        let slack_webhook = payload
            .slack_webhook
            .map(|webhook| webhook.trim().to_string())
            .filter(|webhook| !webhook.is_empty());
        if payload.slack_enabled {
            match slack_webhook.as_deref() {
                Some(webhook) => validate_webhook_url(webhook).map_err(|_| {
                    AppError::validation("slack_webhook: must be a valid https:// URL")
                })?,
                None => {
                    return Err(AppError::validation(
                        "slack_webhook: required when Slack notifications are enabled",
                    ))
                }
            }
        }

        let mut setting = self.get(user_id).await?;
        setting.email_enabled = payload.email_enabled;
        setting.slack_enabled = payload.slack_enabled;
        setting.slack_webhook = slack_webhook;
        setting.notify_on_incident_created = payload.notify_on_incident_created;
        setting.notify_on_assigned = payload.notify_on_assigned;
        setting.notify_on_comment = payload.notify_on_comment;
        setting.notify_on_status_change = payload.notify_on_status_change;
        setting.notify_on_severity_change = payload.notify_on_severity_change;
        setting.notify_on_resolved = payload.notify_on_resolved;
        setting.notify_on_escalation = payload.notify_on_escalation;
        setting.updated_at = Utc::now();

        let saved = self.settings.upsert(&self.pool, &setting).await?;
        tracing::info!(
            user_id = %user_id,
            slack_enabled = saved.slack_enabled,
            "Notification settings saved"
        );
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::notification_setting::MockNotificationSettingRepositoryTrait;
    use crate::repositories::user::MockUserRepositoryTrait;
    use crate::services::test_support::lazy_pool;

    fn request(slack_enabled: bool, webhook: Option<&str>) -> UpdateNotificationSettingRequest {
        UpdateNotificationSettingRequest {
            email_enabled: false,
            slack_enabled,
            slack_webhook: webhook.map(str::to_string),
            notify_on_incident_created: true,
            notify_on_assigned: true,
            notify_on_comment: false,
            notify_on_status_change: true,
            notify_on_severity_change: true,
            notify_on_resolved: true,
            notify_on_escalation: true,
        }
    }

    fn service(settings: MockNotificationSettingRepositoryTrait) -> NotificationSettingService {
        NotificationSettingService::with_repositories(
            lazy_pool(),
            Arc::new(settings),
            Arc::new(MockUserRepositoryTrait::new()),
        )
    }

    #[tokio::test]
    async fn missing_row_yields_defaults() {
        let mut settings = MockNotificationSettingRepositoryTrait::new();
        settings.expect_find_by_user().returning(|_, _| Ok(None));
        let user_id = UserId::new();
        let setting = service(settings).get(user_id).await.expect("settings");
        assert_eq!(setting.user_id, user_id);
        assert!(setting.email_enabled);
        assert!(!setting.slack_enabled);
    }

    #[tokio::test]
    async fn slack_requires_https_webhook() {
        let svc = service(MockNotificationSettingRepositoryTrait::new());
        let plain = svc
            .update(UserId::new(), request(true, Some("http://hooks.example.com/x")))
            .await;
        assert!(matches!(plain, Err(AppError::Validation(_))));
        let missing = svc.update(UserId::new(), request(true, Some("  "))).await;
        assert!(matches!(missing, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn update_keeps_existing_row_identity() {
        let user_id = UserId::new();
        let existing = NotificationSetting::defaults_for(user_id);
        let existing_id = existing.id;
        let mut settings = MockNotificationSettingRepositoryTrait::new();
        settings
            .expect_find_by_user()
            .returning(move |_, _| Ok(Some(existing.clone())));
        settings
            .expect_upsert()
            .withf(move |_, s| s.id == existing_id && !s.notify_on_comment)
            .returning(|_, s| Ok(s.clone()));

        let saved = service(settings)
            .update(
                user_id,
                request(true, Some("https://hooks.slack.com/services/T/B/X")),
            )
            .await
            .expect("saved");
        assert_eq!(
            saved.slack_target(),
            Some("https://hooks.slack.com/services/T/B/X")
        );
        assert!(!saved.email_enabled);
    }

    #[tokio::test]
    async fn admin_lookup_requires_existing_user() {
        let mut users = MockUserRepositoryTrait::new();
        users.expect_find_by_id().returning(|_, _| Ok(None));
        let svc = NotificationSettingService::with_repositories(
            lazy_pool(),
            Arc::new(MockNotificationSettingRepositoryTrait::new()),
            Arc::new(users),
        );
        let result = svc.get_for_user(UserId::new()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
