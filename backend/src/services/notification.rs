//! Incident notifications over email and Slack.
//!
//! Services build a [`NotificationEvent`] and hand it to a
//! [`NotificationDispatcher`]; delivery happens on a worker pool and every
//! failure is logged instead of returned.

use std::sync::{Arc, Mutex};

use anyhow::{bail, Context};
use serde_json::json;
use sqlx::PgPool;

use crate::config::Config;
use crate::models::incident::Incident;
use crate::models::notification::{NotificationKind, NotificationSetting};
use crate::repositories::{
    NotificationSettingRepository, NotificationSettingRepositoryTrait, UserRepository,
    UserRepositoryTrait,
};
use crate::services::worker_pool::WorkerPool;
use crate::types::{IncidentId, UserId};
use crate::utils::email::EmailService;

/// Incident fields rendered into messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentBrief {
    pub id: IncidentId,
    pub title: String,
    pub severity: String,
    pub status: String,
}

impl From<&Incident> for IncidentBrief {
    fn from(incident: &Incident) -> Self {
        Self {
            id: incident.id,
            title: incident.title.clone(),
            severity: incident.severity.as_str().to_string(),
            status: incident.status.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    pub kind: NotificationKind,
    pub incident: IncidentBrief,
    pub recipients: Vec<UserId>,
    pub detail: String,
}

fn push_unique(recipients: &mut Vec<UserId>, user_id: UserId) {
    if !recipients.contains(&user_id) {
        recipients.push(user_id);
    }
}

/// Creator plus assignee, deduplicated.
fn interested_users(incident: &Incident) -> Vec<UserId> {
    let mut recipients = vec![incident.creator_id];
    if let Some(assignee) = incident.assignee_id {
        push_unique(&mut recipients, assignee);
    }
    recipients
}

impl NotificationEvent {
    /// Goes to the assignee unless they created the incident.
    pub fn incident_created(incident: &Incident) -> Self {
        let recipients = incident
            .assignee_id
            .filter(|assignee| *assignee != incident.creator_id)
            .into_iter()
            .collect();
        Self {
            kind: NotificationKind::IncidentCreated,
            incident: incident.into(),
            recipients,
            detail: format!("A new {} incident was reported.", incident.severity.as_str()),
        }
    }

    pub fn assigned(incident: &Incident, assignee: UserId) -> Self {
        Self {
            kind: NotificationKind::Assigned,
            incident: incident.into(),
            recipients: vec![assignee],
            detail: "You have been assigned to this incident.".to_string(),
        }
    }

    /// Assignee first, then the creator, never the commenter.
    pub fn comment(incident: &Incident, commenter: UserId, comment: &str) -> Self {
        let mut recipients = Vec::new();
        if let Some(assignee) = incident.assignee_id.filter(|id| *id != commenter) {
            recipients.push(assignee);
        }
        if incident.creator_id != commenter && Some(incident.creator_id) != incident.assignee_id {
            push_unique(&mut recipients, incident.creator_id);
        }
        Self {
            kind: NotificationKind::Comment,
            incident: incident.into(),
            recipients,
            detail: format!("New comment: {}", comment),
        }
    }

    pub fn status_changed(incident: &Incident, old_status: &str, new_status: &str) -> Self {
        Self {
            kind: NotificationKind::StatusChange,
            incident: incident.into(),
            recipients: interested_users(incident),
            detail: format!("Status changed from {} to {}.", old_status, new_status),
        }
    }

    pub fn resolved(incident: &Incident) -> Self {
        Self {
            kind: NotificationKind::Resolved,
            incident: incident.into(),
            recipients: interested_users(incident),
            detail: "The incident has been resolved.".to_string(),
        }
    }

    pub fn subject(&self) -> String {
        let prefix = match self.kind {
            NotificationKind::IncidentCreated => "New incident",
            NotificationKind::Assigned => "Incident assigned",
            NotificationKind::Comment => "New comment",
            NotificationKind::StatusChange => "Status changed",
            NotificationKind::SeverityChange => "Severity changed",
            NotificationKind::Resolved => "Incident resolved",
        };
        format!("[Incidex] {}: {}", prefix, self.incident.title)
    }

    pub fn body(&self, frontend_url: &str) -> String {
        format!(
            "{}\n\nTitle: {}\nSeverity: {}\nStatus: {}\n\n{}/incidents/{}\n",
            self.detail,
            self.incident.title,
            self.incident.severity,
            self.incident.status,
            frontend_url.trim_end_matches('/'),
            self.incident.id
        )
    }
}

/// Posts messages to Slack incoming webhooks.
#[derive(Clone, Default)]
pub struct SlackClient {
    client: reqwest::Client,
}

impl SlackClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn send(&self, webhook_url: &str, title: &str, text: &str) -> anyhow::Result<()> {
        let payload = json!({
            "text": title,
            "blocks": [
                {
                    "type": "section",
                    "text": { "type": "mrkdwn", "text": format!("*{}*", title) }
                },
                {
                    "type": "section",
                    "text": { "type": "mrkdwn", "text": text }
                }
            ]
        });
        let response = self
            .client
            .post(webhook_url)
            .json(&payload)
            .send()
            .await
            .context("slack webhook request failed")?;
        let status = response.status();
        if !status.is_success() {
            bail!("slack webhook returned {}", status);
        }
        Ok(())
    }
}

pub trait NotificationDispatcher: Send + Sync {
    /// Returns false when the event was dropped.
    fn dispatch(&self, event: NotificationEvent) -> bool;
}

struct Delivery {
    pool: PgPool,
    users: Arc<dyn UserRepositoryTrait>,
    settings: Arc<dyn NotificationSettingRepositoryTrait>,
    email: Option<Arc<EmailService>>,
    slack: SlackClient,
    frontend_url: String,
}

impl Delivery {
    async fn deliver(&self, event: NotificationEvent) {
        for recipient in &event.recipients {
            if let Err(err) = self.deliver_to(&event, *recipient).await {
                tracing::warn!(
                    error = %err,
                    user_id = %recipient,
                    incident_id = %event.incident.id,
                    kind = ?event.kind,
                    "Notification delivery failed"
                );
            }
        }
    }

    async fn deliver_to(&self, event: &NotificationEvent, user_id: UserId) -> anyhow::Result<()> {
        let Some(user) = self.users.find_by_id(&self.pool, user_id).await? else {
            return Ok(());
        };
        if !user.is_active || user.is_deleted() {
            return Ok(());
        }
        let settings = self
            .settings
            .find_by_user(&self.pool, user_id)
            .await?
            .unwrap_or_else(|| NotificationSetting::defaults_for(user_id));
        if !settings.wants(event.kind) {
            return Ok(());
        }

        let subject = event.subject();
        let body = event.body(&self.frontend_url);

        // Channels fail independently.
        if settings.email_enabled {
            if let Some(email) = self.email.clone() {
                if let Err(err) = send_email(email, &user.email, &subject, &body).await {
                    tracing::warn!(
                        error = %err,
                        user_id = %user_id,
                        incident_id = %event.incident.id,
                        "Email notification failed"
                    );
                }
            }
        }
        if let Some(webhook) = settings.slack_target() {
            if let Err(err) = self.slack.send(webhook, &subject, &body).await {
                tracing::warn!(
                    error = %err,
                    user_id = %user_id,
                    incident_id = %event.incident.id,
                    "Slack notification failed"
                );
            }
        }
        Ok(())
    }
}

async fn send_email(
    email: Arc<EmailService>,
    to: &str,
    subject: &str,
    body: &str,
) -> anyhow::Result<()> {
    let (to, subject, body) = (to.to_string(), subject.to_string(), body.to_string());
    tokio::task::spawn_blocking(move || email.send(&to, &subject, body))
        .await
        .context("email task panicked")?
}

/// Delivers events from a bounded worker pool.
pub struct PooledNotificationDispatcher {
    workers: WorkerPool<NotificationEvent>,
}

impl PooledNotificationDispatcher {
    pub fn spawn(pool: PgPool, config: &Config) -> Self {
        let email = match EmailService::new(config) {
            Ok(service) => Some(Arc::new(service)),
            Err(err) => {
                tracing::warn!(error = %err, "Email notifications disabled");
                None
            }
        };
        let delivery = Arc::new(Delivery {
            pool,
            users: Arc::new(UserRepository::new()),
            settings: Arc::new(NotificationSettingRepository::new()),
            email,
            slack: SlackClient::new(),
            frontend_url: config.frontend_url.clone(),
        });
        let workers = WorkerPool::spawn(
            "notifications",
            config.notification_worker_count,
            config.notification_queue_capacity,
            move |event: NotificationEvent| {
                let delivery = Arc::clone(&delivery);
                async move { delivery.deliver(event).await }
            },
        );
        Self { workers }
    }
}

impl NotificationDispatcher for PooledNotificationDispatcher {
    fn dispatch(&self, event: NotificationEvent) -> bool {
        if event.recipients.is_empty() {
            return true;
        }
        self.workers.submit(event)
    }
}

/// Keeps dispatched events in memory for inspection.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<NotificationEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn kinds(&self) -> Vec<NotificationKind> {
        self.events().into_iter().map(|event| event.kind).collect()
    }
}

impl NotificationDispatcher for RecordingNotifier {
    fn dispatch(&self, event: NotificationEvent) -> bool {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
        true
    }
}
