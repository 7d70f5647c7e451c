use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::models::Pagination;
use crate::types::{ActionItemId, PostMortemId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActionItemPriority {
    High,
    Medium,
    Low,
}

impl ActionItemPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionItemPriority::High => "high",
            ActionItemPriority::Medium => "medium",
            ActionItemPriority::Low => "low",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "high" => Some(ActionItemPriority::High),
            "medium" => Some(ActionItemPriority::Medium),
            "low" => Some(ActionItemPriority::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActionItemStatus {
    Pending,
    InProgress,
    Completed,
}

impl ActionItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionItemStatus::Pending => "pending",
            ActionItemStatus::InProgress => "in_progress",
            ActionItemStatus::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "pending" => Some(ActionItemStatus::Pending),
            "in_progress" => Some(ActionItemStatus::InProgress),
            "completed" => Some(ActionItemStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
/// Remediation task raised by a post-mortem.
pub struct ActionItem {
    pub id: ActionItemId,
    pub post_mortem_id: PostMortemId,
    pub title: String,
    pub description: String,
    pub assignee_id: Option<UserId>,
    pub priority: ActionItemPriority,
    pub status: ActionItemStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub related_links: Vec<String>,
    /// Stamped on entry to `completed`, cleared on exit.
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ActionItem {
    /// Applies a status change, keeping `completed_at` in step with it.
    pub fn transition_to(&mut self, status: ActionItemStatus, now: DateTime<Utc>) {
        let was_completed = self.status == ActionItemStatus::Completed;
        let is_completed = status == ActionItemStatus::Completed;
        if is_completed && !was_completed {
            self.completed_at = Some(now);
        } else if !is_completed {
            self.completed_at = None;
        }
        self.status = status;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateActionItemRequest {
    pub post_mortem_id: PostMortemId,
    #[validate(length(min = 1, max = 500, message = "must be 1-500 characters"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub assignee_id: Option<UserId>,
    pub priority: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub related_links: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateActionItemRequest {
    #[validate(length(min = 1, max = 500, message = "must be 1-500 characters"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub assignee_id: Option<UserId>,
    pub priority: String,
    pub status: String,
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub related_links: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct ActionItemListQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assignee_id: Option<UserId>,
    pub post_mortem_id: Option<PostMortemId>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ActionItemListResponse {
    pub action_items: Vec<ActionItem>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(status: ActionItemStatus) -> ActionItem {
        let now = Utc::now();
        ActionItem {
            id: ActionItemId::new(),
            post_mortem_id: PostMortemId::new(),
            title: "add alert".into(),
            description: String::new(),
            assignee_id: None,
            priority: ActionItemPriority::Medium,
            status,
            due_date: None,
            related_links: Vec::new(),
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn completing_stamps_completed_at() {
        let now = Utc::now();
        let mut item = item(ActionItemStatus::InProgress);
        item.transition_to(ActionItemStatus::Completed, now);
        assert_eq!(item.completed_at, Some(now));
    }

    #[test]
    fn staying_completed_keeps_original_timestamp() {
        let first = Utc::now();
        let mut item = item(ActionItemStatus::Pending);
        item.transition_to(ActionItemStatus::Completed, first);
        item.transition_to(ActionItemStatus::Completed, first + chrono::Duration::hours(1));
        assert_eq!(item.completed_at, Some(first));
    }

    #[test]
    fn leaving_completed_clears_timestamp() {
        let mut item = item(ActionItemStatus::Pending);
        item.transition_to(ActionItemStatus::Completed, Utc::now());
        item.transition_to(ActionItemStatus::InProgress, Utc::now());
        assert!(item.completed_at.is_none());
        assert_eq!(item.status, ActionItemStatus::InProgress);
    }

    #[test]
    fn priority_and_status_parse() {
        assert_eq!(ActionItemPriority::parse("high"), Some(ActionItemPriority::High));
        assert_eq!(ActionItemPriority::parse("urgent"), None);
        assert_eq!(ActionItemStatus::parse("in_progress"), Some(ActionItemStatus::InProgress));
        assert_eq!(ActionItemStatus::parse("done"), None);
    }
}
