use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{incident::Severity, tag::Tag, user::User};
use crate::types::{TagId, TemplateId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
/// Reusable incident skeleton.
pub struct IncidentTemplate {
    pub id: TemplateId,
    pub name: String,
    pub description: String,
    pub title: String,
    pub content: String,
    pub severity: Severity,
    pub impact_scope: String,
    pub creator_id: UserId,
    pub is_public: bool,
    pub usage_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub tags: Vec<Tag>,
}

impl IncidentTemplate {
    pub fn is_visible_to(&self, user: &User) -> bool {
        self.is_public || self.creator_id == user.id || user.is_admin()
    }

    pub fn is_managed_by(&self, user: &User) -> bool {
        self.creator_id == user.id || user.is_admin()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct TemplatePayload {
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(length(min = 1, max = 500, message = "must be 1-500 characters"))]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub severity: String,
    #[serde(default)]
    pub impact_scope: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub tag_ids: Vec<TagId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateIncidentFromTemplateRequest {
    pub template_id: TemplateId,
    pub assignee_id: Option<UserId>,
    pub detected_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserRole;

    fn template(creator_id: UserId, is_public: bool) -> IncidentTemplate {
        let now = Utc::now();
        IncidentTemplate {
            id: TemplateId::new(),
            name: "db outage".into(),
            description: String::new(),
            title: "Database outage".into(),
            content: String::new(),
            severity: Severity::High,
            impact_scope: String::new(),
            creator_id,
            is_public,
            usage_count: 0,
            created_at: now,
            updated_at: now,
            tags: Vec::new(),
        }
    }

    #[test]
    fn private_templates_are_visible_to_owner_and_admin_only() {
        let owner = User::new("o@x.io".into(), "h".into(), "O".into(), UserRole::Editor);
        let other = User::new("p@x.io".into(), "h".into(), "P".into(), UserRole::Editor);
        let admin = User::new("a@x.io".into(), "h".into(), "A".into(), UserRole::Admin);
        let private = template(owner.id, false);
        assert!(private.is_visible_to(&owner));
        assert!(!private.is_visible_to(&other));
        assert!(private.is_visible_to(&admin));

        let public = template(owner.id, true);
        assert!(public.is_visible_to(&other));
        assert!(!public.is_managed_by(&other));
        assert!(public.is_managed_by(&admin));
    }
}
