//! Post-mortem documents, one per incident.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::{IntoParams, ToSchema};

use crate::types::{IncidentId, PostMortemId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PostMortemStatus {
    Draft,
    Published,
}

impl PostMortemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostMortemStatus::Draft => "draft",
            PostMortemStatus::Published => "published",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "draft" => Some(PostMortemStatus::Draft),
            "published" => Some(PostMortemStatus::Published),
            _ => None,
        }
    }
}

/// Five-whys chain; each answer digs one level deeper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FiveWhysAnalysis {
    #[serde(default)]
    pub why1: String,
    #[serde(default)]
    pub why2: String,
    #[serde(default)]
    pub why3: String,
    #[serde(default)]
    pub why4: String,
    #[serde(default)]
    pub why5: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct PostMortem {
    pub id: PostMortemId,
    pub incident_id: IncidentId,
    pub author_id: UserId,
    pub status: PostMortemStatus,
    pub root_cause: String,
    pub impact_analysis: String,
    pub what_went_well: String,
    pub what_went_wrong: String,
    pub lessons_learned: String,
    #[schema(value_type = Option<FiveWhysAnalysis>)]
    pub five_whys_analysis: Option<Json<FiveWhysAnalysis>>,
    pub ai_root_cause_suggestion: String,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PostMortem {
    pub fn is_published(&self) -> bool {
        self.status == PostMortemStatus::Published
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CreatePostMortemRequest {
    pub incident_id: IncidentId,
    #[serde(default)]
    pub root_cause: String,
    #[serde(default)]
    pub impact_analysis: String,
    #[serde(default)]
    pub what_went_well: String,
    #[serde(default)]
    pub what_went_wrong: String,
    #[serde(default)]
    pub lessons_learned: String,
    pub five_whys_analysis: Option<FiveWhysAnalysis>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdatePostMortemRequest {
    #[serde(default)]
    pub root_cause: String,
    #[serde(default)]
    pub impact_analysis: String,
    #[serde(default)]
    pub what_went_well: String,
    #[serde(default)]
    pub what_went_wrong: String,
    #[serde(default)]
    pub lessons_learned: String,
    pub five_whys_analysis: Option<FiveWhysAnalysis>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct PostMortemListQuery {
    pub status: Option<String>,
    pub author_id: Option<UserId>,
    pub incident_id: Option<IncidentId>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PostMortemListResponse {
    pub post_mortems: Vec<PostMortem>,
    pub pagination: crate::models::Pagination,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RootCauseSuggestionResponse {
    pub suggestion: String,
}
