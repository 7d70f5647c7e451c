//! Incident entity, its enumerations and the SLA arithmetic.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::models::{tag::Tag, user::UserSummary, Pagination};
use crate::types::{IncidentId, TagId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|severity| severity.as_str() == raw.trim())
    }

    /// Target resolution window in hours.
    pub fn default_sla_hours(&self) -> i32 {
        match self {
            Severity::Critical => 4,
            Severity::High => 24,
            Severity::Medium => 72,
            Severity::Low => 168,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Open,
    Investigating,
    Resolved,
    Closed,
}

impl IncidentStatus {
    pub const ALL: [IncidentStatus; 4] = [
        IncidentStatus::Open,
        IncidentStatus::Investigating,
        IncidentStatus::Resolved,
        IncidentStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Open => "open",
            IncidentStatus::Investigating => "investigating",
            IncidentStatus::Resolved => "resolved",
            IncidentStatus::Closed => "closed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == raw.trim())
    }

    /// Resolved and closed incidents are finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, IncidentStatus::Resolved | IncidentStatus::Closed)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

pub fn sla_deadline(detected_at: DateTime<Utc>, target_hours: i32) -> DateTime<Utc> {
    detected_at + Duration::hours(i64::from(target_hours))
}

/// Resolved after the deadline, or still unresolved once `now` is past it.
pub fn is_sla_violated(
    deadline: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    match resolved_at {
        Some(resolved_at) => resolved_at > deadline,
        None => now > deadline,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Incident {
    pub id: IncidentId,
    pub title: String,
    pub description: String,
    /// AI-generated summary, empty when none was produced.
    pub summary: String,
    pub severity: Severity,
    pub status: IncidentStatus,
    pub impact_scope: String,
    pub detected_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub creator_id: UserId,
    pub assignee_id: Option<UserId>,
    pub sla_target_hours: i32,
    pub sla_deadline: DateTime<Utc>,
    pub sla_violated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub creator: Option<UserSummary>,
    #[sqlx(skip)]
    pub assignee: Option<UserSummary>,
    #[sqlx(skip)]
    pub tags: Vec<Tag>,
}

impl Incident {
    /// Builds a new incident with the severity's default SLA window.
    pub fn new(
        title: String,
        description: String,
        severity: Severity,
        status: IncidentStatus,
        detected_at: DateTime<Utc>,
        creator_id: UserId,
    ) -> Self {
        let now = Utc::now();
        let sla_target_hours = severity.default_sla_hours();
        let deadline = sla_deadline(detected_at, sla_target_hours);
        Self {
            id: IncidentId::new(),
            title,
            description,
            summary: String::new(),
            severity,
            status,
            impact_scope: String::new(),
            detected_at,
            resolved_at: None,
            creator_id,
            assignee_id: None,
            sla_target_hours,
            sla_deadline: deadline,
            sla_violated: is_sla_violated(deadline, None, now),
            created_at: now,
            updated_at: now,
            creator: None,
            assignee: None,
            tags: Vec::new(),
        }
    }

    /// Recomputes the deadline and violation flag from the current fields.
    pub fn refresh_sla(&mut self, now: DateTime<Utc>) {
        self.sla_deadline = sla_deadline(self.detected_at, self.sla_target_hours);
        self.sla_violated = is_sla_violated(self.sla_deadline, self.resolved_at, now);
    }

    pub fn tag_ids(&self) -> Vec<TagId> {
        self.tags.iter().map(|tag| tag.id).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateIncidentRequest {
    #[validate(length(min = 1, max = 500, message = "must be 1-500 characters"))]
    pub title: String,
    #[validate(length(min = 1, message = "is required"))]
    pub description: String,
    pub severity: String,
    pub status: Option<String>,
    #[serde(default)]
    pub impact_scope: String,
    pub detected_at: DateTime<Utc>,
    pub assignee_id: Option<UserId>,
    #[serde(default)]
    pub tag_ids: Vec<TagId>,
}

/// Full-record update; every mutable field is replaced.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateIncidentRequest {
    #[validate(length(min = 1, max = 500, message = "must be 1-500 characters"))]
    pub title: String,
    #[validate(length(min = 1, message = "is required"))]
    pub description: String,
    pub severity: String,
    pub status: String,
    #[serde(default)]
    pub impact_scope: String,
    pub detected_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub assignee_id: Option<UserId>,
    #[serde(default)]
    pub tag_ids: Vec<TagId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssignIncidentRequest {
    pub assignee_id: Option<UserId>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct IncidentListQuery {
    pub severity: Option<String>,
    pub status: Option<String>,
    /// Comma-separated tag ids; matches incidents carrying any of them.
    pub tag_ids: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IncidentListResponse {
    pub incidents: Vec<Incident>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).single().expect("valid time")
    }

    #[test]
    fn default_sla_hours_follow_severity() {
        assert_eq!(Severity::Critical.default_sla_hours(), 4);
        assert_eq!(Severity::High.default_sla_hours(), 24);
        assert_eq!(Severity::Medium.default_sla_hours(), 72);
        assert_eq!(Severity::Low.default_sla_hours(), 168);
    }

    #[test]
    fn deadline_adds_target_hours() {
        assert_eq!(sla_deadline(at(0), 4), at(4));
    }

    #[test]
    fn violation_uses_resolution_time_when_resolved() {
        let deadline = at(4);
        assert!(!is_sla_violated(deadline, Some(at(3)), at(23)));
        assert!(!is_sla_violated(deadline, Some(at(4)), at(23)));
        assert!(is_sla_violated(deadline, Some(at(5)), at(5)));
    }

    #[test]
    fn violation_uses_now_when_unresolved() {
        let deadline = at(4);
        assert!(!is_sla_violated(deadline, None, at(3)));
        assert!(is_sla_violated(deadline, None, at(5)));
    }

    #[test]
    fn refresh_sla_recomputes_after_severity_change() {
        let mut incident = Incident::new(
            "db down".into(),
            "primary unreachable".into(),
            Severity::Low,
            IncidentStatus::Open,
            at(0),
            UserId::new(),
        );
        assert_eq!(incident.sla_deadline, at(0) + Duration::hours(168));

        incident.severity = Severity::Critical;
        incident.sla_target_hours = incident.severity.default_sla_hours();
        incident.refresh_sla(at(6));
        assert_eq!(incident.sla_deadline, at(4));
        assert!(incident.sla_violated);
    }

    #[test]
    fn enums_parse_only_known_values() {
        assert_eq!(Severity::parse("high"), Some(Severity::High));
        assert_eq!(Severity::parse("urgent"), None);
        assert_eq!(IncidentStatus::parse("closed"), Some(IncidentStatus::Closed));
        assert_eq!(IncidentStatus::parse("done"), None);
        assert!(IncidentStatus::Resolved.is_terminal());
        assert!(IncidentStatus::Investigating.is_active());
    }
}
