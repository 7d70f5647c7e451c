//! CSV export of the incident list.

use std::sync::Arc;

use sqlx::PgPool;

use crate::error::AppError;
use crate::models::incident::{Incident, IncidentListQuery};
use crate::repositories::{
    IncidentRepository, IncidentRepositoryTrait, UserRepository, UserRepositoryTrait,
};
use crate::services::incident::{filters_from_query, hydrate_incidents};
use crate::state::AppState;
use crate::utils::csv::write_csv;
use crate::utils::time::format_timestamp;

pub const EXPORT_FILE_NAME: &str = "incidents.csv";

pub const INCIDENT_CSV_HEADER: [&str; 13] = [
    "ID",
    "Title",
    "Severity",
    "Status",
    "Impact Scope",
    "Detected At",
    "Resolved At",
    "Assignee",
    "Creator",
    "Tags",
    "SLA Deadline",
    "SLA Violated",
    "Created At",
];

fn incident_row(incident: &Incident) -> Vec<String> {
    let name_of = |summary: &Option<crate::models::user::UserSummary>| {
        summary
            .as_ref()
            .map(|user| user.name.clone())
            .unwrap_or_default()
    };
    vec![
        incident.id.to_string(),
        incident.title.clone(),
        incident.severity.as_str().to_string(),
        incident.status.as_str().to_string(),
        incident.impact_scope.clone(),
        format_timestamp(incident.detected_at),
        incident
            .resolved_at
            .map(format_timestamp)
            .unwrap_or_default(),
        name_of(&incident.assignee),
        name_of(&incident.creator),
        incident
            .tags
            .iter()
            .map(|tag| tag.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        format_timestamp(incident.sla_deadline),
        if incident.sla_violated { "Yes" } else { "No" }.to_string(),
        format_timestamp(incident.created_at),
    ]
}

pub fn render_incidents_csv(incidents: &[Incident]) -> anyhow::Result<Vec<u8>> {
    write_csv(&INCIDENT_CSV_HEADER, incidents.iter().map(incident_row))
}

pub struct ExportService {
    pool: PgPool,
    incidents: Arc<dyn IncidentRepositoryTrait>,
    users: Arc<dyn UserRepositoryTrait>,
}

impl ExportService {
    pub fn from_state(state: &AppState) -> Self {
        Self::with_repositories(
            state.pool.clone(),
            Arc::new(IncidentRepository::new()),
            Arc::new(UserRepository::new()),
        )
    }

    pub fn with_repositories(
        pool: PgPool,
        incidents: Arc<dyn IncidentRepositoryTrait>,
        users: Arc<dyn UserRepositoryTrait>,
    ) -> Self {
        Self {
            pool,
            incidents,
            users,
        }
    }

    /// Same filters as the incident list, without paging.
    pub async fn incidents_csv(&self, query: &IncidentListQuery) -> Result<Vec<u8>, AppError> {
        let filters = filters_from_query(query)?;
        let incidents = self.incidents.list(&self.pool, &filters, None).await?;
        let incidents = hydrate_incidents(
            &self.pool,
            self.incidents.as_ref(),
            self.users.as_ref(),
            incidents,
        )
        .await?;
        tracing::info!(rows = incidents.len(), "Incident CSV export generated");
        render_incidents_csv(&incidents).map_err(AppError::InternalServerError)
    }
}
