//! Incident lifecycle: creation, full-record updates, assignment and deletion.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::{
    activity::{ActivityType, IncidentActivity},
    incident::{
        AssignIncidentRequest, CreateIncidentRequest, Incident, IncidentListQuery,
        IncidentListResponse, IncidentStatus, Severity, UpdateIncidentRequest,
    },
    user::User,
    whitelist_sort, PageQuery, Pagination, SortOrder,
};
use crate::repositories::{
    incident::{IncidentFilters, DEFAULT_SORT_COLUMN, SORTABLE_COLUMNS},
    IncidentRepository, IncidentRepositoryTrait, TagRepository, TagRepositoryTrait,
    UserRepository, UserRepositoryTrait,
};
use crate::services::{
    ai::{AiService, SummaryInput},
    notification::{NotificationDispatcher, NotificationEvent},
    stats_cache::StatsCache,
};
use crate::state::AppState;
use crate::types::{IncidentId, TagId, UserId};

/// Repositories the incident workflows read and write.
#[derive(Clone)]
pub struct IncidentRepositories {
    pub incidents: Arc<dyn IncidentRepositoryTrait>,
    pub users: Arc<dyn UserRepositoryTrait>,
    pub tags: Arc<dyn TagRepositoryTrait>,
}

impl Default for IncidentRepositories {
    fn default() -> Self {
        Self {
            incidents: Arc::new(IncidentRepository::new()),
            users: Arc::new(UserRepository::new()),
            tags: Arc::new(TagRepository::new()),
        }
    }
}

pub struct IncidentService {
    pool: PgPool,
    repos: IncidentRepositories,
    ai: Arc<dyn AiService>,
    notifier: Arc<dyn NotificationDispatcher>,
    stats_cache: Arc<dyn StatsCache>,
}

pub fn parse_severity(raw: &str) -> Result<Severity, AppError> {
    Severity::parse(raw).ok_or_else(|| {
        AppError::validation(format!(
            "severity: must be one of critical, high, medium, low (got '{}')",
            raw
        ))
    })
}

pub fn parse_status(raw: &str) -> Result<IncidentStatus, AppError> {
    IncidentStatus::parse(raw).ok_or_else(|| {
        AppError::validation(format!(
            "status: must be one of open, investigating, resolved, closed (got '{}')",
            raw
        ))
    })
}

/// Viewers never edit; editors only edit what they created.
pub fn ensure_can_modify(actor: &User, owner_id: UserId) -> Result<(), AppError> {
    if actor.is_admin() {
        return Ok(());
    }
    if !actor.can_edit() {
        return Err(AppError::Forbidden(
            "Viewers cannot modify this resource".into(),
        ));
    }
    if actor.id != owner_id {
        return Err(AppError::Forbidden(
            "Editors can only modify resources they created".into(),
        ));
    }
    Ok(())
}

fn ensure_resolution_order(
    detected_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
) -> Result<(), AppError> {
    match resolved_at {
        Some(resolved_at) if resolved_at < detected_at => Err(AppError::validation(
            "resolved_at: must not be earlier than detected_at",
        )),
        _ => Ok(()),
    }
}

/// Stamps a resolution time when an incident reaches a terminal state without one.
fn settle_resolved_at(
    status: IncidentStatus,
    detected_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match (status.is_terminal(), resolved_at) {
        (true, None) => Some(now.max(detected_at)),
        (_, resolved_at) => resolved_at,
    }
}

pub(crate) fn dedup_tag_ids(tag_ids: &[TagId]) -> Vec<TagId> {
    let mut seen = HashSet::new();
    tag_ids
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect()
}

fn display_name(user: Option<&User>) -> String {
    user.map(|u| u.name.clone())
        .unwrap_or_else(|| "Unassigned".to_string())
}

/// Parses list/export query parameters, falling back to defaults for sort and order.
pub fn filters_from_query(query: &IncidentListQuery) -> Result<IncidentFilters, AppError> {
    let non_empty = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let severity = non_empty(&query.severity)
        .map(|raw| parse_severity(&raw))
        .transpose()?;
    let status = non_empty(&query.status)
        .map(|raw| parse_status(&raw))
        .transpose()?;
    let tag_ids = match non_empty(&query.tag_ids) {
        Some(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<TagId>()
                    .map_err(|_| AppError::validation(format!("tag_ids: invalid id '{}'", part)))
            })
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    Ok(IncidentFilters {
        severity,
        status,
        tag_ids,
        search: non_empty(&query.search),
        sort: whitelist_sort(query.sort.as_deref(), &SORTABLE_COLUMNS, DEFAULT_SORT_COLUMN),
        order: SortOrder::parse(query.order.as_deref()),
    })
}

/// Unknown tag ids are a validation error.
pub async fn ensure_tags_exist(
    pool: &PgPool,
    tags_repo: &dyn TagRepositoryTrait,
    tag_ids: &[TagId],
) -> Result<(), AppError> {
    if tag_ids.is_empty() {
        return Ok(());
    }
    let found = tags_repo.find_by_ids(pool, tag_ids).await?;
    if found.len() != tag_ids.len() {
        let known: HashSet<_> = found.iter().map(|tag| tag.id).collect();
        let missing: Vec<String> = tag_ids
            .iter()
            .filter(|id| !known.contains(id))
            .map(|id| id.to_string())
            .collect();
        return Err(AppError::validation(format!(
            "tag_ids: unknown tag {}",
            missing.join(", ")
        )));
    }
    Ok(())
}

/// The assignee must exist and be active.
pub async fn resolve_assignee(
    pool: &PgPool,
    users_repo: &dyn UserRepositoryTrait,
    id: Option<UserId>,
) -> Result<Option<User>, AppError> {
    let Some(id) = id else {
        return Ok(None);
    };
    match users_repo.find_by_id(pool, id).await? {
        Some(user) if user.is_active && !user.is_deleted() => Ok(Some(user)),
        _ => Err(AppError::validation(
            "assignee_id: user does not exist or is inactive",
        )),
    }
}

/// Fills creator, assignee and tags for a batch of incidents.
pub async fn hydrate_incidents(
    pool: &PgPool,
    incidents_repo: &dyn IncidentRepositoryTrait,
    users_repo: &dyn UserRepositoryTrait,
    mut incidents: Vec<Incident>,
) -> Result<Vec<Incident>, AppError> {
    if incidents.is_empty() {
        return Ok(incidents);
    }

    let mut user_ids: Vec<UserId> = incidents
        .iter()
        .flat_map(|incident| std::iter::once(incident.creator_id).chain(incident.assignee_id))
        .collect();
    user_ids.sort();
    user_ids.dedup();
    let summaries: HashMap<_, _> = users_repo
        .find_summaries(pool, &user_ids)
        .await?
        .into_iter()
        .map(|summary| (summary.id, summary))
        .collect();

    let ids: Vec<IncidentId> = incidents.iter().map(|incident| incident.id).collect();
    let mut tags_by_incident: HashMap<IncidentId, Vec<_>> = HashMap::new();
    for (incident_id, tag) in incidents_repo.tag_links(pool, &ids).await? {
        tags_by_incident.entry(incident_id).or_default().push(tag);
    }

    for incident in &mut incidents {
        incident.creator = summaries.get(&incident.creator_id).cloned();
        incident.assignee = incident
            .assignee_id
            .and_then(|id| summaries.get(&id).cloned());
        incident.tags = tags_by_incident.remove(&incident.id).unwrap_or_default();
    }
    Ok(incidents)
}

impl IncidentService {
    pub fn from_state(state: &AppState) -> Self {
        Self::with_parts(
            state.pool.clone(),
            IncidentRepositories::default(),
            Arc::clone(&state.ai),
            Arc::clone(&state.notifier),
            Arc::clone(&state.stats_cache),
        )
    }

    pub fn with_parts(
        pool: PgPool,
        repos: IncidentRepositories,
        ai: Arc<dyn AiService>,
        notifier: Arc<dyn NotificationDispatcher>,
        stats_cache: Arc<dyn StatsCache>,
    ) -> Self {
        Self {
            pool,
            repos,
            ai,
            notifier,
            stats_cache,
        }
    }

    async fn load(&self, id: IncidentId) -> Result<Incident, AppError> {
        self.repos
            .incidents
            .find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Incident not found".into()))
    }

    async fn hydrate_one(&self, incident: Incident) -> Result<Incident, AppError> {
        hydrate_incidents(
            &self.pool,
            self.repos.incidents.as_ref(),
            self.repos.users.as_ref(),
            vec![incident],
        )
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound("Incident not found".into()))
    }

    async fn ensure_tags_exist(&self, tag_ids: &[TagId]) -> Result<(), AppError> {
        ensure_tags_exist(&self.pool, self.repos.tags.as_ref(), tag_ids).await
    }

    async fn resolve_assignee(&self, id: Option<UserId>) -> Result<Option<User>, AppError> {
        resolve_assignee(&self.pool, self.repos.users.as_ref(), id).await
    }

    async fn lookup_user(&self, id: Option<UserId>) -> Result<Option<User>, AppError> {
        match id {
            Some(id) => self.repos.users.find_by_id(&self.pool, id).await,
            None => Ok(None),
        }
    }

    async fn invalidate_stats(&self) {
        if let Err(err) = self.stats_cache.invalidate_all().await {
            tracing::warn!(error = %err, "Failed to invalidate stats cache");
        }
    }

    fn notify(&self, event: NotificationEvent) {
        // Drops are already logged by the worker pool.
        let _ = self.notifier.dispatch(event);
    }

    pub async fn create(
        &self,
        actor: &User,
        payload: CreateIncidentRequest,
    ) -> Result<Incident, AppError> {
        if !actor.can_edit() {
            return Err(AppError::Forbidden("Viewers cannot create incidents".into()));
        }
        let severity = parse_severity(&payload.severity)?;
        let status = match payload.status.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => parse_status(raw)?,
            _ => IncidentStatus::Open,
        };
        let tag_ids = dedup_tag_ids(&payload.tag_ids);
        self.ensure_tags_exist(&tag_ids).await?;
        let assignee = self.resolve_assignee(payload.assignee_id).await?;

        let now = Utc::now();
        let mut incident = Incident::new(
            payload.title.trim().to_string(),
            payload.description,
            severity,
            status,
            payload.detected_at,
            actor.id,
        );
        incident.impact_scope = payload.impact_scope;
        incident.assignee_id = assignee.as_ref().map(|user| user.id);
        incident.resolved_at = settle_resolved_at(status, incident.detected_at, None, now);
        incident.refresh_sla(now);

        if self.ai.is_available() {
            let input = SummaryInput {
                title: &incident.title,
                description: &incident.description,
                severity: severity.as_str(),
                impact_scope: &incident.impact_scope,
            };
            match self.ai.generate_incident_summary(input).await {
                Ok(summary) => incident.summary = summary,
                Err(err) => {
                    tracing::warn!(error = %err, "AI summary failed, continuing without one")
                }
            }
        }

        let activity = IncidentActivity::new(incident.id, actor.id, ActivityType::Created)
            .with_comment("Incident created");
        self.repos
            .incidents
            .create_with_activity(&self.pool, &incident, &tag_ids, &activity)
            .await?;

        tracing::info!(
            incident_id = %incident.id,
            severity = severity.as_str(),
            user_id = %actor.id,
            "Incident created"
        );
        self.invalidate_stats().await;
        self.notify(NotificationEvent::incident_created(&incident));
        self.hydrate_one(incident).await
    }

    pub async fn list(&self, query: &IncidentListQuery) -> Result<IncidentListResponse, AppError> {
        let filters = filters_from_query(query)?;
        let paging = PageQuery::new(query.page, query.limit);
        let limit = paging.limit();
        let total = self.repos.incidents.count(&self.pool, &filters).await?;
        let incidents = self
            .repos
            .incidents
            .list(&self.pool, &filters, Some((limit, paging.offset_for(limit))))
            .await?;
        let incidents = hydrate_incidents(
            &self.pool,
            self.repos.incidents.as_ref(),
            self.repos.users.as_ref(),
            incidents,
        )
        .await?;
        Ok(IncidentListResponse {
            incidents,
            pagination: Pagination::new(paging.page(), limit, total),
        })
    }

    pub async fn get(&self, id: IncidentId) -> Result<Incident, AppError> {
        let incident = self.load(id).await?;
        self.hydrate_one(incident).await
    }

    pub async fn update(
        &self,
        actor: &User,
        id: IncidentId,
        payload: UpdateIncidentRequest,
    ) -> Result<Incident, AppError> {
        let existing = self.load(id).await?;
        ensure_can_modify(actor, existing.creator_id)?;

        let severity = parse_severity(&payload.severity)?;
        let status = parse_status(&payload.status)?;
        ensure_resolution_order(payload.detected_at, payload.resolved_at)?;
        let tag_ids = dedup_tag_ids(&payload.tag_ids);
        self.ensure_tags_exist(&tag_ids).await?;

        let now = Utc::now();
        let mut activities = Vec::new();
        let old_status = existing.status;

        if existing.severity != severity {
            activities.push(
                IncidentActivity::new(id, actor.id, ActivityType::SeverityChange).with_values(
                    Some(existing.severity.as_str().to_string()),
                    Some(severity.as_str().to_string()),
                ),
            );
        }
        if old_status != status {
            activities.push(
                IncidentActivity::new(id, actor.id, ActivityType::StatusChange).with_values(
                    Some(old_status.as_str().to_string()),
                    Some(status.as_str().to_string()),
                ),
            );
        }
        let entered_resolved =
            status == IncidentStatus::Resolved && old_status != IncidentStatus::Resolved;
        if entered_resolved {
            activities.push(
                IncidentActivity::new(id, actor.id, ActivityType::Resolved)
                    .with_comment("Incident resolved"),
            );
        }
        if old_status.is_terminal() && status.is_active() {
            activities.push(
                IncidentActivity::new(id, actor.id, ActivityType::Reopened).with_values(
                    Some(old_status.as_str().to_string()),
                    Some(status.as_str().to_string()),
                ),
            );
        }

        let assignee_changed = existing.assignee_id != payload.assignee_id;
        let new_assignee = if assignee_changed {
            let previous = self.lookup_user(existing.assignee_id).await?;
            let next = self.resolve_assignee(payload.assignee_id).await?;
            let comment = match &next {
                Some(user) => format!("Assigned to {}", user.name),
                None => "Unassigned".to_string(),
            };
            activities.push(
                IncidentActivity::new(id, actor.id, ActivityType::AssigneeChange)
                    .with_comment(comment)
                    .with_values(
                        Some(display_name(previous.as_ref())),
                        Some(display_name(next.as_ref())),
                    ),
            );
            next
        } else {
            None
        };

        let mut incident = existing.clone();
        incident.title = payload.title.trim().to_string();
        incident.description = payload.description;
        incident.impact_scope = payload.impact_scope;
        incident.detected_at = payload.detected_at;
        incident.assignee_id = payload.assignee_id;
        incident.status = status;
        // An active incident has no resolution time, whatever the client echoes back.
        incident.resolved_at = if status.is_terminal() {
            settle_resolved_at(status, payload.detected_at, payload.resolved_at, now)
        } else {
            None
        };
        if existing.severity != severity {
            incident.severity = severity;
            incident.sla_target_hours = severity.default_sla_hours();
        }
        incident.refresh_sla(now);
        incident.updated_at = now;

        self.repos
            .incidents
            .update_with_activities(&self.pool, &incident, &tag_ids, &activities)
            .await?;
        tracing::info!(
            incident_id = %id,
            user_id = %actor.id,
            activities = activities.len(),
            "Incident updated"
        );
        self.invalidate_stats().await;

        if let Some(assignee) = &new_assignee {
            self.notify(NotificationEvent::assigned(&incident, assignee.id));
        }
        if old_status != status {
            self.notify(NotificationEvent::status_changed(
                &incident,
                old_status.as_str(),
                status.as_str(),
            ));
        }
        if entered_resolved {
            self.notify(NotificationEvent::resolved(&incident));
        }

        self.hydrate_one(incident).await
    }

    pub async fn delete(&self, actor: &User, id: IncidentId) -> Result<(), AppError> {
        if !actor.is_admin() {
            return Err(AppError::Forbidden(
                "Only administrators can delete incidents".into(),
            ));
        }
        if !self.repos.incidents.delete(&self.pool, id).await? {
            return Err(AppError::NotFound("Incident not found".into()));
        }
        tracing::info!(incident_id = %id, user_id = %actor.id, "Incident deleted");
        self.invalidate_stats().await;
        Ok(())
    }

    pub async fn regenerate_summary(
        &self,
        actor: &User,
        id: IncidentId,
    ) -> Result<Incident, AppError> {
        if !actor.can_edit() {
            return Err(AppError::Forbidden(
                "Viewers cannot regenerate summaries".into(),
            ));
        }
        let mut incident = self.load(id).await?;
        if !self.ai.is_available() {
            return Err(AppError::ExternalApi("AI service not configured".into()));
        }
        let summary = self
            .ai
            .generate_incident_summary(SummaryInput {
                title: &incident.title,
                description: &incident.description,
                severity: incident.severity.as_str(),
                impact_scope: &incident.impact_scope,
            })
            .await
            .map_err(|err| AppError::ExternalApi(format!("Failed to generate summary: {}", err)))?;

        self.repos
            .incidents
            .update_summary(&self.pool, id, &summary)
            .await?;
        incident.summary = summary;
        self.hydrate_one(incident).await
    }

    pub async fn assign(
        &self,
        actor: &User,
        id: IncidentId,
        payload: AssignIncidentRequest,
    ) -> Result<Incident, AppError> {
        if !actor.can_edit() {
            return Err(AppError::Forbidden("Viewers cannot assign incidents".into()));
        }
        let mut incident = self.load(id).await?;
        let next = self.resolve_assignee(payload.assignee_id).await?;
        let previous = self.lookup_user(incident.assignee_id).await?;

        let comment = match &next {
            Some(user) => format!("Assigned to {}", user.name),
            None => "Unassigned".to_string(),
        };
        let activity = IncidentActivity::new(id, actor.id, ActivityType::AssigneeChange)
            .with_comment(comment)
            .with_values(
                Some(display_name(previous.as_ref())),
                Some(display_name(next.as_ref())),
            );
        self.repos
            .incidents
            .update_assignee(&self.pool, id, payload.assignee_id, &activity)
            .await?;

        let changed = incident.assignee_id != payload.assignee_id;
        incident.assignee_id = payload.assignee_id;
        incident.updated_at = Utc::now();
        if let (true, Some(assignee)) = (changed, &next) {
            self.notify(NotificationEvent::assigned(&incident, assignee.id));
        }
        self.hydrate_one(incident).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification::NotificationKind;
    use crate::models::user::UserRole;
    use crate::repositories::incident::MockIncidentRepositoryTrait;
    use crate::repositories::tag::MockTagRepositoryTrait;
    use crate::repositories::user::MockUserRepositoryTrait;
    use crate::services::ai::{DisabledAiService, ScriptedAiService};
    use crate::services::notification::RecordingNotifier;
    use crate::services::stats_cache::NoopStatsCache;
    use crate::services::test_support::{incident_by, lazy_pool, user};
    use chrono::Duration;
    use std::sync::Mutex;

    struct Harness {
        incidents: MockIncidentRepositoryTrait,
        users: MockUserRepositoryTrait,
        tags: MockTagRepositoryTrait,
        ai: Arc<dyn AiService>,
        notifier: Arc<RecordingNotifier>,
    }

    impl Harness {
        fn new() -> Self {
            let mut incidents = MockIncidentRepositoryTrait::new();
            let mut users = MockUserRepositoryTrait::new();
            incidents.expect_tag_links().returning(|_, _| Ok(Vec::new()));
            users.expect_find_summaries().returning(|_, _| Ok(Vec::new()));
            Self {
                incidents,
                users,
                tags: MockTagRepositoryTrait::new(),
                ai: Arc::new(DisabledAiService),
                notifier: Arc::new(RecordingNotifier::new()),
            }
        }

        fn with_existing(mut self, incident: &Incident) -> Self {
            let stored = incident.clone();
            self.incidents
                .expect_find_by_id()
                .returning(move |_, _| Ok(Some(stored.clone())));
            self
        }

        fn service(self) -> IncidentService {
            IncidentService::with_parts(
                lazy_pool(),
                IncidentRepositories {
                    incidents: Arc::new(self.incidents),
                    users: Arc::new(self.users),
                    tags: Arc::new(self.tags),
                },
                self.ai,
                self.notifier,
                Arc::new(NoopStatsCache),
            )
        }
    }

    fn update_payload(incident: &Incident, status: &str) -> UpdateIncidentRequest {
        UpdateIncidentRequest {
            title: incident.title.clone(),
            description: incident.description.clone(),
            severity: incident.severity.as_str().to_string(),
            status: status.to_string(),
            impact_scope: incident.impact_scope.clone(),
            detected_at: incident.detected_at,
            resolved_at: None,
            assignee_id: incident.assignee_id,
            tag_ids: Vec::new(),
        }
    }

    type Captured = Arc<Mutex<Vec<IncidentActivity>>>;

    fn capture_update(harness: &mut Harness) -> Captured {
        let captured: Captured = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&captured);
        harness
            .incidents
            .expect_update_with_activities()
            .times(1)
            .returning(move |_, _, _, activities| {
                sink.lock().expect("lock").extend_from_slice(activities);
                Ok(())
            });
        captured
    }

    fn types_of(captured: &Captured) -> Vec<ActivityType> {
        captured
            .lock()
            .expect("lock")
            .iter()
            .map(|activity| activity.activity_type)
            .collect()
    }

    #[tokio::test]
    async fn update_policy_by_role_and_ownership() {
        let editor = user(UserRole::Editor);
        let other_editor = user(UserRole::Editor);
        let viewer = user(UserRole::Viewer);
        let admin = user(UserRole::Admin);
        let own = incident_by(&editor);

        for (actor, allowed) in [
            (&viewer, false),
            (&other_editor, false),
            (&editor, true),
            (&admin, true),
        ] {
            let mut harness = Harness::new().with_existing(&own);
            if allowed {
                harness
                    .incidents
                    .expect_update_with_activities()
                    .returning(|_, _, _, _| Ok(()));
            }
            let result = harness
                .service()
                .update(actor, own.id, update_payload(&own, "open"))
                .await;
            if allowed {
                assert!(result.is_ok(), "{:?} should update", actor.role);
            } else {
                assert!(
                    matches!(result, Err(AppError::Forbidden(_))),
                    "{:?} should be forbidden",
                    actor.role
                );
            }
        }

        let viewer_own = incident_by(&viewer);
        let result = Harness::new()
            .with_existing(&viewer_own)
            .service()
            .update(&viewer, viewer_own.id, update_payload(&viewer_own, "open"))
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn missing_incident_is_not_found() {
        let mut harness = Harness::new();
        harness.incidents.expect_find_by_id().returning(|_, _| Ok(None));
        let admin = user(UserRole::Admin);
        let payload = update_payload(&incident_by(&admin), "open");
        let result = harness
            .service()
            .update(&admin, IncidentId::new(), payload)
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn resolving_appends_one_resolved_activity() {
        let admin = user(UserRole::Admin);
        let existing = incident_by(&admin);
        let mut harness = Harness::new().with_existing(&existing);
        let captured = capture_update(&mut harness);
        let notifier = Arc::clone(&harness.notifier);

        let updated = harness
            .service()
            .update(&admin, existing.id, update_payload(&existing, "resolved"))
            .await
            .expect("update");

        assert_eq!(
            types_of(&captured),
            vec![ActivityType::StatusChange, ActivityType::Resolved]
        );
        assert!(updated.resolved_at.is_some());
        assert!(updated.resolved_at >= Some(updated.detected_at));
        assert!(notifier.kinds().contains(&NotificationKind::Resolved));
        assert!(notifier.kinds().contains(&NotificationKind::StatusChange));
    }

    #[tokio::test]
    async fn leaving_closed_appends_reopened() {
        let admin = user(UserRole::Admin);
        let mut existing = incident_by(&admin);
        existing.status = IncidentStatus::Closed;
        existing.resolved_at = Some(existing.detected_at + Duration::hours(1));
        let mut harness = Harness::new().with_existing(&existing);
        let captured = capture_update(&mut harness);

        let updated = harness
            .service()
            .update(&admin, existing.id, update_payload(&existing, "investigating"))
            .await
            .expect("update");

        assert_eq!(
            types_of(&captured),
            vec![ActivityType::StatusChange, ActivityType::Reopened]
        );
        assert!(updated.resolved_at.is_none());
    }

    #[tokio::test]
    async fn reopening_drops_echoed_resolved_at_and_sla_violation() {
        let admin = user(UserRole::Admin);
        let mut existing = incident_by(&admin);
        existing.status = IncidentStatus::Resolved;
        existing.resolved_at = Some(existing.detected_at + Duration::hours(200));
        existing.refresh_sla(Utc::now());
        assert!(existing.sla_violated);
        let mut harness = Harness::new().with_existing(&existing);
        capture_update(&mut harness);

        let mut payload = update_payload(&existing, "open");
        payload.resolved_at = existing.resolved_at;
        let updated = harness
            .service()
            .update(&admin, existing.id, payload)
            .await
            .expect("update");

        assert_eq!(updated.status, IncidentStatus::Open);
        assert!(updated.resolved_at.is_none());
        assert!(!updated.sla_violated);
    }

    #[tokio::test]
    async fn resolved_before_detected_is_rejected() {
        let admin = user(UserRole::Admin);
        let existing = incident_by(&admin);
        let mut payload = update_payload(&existing, "resolved");
        payload.resolved_at = Some(existing.detected_at - Duration::minutes(5));

        let result = Harness::new()
            .with_existing(&existing)
            .service()
            .update(&admin, existing.id, payload)
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn invalid_enums_are_validation_errors() {
        let admin = user(UserRole::Admin);
        let existing = incident_by(&admin);

        let mut payload = update_payload(&existing, "open");
        payload.severity = "catastrophic".into();
        let result = Harness::new()
            .with_existing(&existing)
            .service()
            .update(&admin, existing.id, payload)
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = Harness::new()
            .with_existing(&existing)
            .service()
            .update(&admin, existing.id, update_payload(&existing, "paused"))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn severity_change_recomputes_sla() {
        let admin = user(UserRole::Admin);
        let existing = incident_by(&admin);
        let mut harness = Harness::new().with_existing(&existing);
        let captured = capture_update(&mut harness);

        let mut payload = update_payload(&existing, "open");
        payload.severity = "critical".into();
        let updated = harness
            .service()
            .update(&admin, existing.id, payload)
            .await
            .expect("update");

        assert_eq!(types_of(&captured), vec![ActivityType::SeverityChange]);
        assert_eq!(updated.sla_target_hours, 4);
        assert_eq!(updated.sla_deadline, existing.detected_at + Duration::hours(4));
    }

    #[tokio::test]
    async fn assignee_change_records_names_and_notifies() {
        let admin = user(UserRole::Admin);
        let responder = user(UserRole::Editor);
        let existing = incident_by(&admin);
        let mut harness = Harness::new().with_existing(&existing);
        let stored = responder.clone();
        harness
            .users
            .expect_find_by_id()
            .returning(move |_, _| Ok(Some(stored.clone())));
        let captured = capture_update(&mut harness);
        let notifier = Arc::clone(&harness.notifier);

        let mut payload = update_payload(&existing, "open");
        payload.assignee_id = Some(responder.id);
        harness
            .service()
            .update(&admin, existing.id, payload)
            .await
            .expect("update");

        let activities = captured.lock().expect("lock").clone();
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].activity_type, ActivityType::AssigneeChange);
        assert_eq!(activities[0].old_value.as_deref(), Some("Unassigned"));
        assert_eq!(activities[0].new_value.as_deref(), Some(responder.name.as_str()));
        assert_eq!(notifier.kinds(), vec![NotificationKind::Assigned]);
    }

    #[tokio::test]
    async fn delete_requires_admin() {
        let editor = user(UserRole::Editor);
        let viewer = user(UserRole::Viewer);
        for actor in [&editor, &viewer] {
            let result = Harness::new().service().delete(actor, IncidentId::new()).await;
            assert!(matches!(result, Err(AppError::Forbidden(_))));
        }

        let mut harness = Harness::new();
        harness.incidents.expect_delete().returning(|_, _| Ok(true));
        assert!(harness
            .service()
            .delete(&user(UserRole::Admin), IncidentId::new())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn create_rejects_unknown_tags() {
        let editor = user(UserRole::Editor);
        let mut harness = Harness::new();
        harness.tags.expect_find_by_ids().returning(|_, _| Ok(Vec::new()));
        let result = harness
            .service()
            .create(
                &editor,
                CreateIncidentRequest {
                    title: "Disk full".into(),
                    description: "db01".into(),
                    severity: "medium".into(),
                    status: None,
                    impact_scope: String::new(),
                    detected_at: Utc::now(),
                    assignee_id: None,
                    tag_ids: vec![TagId::new()],
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn create_uses_ai_summary_and_writes_created_activity() {
        let editor = user(UserRole::Editor);
        let mut harness = Harness::new();
        harness.ai = Arc::new(ScriptedAiService::replying("Checkout is failing."));
        harness
            .incidents
            .expect_create_with_activity()
            .withf(|_, incident, _, activity| {
                incident.status == IncidentStatus::Open
                    && incident.sla_target_hours == 72
                    && activity.activity_type == ActivityType::Created
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let created = harness
            .service()
            .create(
                &editor,
                CreateIncidentRequest {
                    title: "Checkout failing".into(),
                    description: "500s".into(),
                    severity: "medium".into(),
                    status: None,
                    impact_scope: "EU".into(),
                    detected_at: Utc::now(),
                    assignee_id: None,
                    tag_ids: Vec::new(),
                },
            )
            .await
            .expect("create");
        assert_eq!(created.summary, "Checkout is failing.");
    }

    #[tokio::test]
    async fn create_survives_ai_failure() {
        let editor = user(UserRole::Editor);
        let mut harness = Harness::new();
        harness.ai = Arc::new(ScriptedAiService::failing());
        harness
            .incidents
            .expect_create_with_activity()
            .returning(|_, _, _, _| Ok(()));

        let created = harness
            .service()
            .create(
                &editor,
                CreateIncidentRequest {
                    title: "Queue backlog".into(),
                    description: "lag".into(),
                    severity: "low".into(),
                    status: Some("investigating".into()),
                    impact_scope: String::new(),
                    detected_at: Utc::now(),
                    assignee_id: None,
                    tag_ids: Vec::new(),
                },
            )
            .await
            .expect("create");
        assert!(created.summary.is_empty());
        assert_eq!(created.status, IncidentStatus::Investigating);
    }

    #[tokio::test]
    async fn summarize_requires_configured_ai() {
        let editor = user(UserRole::Editor);
        let existing = incident_by(&editor);
        let result = Harness::new()
            .with_existing(&existing)
            .service()
            .regenerate_summary(&editor, existing.id)
            .await;
        match result {
            Err(AppError::ExternalApi(message)) => {
                assert_eq!(message, "AI service not configured")
            }
            other => panic!("unexpected result: {:?}", other.map(|i| i.id)),
        }

        let viewer = user(UserRole::Viewer);
        let result = Harness::new()
            .service()
            .regenerate_summary(&viewer, existing.id)
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[test]
    fn list_filters_parse_tags_and_fall_back_on_sort() {
        let tag = TagId::new();
        let filters = filters_from_query(&IncidentListQuery {
            tag_ids: Some(format!(" {} ,", tag)),
            sort: Some("password".into()),
            order: Some("asc".into()),
            ..IncidentListQuery::default()
        })
        .expect("filters");
        assert_eq!(filters.tag_ids, vec![tag]);
        assert_eq!(filters.sort, "created_at");
        assert_eq!(filters.order, SortOrder::Asc);

        assert!(filters_from_query(&IncidentListQuery {
            tag_ids: Some("nope".into()),
            ..IncidentListQuery::default()
        })
        .is_err());
    }
}
