use std::collections::HashMap;
use std::sync::Arc;

use sqlx::PgPool;

use crate::error::AppError;
use crate::models::{
    activity::{
        ActivityListQuery, ActivityType, CreateCommentRequest, CreateTimelineEventRequest,
        IncidentActivity,
    },
    incident::Incident,
    user::User,
};
use crate::repositories::{
    ActivityRepository, ActivityRepositoryTrait, IncidentRepository, IncidentRepositoryTrait,
    UserRepository, UserRepositoryTrait,
};
use crate::services::notification::{NotificationDispatcher, NotificationEvent};
use crate::state::AppState;
use crate::types::IncidentId;

pub struct ActivityService {
    pool: PgPool,
    activities: Arc<dyn ActivityRepositoryTrait>,
    incidents: Arc<dyn IncidentRepositoryTrait>,
    users: Arc<dyn UserRepositoryTrait>,
    notifier: Arc<dyn NotificationDispatcher>,
}

/// Attaches the author summary to each activity.
pub async fn attach_authors(
    pool: &PgPool,
    users: &dyn UserRepositoryTrait,
    mut activities: Vec<IncidentActivity>,
) -> Result<Vec<IncidentActivity>, AppError> {
    if activities.is_empty() {
        return Ok(activities);
    }
    let mut ids: Vec<_> = activities.iter().map(|a| a.user_id).collect();
    ids.sort();
    ids.dedup();
    let summaries: HashMap<_, _> = users
        .find_summaries(pool, &ids)
        .await?
        .into_iter()
        .map(|summary| (summary.id, summary))
        .collect();
    for activity in &mut activities {
        activity.user = summaries.get(&activity.user_id).cloned();
    }
    Ok(activities)
}

impl ActivityService {
    pub fn from_state(state: &AppState) -> Self {
        Self::with_repositories(
            state.pool.clone(),
            Arc::new(ActivityRepository::new()),
            Arc::new(IncidentRepository::new()),
            Arc::new(UserRepository::new()),
            Arc::clone(&state.notifier),
        )
    }

    pub fn with_repositories(
        pool: PgPool,
        activities: Arc<dyn ActivityRepositoryTrait>,
        incidents: Arc<dyn IncidentRepositoryTrait>,
        users: Arc<dyn UserRepositoryTrait>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            pool,
            activities,
            incidents,
            users,
            notifier,
        }
    }

    async fn load_incident(&self, id: IncidentId) -> Result<Incident, AppError> {
        self.incidents
            .find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Incident not found".into()))
    }

    async fn store(
        &self,
        actor: &User,
        activity: IncidentActivity,
    ) -> Result<IncidentActivity, AppError> {
        self.activities.create(&self.pool, &activity).await?;
        let mut activity = activity;
        activity.user = Some(actor.summary());
        Ok(activity)
    }

    pub async fn add_comment(
        &self,
        actor: &User,
        incident_id: IncidentId,
        payload: CreateCommentRequest,
    ) -> Result<IncidentActivity, AppError> {
        let comment = payload.comment.trim();
        if comment.is_empty() {
            return Err(AppError::validation("comment: must not be empty"));
        }
        let incident = self.load_incident(incident_id).await?;
        let activity = IncidentActivity::new(incident_id, actor.id, ActivityType::Comment)
            .with_comment(comment);
        let activity = self.store(actor, activity).await?;

        let _ = self
            .notifier
            .dispatch(NotificationEvent::comment(&incident, actor.id, comment));
        Ok(activity)
    }

    pub async fn add_timeline_event(
        &self,
        actor: &User,
        incident_id: IncidentId,
        payload: CreateTimelineEventRequest,
    ) -> Result<IncidentActivity, AppError> {
        if !actor.can_edit() {
            return Err(AppError::Forbidden(
                "Viewers cannot add timeline events".into(),
            ));
        }
        let event_type = ActivityType::parse_timeline_event(&payload.event_type).ok_or_else(|| {
            let allowed: Vec<&str> = ActivityType::TIMELINE_EVENTS
                .iter()
                .map(ActivityType::as_str)
                .collect();
            AppError::validation(format!(
                "event_type: must be one of {}",
                allowed.join(", ")
            ))
        })?;
        self.load_incident(incident_id).await?;

        let activity = IncidentActivity::new(incident_id, actor.id, event_type)
            .with_comment(payload.description.trim())
            .with_values(None, Some(payload.event_time.to_rfc3339()));
        self.store(actor, activity).await
    }

    /// Newest first.
    pub async fn list(
        &self,
        incident_id: IncidentId,
        query: &ActivityListQuery,
    ) -> Result<Vec<IncidentActivity>, AppError> {
        self.load_incident(incident_id).await?;
        let activities = self
            .activities
            .list_recent(&self.pool, incident_id, query.limit())
            .await?;
        attach_authors(&self.pool, self.users.as_ref(), activities).await
    }
}
