//! Incident templates and incident creation from a template.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::{
    activity::{ActivityType, IncidentActivity},
    incident::{Incident, IncidentStatus},
    template::{CreateIncidentFromTemplateRequest, IncidentTemplate, TemplatePayload},
    user::User,
};
use crate::repositories::{TemplateRepository, TemplateRepositoryTrait};
use crate::services::{
    incident::{
        dedup_tag_ids, ensure_tags_exist, hydrate_incidents, parse_severity, resolve_assignee,
        IncidentRepositories,
    },
    notification::{NotificationDispatcher, NotificationEvent},
    stats_cache::StatsCache,
};
use crate::state::AppState;
use crate::types::{TemplateId, UserId};

pub struct TemplateService {
    pool: PgPool,
    templates: Arc<dyn TemplateRepositoryTrait>,
    repos: IncidentRepositories,
    notifier: Arc<dyn NotificationDispatcher>,
    stats_cache: Arc<dyn StatsCache>,
}

impl TemplateService {
    pub fn from_state(state: &AppState) -> Self {
        Self::with_parts(
            state.pool.clone(),
            Arc::new(TemplateRepository::new()),
            IncidentRepositories::default(),
            Arc::clone(&state.notifier),
            Arc::clone(&state.stats_cache),
        )
    }

    pub fn with_parts(
        pool: PgPool,
        templates: Arc<dyn TemplateRepositoryTrait>,
        repos: IncidentRepositories,
        notifier: Arc<dyn NotificationDispatcher>,
        stats_cache: Arc<dyn StatsCache>,
    ) -> Self {
        Self {
            pool,
            templates,
            repos,
            notifier,
            stats_cache,
        }
    }

    async fn attach_tags(
        &self,
        mut templates: Vec<IncidentTemplate>,
    ) -> Result<Vec<IncidentTemplate>, AppError> {
        if templates.is_empty() {
            return Ok(templates);
        }
        let ids: Vec<TemplateId> = templates.iter().map(|t| t.id).collect();
        let mut by_template: HashMap<TemplateId, Vec<_>> = HashMap::new();
        for (template_id, tag) in self.templates.tag_links(&self.pool, &ids).await? {
            by_template.entry(template_id).or_default().push(tag);
        }
        for template in &mut templates {
            template.tags = by_template.remove(&template.id).unwrap_or_default();
        }
        Ok(templates)
    }

    async fn load_with_tags(&self, id: TemplateId) -> Result<IncidentTemplate, AppError> {
        let template = self
            .templates
            .find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Template not found".into()))?;
        self.attach_tags(vec![template])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound("Template not found".into()))
    }

    /// Missing and invisible templates look the same to the caller.
    async fn load_visible(
        &self,
        actor: &User,
        id: TemplateId,
    ) -> Result<IncidentTemplate, AppError> {
        let template = self.load_with_tags(id).await?;
        if !template.is_visible_to(actor) {
            return Err(AppError::NotFound("Template not found".into()));
        }
        Ok(template)
    }

    pub async fn list(&self, actor: &User) -> Result<Vec<IncidentTemplate>, AppError> {
        let templates = self
            .templates
            .list_visible(&self.pool, actor.id, actor.is_admin())
            .await?;
        self.attach_tags(templates).await
    }

    pub async fn get(&self, actor: &User, id: TemplateId) -> Result<IncidentTemplate, AppError> {
        self.load_visible(actor, id).await
    }

    pub async fn create(
        &self,
        actor: &User,
        payload: TemplatePayload,
    ) -> Result<IncidentTemplate, AppError> {
        if !actor.can_edit() {
            return Err(AppError::Forbidden("Viewers cannot create templates".into()));
        }
        let severity = parse_severity(&payload.severity)?;
        let tag_ids = dedup_tag_ids(&payload.tag_ids);
        ensure_tags_exist(&self.pool, self.repos.tags.as_ref(), &tag_ids).await?;

        let now = Utc::now();
        let template = IncidentTemplate {
            id: TemplateId::new(),
            name: payload.name.trim().to_string(),
            description: payload.description,
            title: payload.title.trim().to_string(),
            content: payload.content,
            severity,
            impact_scope: payload.impact_scope,
            creator_id: actor.id,
            is_public: payload.is_public,
            usage_count: 0,
            created_at: now,
            updated_at: now,
            tags: Vec::new(),
        };
        self.templates.create(&self.pool, &template, &tag_ids).await?;
        tracing::info!(template_id = %template.id, user_id = %actor.id, "Template created");
        self.load_with_tags(template.id).await
    }

    pub async fn update(
        &self,
        actor: &User,
        id: TemplateId,
        payload: TemplatePayload,
    ) -> Result<IncidentTemplate, AppError> {
        let mut template = self.load_visible(actor, id).await?;
        if !template.is_managed_by(actor) {
            return Err(AppError::Forbidden(
                "Only the creator or an administrator can modify this template".into(),
            ));
        }
        let severity = parse_severity(&payload.severity)?;
        let tag_ids = dedup_tag_ids(&payload.tag_ids);
        ensure_tags_exist(&self.pool, self.repos.tags.as_ref(), &tag_ids).await?;

        template.name = payload.name.trim().to_string();
        template.description = payload.description;
        template.title = payload.title.trim().to_string();
        template.content = payload.content;
        template.severity = severity;
        template.impact_scope = payload.impact_scope;
        template.is_public = payload.is_public;
        template.updated_at = Utc::now();
        self.templates.update(&self.pool, &template, &tag_ids).await?;
        self.load_with_tags(id).await
    }

    pub async fn delete(&self, actor: &User, id: TemplateId) -> Result<(), AppError> {
        let template = self.load_visible(actor, id).await?;
        if !template.is_managed_by(actor) {
            return Err(AppError::Forbidden(
                "Only the creator or an administrator can delete this template".into(),
            ));
        }
        if !self.templates.delete(&self.pool, id).await? {
            return Err(AppError::NotFound("Template not found".into()));
        }
        Ok(())
    }

    /// Opens a new incident prefilled from the template.
    pub async fn create_incident(
        &self,
        actor: &User,
        payload: CreateIncidentFromTemplateRequest,
    ) -> Result<Incident, AppError> {
        if !actor.can_edit() {
            return Err(AppError::Forbidden("Viewers cannot create incidents".into()));
        }
        let template = self.load_visible(actor, payload.template_id).await?;
        let assignee: Option<UserId> =
            resolve_assignee(&self.pool, self.repos.users.as_ref(), payload.assignee_id)
                .await?
                .map(|user| user.id);

        if let Err(err) = self.templates.increment_usage(&self.pool, template.id).await {
            tracing::warn!(
                error = %err,
                template_id = %template.id,
                "Failed to bump template usage"
            );
        }

        let now = Utc::now();
        let mut incident = Incident::new(
            template.title.clone(),
            template.content.clone(),
            template.severity,
            IncidentStatus::Open,
            payload.detected_at.unwrap_or(now),
            actor.id,
        );
        incident.impact_scope = template.impact_scope.clone();
        incident.assignee_id = assignee;
        incident.refresh_sla(now);

        let tag_ids: Vec<_> = template.tags.iter().map(|tag| tag.id).collect();
        let activity = IncidentActivity::new(incident.id, actor.id, ActivityType::Created)
            .with_comment(format!("Incident created from template \"{}\"", template.name));
        self.repos
            .incidents
            .create_with_activity(&self.pool, &incident, &tag_ids, &activity)
            .await?;
        tracing::info!(
            incident_id = %incident.id,
            template_id = %template.id,
            "Incident created from template"
        );

        if let Err(err) = self.stats_cache.invalidate_all().await {
            tracing::warn!(error = %err, "Failed to invalidate stats cache");
        }
        let _ = self
            .notifier
            .dispatch(NotificationEvent::incident_created(&incident));

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
}
