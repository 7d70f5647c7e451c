//! Post-mortem drafting, publication and AI root-cause suggestions.

use std::sync::Arc;

use chrono::Utc;
use sqlx::{types::Json, PgPool};

use crate::error::AppError;
use crate::models::{
    incident::Incident,
    post_mortem::{
        CreatePostMortemRequest, PostMortem, PostMortemListQuery, PostMortemListResponse,
        PostMortemStatus, RootCauseSuggestionResponse, UpdatePostMortemRequest,
    },
    user::User,
    whitelist_sort, PageQuery, Pagination, SortOrder,
};
use crate::repositories::{
    post_mortem::{PostMortemFilters, SORTABLE_COLUMNS},
    ActivityRepository, ActivityRepositoryTrait, IncidentRepository, IncidentRepositoryTrait,
    PostMortemRepository, PostMortemRepositoryTrait,
};
use crate::services::{
    ai::{AiService, MAX_TIMELINE_ENTRIES},
    incident::ensure_can_modify,
};
use crate::state::AppState;
use crate::types::{IncidentId, PostMortemId};

pub struct PostMortemService {
    pool: PgPool,
    post_mortems: Arc<dyn PostMortemRepositoryTrait>,
    incidents: Arc<dyn IncidentRepositoryTrait>,
    activities: Arc<dyn ActivityRepositoryTrait>,
    ai: Arc<dyn AiService>,
}

impl PostMortemService {
    pub fn from_state(state: &AppState) -> Self {
        Self::with_repositories(
            state.pool.clone(),
            Arc::new(PostMortemRepository::new()),
            Arc::new(IncidentRepository::new()),
            Arc::new(ActivityRepository::new()),
            Arc::clone(&state.ai),
        )
    }

    pub fn with_repositories(
        pool: PgPool,
        post_mortems: Arc<dyn PostMortemRepositoryTrait>,
        incidents: Arc<dyn IncidentRepositoryTrait>,
        activities: Arc<dyn ActivityRepositoryTrait>,
        ai: Arc<dyn AiService>,
    ) -> Self {
        Self {
            pool,
            post_mortems,
            incidents,
            activities,
            ai,
        }
    }

    async fn load(&self, id: PostMortemId) -> Result<PostMortem, AppError> {
        self.post_mortems
            .find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Post-mortem not found".into()))
    }

    async fn load_incident(&self, id: IncidentId) -> Result<Incident, AppError> {
        self.incidents
            .find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Incident not found".into()))
    }

    async fn suggest_root_cause(&self, incident: &Incident) -> anyhow::Result<String> {
        let timeline = self
            .activities
            .list_chronological(&self.pool, incident.id, MAX_TIMELINE_ENTRIES as i64)
            .await?;
        self.ai
            .generate_root_cause_suggestion(&incident.title, &incident.description, &timeline)
            .await
    }

    pub async fn create(
        &self,
        actor: &User,
        payload: CreatePostMortemRequest,
    ) -> Result<PostMortem, AppError> {
        if !actor.can_edit() {
            return Err(AppError::Forbidden("Viewers cannot create post-mortems".into()));
        }
        let incident = self.load_incident(payload.incident_id).await?;
        if self
            .post_mortems
            .find_by_incident(&self.pool, incident.id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "A post-mortem already exists for this incident".into(),
            ));
        }

        let mut ai_root_cause_suggestion = String::new();
        if self.ai.is_available() {
            match self.suggest_root_cause(&incident).await {
                Ok(suggestion) => ai_root_cause_suggestion = suggestion,
                Err(err) => tracing::warn!(
                    error = %err,
                    incident_id = %incident.id,
                    "AI root cause suggestion failed"
                ),
            }
        }

        let now = Utc::now();
        let post_mortem = PostMortem {
            id: PostMortemId::new(),
            incident_id: incident.id,
            author_id: actor.id,
            status: PostMortemStatus::Draft,
            root_cause: payload.root_cause,
            impact_analysis: payload.impact_analysis,
            what_went_well: payload.what_went_well,
            what_went_wrong: payload.what_went_wrong,
            lessons_learned: payload.lessons_learned,
            five_whys_analysis: payload.five_whys_analysis.map(Json),
            ai_root_cause_suggestion,
            published_at: None,
            created_at: now,
            updated_at: now,
        };
        let saved = self.post_mortems.create(&self.pool, &post_mortem).await?;
        tracing::info!(
            post_mortem_id = %saved.id,
            incident_id = %incident.id,
            "Post-mortem created"
        );
        Ok(saved)
    }

    pub async fn get(&self, id: PostMortemId) -> Result<PostMortem, AppError> {
        self.load(id).await
    }

    pub async fn get_by_incident(&self, incident_id: IncidentId) -> Result<PostMortem, AppError> {
        self.post_mortems
            .find_by_incident(&self.pool, incident_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Post-mortem not found".into()))
    }

    pub async fn list(
        &self,
        query: &PostMortemListQuery,
    ) -> Result<PostMortemListResponse, AppError> {
        let status = match query.status.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(PostMortemStatus::parse(raw).ok_or_else(|| {
                AppError::validation("status: must be one of draft, published")
            })?),
            _ => None,
        };
        let filters = PostMortemFilters {
            status,
            author_id: query.author_id,
            incident_id: query.incident_id,
            search: query
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            sort: whitelist_sort(query.sort.as_deref(), &SORTABLE_COLUMNS, "created_at"),
            order: SortOrder::parse(query.order.as_deref()),
        };
        let paging = PageQuery::new(query.page, query.limit);
        let limit = paging.limit();
        let total = self.post_mortems.count(&self.pool, &filters).await?;
        let post_mortems = self
            .post_mortems
            .list(&self.pool, &filters, limit, paging.offset_for(limit))
            .await?;
        Ok(PostMortemListResponse {
            post_mortems,
            pagination: Pagination::new(paging.page(), limit, total),
        })
    }

    pub async fn update(
        &self,
        actor: &User,
        id: PostMortemId,
        payload: UpdatePostMortemRequest,
    ) -> Result<PostMortem, AppError> {
        let mut post_mortem = self.load(id).await?;
        ensure_can_modify(actor, post_mortem.author_id)?;
        if post_mortem.is_published() {
            return Err(AppError::validation(
                "Published post-mortems must be unpublished before editing",
            ));
        }
        post_mortem.root_cause = payload.root_cause;
        post_mortem.impact_analysis = payload.impact_analysis;
        post_mortem.what_went_well = payload.what_went_well;
        post_mortem.what_went_wrong = payload.what_went_wrong;
        post_mortem.lessons_learned = payload.lessons_learned;
        post_mortem.five_whys_analysis = payload.five_whys_analysis.map(Json);
        post_mortem.updated_at = Utc::now();
        self.post_mortems.update_content(&self.pool, &post_mortem).await
    }

    pub async fn publish(&self, actor: &User, id: PostMortemId) -> Result<PostMortem, AppError> {
        let post_mortem = self.load(id).await?;
        ensure_can_modify(actor, post_mortem.author_id)?;
        if post_mortem.is_published() {
            return Err(AppError::validation("Post-mortem is already published"));
        }
        let published = self
            .post_mortems
            .set_status(&self.pool, id, PostMortemStatus::Published, Some(Utc::now()))
            .await?;
        tracing::info!(post_mortem_id = %id, user_id = %actor.id, "Post-mortem published");
        Ok(published)
    }

    pub async fn unpublish(&self, actor: &User, id: PostMortemId) -> Result<PostMortem, AppError> {
        let post_mortem = self.load(id).await?;
        ensure_can_modify(actor, post_mortem.author_id)?;
        if !post_mortem.is_published() {
            return Err(AppError::validation("Post-mortem is already a draft"));
        }
        self.post_mortems
            .set_status(&self.pool, id, PostMortemStatus::Draft, None)
            .await
    }

    pub async fn delete(&self, actor: &User, id: PostMortemId) -> Result<(), AppError> {
        if !actor.is_admin() {
            return Err(AppError::Forbidden(
                "Only administrators can delete post-mortems".into(),
            ));
        }
        if !self.post_mortems.delete(&self.pool, id).await? {
            return Err(AppError::NotFound("Post-mortem not found".into()));
        }
        Ok(())
    }

    /// Generates a fresh suggestion and stores it on the incident's post-mortem, if any.
    pub async fn generate_ai_suggestion(
        &self,
        incident_id: IncidentId,
    ) -> Result<RootCauseSuggestionResponse, AppError> {
        if !self.ai.is_available() {
            return Err(AppError::ExternalApi("AI service not configured".into()));
        }
        let incident = self.load_incident(incident_id).await?;
        let suggestion = self.suggest_root_cause(&incident).await.map_err(|err| {
            AppError::ExternalApi(format!("Failed to generate root cause suggestion: {}", err))
        })?;

        if let Some(existing) = self
            .post_mortems
            .find_by_incident(&self.pool, incident_id)
            .await?
        {
            self.post_mortems
                .update_ai_suggestion(&self.pool, existing.id, &suggestion)
                .await?;
        }
        Ok(RootCauseSuggestionResponse { suggestion })
    }
}
