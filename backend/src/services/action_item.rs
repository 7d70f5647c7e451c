use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::{
    action_item::{
        ActionItem, ActionItemListQuery, ActionItemListResponse, ActionItemPriority,
        ActionItemStatus, CreateActionItemRequest, UpdateActionItemRequest,
    },
    user::User,
    whitelist_sort, PageQuery, Pagination, SortOrder,
};
use crate::repositories::{
    action_item::{ActionItemFilters, SORTABLE_COLUMNS},
    ActionItemRepository, ActionItemRepositoryTrait, PostMortemRepository,
    PostMortemRepositoryTrait,
};
use crate::state::AppState;
use crate::types::{ActionItemId, PostMortemId};

fn parse_priority(raw: &str) -> Result<ActionItemPriority, AppError> {
    ActionItemPriority::parse(raw)
        .ok_or_else(|| AppError::validation("priority: must be one of high, medium, low"))
}

fn parse_status(raw: &str) -> Result<ActionItemStatus, AppError> {
    ActionItemStatus::parse(raw).ok_or_else(|| {
        AppError::validation("status: must be one of pending, in_progress, completed")
    })
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|value| !value.is_empty())
}

fn clean_links(links: Vec<String>) -> Vec<String> {
    links
        .into_iter()
        .map(|link| link.trim().to_string())
        .filter(|link| !link.is_empty())
        .collect()
}

pub struct ActionItemService {
    pool: PgPool,
    items: Arc<dyn ActionItemRepositoryTrait>,
    post_mortems: Arc<dyn PostMortemRepositoryTrait>,
}

impl ActionItemService {
    pub fn from_state(state: &AppState) -> Self {
        Self::with_repositories(
            state.pool.clone(),
            Arc::new(ActionItemRepository::new()),
            Arc::new(PostMortemRepository::new()),
        )
    }

    pub fn with_repositories(
        pool: PgPool,
        items: Arc<dyn ActionItemRepositoryTrait>,
        post_mortems: Arc<dyn PostMortemRepositoryTrait>,
    ) -> Self {
        Self {
            pool,
            items,
            post_mortems,
        }
    }

    async fn load(&self, id: ActionItemId) -> Result<ActionItem, AppError> {
        self.items
            .find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Action item not found".into()))
    }

    pub async fn create(
        &self,
        actor: &User,
        payload: CreateActionItemRequest,
    ) -> Result<ActionItem, AppError> {
        if !actor.can_edit() {
            return Err(AppError::Forbidden("Viewers cannot create action items".into()));
        }
        let priority = match non_blank(payload.priority.as_deref()) {
            Some(raw) => parse_priority(raw)?,
            None => ActionItemPriority::Medium,
        };
        self.post_mortems
            .find_by_id(&self.pool, payload.post_mortem_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Post-mortem not found".into()))?;

        let now = Utc::now();
        let item = ActionItem {
            id: ActionItemId::new(),
            post_mortem_id: payload.post_mortem_id,
            title: payload.title.trim().to_string(),
            description: payload.description,
            assignee_id: payload.assignee_id,
            priority,
            status: ActionItemStatus::Pending,
            due_date: payload.due_date,
            related_links: clean_links(payload.related_links),
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        let saved = self.items.create(&self.pool, &item).await?;
        tracing::info!(
            action_item_id = %saved.id,
            post_mortem_id = %saved.post_mortem_id,
            "Action item created"
        );
        Ok(saved)
    }

    pub async fn get(&self, id: ActionItemId) -> Result<ActionItem, AppError> {
        self.load(id).await
    }

    pub async fn list(
        &self,
        query: &ActionItemListQuery,
    ) -> Result<ActionItemListResponse, AppError> {
        let filters = ActionItemFilters {
            status: non_blank(query.status.as_deref())
                .map(parse_status)
                .transpose()?,
            priority: non_blank(query.priority.as_deref())
                .map(parse_priority)
                .transpose()?,
            assignee_id: query.assignee_id,
            post_mortem_id: query.post_mortem_id,
            search: non_blank(query.search.as_deref()).map(str::to_string),
            sort: whitelist_sort(query.sort.as_deref(), &SORTABLE_COLUMNS, "created_at"),
            order: SortOrder::parse(query.order.as_deref()),
        };
        let paging = PageQuery::new(query.page, query.limit);
        let limit = paging.limit();
        let total = self.items.count(&self.pool, &filters).await?;
        let action_items = self
            .items
            .list(&self.pool, &filters, limit, paging.offset_for(limit))
            .await?;
        Ok(ActionItemListResponse {
            action_items,
            pagination: Pagination::new(paging.page(), limit, total),
        })
    }

    pub async fn list_by_post_mortem(
        &self,
        post_mortem_id: PostMortemId,
    ) -> Result<Vec<ActionItem>, AppError> {
        self.items
            .list_by_post_mortem(&self.pool, post_mortem_id)
            .await
    }

    pub async fn update(
        &self,
        actor: &User,
        id: ActionItemId,
        payload: UpdateActionItemRequest,
    ) -> Result<ActionItem, AppError> {
        if !actor.can_edit() {
            return Err(AppError::Forbidden("Viewers cannot update action items".into()));
        }
        let priority = parse_priority(&payload.priority)?;
        let status = parse_status(&payload.status)?;
        let mut item = self.load(id).await?;

        let now = Utc::now();
        item.title = payload.title.trim().to_string();
        item.description = payload.description;
        item.assignee_id = payload.assignee_id;
        item.priority = priority;
        item.due_date = payload.due_date;
        item.related_links = clean_links(payload.related_links);
        item.transition_to(status, now);
        item.updated_at = now;
        self.items.update(&self.pool, &item).await
    }

    pub async fn delete(&self, actor: &User, id: ActionItemId) -> Result<(), AppError> {
        if !actor.is_admin() {
            return Err(AppError::Forbidden(
                "Only administrators can delete action items".into(),
            ));
        }
        if !self.items.delete(&self.pool, id).await? {
            return Err(AppError::NotFound("Action item not found".into()));
        }
        Ok(())
    }
}
