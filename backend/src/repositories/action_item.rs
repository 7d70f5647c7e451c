use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::error::AppError;
use crate::models::{
    action_item::{ActionItem, ActionItemPriority, ActionItemStatus},
    SortOrder,
};
use crate::repositories::common::push_clause;
use crate::types::{ActionItemId, PostMortemId, UserId};

const SELECT_COLUMNS: &str = "id, post_mortem_id, title, description, assignee_id, priority, \
     status, due_date, related_links, completed_at, created_at, updated_at";

pub const SORTABLE_COLUMNS: [&str; 3] = ["created_at", "due_date", "priority"];

#[derive(Debug, Clone)]
pub struct ActionItemFilters {
    pub status: Option<ActionItemStatus>,
    pub priority: Option<ActionItemPriority>,
    pub assignee_id: Option<UserId>,
    pub post_mortem_id: Option<PostMortemId>,
    pub search: Option<String>,
    pub sort: &'static str,
    pub order: SortOrder,
}

impl Default for ActionItemFilters {
    fn default() -> Self {
        Self {
            status: None,
            priority: None,
            assignee_id: None,
            post_mortem_id: None,
            search: None,
            sort: "created_at",
            order: SortOrder::Desc,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActionItemRepositoryTrait: Send + Sync {
    async fn create(&self, db: &PgPool, item: &ActionItem) -> Result<ActionItem, AppError>;

    async fn find_by_id(
        &self,
        db: &PgPool,
        id: ActionItemId,
    ) -> Result<Option<ActionItem>, AppError>;

    async fn list(
        &self,
        db: &PgPool,
        filters: &ActionItemFilters,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ActionItem>, AppError>;

    async fn count(&self, db: &PgPool, filters: &ActionItemFilters) -> Result<i64, AppError>;

    async fn list_by_post_mortem(
        &self,
        db: &PgPool,
        post_mortem_id: PostMortemId,
    ) -> Result<Vec<ActionItem>, AppError>;

    async fn update(&self, db: &PgPool, item: &ActionItem) -> Result<ActionItem, AppError>;

    async fn delete(&self, db: &PgPool, id: ActionItemId) -> Result<bool, AppError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ActionItemRepository;

impl ActionItemRepository {
    pub fn new() -> Self {
        Self
    }
}

/// Priority sorts by urgency rather than alphabetically.
fn order_expression(sort: &str) -> &'static str {
    match sort {
        "due_date" => "due_date",
        "priority" => "CASE priority WHEN 'high' THEN 1 WHEN 'medium' THEN 2 ELSE 3 END",
        _ => "created_at",
    }
}

#[async_trait]
impl ActionItemRepositoryTrait for ActionItemRepository {
    async fn create(&self, db: &PgPool, item: &ActionItem) -> Result<ActionItem, AppError> {
        let query = format!(
            "INSERT INTO action_items (id, post_mortem_id, title, description, assignee_id, \
             priority, status, due_date, related_links, completed_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING {}",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, ActionItem>(&query)
            .bind(item.id)
            .bind(item.post_mortem_id)
            .bind(&item.title)
            .bind(&item.description)
            .bind(item.assignee_id)
            .bind(item.priority)
            .bind(item.status)
            .bind(item.due_date)
            .bind(&item.related_links)
            .bind(item.completed_at)
            .bind(item.created_at)
            .bind(item.updated_at)
            .fetch_one(db)
            .await?;
        Ok(row)
    }

    async fn find_by_id(
        &self,
        db: &PgPool,
        id: ActionItemId,
    ) -> Result<Option<ActionItem>, AppError> {
        let query = format!("SELECT {} FROM action_items WHERE id = $1", SELECT_COLUMNS);
        let row = sqlx::query_as::<_, ActionItem>(&query)
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }

    async fn list(
        &self,
        db: &PgPool,
        filters: &ActionItemFilters,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ActionItem>, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM action_items", SELECT_COLUMNS));
        let mut has_clause = false;
        apply_action_item_filters(&mut builder, &mut has_clause, filters);
        builder.push(format!(
            " ORDER BY {} {order} NULLS LAST, id {order}",
            order_expression(filters.sort),
            order = filters.order.as_sql()
        ));
        builder
            .push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = builder.build_query_as::<ActionItem>().fetch_all(db).await?;
        Ok(rows)
    }

    async fn count(&self, db: &PgPool, filters: &ActionItemFilters) -> Result<i64, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM action_items");
        let mut has_clause = false;
        apply_action_item_filters(&mut builder, &mut has_clause, filters);
        let total = builder.build_query_scalar::<i64>().fetch_one(db).await?;
        Ok(total)
    }

    async fn list_by_post_mortem(
        &self,
        db: &PgPool,
        post_mortem_id: PostMortemId,
    ) -> Result<Vec<ActionItem>, AppError> {
        let query = format!(
            "SELECT {} FROM action_items WHERE post_mortem_id = $1 ORDER BY created_at ASC",
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, ActionItem>(&query)
            .bind(post_mortem_id)
            .fetch_all(db)
            .await?;
        Ok(rows)
    }

    async fn update(&self, db: &PgPool, item: &ActionItem) -> Result<ActionItem, AppError> {
        let query = format!(
            "UPDATE action_items SET title = $2, description = $3, assignee_id = $4, \
             priority = $5, status = $6, due_date = $7, related_links = $8, completed_at = $9, \
             updated_at = $10 WHERE id = $1 RETURNING {}",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, ActionItem>(&query)
            .bind(item.id)
            .bind(&item.title)
            .bind(&item.description)
            .bind(item.assignee_id)
            .bind(item.priority)
            .bind(item.status)
            .bind(item.due_date)
            .bind(&item.related_links)
            .bind(item.completed_at)
            .bind(item.updated_at)
            .fetch_optional(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Action item not found".into()))?;
        Ok(row)
    }

    async fn delete(&self, db: &PgPool, id: ActionItemId) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM action_items WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn apply_action_item_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    has_clause: &mut bool,
    filters: &ActionItemFilters,
) {
    if let Some(status) = filters.status {
        push_clause(builder, has_clause);
        builder.push("status = ").push_bind(status);
    }
    if let Some(priority) = filters.priority {
        push_clause(builder, has_clause);
        builder.push("priority = ").push_bind(priority);
    }
    if let Some(assignee_id) = filters.assignee_id {
        push_clause(builder, has_clause);
        builder.push("assignee_id = ").push_bind(assignee_id);
    }
    if let Some(post_mortem_id) = filters.post_mortem_id {
        push_clause(builder, has_clause);
        builder.push("post_mortem_id = ").push_bind(post_mortem_id);
    }
    if let Some(search) = filters
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        let pattern = format!("%{}%", search);
        push_clause(builder, has_clause);
        builder
            .push("(title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}
