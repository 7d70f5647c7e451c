use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::tag::{Tag, TagPayload, DEFAULT_TAG_COLOR};
use crate::repositories::{TagRepository, TagRepositoryTrait};
use crate::state::AppState;
use crate::types::TagId;

pub struct TagService {
    pool: PgPool,
    tags: Arc<dyn TagRepositoryTrait>,
}

impl TagService {
    pub fn from_state(state: &AppState) -> Self {
        Self::with_repository(state.pool.clone(), Arc::new(TagRepository::new()))
    }

    pub fn with_repository(pool: PgPool, tags: Arc<dyn TagRepositoryTrait>) -> Self {
        Self { pool, tags }
    }

    pub async fn list(&self) -> Result<Vec<Tag>, AppError> {
        self.tags.list(&self.pool).await
    }

    pub async fn create(&self, payload: TagPayload) -> Result<Tag, AppError> {
        let tag = Tag::new(payload.name.trim().to_string(), payload.color);
        self.tags.create(&self.pool, &tag).await
    }

    pub async fn update(&self, id: TagId, payload: TagPayload) -> Result<Tag, AppError> {
        let mut tag = self
            .tags
            .find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Tag not found".into()))?;
        tag.name = payload.name.trim().to_string();
        tag.color = payload
            .color
            .filter(|color| !color.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TAG_COLOR.to_string());
        tag.updated_at = Utc::now();
        self.tags.update(&self.pool, &tag).await
    }

    pub async fn delete(&self, id: TagId) -> Result<(), AppError> {
        if !self.tags.delete(&self.pool, id).await? {
            return Err(AppError::NotFound("Tag not found".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::tag::MockTagRepositoryTrait;
    use crate::services::test_support::lazy_pool;

    #[tokio::test]
    async fn create_defaults_color() {
        let mut tags = MockTagRepositoryTrait::new();
        tags.expect_create()
            .withf(|_, tag| tag.color == DEFAULT_TAG_COLOR && tag.name == "database")
            .returning(|_, tag| Ok(tag.clone()));
        let service = TagService::with_repository(lazy_pool(), Arc::new(tags));
        let tag = service
            .create(TagPayload {
                name: " database ".into(),
                color: None,
            })
            .await
            .expect("create");
        assert_eq!(tag.color, "#808080");
    }

    #[tokio::test]
    async fn duplicate_name_surfaces_conflict() {
        let mut tags = MockTagRepositoryTrait::new();
        tags.expect_create()
            .returning(|_, _| Err(AppError::Conflict("Resource already exists".into())));
        let service = TagService::with_repository(lazy_pool(), Arc::new(tags));
        let result = service
            .create(TagPayload {
                name: "network".into(),
                color: Some("#00ff00".into()),
            })
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn missing_tag_is_not_found() {
        let mut tags = MockTagRepositoryTrait::new();
        tags.expect_delete().returning(|_, _| Ok(false));
        tags.expect_find_by_id().returning(|_, _| Ok(None));
        let service = TagService::with_repository(lazy_pool(), Arc::new(tags));
        assert!(matches!(
            service.delete(TagId::new()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service
                .update(
                    TagId::new(),
                    TagPayload {
                        name: "x".into(),
                        color: None
                    }
                )
                .await,
            Err(AppError::NotFound(_))
        ));
    }
}
