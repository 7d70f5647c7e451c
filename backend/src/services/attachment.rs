use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::attachment::{
    file_extension, is_allowed_extension, storage_key_for, Attachment, ALLOWED_EXTENSIONS,
    MAX_ATTACHMENT_BYTES,
};
use crate::models::user::User;
use crate::repositories::{
    AttachmentRepository, AttachmentRepositoryTrait, IncidentRepository, IncidentRepositoryTrait,
};
use crate::services::storage::ObjectStorage;
use crate::state::AppState;
use crate::types::{AttachmentId, IncidentId};

/// A file received from a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

pub struct AttachmentService {
    pool: PgPool,
    attachments: Arc<dyn AttachmentRepositoryTrait>,
    incidents: Arc<dyn IncidentRepositoryTrait>,
    storage: Arc<dyn ObjectStorage>,
}

impl AttachmentService {
    pub fn from_state(state: &AppState) -> Self {
        Self::with_repositories(
            state.pool.clone(),
            Arc::new(AttachmentRepository::new()),
            Arc::new(IncidentRepository::new()),
            Arc::clone(&state.storage),
        )
    }

    pub fn with_repositories(
        pool: PgPool,
        attachments: Arc<dyn AttachmentRepositoryTrait>,
        incidents: Arc<dyn IncidentRepositoryTrait>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        Self {
            pool,
            attachments,
            incidents,
            storage,
        }
    }

    async fn ensure_incident(&self, incident_id: IncidentId) -> Result<(), AppError> {
        self.incidents
            .find_by_id(&self.pool, incident_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Incident not found".into()))?;
        Ok(())
    }

    async fn load(
        &self,
        incident_id: IncidentId,
        id: AttachmentId,
    ) -> Result<Attachment, AppError> {
        self.attachments
            .find_by_id(&self.pool, id)
            .await?
            .filter(|attachment| attachment.incident_id == incident_id)
            .ok_or_else(|| AppError::NotFound("Attachment not found".into()))
    }

    pub async fn upload(
        &self,
        actor: &User,
        incident_id: IncidentId,
        file: UploadedFile,
    ) -> Result<Attachment, AppError> {
        if !actor.can_edit() {
            return Err(AppError::Forbidden("Viewers cannot upload attachments".into()));
        }
        self.ensure_incident(incident_id).await?;

        let file_name = file.file_name.trim().to_string();
        if file_name.is_empty() {
            return Err(AppError::validation("file: a file name is required"));
        }
        if file.bytes.is_empty() {
            return Err(AppError::validation("file: must not be empty"));
        }
        if file.bytes.len() > MAX_ATTACHMENT_BYTES {
            return Err(AppError::validation("file: exceeds the 50MB limit"));
        }
        let extension = file_extension(&file_name);
        if !is_allowed_extension(&extension) {
            return Err(AppError::validation(format!(
                "file: extension not allowed (allowed: {})",
                ALLOWED_EXTENSIONS.join(" ")
            )));
        }

        let mime_type = file
            .content_type
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let storage_key = storage_key_for(incident_id, &extension);
        let file_size = file.bytes.len() as i64;

        self.storage
            .put(&storage_key, file.bytes, &mime_type)
            .await
            .map_err(|err| AppError::ExternalApi(format!("Failed to store attachment: {}", err)))?;

        let attachment = Attachment {
            id: AttachmentId::new(),
            incident_id,
            user_id: actor.id,
            file_name,
            file_size,
            mime_type,
            storage_key,
            created_at: Utc::now(),
        };
        match self.attachments.create(&self.pool, &attachment).await {
            Ok(saved) => {
                tracing::info!(
                    attachment_id = %saved.id,
                    incident_id = %incident_id,
                    file_size,
                    "Attachment uploaded"
                );
                Ok(saved)
            }
            Err(err) => {
                if let Err(cleanup) = self.storage.delete(&attachment.storage_key).await {
                    tracing::warn!(
                        error = %cleanup,
                        storage_key = %attachment.storage_key,
                        "Failed to remove orphaned attachment blob"
                    );
                }
                Err(err)
            }
        }
    }

    pub async fn list(&self, incident_id: IncidentId) -> Result<Vec<Attachment>, AppError> {
        self.ensure_incident(incident_id).await?;
        self.attachments
            .list_by_incident(&self.pool, incident_id)
            .await
    }

    pub async fn download(
        &self,
        incident_id: IncidentId,
        id: AttachmentId,
    ) -> Result<(Attachment, Vec<u8>), AppError> {
        let attachment = self.load(incident_id, id).await?;
        let bytes = self
            .storage
            .get(&attachment.storage_key)
            .await
            .map_err(|err| AppError::ExternalApi(format!("Failed to fetch attachment: {}", err)))?;
        Ok((attachment, bytes))
    }

    /// Admins and the uploader may delete; blob removal is best effort.
    pub async fn delete(
        &self,
        actor: &User,
        incident_id: IncidentId,
        id: AttachmentId,
    ) -> Result<(), AppError> {
        let attachment = self.load(incident_id, id).await?;
        if !actor.is_admin() && attachment.user_id != actor.id {
            return Err(AppError::Forbidden(
                "Only the uploader or an administrator can delete this attachment".into(),
            ));
        }
        self.attachments.delete(&self.pool, id).await?;
        if let Err(err) = self.storage.delete(&attachment.storage_key).await {
            tracing::warn!(
                error = %err,
                storage_key = %attachment.storage_key,
                "Failed to delete attachment blob"
            );
        }
        Ok(())
    }
}
