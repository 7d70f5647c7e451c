use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::types::{AttachmentId, IncidentId, UserId};

pub const MAX_ATTACHMENT_BYTES: usize = 50 * 1024 * 1024;

pub const ALLOWED_EXTENSIONS: [&str; 16] = [
    ".jpg", ".jpeg", ".png", ".gif", ".webp", ".pdf", ".txt", ".log", ".md", ".json", ".xml",
    ".yaml", ".yml", ".zip", ".tar", ".gz",
];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
/// Metadata for a file stored in object storage.
pub struct Attachment {
    pub id: AttachmentId,
    pub incident_id: IncidentId,
    pub user_id: UserId,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    /// Object key, `incidents/{incident_id}/{uuid}{ext}`.
    pub storage_key: String,
    pub created_at: DateTime<Utc>,
}

/// Lower-cased extension including the dot, or an empty string.
pub fn file_extension(file_name: &str) -> String {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

pub fn is_allowed_extension(extension: &str) -> bool {
    ALLOWED_EXTENSIONS.contains(&extension)
}

pub fn storage_key_for(incident_id: IncidentId, extension: &str) -> String {
    format!("incidents/{}/{}{}", incident_id, uuid::Uuid::new_v4(), extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased_with_dot() {
        assert_eq!(file_extension("Screen.PNG"), ".png");
        assert_eq!(file_extension("archive.tar.gz"), ".gz");
        assert_eq!(file_extension("README"), "");
    }

    #[test]
    fn only_listed_extensions_are_allowed() {
        assert!(is_allowed_extension(".log"));
        assert!(is_allowed_extension(".yml"));
        assert!(!is_allowed_extension(".exe"));
        assert!(!is_allowed_extension(""));
    }

    #[test]
    fn storage_key_is_scoped_by_incident() {
        let incident_id = IncidentId::new();
        let key = storage_key_for(incident_id, ".pdf");
        assert!(key.starts_with(&format!("incidents/{}/", incident_id)));
        assert!(key.ends_with(".pdf"));
    }
}
