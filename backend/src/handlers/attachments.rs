use axum::{
    body::Body,
    extract::{Extension, Multipart, Path, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    error::AppError,
    handlers::common::{parse_id, MessageResponse},
    models::{attachment::Attachment, user::User},
    services::attachment::{AttachmentService, UploadedFile},
    state::AppState,
    types::{AttachmentId, IncidentId},
};

const FILE_FIELD: &str = "file";

pub async fn upload_attachment(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(incident_id): Path<String>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Attachment>), AppError> {
    let incident_id: IncidentId = parse_id("incident_id", &incident_id)?;
    let file = read_file_field(multipart).await?;
    let attachment = AttachmentService::from_state(&state)
        .upload(&user, incident_id, file)
        .await?;
    Ok((StatusCode::CREATED, Json(attachment)))
}

pub async fn list_attachments(
    State(state): State<AppState>,
    Path(incident_id): Path<String>,
) -> Result<Json<Vec<Attachment>>, AppError> {
    let incident_id: IncidentId = parse_id("incident_id", &incident_id)?;
    let attachments = AttachmentService::from_state(&state)
        .list(incident_id)
        .await?;
    Ok(Json(attachments))
}

pub async fn download_attachment(
    State(state): State<AppState>,
    Path((incident_id, attachment_id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let incident_id: IncidentId = parse_id("incident_id", &incident_id)?;
    let attachment_id: AttachmentId = parse_id("attachment_id", &attachment_id)?;
    let (attachment, bytes) = AttachmentService::from_state(&state)
        .download(incident_id, attachment_id)
        .await?;

    let mut response = Body::from(bytes).into_response();
    let content_type = HeaderValue::from_str(&attachment.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    response.headers_mut().insert(CONTENT_TYPE, content_type);
    if let Ok(disposition) = HeaderValue::from_str(&content_disposition(&attachment.file_name)) {
        response
            .headers_mut()
            .insert(CONTENT_DISPOSITION, disposition);
    }
    Ok(response)
}

pub async fn delete_attachment(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path((incident_id, attachment_id)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, AppError> {
    let incident_id: IncidentId = parse_id("incident_id", &incident_id)?;
    let attachment_id: AttachmentId = parse_id("attachment_id", &attachment_id)?;
    AttachmentService::from_state(&state)
        .delete(&user, incident_id, attachment_id)
        .await?;
    Ok(Json(MessageResponse::new("Attachment deleted successfully")))
}

async fn read_file_field(mut multipart: Multipart) -> Result<UploadedFile, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::BadRequest(format!("Invalid multipart body: {err}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|err| AppError::BadRequest(format!("Failed to read upload: {err}")))?;
        return Ok(UploadedFile {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }
    Err(AppError::validation("file: is required"))
}

/// Quotes and backslashes would break the quoted filename parameter.
fn content_disposition(file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .filter(|c| !matches!(c, '"' | '\\') && !c.is_control())
        .collect();
    format!("attachment; filename=\"{safe}\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_disposition_strips_quotes() {
        assert_eq!(
            content_disposition("report \"final\".pdf"),
            "attachment; filename=\"report final.pdf\""
        );
    }
}
