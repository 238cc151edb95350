//! Media upload endpoint
//!
//! Files are spooled to a temporary file while the request streams in,
//! then sent to the media bucket.

use axum::{
    Json,
    extract::{Multipart, State},
};
use tokio::io::AsyncWriteExt;

use super::dto::{UploadResponse, UploadedFile};
use crate::AppState;
use crate::auth::CurrentUser;
use crate::data::MediaType;
use crate::error::AppError;
use crate::metrics::{MEDIA_BYTES_UPLOADED, MEDIA_UPLOADS_TOTAL};
use crate::storage::extension_for;

pub const MAX_FILES: usize = 5;
pub const MAX_FILE_BYTES: usize = 200 * 1024 * 1024;
/// Request body cap: every file at full size plus room for multipart framing
pub const MAX_BODY_BYTES: usize = MAX_FILES * MAX_FILE_BYTES + 1024 * 1024;

/// A file received and written to disk, not yet uploaded
struct SpooledFile {
    path: tempfile::TempPath,
    content_type: String,
    media_type: MediaType,
    file_name: Option<String>,
    size: usize,
}

async fn spool_field(
    field: &mut axum::extract::multipart::Field<'_>,
    content_type: String,
    media_type: MediaType,
) -> Result<SpooledFile, AppError> {
    let file_name = field.file_name().map(str::to_string);
    let (std_file, path) = tempfile::NamedTempFile::new()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to create temp file: {e}")))?
        .into_parts();
    let mut file = tokio::fs::File::from_std(std_file);

    let mut size = 0usize;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read file: {}", e)))?
    {
        size += chunk.len();
        if size > MAX_FILE_BYTES {
            return Err(AppError::Validation(format!(
                "File too large: exceeds {} bytes",
                MAX_FILE_BYTES
            )));
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to spool upload: {e}")))?;
    }
    file.flush()
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to spool upload: {e}")))?;

    if size == 0 {
        return Err(AppError::validation("Uploaded file is empty"));
    }

    Ok(SpooledFile {
        path,
        content_type,
        media_type,
        file_name,
        size,
    })
}

/// POST /api/upload
///
/// Accepts up to five images or videos in `files` (or `images`) fields.
pub async fn upload(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut spooled: Vec<SpooledFile> = Vec::new();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to parse multipart: {}", e)))?
    {
        if !matches!(field.name(), Some("files") | Some("images")) {
            continue;
        }
        if spooled.len() == MAX_FILES {
            return Err(AppError::Validation(format!(
                "At most {MAX_FILES} files per upload"
            )));
        }

        let content_type = field
            .content_type()
            .map(str::to_string)
            .ok_or_else(|| AppError::validation("Missing content type for uploaded file"))?;
        let media_type = MediaType::from_mime(&content_type)
            .ok_or_else(|| AppError::validation("Only images and videos are allowed"))?;

        spooled.push(spool_field(&mut field, content_type, media_type).await?);
    }

    if spooled.is_empty() {
        return Err(AppError::validation("No files provided"));
    }

    let mut files: Vec<UploadedFile> = Vec::with_capacity(spooled.len());
    for file in &spooled {
        let extension = extension_for(&file.content_type, file.file_name.as_deref());
        let key = format!("posts/{}.{}", ulid::Ulid::new().to_string().to_lowercase(), extension);

        match state
            .storage
            .upload_file(&key, &file.path, &file.content_type)
            .await
        {
            Ok(url) => {
                MEDIA_UPLOADS_TOTAL.inc();
                MEDIA_BYTES_UPLOADED.inc_by(file.size as f64);
                files.push(UploadedFile {
                    url,
                    media_type: file.media_type,
                });
            }
            Err(error) => {
                for uploaded in &files {
                    state.storage.delete_url_best_effort(&uploaded.url).await;
                }
                return Err(error);
            }
        }
    }

    tracing::info!(user_id = user.id(), count = files.len(), "Media uploaded");
    Ok(Json(UploadResponse { files }))
}
