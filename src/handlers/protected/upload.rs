// handlers/protected/upload.rs - POST /api/patients/:id/upload
//
// Multipart form: `file` (required, image/*) plus optional `type`, `category`,
// `title`, `description` and `tooth_number` text fields in any order.

use axum::extract::{multipart::Field, Extension, Multipart, Path, State};
use tracing::debug;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::handlers::parse_id;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::upload_service::{StoredFile, UploadError, UploadMeta, UploadResult, UploadService};
use crate::services::Tenant;

pub async fn upload_image(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(patient_id): Path<String>,
    multipart: Multipart,
) -> ApiResult<UploadResult> {
    let patient_id = parse_id(&patient_id, "Invalid patient ID")?;
    let uploads = state.uploads();
    uploads.authorize(&tenant, patient_id).await?;

    let mut stored: Option<StoredFile> = None;
    let meta = match read_form(&uploads, patient_id, multipart, &mut stored).await {
        Ok(meta) => meta,
        Err(e) => {
            if let Some(file) = &stored {
                uploads.discard(file).await;
            }
            return Err(e);
        }
    };

    let file = stored.ok_or(UploadError::NoFile)?;
    let result = uploads.record(&tenant, patient_id, file, meta).await?;
    Ok(ApiResponse::created(result))
}

/// Streams the `file` part to disk and collects the text fields
async fn read_form(
    uploads: &UploadService,
    patient_id: Uuid,
    mut multipart: Multipart,
    stored: &mut Option<StoredFile>,
) -> Result<UploadMeta, ApiError> {
    let mut meta = UploadMeta::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::Multipart(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let original = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let file = uploads.store_file(patient_id, &original, &content_type, field).await?;
                if let Some(previous) = stored.replace(file) {
                    uploads.discard(&previous).await;
                }
            }
            "type" => meta.kind = text(field).await?,
            "category" => meta.category = text(field).await?,
            "title" => meta.title = text(field).await?,
            "description" => meta.description = text(field).await?,
            "tooth_number" => meta.tooth_number = text(field).await?.trim().parse().ok(),
            other => debug!("Ignoring upload form field {:?}", other),
        }
    }

    Ok(meta)
}

async fn text(field: Field<'_>) -> Result<String, ApiError> {
    Ok(field.text().await.map_err(|e| UploadError::Multipart(e.to_string()))?)
}
