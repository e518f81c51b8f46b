use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{AccessConfig, ServerConfig};
use crate::database::models::PatientImage;
use crate::error::ApiError;
use crate::store::{RecordStore, StoreError};

use super::document_service::{DocumentService, ImageInput};
use super::{PatientResource, Tenant};

pub const ALLOWED_IMAGE_TYPES: [&str; 7] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/bmp",
    "image/tiff",
];

/// Public prefix the upload directory is served under
pub const PUBLIC_PREFIX: &str = "/uploads";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file provided")]
    NoFile,
    #[error("Unsupported content type: {0}")]
    UnsupportedType(String),
    #[error("File too large")]
    TooLarge,
    #[error("Multipart error: {0}")]
    Multipart(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A file written under the upload directory
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub path: PathBuf,
    pub url: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: i64,
}

/// Form fields sent alongside the file
#[derive(Debug, Clone, Default)]
pub struct UploadMeta {
    pub kind: String,
    pub category: String,
    pub title: String,
    pub description: String,
    pub tooth_number: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadResult {
    pub url: String,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub image: PatientImage,
}

pub fn is_allowed_image(content_type: &str) -> bool {
    ALLOWED_IMAGE_TYPES.contains(&content_type.trim().to_ascii_lowercase().as_str())
}

/// `patient_{id}_{unix}_{stem}{ext}` with the stem reduced to filename-safe characters
pub fn stored_name(patient_id: Uuid, unix: i64, original: &str) -> String {
    let base = Path::new(original)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");
    let path = Path::new(base);
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();
    let stem: String = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("upload")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let stem = if stem.is_empty() { "upload".to_string() } else { stem };
    format!("patient_{}_{}_{}{}", patient_id, unix, stem, ext)
}

/// Inserts `_{suffix}` before the extension of a stored name
fn with_suffix(name: &str, suffix: &str) -> String {
    match name.rfind('.') {
        Some(dot) => format!("{}_{}{}", &name[..dot], suffix, &name[dot..]),
        None => format!("{}_{}", name, suffix),
    }
}

const CREATE_ATTEMPTS: usize = 5;

/// Opens a new file in `dir` without replacing an existing one; a taken name gets a short random suffix
async fn create_unique(dir: &Path, name: String) -> Result<(String, fs::File), UploadError> {
    let mut candidate = name.clone();
    for _ in 0..CREATE_ATTEMPTS {
        match fs::OpenOptions::new().write(true).create_new(true).open(dir.join(&candidate)).await {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let short = Uuid::new_v4().simple().to_string();
                candidate = with_suffix(&name, &short[..8]);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(UploadError::Io(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        format!("no free upload name for {}", name),
    )))
}

/// Streams patient images to disk and records them as image rows
pub struct UploadService {
    documents: DocumentService,
    root: PathBuf,
    max_bytes: usize,
}

impl UploadService {
    pub fn new(store: Arc<dyn RecordStore>, access: AccessConfig, server: &ServerConfig) -> Self {
        Self {
            documents: DocumentService::new(store, access),
            root: PathBuf::from(&server.upload_dir),
            max_bytes: server.max_upload_bytes,
        }
    }

    pub async fn authorize(&self, tenant: &Tenant, patient_id: Uuid) -> Result<(), ApiError> {
        self.documents.gate().require(tenant, patient_id, PatientResource::Images).await
    }

    /// Writes `chunks` to `{root}/patients/`; a partial file is removed on any failure
    pub async fn store_file<S, E>(
        &self,
        patient_id: Uuid,
        original_name: &str,
        content_type: &str,
        chunks: S,
    ) -> Result<StoredFile, UploadError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: std::fmt::Display,
    {
        if !is_allowed_image(content_type) {
            return Err(UploadError::UnsupportedType(content_type.to_string()));
        }

        let dir = self.root.join("patients");
        fs::create_dir_all(&dir).await?;
        let (name, file) = create_unique(&dir, stored_name(patient_id, Utc::now().timestamp(), original_name)).await?;
        let path = dir.join(&name);

        match self.write_capped(file, chunks).await {
            Ok(size) => {
                info!("Stored upload {} ({} bytes)", path.display(), size);
                Ok(StoredFile {
                    url: format!("{}/patients/{}", PUBLIC_PREFIX, name),
                    path,
                    original_name: original_name.to_string(),
                    mime_type: content_type.trim().to_ascii_lowercase(),
                    size,
                })
            }
            Err(e) => {
                remove_quietly(&path).await;
                Err(e)
            }
        }
    }

    async fn write_capped<S, E>(&self, mut file: fs::File, chunks: S) -> Result<i64, UploadError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: std::fmt::Display,
    {
        let mut written: usize = 0;
        futures::pin_mut!(chunks);
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| UploadError::Multipart(e.to_string()))?;
            written += chunk.len();
            if written > self.max_bytes {
                return Err(UploadError::TooLarge);
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(written as i64)
    }

    /// Inserts the image row for a stored file; the file is removed if the insert fails
    pub async fn record(&self, tenant: &Tenant, patient_id: Uuid, file: StoredFile, meta: UploadMeta) -> Result<UploadResult, ApiError> {
        let input = ImageInput {
            kind: meta.kind,
            title: meta.title,
            description: meta.description,
            url: file.url.clone(),
            file_name: file.original_name.clone(),
            file_size: file.size,
            mime_type: file.mime_type.clone(),
            tooth_number: meta.tooth_number,
            category: meta.category,
            is_public: false,
        };

        match self.documents.insert_image(tenant, patient_id, input).await {
            Ok(image) => Ok(UploadResult {
                url: file.url,
                file_name: file.original_name,
                file_size: file.size,
                mime_type: file.mime_type,
                image,
            }),
            Err(e) => {
                remove_quietly(&file.path).await;
                Err(e)
            }
        }
    }

    /// Drops a stored file when the request is abandoned after writing it
    pub async fn discard(&self, file: &StoredFile) {
        remove_quietly(&file.path).await;
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove upload {}: {}", path.display(), e);
        }
    }
}
