use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::AccessConfig;
use crate::database::models::odontogram::is_valid_tooth_number;
use crate::database::models::{PatientDoc, PatientImage};
use crate::error::ApiError;
use crate::store::{decode, decode_all, soft_delete, Query, RecordStore, Table};

use super::{non_empty, AccessGate, ListParams, PatientResource, Tenant};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const DEFAULT_IMAGE_TYPE: &str = "photo";
pub const DEFAULT_IMAGE_CATEGORY: &str = "diagnostic";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocInput {
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageInput {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub file_size: i64,
    #[serde(default)]
    pub mime_type: String,
    pub tooth_number: Option<i32>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub is_public: bool,
}

impl ImageInput {
    fn to_row(&self) -> Result<Value, ApiError> {
        if let Some(n) = self.tooth_number {
            if !is_valid_tooth_number(n) {
                return Err(ApiError::validation_error("Invalid tooth number", Some("tooth_number")));
            }
        }
        let kind = if self.kind.trim().is_empty() { DEFAULT_IMAGE_TYPE } else { self.kind.as_str() };
        let category = if self.category.trim().is_empty() {
            DEFAULT_IMAGE_CATEGORY
        } else {
            self.category.as_str()
        };
        Ok(json!({
            "type": kind,
            "title": self.title,
            "description": self.description,
            "url": self.url,
            "file_name": self.file_name,
            "file_size": self.file_size,
            "mime_type": self.mime_type,
            "tooth_number": self.tooth_number,
            "category": category,
            "is_public": self.is_public,
        }))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocPage {
    pub docs: Vec<PatientDoc>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

/// Patient documents and clinical images
pub struct DocumentService {
    store: Arc<dyn RecordStore>,
    gate: AccessGate,
}

impl DocumentService {
    pub fn new(store: Arc<dyn RecordStore>, access: AccessConfig) -> Self {
        let gate = AccessGate::new(store.clone(), access);
        Self { store, gate }
    }

    fn scope(table: Table, patient_id: Uuid) -> Query {
        Query::from(table).eq("patient_id", patient_id).live()
    }

    // Documents

    pub async fn list_docs(&self, tenant: &Tenant, patient_id: Uuid, params: &ListParams) -> Result<DocPage, ApiError> {
        self.gate.require(tenant, patient_id, PatientResource::Documents).await?;
        let paging = params.paging(DEFAULT_PAGE_SIZE);
        let mut query = Self::scope(Table::PatientDocs, patient_id).order_asc("created_at");
        if let Some(search) = non_empty(&params.search) {
            query = query.contains("file_name", search);
        }
        let total = self.store.count(&query).await?;
        let docs = decode_all(self.store.select(&paging.apply(query)).await?)?;
        Ok(DocPage { docs, total, page: paging.page, limit: paging.limit })
    }

    pub async fn create_doc(&self, tenant: &Tenant, patient_id: Uuid, input: DocInput) -> Result<PatientDoc, ApiError> {
        self.gate.require(tenant, patient_id, PatientResource::Documents).await?;
        let row = json!({ "patient_id": patient_id, "file_name": input.file_name, "url": input.url });
        Ok(decode(self.store.insert(Table::PatientDocs, row).await?)?)
    }

    pub async fn get_doc(&self, tenant: &Tenant, patient_id: Uuid, id: Uuid) -> Result<PatientDoc, ApiError> {
        self.gate.require(tenant, patient_id, PatientResource::Documents).await?;
        match self.store.select_one(&Self::scope(Table::PatientDocs, patient_id).eq("id", id)).await? {
            Some(row) => Ok(decode(row)?),
            None => Err(ApiError::not_found("Patient document not found")),
        }
    }

    pub async fn update_doc(&self, tenant: &Tenant, patient_id: Uuid, id: Uuid, input: DocInput) -> Result<(), ApiError> {
        self.gate.require(tenant, patient_id, PatientResource::Documents).await?;
        let patch = json!({ "file_name": input.file_name, "url": input.url });
        let updated = self
            .store
            .update(&Self::scope(Table::PatientDocs, patient_id).eq("id", id), patch)
            .await?;
        if updated.is_empty() {
            return Err(ApiError::not_found("Patient document not found"));
        }
        Ok(())
    }

    pub async fn delete_doc(&self, tenant: &Tenant, patient_id: Uuid, id: Uuid) -> Result<(), ApiError> {
        self.gate.require(tenant, patient_id, PatientResource::Documents).await?;
        let updated = self
            .store
            .update(&Self::scope(Table::PatientDocs, patient_id).eq("id", id), soft_delete())
            .await?;
        if updated.is_empty() {
            return Err(ApiError::not_found("Patient document not found"));
        }
        Ok(())
    }

    // Images

    pub async fn list_images(&self, tenant: &Tenant, patient_id: Uuid, params: &ListParams) -> Result<Vec<PatientImage>, ApiError> {
        self.gate.require(tenant, patient_id, PatientResource::Images).await?;
        let mut query = Self::scope(Table::PatientImages, patient_id).order_asc("created_at");
        if let Some(kind) = non_empty(&params.kind) {
            query = query.eq("type", kind);
        }
        if let Some(category) = non_empty(&params.category) {
            query = query.eq("category", category);
        }
        Ok(decode_all(self.store.select(&query).await?)?)
    }

    pub async fn create_image(&self, tenant: &Tenant, patient_id: Uuid, input: ImageInput) -> Result<PatientImage, ApiError> {
        self.gate.require(tenant, patient_id, PatientResource::Images).await?;
        self.insert_image(tenant, patient_id, input).await
    }

    /// Inserts an image row without the access check; callers have already passed the gate
    pub(crate) async fn insert_image(&self, tenant: &Tenant, patient_id: Uuid, input: ImageInput) -> Result<PatientImage, ApiError> {
        let mut row = input.to_row()?;
        row["patient_id"] = json!(patient_id);
        row["created_by"] = json!(tenant.user_id);
        Ok(decode(self.store.insert(Table::PatientImages, row).await?)?)
    }

    pub async fn get_image(&self, tenant: &Tenant, patient_id: Uuid, id: Uuid) -> Result<PatientImage, ApiError> {
        self.gate.require(tenant, patient_id, PatientResource::Images).await?;
        match self.store.select_one(&Self::scope(Table::PatientImages, patient_id).eq("id", id)).await? {
            Some(row) => Ok(decode(row)?),
            None => Err(ApiError::not_found("Patient image not found")),
        }
    }

    pub async fn update_image(&self, tenant: &Tenant, patient_id: Uuid, id: Uuid, input: ImageInput) -> Result<(), ApiError> {
        self.gate.require(tenant, patient_id, PatientResource::Images).await?;
        let patch = input.to_row()?;
        let updated = self
            .store
            .update(&Self::scope(Table::PatientImages, patient_id).eq("id", id), patch)
            .await?;
        if updated.is_empty() {
            return Err(ApiError::not_found("Patient image not found"));
        }
        Ok(())
    }

    pub async fn delete_image(&self, tenant: &Tenant, patient_id: Uuid, id: Uuid) -> Result<(), ApiError> {
        self.gate.require(tenant, patient_id, PatientResource::Images).await?;
        let updated = self
            .store
            .update(&Self::scope(Table::PatientImages, patient_id).eq("id", id), soft_delete())
            .await?;
        if updated.is_empty() {
            return Err(ApiError::not_found("Patient image not found"));
        }
        Ok(())
    }

    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }
}
