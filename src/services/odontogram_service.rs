use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::config::AccessConfig;
use crate::database::models::odontogram::{is_valid_tooth_number, TOOTH_STATES};
use crate::database::models::{OdontogramTreatment, ToothState};
use crate::error::ApiError;
use crate::store::{decode, decode_all, soft_delete, Query, RecordStore, Table};

use super::{date_range, non_empty, AccessGate, ListParams, PatientResource, Tenant};

pub const DEFAULT_PAGE_SIZE: i64 = 10;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TreatmentInput {
    #[serde(default, deserialize_with = "crate::database::models::lenient::decimal")]
    pub price: Decimal,
    #[serde(default)]
    pub teeth_number: String,
    #[serde(default)]
    pub treatment_type: String,
    #[serde(default)]
    pub status: String,
    pub next_session: Option<DateTime<Utc>>,
    #[serde(default)]
    pub observations: String,
    pub date_of_treatment: Option<DateTime<Utc>>,
}

impl TreatmentInput {
    fn to_row(&self) -> Value {
        json!({
            "price": self.price,
            "teeth_number": self.teeth_number,
            "treatment_type": self.treatment_type,
            "status": self.status,
            "next_session": self.next_session,
            "observations": self.observations,
            "date_of_treatment": self.date_of_treatment,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToothStateInput {
    pub tooth_number: Option<i32>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub notes: String,
    pub treatment_date: Option<DateTime<Utc>>,
}

impl ToothStateInput {
    /// Checks the FDI number and state; an empty state means `healthy`
    fn validated(self) -> Result<Self, ApiError> {
        let tooth = self
            .tooth_number
            .ok_or_else(|| ApiError::validation_error("Tooth number is required", Some("tooth_number")))?;
        if !is_valid_tooth_number(tooth) {
            return Err(ApiError::validation_error("Invalid tooth number", Some("tooth_number")));
        }
        if !self.state.is_empty() && !TOOTH_STATES.contains(&self.state.as_str()) {
            return Err(ApiError::validation_error("Invalid tooth state", Some("state")));
        }
        Ok(self)
    }

    fn to_row(&self, patient_id: Uuid, created_by: Uuid) -> Value {
        let state = if self.state.is_empty() { "healthy" } else { self.state.as_str() };
        json!({
            "patient_id": patient_id,
            "tooth_number": self.tooth_number,
            "state": state,
            "condition": self.condition,
            "notes": self.notes,
            "treatment_date": self.treatment_date,
            "created_by": created_by,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TreatmentPage {
    pub treatments: Vec<OdontogramTreatment>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

/// Treatments and per-tooth states of a patient's chart
pub struct OdontogramService {
    store: Arc<dyn RecordStore>,
    gate: AccessGate,
}

impl OdontogramService {
    pub fn new(store: Arc<dyn RecordStore>, access: AccessConfig) -> Self {
        let gate = AccessGate::new(store.clone(), access);
        Self { store, gate }
    }

    // Treatments

    pub async fn create_treatment(&self, tenant: &Tenant, patient_id: Uuid, input: TreatmentInput) -> Result<OdontogramTreatment, ApiError> {
        self.gate.require(tenant, patient_id, PatientResource::Treatments).await?;
        let mut row = input.to_row();
        row["patient_id"] = json!(patient_id);
        Ok(decode(self.store.insert(Table::OdontogramTreatments, row).await?)?)
    }

    pub async fn list_treatments(&self, tenant: &Tenant, patient_id: Uuid, params: &ListParams) -> Result<TreatmentPage, ApiError> {
        self.gate.require(tenant, patient_id, PatientResource::Treatments).await?;
        let paging = params.paging(DEFAULT_PAGE_SIZE);
        let mut query = Query::from(Table::OdontogramTreatments)
            .eq("patient_id", patient_id)
            .live()
            .order_asc("date_of_treatment");
        if let Some(search) = non_empty(&params.search) {
            query = query.contains("treatment_type", search);
        }
        if let Some(status) = non_empty(&params.status) {
            query = query.eq("status", status);
        }
        query = date_range(
            query,
            "date_of_treatment",
            non_empty(&params.start_date),
            non_empty(&params.end_date),
        );

        let total = self.store.count(&query).await?;
        let treatments = decode_all(self.store.select(&paging.apply(query)).await?)?;
        Ok(TreatmentPage { treatments, total, page: paging.page, limit: paging.limit })
    }

    /// Loads a live treatment and checks access to its patient
    pub async fn get_treatment(&self, tenant: &Tenant, id: Uuid) -> Result<OdontogramTreatment, ApiError> {
        let query = Query::from(Table::OdontogramTreatments).eq("id", id).live();
        let treatment: OdontogramTreatment = match self.store.select_one(&query).await? {
            Some(row) => decode(row)?,
            None => return Err(ApiError::not_found("Odontogram treatment not found")),
        };
        self.gate.require(tenant, treatment.patient_id, PatientResource::Treatments).await?;
        Ok(treatment)
    }

    pub async fn update_treatment(&self, tenant: &Tenant, id: Uuid, input: TreatmentInput) -> Result<(), ApiError> {
        self.get_treatment(tenant, id).await?;
        let query = Query::from(Table::OdontogramTreatments).eq("id", id).live();
        if self.store.update(&query, input.to_row()).await?.is_empty() {
            return Err(ApiError::not_found("Odontogram treatment not found"));
        }
        Ok(())
    }

    pub async fn delete_treatment(&self, tenant: &Tenant, id: Uuid) -> Result<(), ApiError> {
        self.get_treatment(tenant, id).await?;
        let query = Query::from(Table::OdontogramTreatments).eq("id", id).live();
        self.store.update(&query, soft_delete()).await?;
        Ok(())
    }

    // Tooth states

    fn tooth_scope(patient_id: Uuid) -> Query {
        Query::from(Table::ToothStates).eq("patient_id", patient_id).live()
    }

    pub async fn list_tooth_states(&self, tenant: &Tenant, patient_id: Uuid) -> Result<Vec<ToothState>, ApiError> {
        self.gate.require(tenant, patient_id, PatientResource::ToothStates).await?;
        let query = Self::tooth_scope(patient_id).order_asc("tooth_number");
        Ok(decode_all(self.store.select(&query).await?)?)
    }

    pub async fn get_tooth_state(&self, tenant: &Tenant, patient_id: Uuid, id: Uuid) -> Result<ToothState, ApiError> {
        self.gate.require(tenant, patient_id, PatientResource::ToothStates).await?;
        match self.store.select_one(&Self::tooth_scope(patient_id).eq("id", id)).await? {
            Some(row) => Ok(decode(row)?),
            None => Err(ApiError::not_found("Tooth state not found")),
        }
    }

    pub async fn create_tooth_state(&self, tenant: &Tenant, patient_id: Uuid, input: ToothStateInput) -> Result<ToothState, ApiError> {
        self.gate.require(tenant, patient_id, PatientResource::ToothStates).await?;
        let input = input.validated()?;
        let row = input.to_row(patient_id, tenant.user_id);
        Ok(decode(self.store.insert(Table::ToothStates, row).await?)?)
    }

    pub async fn update_tooth_state(&self, tenant: &Tenant, patient_id: Uuid, id: Uuid, input: ToothStateInput) -> Result<(), ApiError> {
        self.gate.require(tenant, patient_id, PatientResource::ToothStates).await?;
        let input = input.validated()?;
        let mut patch = input.to_row(patient_id, tenant.user_id);
        if let Some(map) = patch.as_object_mut() {
            map.remove("created_by");
        }
        let updated = self.store.update(&Self::tooth_scope(patient_id).eq("id", id), patch).await?;
        if updated.is_empty() {
            return Err(ApiError::not_found("Tooth state not found"));
        }
        Ok(())
    }

    pub async fn delete_tooth_state(&self, tenant: &Tenant, patient_id: Uuid, id: Uuid) -> Result<(), ApiError> {
        self.gate.require(tenant, patient_id, PatientResource::ToothStates).await?;
        let updated = self
            .store
            .update(&Self::tooth_scope(patient_id).eq("id", id), soft_delete())
            .await?;
        if updated.is_empty() {
            return Err(ApiError::not_found("Tooth state not found"));
        }
        Ok(())
    }

    /// Retires every live state of the patient and stores `body` as the new chart, atomically
    pub async fn replace_odontogram(&self, tenant: &Tenant, patient_id: Uuid, body: Value) -> Result<Vec<ToothState>, ApiError> {
        self.gate.require(tenant, patient_id, PatientResource::ToothStates).await?;
        let items = match body {
            Value::Array(items) => items,
            _ => return Err(ApiError::bad_request("Invalid request body")),
        };

        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let input: ToothStateInput =
                serde_json::from_value(item).map_err(|_| ApiError::bad_request("Invalid request body"))?;
            rows.push(input.validated()?.to_row(patient_id, tenant.user_id));
        }

        let created = self
            .store
            .replace_all(&Self::tooth_scope(patient_id), soft_delete(), rows)
            .await?;
        info!("Replaced odontogram for patient {} with {} state(s)", patient_id, created.len());
        Ok(decode_all(created)?)
    }
}
