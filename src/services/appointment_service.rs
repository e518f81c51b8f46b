use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;
use uuid::Uuid;

use crate::database::models::{Appointment, AppointmentStatus, Patient};
use crate::error::ApiError;
use crate::store::{decode, decode_all, Guard, Query, RecordStore, StoreError, Table};

use super::{date_range, day_start, non_empty, parse_day, ListParams, Tenant};

pub const SLOT_UNIQUE: &str = "appointments_slot_unique";
pub const DEFAULT_DURATION_MINUTES: i32 = 30;
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Body of `POST /api/appointments`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewAppointment {
    pub patient_id: Option<Uuid>,
    pub date_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub notes: Option<String>,
    pub duration: Option<i32>,
    pub priority: Option<String>,
    pub room: Option<String>,
    pub is_first_visit: Option<bool>,
}

/// Body of `PUT /api/appointments/{id}`; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentPatch {
    pub patient_id: Option<Uuid>,
    pub date_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub notes: Option<String>,
    pub duration: Option<i32>,
    pub priority: Option<String>,
    pub room: Option<String>,
    pub is_first_visit: Option<bool>,
}

/// Optional body of the cancel action
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelBody {
    #[serde(default)]
    pub reason: String,
}

/// Flattened list entry with the patient's contact details inlined
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentRow {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub patient_email: String,
    pub patient_phone: String,
    pub date: String,
    pub time: String,
    pub duration: i32,
    pub treatment: String,
    pub status: String,
    pub notes: String,
    pub is_first_visit: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentPage {
    pub data: Vec<AppointmentRow>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub success: bool,
    pub message: &'static str,
}

fn parse_status(status: &str) -> Result<AppointmentStatus, ApiError> {
    AppointmentStatus::parse(status).ok_or_else(|| ApiError::validation_error("Invalid status", Some("status")))
}

fn slot_guard(doctor_id: Uuid, date_time: DateTime<Utc>) -> Guard {
    Guard::new(SLOT_UNIQUE)
        .eq("doctor_id", doctor_id)
        .eq("date_time", date_time)
        .neq("status", AppointmentStatus::Cancelled.as_str())
        .live()
}

/// Guard for a row that ends up active at `date_time`: needed when it moves or leaves `cancelled`
fn rebook_guards(tenant: &Tenant, id: Uuid, existing: &Appointment, date_time: DateTime<Utc>, status: &str) -> Vec<Guard> {
    let cancelled = AppointmentStatus::Cancelled.as_str();
    let reactivated = existing.status == cancelled && status != cancelled;
    if status != cancelled && (date_time != existing.date_time || reactivated) {
        vec![slot_guard(tenant.doctor_id, date_time).neq("id", id)]
    } else {
        Vec::new()
    }
}

fn slot_conflict(err: StoreError) -> ApiError {
    if err.is_conflict(SLOT_UNIQUE) {
        ApiError::conflict("Time slot already booked")
    } else {
        err.into()
    }
}

pub struct AppointmentService {
    store: Arc<dyn RecordStore>,
}

impl AppointmentService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    fn scoped(tenant: &Tenant, id: Uuid) -> Query {
        Query::from(Table::Appointments)
            .eq("id", id)
            .eq("doctor_id", tenant.doctor_id)
            .live()
    }

    pub async fn create(&self, tenant: &Tenant, body: NewAppointment) -> Result<Appointment, ApiError> {
        let patient_id = body
            .patient_id
            .ok_or_else(|| ApiError::validation_error("Patient ID is required", Some("patient_id")))?;
        let date_time = body
            .date_time
            .ok_or_else(|| ApiError::validation_error("Date and time are required", Some("date_time")))?;
        let status = match non_empty(&body.status) {
            Some(s) => parse_status(s)?,
            None => AppointmentStatus::Scheduled,
        };
        let duration = body.duration.filter(|d| *d > 0).unwrap_or(DEFAULT_DURATION_MINUTES);
        let end_time = body
            .end_time
            .unwrap_or_else(|| date_time + Duration::minutes(i64::from(duration)));

        let row = json!({
            "patient_id": patient_id,
            "doctor_id": tenant.doctor_id,
            "created_by": tenant.doctor_id,
            "date_time": date_time,
            "end_time": end_time,
            "status": status.as_str(),
            "type": body.kind.unwrap_or_default(),
            "notes": body.notes.unwrap_or_default(),
            "duration": duration,
            "priority": body.priority.unwrap_or_default(),
            "room": body.room.unwrap_or_default(),
            "is_first_visit": body.is_first_visit.unwrap_or(false),
        });

        let guards = [slot_guard(tenant.doctor_id, date_time)];
        let created = self
            .store
            .insert_guarded(Table::Appointments, row, &guards)
            .await
            .map_err(slot_conflict)?;
        let appointment: Appointment = decode(created)?;
        info!("Created appointment {} for doctor {}", appointment.id, tenant.doctor_id);
        Ok(appointment)
    }

    pub async fn get(&self, tenant: &Tenant, id: Uuid) -> Result<Appointment, ApiError> {
        match self.store.select_one(&Self::scoped(tenant, id)).await? {
            Some(row) => Ok(decode(row)?),
            None => Err(ApiError::not_found("Appointment not found")),
        }
    }

    pub async fn list(&self, tenant: &Tenant, params: &ListParams) -> Result<AppointmentPage, ApiError> {
        let paging = params.paging(DEFAULT_PAGE_SIZE);
        let mut query = Query::from(Table::Appointments)
            .eq("doctor_id", tenant.doctor_id)
            .live()
            .order_asc("date_time");

        if let Some(day) = non_empty(&params.date).and_then(parse_day) {
            let start = day_start(day);
            query = query.gte("date_time", start).lt("date_time", start + Duration::hours(24));
        } else {
            query = date_range(
                query,
                "date_time",
                non_empty(&params.start_date),
                non_empty(&params.end_date),
            );
        }
        if let Some(patient_id) = non_empty(&params.patient_id).and_then(|s| Uuid::parse_str(s).ok()) {
            query = query.eq("patient_id", patient_id);
        }
        if let Some(status) = non_empty(&params.status) {
            query = query.eq("status", status);
        }

        let total = self.store.count(&query).await?;
        let appointments: Vec<Appointment> = decode_all(self.store.select(&paging.apply(query)).await?)?;
        let data = self.rows(appointments).await?;

        Ok(AppointmentPage {
            data,
            total,
            page: paging.page,
            limit: paging.limit,
            success: true,
            message: "Appointments retrieved successfully",
        })
    }

    /// Tenant appointments starting in `[start, end)`, oldest first
    pub async fn between(&self, tenant: &Tenant, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Appointment>, StoreError> {
        let query = Query::from(Table::Appointments)
            .eq("doctor_id", tenant.doctor_id)
            .live()
            .gte("date_time", start)
            .lt("date_time", end)
            .order_asc("date_time");
        decode_all(self.store.select(&query).await?)
    }

    /// Joins patient contact details onto appointments with one batched lookup
    pub async fn rows(&self, appointments: Vec<Appointment>) -> Result<Vec<AppointmentRow>, StoreError> {
        let mut ids: Vec<Uuid> = appointments.iter().map(|a| a.patient_id).collect();
        ids.sort();
        ids.dedup();

        let patients: HashMap<Uuid, Patient> = if ids.is_empty() {
            HashMap::new()
        } else {
            let rows = self.store.select(&Query::from(Table::Patients).one_of("id", ids)).await?;
            decode_all::<Patient>(rows)?.into_iter().map(|p| (p.id, p)).collect()
        };

        Ok(appointments
            .into_iter()
            .map(|a| {
                let patient = patients.get(&a.patient_id).map(|p| &p.details);
                AppointmentRow {
                    id: a.id,
                    patient_id: a.patient_id,
                    patient_name: patient.map(|p| p.name.clone()).unwrap_or_default(),
                    patient_email: patient.map(|p| p.email.clone()).unwrap_or_default(),
                    patient_phone: patient.map(|p| p.phone.clone()).unwrap_or_default(),
                    date: a.date_time.format("%Y-%m-%d").to_string(),
                    time: a.date_time.format("%H:%M").to_string(),
                    duration: a.duration,
                    treatment: a.kind,
                    status: a.status,
                    notes: a.notes,
                    is_first_visit: a.is_first_visit,
                    created_at: a.created_at,
                    updated_at: a.updated_at,
                }
            })
            .collect())
    }

    /// Partial update; a moved slot is re-checked excluding this appointment
    pub async fn update(&self, tenant: &Tenant, id: Uuid, patch: AppointmentPatch) -> Result<(), ApiError> {
        let existing = self.get(tenant, id).await?;

        let mut changes = Map::new();
        if let Some(patient_id) = patch.patient_id {
            changes.insert("patient_id".into(), json!(patient_id));
        }
        let status = match non_empty(&patch.status) {
            Some(status) => {
                let status = parse_status(status)?.as_str();
                changes.insert("status".into(), json!(status));
                status.to_string()
            }
            None => existing.status.clone(),
        };
        if let Some(kind) = patch.kind {
            changes.insert("type".into(), json!(kind));
        }
        if let Some(notes) = patch.notes {
            changes.insert("notes".into(), json!(notes));
        }
        if let Some(priority) = patch.priority {
            changes.insert("priority".into(), json!(priority));
        }
        if let Some(room) = patch.room {
            changes.insert("room".into(), json!(room));
        }
        if let Some(first) = patch.is_first_visit {
            changes.insert("is_first_visit".into(), json!(first));
        }

        let date_time = patch.date_time.unwrap_or(existing.date_time);
        let duration = patch.duration.filter(|d| *d > 0).unwrap_or(existing.duration);
        if patch.date_time.is_some() {
            changes.insert("date_time".into(), json!(date_time));
        }
        if patch.duration.is_some() {
            changes.insert("duration".into(), json!(duration));
        }
        match patch.end_time {
            Some(end) => {
                changes.insert("end_time".into(), json!(end));
            }
            None if patch.date_time.is_some() || patch.duration.is_some() => {
                let end = date_time + Duration::minutes(i64::from(duration.max(0)));
                changes.insert("end_time".into(), json!(end));
            }
            None => {}
        }

        let guards = rebook_guards(tenant, id, &existing, date_time, &status);

        let updated = self
            .store
            .update_guarded(&Self::scoped(tenant, id), Value::Object(changes), &guards)
            .await
            .map_err(slot_conflict)?;
        if updated.is_empty() {
            return Err(ApiError::not_found("Appointment not found"));
        }
        Ok(())
    }

    /// Applies `confirm`, `complete` or `cancel`; returns the new status
    pub async fn apply_action(&self, tenant: &Tenant, id: Uuid, action: &str, cancel: CancelBody) -> Result<AppointmentStatus, ApiError> {
        let status = AppointmentStatus::from_action(action).ok_or_else(|| ApiError::bad_request("Invalid action"))?;
        let existing = self.get(tenant, id).await?;
        let guards = rebook_guards(tenant, id, &existing, existing.date_time, status.as_str());

        let mut changes = json!({ "status": status.as_str() });
        if status == AppointmentStatus::Cancelled {
            changes["cancelled_at"] = json!(Utc::now());
            if !cancel.reason.trim().is_empty() {
                changes["cancellation_reason"] = json!(cancel.reason);
            }
        }

        let updated = self
            .store
            .update_guarded(&Self::scoped(tenant, id), changes, &guards)
            .await
            .map_err(slot_conflict)?;
        if updated.is_empty() {
            return Err(ApiError::not_found("Appointment not found"));
        }
        info!("Appointment {} is now {}", id, status.as_str());
        Ok(status)
    }

    /// Soft delete; the row is also marked cancelled so it frees its slot
    pub async fn delete(&self, tenant: &Tenant, id: Uuid) -> Result<(), ApiError> {
        let changes = json!({
            "deleted_at": Utc::now(),
            "status": AppointmentStatus::Cancelled.as_str(),
        });
        let updated = self.store.update(&Self::scoped(tenant, id), changes).await?;
        if updated.is_empty() {
            return Err(ApiError::not_found("Appointment not found"));
        }
        Ok(())
    }
}
