use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AccessConfig;
use crate::database::models::patient::PatientDetails;
use crate::database::models::{Doctor, Patient, PatientDoctor};
use crate::error::ApiError;
use crate::store::{decode, decode_all, soft_delete, Guard, Query, RecordStore, StoreError, Table};

use super::{AccessGate, PatientResource, Tenant};

pub const EMAIL_UNIQUE: &str = "patients_email_unique";
pub const CPF_UNIQUE: &str = "patients_cpf_unique";
pub const ASSIGNMENT_UNIQUE: &str = "patient_doctors_pair_unique";

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email pattern compiles")
});

/// Free-text columns capped at 1000 characters: (label, field, value)
fn text_fields(p: &PatientDetails) -> [(&'static str, &'static str, &str); 17] {
    [
        ("Medical History", "medical_history", p.medical_history.as_str()),
        ("Notes", "notes", p.notes.as_str()),
        ("Emergency Contact", "emergency_contact", p.emergency_contact.as_str()),
        ("Emergency Phone", "emergency_phone", p.emergency_phone.as_str()),
        ("Profession", "profession", p.profession.as_str()),
        ("Civil Status", "civil_status", p.civil_status.as_str()),
        ("Gender", "gender", p.gender.as_str()),
        ("Allergies", "allergies", p.allergies.as_str()),
        ("Medications", "medications", p.medications.as_str()),
        ("Diseases", "diseases", p.diseases.as_str()),
        ("Surgeries", "surgeries", p.surgeries.as_str()),
        ("Family History", "family_history", p.family_history.as_str()),
        ("Previous Dentist", "previous_dentist", p.previous_dentist.as_str()),
        ("Chief Complaint", "chief_complaint", p.chief_complaint.as_str()),
        ("Insurance Provider", "insurance_provider", p.insurance_provider.as_str()),
        ("Insurance Number", "insurance_number", p.insurance_number.as_str()),
        ("Insurance Coverage", "insurance_coverage", p.insurance_coverage.as_str()),
    ]
}

/// Body of `POST /api/patients`
#[derive(Debug, Clone, Deserialize)]
pub struct NewPatient {
    #[serde(flatten)]
    pub details: PatientDetails,
    #[serde(default)]
    pub assign_to_current_doctor: Option<bool>,
}

/// Body of `POST /api/patients/assign`
#[derive(Debug, Clone, Deserialize)]
pub struct AssignRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    #[serde(default)]
    pub is_primary_doctor: bool,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Create,
    Update,
}

fn check_len(label: &str, value: &str, max: usize, field: &str) -> Result<(), ApiError> {
    if value.chars().count() > max {
        return Err(ApiError::validation_error(
            format!("{} must be less than {} characters", label, max),
            Some(field),
        ));
    }
    Ok(())
}

fn require(label: &str, value: &str, field: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation_error(format!("{} is required", label), Some(field)));
    }
    Ok(())
}

/// Field rules for patient bodies. Create needs contact details; update only name and email.
pub fn validate(details: &PatientDetails, mode: Validation) -> Result<(), ApiError> {
    require("Name", &details.name, "name")?;
    require("Email", &details.email, "email")?;
    if mode == Validation::Create {
        require("Phone", &details.phone, "phone")?;
        require("Address", &details.address, "address")?;
    }

    check_len("Name", &details.name, 255, "name")?;
    check_len("Email", &details.email, 255, "email")?;
    check_len("Phone", &details.phone, 20, "phone")?;
    check_len("Address", &details.address, 500, "address")?;
    check_len("CPF", &details.cpf, 14, "cpf")?;

    if !EMAIL_RE.is_match(details.email.trim()) {
        return Err(ApiError::validation_error("Invalid email format", Some("email")));
    }
    if !(0..=10).contains(&details.pain_level) {
        return Err(ApiError::validation_error("Pain level must be between 0 and 10", Some("pain_level")));
    }

    for (label, field, value) in text_fields(details) {
        check_len(label, value, 1000, field)?;
    }
    Ok(())
}

/// Conflict messages for the patient-table guards
fn conflict(err: StoreError) -> ApiError {
    match err {
        StoreError::Conflict(name) if name == EMAIL_UNIQUE => ApiError::conflict("Patient with this email already exists"),
        StoreError::Conflict(name) if name == CPF_UNIQUE => ApiError::conflict("Patient with this CPF already exists"),
        StoreError::Conflict(name) if name == ASSIGNMENT_UNIQUE => {
            ApiError::conflict("Patient is already assigned to this doctor")
        }
        other => other.into(),
    }
}

fn uniqueness_guards(details: &PatientDetails, except: Option<Uuid>) -> Vec<Guard> {
    let mut guards = vec![Guard::new(EMAIL_UNIQUE).eq("email", details.email.trim()).live()];
    if !details.cpf.trim().is_empty() {
        guards.push(Guard::new(CPF_UNIQUE).eq("cpf", details.cpf.trim()).live());
    }
    match except {
        Some(id) => guards.into_iter().map(|g| g.neq("id", id)).collect(),
        None => guards,
    }
}

fn assignment_guard(patient_id: Uuid, doctor_id: Uuid) -> Guard {
    Guard::new(ASSIGNMENT_UNIQUE)
        .eq("patient_id", patient_id)
        .eq("doctor_id", doctor_id)
}

pub struct PatientService {
    store: Arc<dyn RecordStore>,
    gate: AccessGate,
}

impl PatientService {
    pub fn new(store: Arc<dyn RecordStore>, access: AccessConfig) -> Self {
        let gate = AccessGate::new(store.clone(), access);
        Self { store, gate }
    }

    /// Validates, inserts under the email/CPF guards and assigns the patient to the caller
    pub async fn create(&self, tenant: &Tenant, body: NewPatient) -> Result<Patient, ApiError> {
        let mut details = body.details;
        validate(&details, Validation::Create)?;
        details.email = details.email.trim().to_string();
        details.cpf = details.cpf.trim().to_string();

        let guards = uniqueness_guards(&details, None);
        let row = serde_json::to_value(&details).map_err(|e| ApiError::upstream("Encoding patient", e))?;
        let patient: Patient = decode(self.store.insert_guarded(Table::Patients, row, &guards).await.map_err(conflict)?)?;

        if body.assign_to_current_doctor.unwrap_or(true) {
            let assignment = json!({
                "patient_id": patient.id,
                "doctor_id": tenant.doctor_id,
                "is_primary_doctor": true,
                "assigned_at": chrono::Utc::now(),
                "notes": "Assigned during patient creation",
            });
            let guard = assignment_guard(patient.id, tenant.doctor_id);
            if let Err(e) = self.store.insert_guarded(Table::PatientDoctors, assignment, &[guard]).await {
                warn!("Assignment for new patient {} failed, retracting patient: {}", patient.id, e);
                let retract = Query::from(Table::Patients).eq("id", patient.id);
                if let Err(cleanup) = self.store.update(&retract, soft_delete()).await {
                    warn!("Could not retract patient {}: {}", patient.id, cleanup);
                }
                return Err(conflict(e));
            }
        }

        info!("Created patient {} for doctor {}", patient.id, tenant.doctor_id);
        Ok(patient)
    }

    /// Non-deleted patients assigned to the tenant
    pub async fn my_patients(&self, tenant: &Tenant) -> Result<Vec<Patient>, ApiError> {
        let ids = self.assigned_patient_ids(tenant.doctor_id).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::from(Table::Patients).one_of("id", ids).live().order_asc("name");
        Ok(decode_all(self.store.select(&query).await?)?)
    }

    pub async fn assigned_patient_ids(&self, doctor_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let rows = self
            .store
            .select(&Query::from(Table::PatientDoctors).eq("doctor_id", doctor_id))
            .await?;
        let assignments: Vec<PatientDoctor> = decode_all(rows)?;
        Ok(assignments.into_iter().map(|a| a.patient_id).collect())
    }

    pub async fn get(&self, tenant: &Tenant, id: Uuid) -> Result<Patient, ApiError> {
        self.gate.require(tenant, id, PatientResource::Patient).await?;
        self.find(id).await?.ok_or_else(|| ApiError::not_found("Patient not found"))
    }

    async fn find(&self, id: Uuid) -> Result<Option<Patient>, StoreError> {
        let query = Query::from(Table::Patients).eq("id", id).live();
        self.store.select_one(&query).await?.map(decode).transpose()
    }

    /// Full replacement of the editable fields; uniqueness excludes the patient itself
    pub async fn update(&self, tenant: &Tenant, id: Uuid, mut details: PatientDetails) -> Result<Patient, ApiError> {
        validate(&details, Validation::Update)?;
        self.gate.require(tenant, id, PatientResource::Patient).await?;
        details.email = details.email.trim().to_string();
        details.cpf = details.cpf.trim().to_string();

        let guards = uniqueness_guards(&details, Some(id));
        let patch = serde_json::to_value(&details).map_err(|e| ApiError::upstream("Encoding patient", e))?;
        let query = Query::from(Table::Patients).eq("id", id).live();
        let updated = self.store.update_guarded(&query, patch, &guards).await.map_err(conflict)?;
        match updated.into_iter().next() {
            Some(row) => Ok(decode(row)?),
            None => Err(ApiError::not_found("Patient not found")),
        }
    }

    /// Soft-deletes the patient and removes every assignment to it
    pub async fn delete(&self, tenant: &Tenant, id: Uuid) -> Result<(), ApiError> {
        self.gate.require(tenant, id, PatientResource::Patient).await?;
        let query = Query::from(Table::Patients).eq("id", id).live();
        if self.store.update(&query, soft_delete()).await?.is_empty() {
            return Err(ApiError::not_found("Patient not found"));
        }
        let removed = self
            .store
            .delete(&Query::from(Table::PatientDoctors).eq("patient_id", id))
            .await?;
        info!("Deleted patient {} and {} assignment(s)", id, removed);
        Ok(())
    }

    /// Shares a patient the caller can already see with another doctor
    pub async fn assign(&self, tenant: &Tenant, req: AssignRequest) -> Result<PatientDoctor, ApiError> {
        self.gate.require(tenant, req.patient_id, PatientResource::Patient).await?;
        let row = json!({
            "patient_id": req.patient_id,
            "doctor_id": req.doctor_id,
            "is_primary_doctor": req.is_primary_doctor,
            "assigned_at": chrono::Utc::now(),
            "notes": req.notes,
        });
        let guard = assignment_guard(req.patient_id, req.doctor_id);
        let inserted = self
            .store
            .insert_guarded(Table::PatientDoctors, row, &[guard])
            .await
            .map_err(conflict)?;
        Ok(decode(inserted)?)
    }

    /// Hard-deletes an assignment of a patient the caller has access to
    pub async fn unassign(&self, tenant: &Tenant, assignment_id: Uuid) -> Result<(), ApiError> {
        let query = Query::from(Table::PatientDoctors).eq("id", assignment_id);
        let assignment: PatientDoctor = match self.store.select_one(&query).await? {
            Some(row) => decode(row)?,
            None => return Err(ApiError::not_found("Assignment not found")),
        };
        self.gate.require(tenant, assignment.patient_id, PatientResource::Patient).await?;
        self.store.delete(&query).await?;
        Ok(())
    }

    /// Assignments of a patient, each with its doctor attached
    pub async fn doctors(&self, tenant: &Tenant, patient_id: Uuid) -> Result<Vec<PatientDoctor>, ApiError> {
        self.gate.require(tenant, patient_id, PatientResource::Patient).await?;
        let rows = self
            .store
            .select(&Query::from(Table::PatientDoctors).eq("patient_id", patient_id).order_asc("created_at"))
            .await?;
        let mut assignments: Vec<PatientDoctor> = decode_all(rows)?;

        let doctor_ids: Vec<Uuid> = assignments.iter().map(|a| a.doctor_id).collect();
        if !doctor_ids.is_empty() {
            let doctors: Vec<Doctor> = decode_all(
                self.store
                    .select(&Query::from(Table::Doctors).one_of("id", doctor_ids))
                    .await?,
            )?;
            for assignment in assignments.iter_mut() {
                assignment.doctor = doctors.iter().find(|d| d.id == assignment.doctor_id).cloned();
            }
        }
        Ok(assignments)
    }
}
