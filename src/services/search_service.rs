use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::AccessConfig;
use crate::database::models::{Appointment, Finance, Patient};
use crate::error::ApiError;
use crate::store::{decode_all, Query, RecordStore, Table};

use super::patient_service::PatientService;
use super::{non_empty, Paging, Tenant};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const PREVIEW_SIZE: i64 = 5;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl SearchParams {
    fn term(&self) -> Result<&str, ApiError> {
        non_empty(&self.q).ok_or_else(|| ApiError::bad_request("Search query is required"))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub patients: Vec<Patient>,
    pub appointments: Vec<Appointment>,
    pub finances: Vec<Finance>,
    pub total: usize,
}

/// Case-insensitive lookups across the tenant's patients, appointments and finances
pub struct SearchService {
    store: Arc<dyn RecordStore>,
    patients: PatientService,
}

impl SearchService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            patients: PatientService::new(store.clone(), AccessConfig::default()),
            store,
        }
    }

    async fn patients_matching(&self, tenant: &Tenant, term: &str, paging: Paging) -> Result<Vec<Patient>, ApiError> {
        let ids = self.patients.assigned_patient_ids(tenant.doctor_id).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::from(Table::Patients)
            .one_of("id", ids)
            .live()
            .contains("name", term)
            .order_asc("name");
        Ok(decode_all(self.store.select(&paging.apply(query)).await?)?)
    }

    /// Appointments whose type or notes contain `term`, oldest first
    async fn appointments_matching(&self, tenant: &Tenant, term: &str) -> Result<Vec<Appointment>, ApiError> {
        let base = Query::from(Table::Appointments)
            .eq("doctor_id", tenant.doctor_id)
            .live()
            .order_asc("date_time");

        let mut found: Vec<Appointment> = decode_all(self.store.select(&base.clone().contains("type", term)).await?)?;
        let mut seen: HashSet<_> = found.iter().map(|a| a.id).collect();
        let by_notes: Vec<Appointment> = decode_all(self.store.select(&base.contains("notes", term)).await?)?;
        found.extend(by_notes.into_iter().filter(|a| seen.insert(a.id)));
        found.sort_by_key(|a| a.date_time);
        Ok(found)
    }

    async fn finances_matching(&self, tenant: &Tenant, term: &str, limit: i64) -> Result<Vec<Finance>, ApiError> {
        let query = Query::from(Table::Finances)
            .eq("doctor_id", tenant.doctor_id)
            .live()
            .contains("description", term)
            .order_desc("created_at")
            .limit(limit);
        Ok(decode_all(self.store.select(&query).await?)?)
    }

    /// Up to five hits per resource
    pub async fn global(&self, tenant: &Tenant, params: &SearchParams) -> Result<SearchResults, ApiError> {
        let term = params.term()?;
        let preview = Paging { page: 1, limit: PREVIEW_SIZE };

        let patients = self.patients_matching(tenant, term, preview).await?;
        let mut appointments = self.appointments_matching(tenant, term).await?;
        appointments.truncate(PREVIEW_SIZE as usize);
        let finances = self.finances_matching(tenant, term, PREVIEW_SIZE).await?;

        let total = patients.len() + appointments.len() + finances.len();
        info!("Global search for doctor {} matched {} records", tenant.doctor_id, total);
        Ok(SearchResults { patients, appointments, finances, total })
    }

    pub async fn patients(&self, tenant: &Tenant, params: &SearchParams) -> Result<Vec<Patient>, ApiError> {
        let term = params.term()?;
        let paging = Paging::parse(params.page.as_deref(), params.limit.as_deref(), DEFAULT_PAGE_SIZE);
        self.patients_matching(tenant, term, paging).await
    }

    pub async fn appointments(&self, tenant: &Tenant, params: &SearchParams) -> Result<Vec<Appointment>, ApiError> {
        let term = params.term()?;
        let paging = Paging::parse(params.page.as_deref(), params.limit.as_deref(), DEFAULT_PAGE_SIZE);
        let offset = ((paging.page - 1) * paging.limit) as usize;
        Ok(self
            .appointments_matching(tenant, term)
            .await?
            .into_iter()
            .skip(offset)
            .take(paging.limit as usize)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;
    use uuid::Uuid;

    async fn setup() -> (SearchService, Tenant) {
        let store = Arc::new(MemoryStore::new());
        let tenant = Tenant { doctor_id: Uuid::new_v4(), user_id: Uuid::new_v4() };

        for name in ["Maria Silva", "Mariana Costa", "João Souza"] {
            let patient = store.seed(Table::Patients, json!({"name": name})).await.unwrap();
            store
                .seed(Table::PatientDoctors, json!({"doctor_id": tenant.doctor_id, "patient_id": patient["id"]}))
                .await
                .unwrap();
        }
        // another doctor's patient
        store.seed(Table::Patients, json!({"name": "Maria Oliveira"})).await.unwrap();

        for (i, (kind, notes)) in [("cleaning", ""), ("root canal", "follow-up cleaning"), ("extraction", "")]
            .into_iter()
            .enumerate()
        {
            store
                .seed(
                    Table::Appointments,
                    json!({
                        "doctor_id": tenant.doctor_id, "patient_id": Uuid::new_v4(),
                        "date_time": format!("2024-05-0{}T10:00:00Z", i + 1), "type": kind, "notes": notes
                    }),
                )
                .await
                .unwrap();
        }
        store
            .seed(Table::Finances, json!({"doctor_id": tenant.doctor_id, "description": "Cleaning fee"}))
            .await
            .unwrap();

        (SearchService::new(store), tenant)
    }

    fn query(q: &str) -> SearchParams {
        SearchParams { q: Some(q.into()), ..Default::default() }
    }

    #[tokio::test]
    async fn query_is_required() {
        let (search, tenant) = setup().await;
        let err = search.global(&tenant, &SearchParams::default()).await.unwrap_err();
        assert_eq!(err.message(), "Search query is required");
        assert!(search.patients(&tenant, &query("  ")).await.is_err());
    }

    #[tokio::test]
    async fn patients_are_limited_to_assignments() {
        let (search, tenant) = setup().await;
        let found = search.patients(&tenant, &query("maria")).await.unwrap();
        let names: Vec<_> = found.iter().map(|p| p.details.name.as_str()).collect();
        assert_eq!(names, vec!["Maria Silva", "Mariana Costa"]);
    }

    #[tokio::test]
    async fn appointments_match_type_or_notes() {
        let (search, tenant) = setup().await;
        let found = search.appointments(&tenant, &query("CLEANING")).await.unwrap();
        assert_eq!(found.len(), 2);

        let second_page = SearchParams { page: Some("2".into()), limit: Some("1".into()), ..query("cleaning") };
        let found = search.appointments(&tenant, &second_page).await.unwrap();
        assert_eq!(found[0].kind, "root canal");
    }

    #[tokio::test]
    async fn global_totals_every_resource() {
        let (search, tenant) = setup().await;
        let results = search.global(&tenant, &query("clean")).await.unwrap();
        assert_eq!(results.appointments.len(), 2);
        assert_eq!(results.finances.len(), 1);
        assert!(results.patients.is_empty());
        assert_eq!(results.total, 3);
    }
}
