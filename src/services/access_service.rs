use std::sync::Arc;

use uuid::Uuid;

use crate::config::AccessConfig;
use crate::error::ApiError;
use crate::store::{Query, RecordStore, StoreError, Table};

use super::Tenant;

/// Patient-keyed resources whose assignment check is configurable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatientResource {
    Patient,
    Treatments,
    Documents,
    Images,
    ToothStates,
}

/// Checks the patient-doctor assignment table before patient-scoped access
pub struct AccessGate {
    store: Arc<dyn RecordStore>,
    config: AccessConfig,
}

impl AccessGate {
    pub fn new(store: Arc<dyn RecordStore>, config: AccessConfig) -> Self {
        Self { store, config }
    }

    /// Direct patient routes are always gated; sub-resources follow configuration
    pub fn is_gated(&self, resource: PatientResource) -> bool {
        match resource {
            PatientResource::Patient => true,
            PatientResource::Treatments => self.config.gate_treatments,
            PatientResource::Documents => self.config.gate_documents,
            PatientResource::Images => self.config.gate_images,
            PatientResource::ToothStates => self.config.gate_tooth_states,
        }
    }

    pub async fn is_assigned(&self, doctor_id: Uuid, patient_id: Uuid) -> Result<bool, StoreError> {
        let query = Query::from(Table::PatientDoctors)
            .eq("doctor_id", doctor_id)
            .eq("patient_id", patient_id);
        Ok(self.store.count(&query).await? > 0)
    }

    /// 403 "Access denied to this patient" unless the tenant holds an assignment
    pub async fn require(&self, tenant: &Tenant, patient_id: Uuid, resource: PatientResource) -> Result<(), ApiError> {
        if !self.is_gated(resource) {
            return Ok(());
        }
        if self.is_assigned(tenant.doctor_id, patient_id).await? {
            Ok(())
        } else {
            tracing::debug!("Doctor {} denied access to patient {} ({:?})", tenant.doctor_id, patient_id, resource);
            Err(ApiError::forbidden("Access denied to this patient"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn open_config() -> AccessConfig {
        AccessConfig {
            gate_treatments: false,
            gate_documents: true,
            gate_images: false,
            gate_tooth_states: true,
        }
    }

    #[tokio::test]
    async fn assignment_grants_access() {
        let store = Arc::new(MemoryStore::new());
        let tenant = Tenant { doctor_id: Uuid::new_v4(), user_id: Uuid::new_v4() };
        let patient = Uuid::new_v4();
        let gate = AccessGate::new(store.clone(), open_config());

        let denied = gate.require(&tenant, patient, PatientResource::Patient).await.unwrap_err();
        assert_eq!(denied.status_code(), 403);

        store
            .seed(Table::PatientDoctors, json!({"doctor_id": tenant.doctor_id, "patient_id": patient}))
            .await
            .unwrap();
        assert!(gate.require(&tenant, patient, PatientResource::Patient).await.is_ok());
    }

    #[tokio::test]
    async fn ungated_resources_skip_the_check() {
        let gate = AccessGate::new(Arc::new(MemoryStore::new()), open_config());
        let tenant = Tenant { doctor_id: Uuid::new_v4(), user_id: Uuid::new_v4() };
        assert!(gate.require(&tenant, Uuid::new_v4(), PatientResource::Treatments).await.is_ok());
        assert!(gate.require(&tenant, Uuid::new_v4(), PatientResource::Images).await.is_ok());
        assert!(gate.require(&tenant, Uuid::new_v4(), PatientResource::Documents).await.is_err());
    }
}
