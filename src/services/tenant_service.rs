use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::database::models::{Doctor, User};
use crate::store::{decode, Guard, Query, RecordStore, StoreError, Table};

pub const DOCTOR_PER_ACCOUNT: &str = "doctors_user_id_unique";

#[derive(Debug, thiserror::Error)]
pub enum TenantError {
    #[error("Invalid user ID")]
    InvalidUserId,
    #[error("User not found: {0}")]
    UserNotFound(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Resolved tenant for the current request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tenant {
    pub doctor_id: Uuid,
    pub user_id: Uuid,
}

/// Maps authenticated accounts to doctor tenants
pub struct TenantService {
    store: Arc<dyn RecordStore>,
}

impl TenantService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Resolves the doctor for `subject`, provisioning one on first use.
    ///
    /// Order: existing doctor row, then a legacy `users` row tagged `doctor`
    /// (its id doubles as the doctor id), then a new doctor built from the
    /// account. Concurrent first requests converge on a single doctor row.
    pub async fn resolve(&self, subject: &str) -> Result<Tenant, TenantError> {
        let user_id = Uuid::parse_str(subject).map_err(|_| TenantError::InvalidUserId)?;

        if let Some(doctor) = self.find_doctor(user_id).await? {
            return Ok(Tenant { doctor_id: doctor.id, user_id });
        }

        let legacy = Query::from(Table::Users).eq("id", user_id).eq("role", "doctor");
        if let Some(row) = self.store.select_one(&legacy).await? {
            let user: User = decode(row)?;
            debug!("Resolved legacy doctor account {}", user.id);
            return Ok(Tenant { doctor_id: user.id, user_id });
        }

        let doctor_id = self.provision(user_id).await?;
        Ok(Tenant { doctor_id, user_id })
    }

    /// Lookup-only resolution used by billing and profile endpoints
    pub async fn find_doctor(&self, user_id: Uuid) -> Result<Option<Doctor>, StoreError> {
        let query = Query::from(Table::Doctors).eq("user_id", user_id).live();
        match self.store.select_one(&query).await? {
            Some(row) => Ok(Some(decode(row)?)),
            None => Ok(None),
        }
    }

    /// Inserts the doctor row for a new account; `name` and `email` come from the caller
    pub async fn create_doctor(&self, user_id: Uuid, name: &str, email: &str) -> Result<Doctor, StoreError> {
        let guard = Guard::new(DOCTOR_PER_ACCOUNT).eq("user_id", user_id).live();
        let row = self
            .store
            .insert_guarded(
                Table::Doctors,
                json!({ "user_id": user_id, "name": name, "email": email }),
                &[guard],
            )
            .await?;
        decode(row)
    }

    async fn provision(&self, user_id: Uuid) -> Result<Uuid, TenantError> {
        let account = self
            .store
            .select_one(&Query::from(Table::Users).eq("id", user_id))
            .await?
            .ok_or(TenantError::UserNotFound(user_id))?;
        let account: User = decode(account)?;

        info!("Creating default doctor entry for user: {}", user_id);
        match self.create_doctor(user_id, &account.name, &account.email).await {
            Ok(doctor) => Ok(doctor.id),
            Err(e) if e.is_conflict(DOCTOR_PER_ACCOUNT) => {
                warn!("Doctor for user {} was provisioned concurrently, using existing row", user_id);
                let winner = self.find_doctor(user_id).await?.ok_or(TenantError::Store(e))?;
                Ok(winner.id)
            }
            Err(e) => Err(e.into()),
        }
    }
}
