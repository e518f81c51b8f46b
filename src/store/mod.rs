//! Record store seam.
//!
//! Every resource service talks to the database through [`RecordStore`], which
//! moves JSON rows in and out using the typed [`Query`] grammar. Three backends
//! implement it: PostgREST over HTTP ([`RestStore`]), a direct Postgres pool
//! ([`crate::database::PgStore`]) and an in-process [`MemoryStore`].

pub mod error;
pub mod memory;
pub mod query;
pub mod rest;

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use uuid::Uuid;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use query::{Condition, FieldValue, Guard, OrderBy, Query, SortDirection, Table};
pub use rest::RestStore;

#[async_trait]
pub trait RecordStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn select(&self, query: &Query) -> Result<Vec<Value>, StoreError>;

    async fn select_one(&self, query: &Query) -> Result<Option<Value>, StoreError> {
        let mut query = query.clone();
        query.limit = Some(1);
        Ok(self.select(&query).await?.into_iter().next())
    }

    async fn count(&self, query: &Query) -> Result<i64, StoreError>;

    async fn insert(&self, table: Table, row: Value) -> Result<Value, StoreError> {
        self.insert_guarded(table, row, &[]).await
    }

    /// Inserts `row` unless a row matching any guard already exists.
    /// Check and insert happen as one step; a violation yields `StoreError::Conflict(guard.name)`.
    async fn insert_guarded(&self, table: Table, row: Value, guards: &[Guard]) -> Result<Value, StoreError>;

    async fn update(&self, query: &Query, patch: Value) -> Result<Vec<Value>, StoreError> {
        self.update_guarded(query, patch, &[]).await
    }

    /// Applies `patch` to rows matching `query` unless any guard matches, atomically.
    async fn update_guarded(&self, query: &Query, patch: Value, guards: &[Guard]) -> Result<Vec<Value>, StoreError>;

    /// Hard delete; returns the number of removed rows
    async fn delete(&self, query: &Query) -> Result<u64, StoreError>;

    /// Applies `retire` to every row matching `scope` and inserts `rows` into the same
    /// table as a single operation. Either both steps take effect or neither does.
    async fn replace_all(&self, scope: &Query, retire: Value, rows: Vec<Value>) -> Result<Vec<Value>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Fills `id`, `created_at` and (where tracked) `updated_at` on a new row
pub fn stamp_new(table: Table, row: Value) -> Result<Map<String, Value>, StoreError> {
    let mut map = into_object(row)?;
    let now = json!(Utc::now());
    if map.get("id").map_or(true, Value::is_null) {
        map.insert("id".to_string(), json!(Uuid::new_v4()));
    }
    if map.get("created_at").map_or(true, Value::is_null) {
        map.insert("created_at".to_string(), now.clone());
    }
    if table.tracks_updates() && map.get("updated_at").map_or(true, Value::is_null) {
        map.insert("updated_at".to_string(), now);
    }
    Ok(map)
}

/// Adds `updated_at` to a patch for tables that track it
pub fn stamp_patch(table: Table, patch: Value) -> Result<Map<String, Value>, StoreError> {
    let mut map = into_object(patch)?;
    if table.tracks_updates() {
        map.insert("updated_at".to_string(), json!(Utc::now()));
    }
    Ok(map)
}

/// Patch that soft-deletes the matched rows
pub fn soft_delete() -> Value {
    json!({ "deleted_at": Utc::now() })
}

pub fn into_object(value: Value) -> Result<Map<String, Value>, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Malformed(format!("expected JSON object, got {}", other))),
    }
}

/// Decodes a store row into a typed model
pub fn decode<T: DeserializeOwned>(row: Value) -> Result<T, StoreError> {
    serde_json::from_value(row).map_err(|e| StoreError::Malformed(e.to_string()))
}

pub fn decode_all<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, StoreError> {
    rows.into_iter().map(decode).collect()
}
