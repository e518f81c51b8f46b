use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{PgConnection, Postgres, Transaction};
use tracing::debug;

use crate::filter::Filter;
use crate::store::{stamp_new, stamp_patch, Guard, Query, RecordStore, StoreError, Table};

use super::manager::DatabaseManager;
use super::query_builder::QueryBuilder;

/// Record store backed by a direct Postgres connection.
///
/// Guarded writes take a `SHARE ROW EXCLUSIVE` lock on the target table inside a
/// transaction, so the guard check and the write cannot interleave with another
/// guarded write. Unique indexes named after the guards back this up.
pub struct PgStore {
    db: DatabaseManager,
}

impl PgStore {
    pub fn new(db: DatabaseManager) -> Self {
        Self { db }
    }

    async fn begin_locked(&self, table: Table) -> Result<Transaction<'static, Postgres>, StoreError> {
        let mut tx = self.db.pool().begin().await?;
        let lock = format!("LOCK TABLE \"{}\" IN SHARE ROW EXCLUSIVE MODE", table.name());
        sqlx::query(&lock).execute(&mut *tx).await?;
        Ok(tx)
    }

    async fn check_guards(conn: &mut PgConnection, table: Table, guards: &[Guard]) -> Result<(), StoreError> {
        for guard in guards {
            let count = QueryBuilder::new(&guard.to_query(table).without_paging())?.count(&mut *conn).await?;
            if count > 0 {
                debug!("Guard {} rejected write on {}", guard.name, table);
                return Err(StoreError::Conflict(guard.name.to_string()));
            }
        }
        Ok(())
    }

    async fn insert_row(conn: &mut PgConnection, table: Table, row: Map<String, Value>) -> Result<Value, StoreError> {
        let columns: Vec<String> = row.keys().cloned().collect();
        let sql = Filter::insert_sql(table, &columns)?;
        let inserted = sqlx::query_scalar::<_, Value>(&sql)
            .bind(Value::Object(row))
            .fetch_one(&mut *conn)
            .await?;
        Ok(inserted)
    }

    async fn update_rows(conn: &mut PgConnection, query: &Query, patch: Map<String, Value>) -> Result<Vec<Value>, StoreError> {
        let columns: Vec<String> = patch.keys().cloned().collect();
        QueryBuilder::new(query)?
            .update(&mut *conn, &Value::Object(patch), &columns)
            .await
    }
}

#[async_trait]
impl RecordStore for PgStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn select(&self, query: &Query) -> Result<Vec<Value>, StoreError> {
        QueryBuilder::new(query)?.select_all(self.db.pool()).await
    }

    async fn count(&self, query: &Query) -> Result<i64, StoreError> {
        QueryBuilder::new(&query.without_paging())?.count(self.db.pool()).await
    }

    async fn insert_guarded(&self, table: Table, row: Value, guards: &[Guard]) -> Result<Value, StoreError> {
        let row = stamp_new(table, row)?;
        if guards.is_empty() {
            let mut conn = self.db.pool().acquire().await?;
            return Self::insert_row(&mut conn, table, row).await;
        }

        let mut tx = self.begin_locked(table).await?;
        Self::check_guards(&mut tx, table, guards).await?;
        let inserted = Self::insert_row(&mut tx, table, row).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    async fn update_guarded(&self, query: &Query, patch: Value, guards: &[Guard]) -> Result<Vec<Value>, StoreError> {
        let patch = stamp_patch(query.table, patch)?;
        if guards.is_empty() {
            let mut conn = self.db.pool().acquire().await?;
            return Self::update_rows(&mut conn, query, patch).await;
        }

        let mut tx = self.begin_locked(query.table).await?;
        Self::check_guards(&mut tx, query.table, guards).await?;
        let updated = Self::update_rows(&mut tx, query, patch).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn delete(&self, query: &Query) -> Result<u64, StoreError> {
        QueryBuilder::new(&query.without_paging())?.delete(self.db.pool()).await
    }

    async fn replace_all(&self, scope: &Query, retire: Value, rows: Vec<Value>) -> Result<Vec<Value>, StoreError> {
        let retire = stamp_patch(scope.table, retire)?;
        let stamped = rows
            .into_iter()
            .map(|r| stamp_new(scope.table, r))
            .collect::<Result<Vec<_>, _>>()?;

        let mut tx = self.begin_locked(scope.table).await?;
        Self::update_rows(&mut tx, &scope.without_paging(), retire).await?;
        let mut created = Vec::with_capacity(stamped.len());
        for row in stamped {
            created.push(Self::insert_row(&mut tx, scope.table, row).await?);
        }
        tx.commit().await?;
        Ok(created)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.db.health_check().await?;
        Ok(())
    }
}
