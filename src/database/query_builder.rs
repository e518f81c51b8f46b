use serde_json::Value;
use sqlx::{postgres::PgArguments, Postgres};

use crate::filter::types::SqlResult;
use crate::filter::Filter;
use crate::store::{FieldValue, Query, StoreError};

/// Runs filter-rendered statements on any Postgres executor (pool or transaction)
pub struct QueryBuilder {
    filter: Filter,
}

impl QueryBuilder {
    pub fn new(query: &Query) -> Result<Self, StoreError> {
        Ok(Self { filter: Filter::new(query)? })
    }

    pub async fn select_all<'e, E>(&self, executor: E) -> Result<Vec<Value>, StoreError>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let sql = self.filter.to_sql()?;
        let mut q = sqlx::query_scalar::<_, Value>(&sql.query);
        for p in sql.params.iter() {
            q = bind_param_scalar(q, p);
        }
        Ok(q.fetch_all(executor).await?)
    }

    pub async fn count<'e, E>(&self, executor: E) -> Result<i64, StoreError>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let sql = self.filter.to_count_sql()?;
        let mut q = sqlx::query_scalar::<_, i64>(&sql.query);
        for p in sql.params.iter() {
            q = bind_param_scalar(q, p);
        }
        Ok(q.fetch_one(executor).await?)
    }

    pub async fn update<'e, E>(&self, executor: E, patch: &Value, columns: &[String]) -> Result<Vec<Value>, StoreError>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let sql = self.filter.to_update_sql(columns)?;
        let mut q = sqlx::query_scalar::<_, Value>(&sql.query).bind(patch.clone());
        for p in sql.params.iter() {
            q = bind_param_scalar(q, p);
        }
        Ok(q.fetch_all(executor).await?)
    }

    pub async fn delete<'e, E>(&self, executor: E) -> Result<u64, StoreError>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let SqlResult { query, params } = self.filter.to_delete_sql()?;
        let mut q = sqlx::query(&query);
        for p in params.iter() {
            q = bind_param_query(q, p);
        }
        Ok(q.execute(executor).await?.rows_affected())
    }
}

fn bind_param_query<'q>(
    q: sqlx::query::Query<'q, Postgres, PgArguments>,
    v: &FieldValue,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match v {
        FieldValue::Text(s) => q.bind(s.clone()),
        FieldValue::Int(i) => q.bind(*i),
        FieldValue::Float(f) => q.bind(*f),
        FieldValue::Bool(b) => q.bind(*b),
        FieldValue::Uuid(u) => q.bind(*u),
        FieldValue::Timestamp(t) => q.bind(*t),
        FieldValue::Date(d) => q.bind(*d),
    }
}

fn bind_param_scalar<'q, O>(
    q: sqlx::query::QueryScalar<'q, Postgres, O, PgArguments>,
    v: &FieldValue,
) -> sqlx::query::QueryScalar<'q, Postgres, O, PgArguments> {
    match v {
        FieldValue::Text(s) => q.bind(s.clone()),
        FieldValue::Int(i) => q.bind(*i),
        FieldValue::Float(f) => q.bind(*f),
        FieldValue::Bool(b) => q.bind(*b),
        FieldValue::Uuid(u) => q.bind(*u),
        FieldValue::Timestamp(t) => q.bind(*t),
        FieldValue::Date(d) => q.bind(*d),
    }
}
