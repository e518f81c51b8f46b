use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::config::StoreConfig;

use super::query::{Condition, FieldValue, Query, SortDirection, Table};
use super::{stamp_new, stamp_patch, Guard, RecordStore, StoreError};

/// PostgREST error body
#[derive(Debug, Deserialize)]
struct RestErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Record store speaking the PostgREST dialect of the hosted database.
///
/// Guards are checked with a read before the write; the unique indexes the
/// guards are named after turn a lost race into a 409 that maps back to the
/// same `Conflict(name)`.
pub struct RestStore {
    client: Client,
    base_url: String,
    service_key: String,
}

impl RestStore {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        if config.url.is_empty() {
            return Err(StoreError::Unavailable("SUPABASE_URL is not configured".to_string()));
        }
        if config.service_key.is_empty() {
            return Err(StoreError::Unavailable("no record store API key configured".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: format!("{}/rest/v1", config.url.trim_end_matches('/')),
            service_key: config.service_key.clone(),
        })
    }

    fn request(&self, method: Method, table: Table) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.base_url, table.name()))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, StoreError> {
        let response = builder.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }
        Err(Self::error_from(response).await)
    }

    async fn error_from(response: Response) -> StoreError {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let body: Option<RestErrorBody> = serde_json::from_str(&text).ok();
        let code = body.as_ref().and_then(|b| b.code.clone()).unwrap_or_default();
        let message = body.and_then(|b| b.message).unwrap_or_else(|| text.clone());

        if status == StatusCode::CONFLICT && code == "23505" {
            let name = constraint_name(&message).unwrap_or("unique").to_string();
            debug!("Record store unique violation on {}", name);
            return StoreError::Conflict(name);
        }
        if status == StatusCode::BAD_REQUEST {
            return StoreError::InvalidQuery(format!("{} {}", code, message));
        }
        if status.is_server_error() && status != StatusCode::INTERNAL_SERVER_ERROR {
            return StoreError::Unavailable(format!("{}: {}", status, message));
        }
        StoreError::Upstream(format!("{} {}: {}", status, code, message))
    }

    async fn rows(response: Response) -> Result<Vec<Value>, StoreError> {
        let value: Value = response.json().await.map_err(|e| StoreError::Malformed(e.to_string()))?;
        match value {
            Value::Array(rows) => Ok(rows),
            other => Err(StoreError::Malformed(format!("expected row array, got {}", other))),
        }
    }

    async fn check_guards(&self, table: Table, guards: &[Guard]) -> Result<(), StoreError> {
        for guard in guards {
            if self.select_one(&guard.to_query(table)).await?.is_some() {
                debug!("Guard {} rejected write on {}", guard.name, table);
                return Err(StoreError::Conflict(guard.name.to_string()));
            }
        }
        Ok(())
    }

    async fn insert_many(&self, table: Table, rows: Vec<Value>) -> Result<Vec<Value>, StoreError> {
        let response = self
            .send(
                self.request(Method::POST, table)
                    .header("Prefer", "return=representation")
                    .json(&Value::Array(rows)),
            )
            .await?;
        Self::rows(response).await
    }
}

#[async_trait]
impl RecordStore for RestStore {
    fn backend_name(&self) -> &'static str {
        "rest"
    }

    async fn select(&self, query: &Query) -> Result<Vec<Value>, StoreError> {
        let mut params = filter_params(&query.conditions);
        params.push(("select".to_string(), "*".to_string()));
        if let Some(order) = order_param(query) {
            params.push(("order".to_string(), order));
        }
        if let Some(limit) = query.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = query.offset {
            params.push(("offset".to_string(), offset.to_string()));
        }

        let response = self.send(self.request(Method::GET, query.table).query(&params)).await?;
        Self::rows(response).await
    }

    async fn count(&self, query: &Query) -> Result<i64, StoreError> {
        let mut params = filter_params(&query.conditions);
        params.push(("select".to_string(), "id".to_string()));

        let response = self
            .send(
                self.request(Method::HEAD, query.table)
                    .header("Prefer", "count=exact")
                    .query(&params),
            )
            .await?;

        let range = response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| StoreError::Malformed("count response without Content-Range".to_string()))?;
        parse_content_range_total(range)
            .ok_or_else(|| StoreError::Malformed(format!("unreadable Content-Range {:?}", range)))
    }

    async fn insert_guarded(&self, table: Table, row: Value, guards: &[Guard]) -> Result<Value, StoreError> {
        let row = stamp_new(table, row)?;
        self.check_guards(table, guards).await?;
        self.insert_many(table, vec![Value::Object(row)])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Malformed(format!("insert into {} returned no row", table)))
    }

    async fn update_guarded(&self, query: &Query, patch: Value, guards: &[Guard]) -> Result<Vec<Value>, StoreError> {
        let patch = stamp_patch(query.table, patch)?;
        self.check_guards(query.table, guards).await?;

        let response = self
            .send(
                self.request(Method::PATCH, query.table)
                    .header("Prefer", "return=representation")
                    .query(&filter_params(&query.conditions))
                    .json(&Value::Object(patch)),
            )
            .await?;
        Self::rows(response).await
    }

    async fn delete(&self, query: &Query) -> Result<u64, StoreError> {
        let mut params = filter_params(&query.conditions);
        params.push(("select".to_string(), "id".to_string()));

        let response = self
            .send(
                self.request(Method::DELETE, query.table)
                    .header("Prefer", "return=representation")
                    .query(&params),
            )
            .await?;
        Ok(Self::rows(response).await?.len() as u64)
    }

    async fn replace_all(&self, scope: &Query, retire: Value, rows: Vec<Value>) -> Result<Vec<Value>, StoreError> {
        let table = scope.table;
        let retire = stamp_patch(table, retire)?;

        let previous: Vec<FieldValue> = self
            .select(&scope.without_paging())
            .await?
            .iter()
            .filter_map(|r| r.get("id").and_then(Value::as_str).map(|s| FieldValue::Text(s.to_string())))
            .collect();

        let stamped = rows
            .into_iter()
            .map(|r| stamp_new(table, r).map(Value::Object))
            .collect::<Result<Vec<_>, _>>()?;
        let created = if stamped.is_empty() {
            vec![]
        } else {
            self.insert_many(table, stamped).await?
        };

        if previous.is_empty() {
            return Ok(created);
        }

        let retire_query = Query::from(table).one_of("id", previous);
        let result = self
            .send(
                self.request(Method::PATCH, table)
                    .header("Prefer", "return=minimal")
                    .query(&filter_params(&retire_query.conditions))
                    .json(&Value::Object(retire)),
            )
            .await;

        if let Err(err) = result {
            warn!("Retiring previous {} rows failed, removing the new set: {}", table, err);
            let new_ids: Vec<FieldValue> = created
                .iter()
                .filter_map(|r| r.get("id").and_then(Value::as_str).map(|s| FieldValue::Text(s.to_string())))
                .collect();
            if !new_ids.is_empty() {
                if let Err(cleanup) = self.delete(&Query::from(table).one_of("id", new_ids)).await {
                    error!("Could not remove new {} rows after failed replace: {}", table, cleanup);
                }
            }
            return Err(err);
        }

        Ok(created)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let response = self
            .client
            .get(format!("{}/", self.base_url))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .send()
            .await?;
        if response.status().is_server_error() {
            return Err(StoreError::Unavailable(format!("record store answered {}", response.status())));
        }
        Ok(())
    }
}

/// Renders conditions as PostgREST `column=op.value` pairs; repeated columns are ANDed
fn filter_params(conditions: &[Condition]) -> Vec<(String, String)> {
    conditions
        .iter()
        .map(|c| {
            let value = match c {
                Condition::Eq(_, v) => format!("eq.{}", v.to_param()),
                Condition::Neq(_, v) => format!("neq.{}", v.to_param()),
                Condition::Gt(_, v) => format!("gt.{}", v.to_param()),
                Condition::Gte(_, v) => format!("gte.{}", v.to_param()),
                Condition::Lt(_, v) => format!("lt.{}", v.to_param()),
                Condition::Lte(_, v) => format!("lte.{}", v.to_param()),
                Condition::Contains(_, needle) => format!("ilike.*{}*", needle.replace('*', "")),
                Condition::In(_, values) => {
                    let list = values
                        .iter()
                        .map(|v| format!("\"{}\"", v.to_param().replace('"', "\\\"")))
                        .collect::<Vec<_>>()
                        .join(",");
                    format!("in.({})", list)
                }
                Condition::IsNull(_) => "is.null".to_string(),
                Condition::NotNull(_) => "not.is.null".to_string(),
            };
            (c.column().to_string(), value)
        })
        .collect()
}

fn order_param(query: &Query) -> Option<String> {
    if query.order.is_empty() {
        return None;
    }
    Some(
        query
            .order
            .iter()
            .map(|o| match o.sort {
                SortDirection::Asc => format!("{}.asc", o.column),
                SortDirection::Desc => format!("{}.desc", o.column),
            })
            .collect::<Vec<_>>()
            .join(","),
    )
}

/// `0-9/42` or `*/0` → total after the slash
fn parse_content_range_total(range: &str) -> Option<i64> {
    range.rsplit('/').next()?.trim().parse().ok()
}

/// Pulls the quoted constraint name out of a Postgres unique-violation message
fn constraint_name(message: &str) -> Option<&str> {
    let start = message.find('"')? + 1;
    let end = start + message[start..].find('"')?;
    Some(&message[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn renders_postgrest_filters() {
        let doctor = Uuid::nil();
        let q = Query::from(Table::Appointments)
            .eq("doctor_id", doctor)
            .neq("status", "cancelled")
            .live()
            .contains("notes", "canal");
        let params = filter_params(&q.conditions);
        assert_eq!(params[0], ("doctor_id".to_string(), format!("eq.{}", doctor)));
        assert_eq!(params[1], ("status".to_string(), "neq.cancelled".to_string()));
        assert_eq!(params[2], ("deleted_at".to_string(), "is.null".to_string()));
        assert_eq!(params[3], ("notes".to_string(), "ilike.*canal*".to_string()));
    }

    #[test]
    fn renders_in_lists_quoted() {
        let q = Query::from(Table::Patients).one_of("id", vec!["a", "b"]);
        let params = filter_params(&q.conditions);
        assert_eq!(params[0].1, "in.(\"a\",\"b\")");
    }

    #[test]
    fn renders_order() {
        let q = Query::from(Table::Finances).order_asc("due_at").order_desc("created_at");
        assert_eq!(order_param(&q).as_deref(), Some("due_at.asc,created_at.desc"));
        assert_eq!(order_param(&Query::from(Table::Finances)), None);
    }

    #[test]
    fn reads_content_range_totals() {
        assert_eq!(parse_content_range_total("0-9/42"), Some(42));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[test]
    fn extracts_constraint_names() {
        let msg = "duplicate key value violates unique constraint \"patients_email_unique\"";
        assert_eq!(constraint_name(msg), Some("patients_email_unique"));
        assert_eq!(constraint_name("no quotes"), None);
    }
}
