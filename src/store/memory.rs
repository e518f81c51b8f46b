use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::query::{Condition, FieldValue, Guard, OrderBy, Query, SortDirection, Table};
use super::{stamp_new, stamp_patch, RecordStore, StoreError};

type Row = Map<String, Value>;

/// In-process tables guarded by a single lock.
///
/// Guarded writes and `replace_all` run under the write lock, which makes them
/// atomic with respect to every other request.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<Table, Vec<Row>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a row verbatim apart from stamping, bypassing guards
    pub async fn seed(&self, table: Table, row: Value) -> Result<Value, StoreError> {
        let row = stamp_new(table, row)?;
        let mut tables = self.tables.write().await;
        tables.entry(table).or_default().push(row.clone());
        Ok(Value::Object(row))
    }

    /// Every row of a table, including soft-deleted ones
    pub async fn dump(&self, table: Table) -> Vec<Value> {
        let tables = self.tables.read().await;
        tables
            .get(&table)
            .map(|rows| rows.iter().cloned().map(Value::Object).collect())
            .unwrap_or_default()
    }
}

fn check_guards(rows: &[Row], guards: &[Guard]) -> Result<(), StoreError> {
    for guard in guards {
        if rows.iter().any(|row| matches_all(row, &guard.conditions)) {
            return Err(StoreError::Conflict(guard.name.to_string()));
        }
    }
    Ok(())
}

fn apply_patch(row: &mut Row, patch: &Row) {
    for (k, v) in patch {
        row.insert(k.clone(), v.clone());
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn select(&self, query: &Query) -> Result<Vec<Value>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<&Row> = tables
            .get(&query.table)
            .map(|rows| rows.iter().filter(|r| matches_all(r, &query.conditions)).collect())
            .unwrap_or_default();

        if !query.order.is_empty() {
            rows.sort_by(|a, b| compare_rows(a, b, &query.order));
        }

        let offset = query.offset.unwrap_or(0).max(0) as usize;
        let limit = query.limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);
        Ok(rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .map(Value::Object)
            .collect())
    }

    async fn count(&self, query: &Query) -> Result<i64, StoreError> {
        let tables = self.tables.read().await;
        let count = tables
            .get(&query.table)
            .map(|rows| rows.iter().filter(|r| matches_all(r, &query.conditions)).count())
            .unwrap_or(0);
        Ok(count as i64)
    }

    async fn insert_guarded(&self, table: Table, row: Value, guards: &[Guard]) -> Result<Value, StoreError> {
        let row = stamp_new(table, row)?;
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table).or_default();
        check_guards(rows, guards)?;
        rows.push(row.clone());
        Ok(Value::Object(row))
    }

    async fn update_guarded(&self, query: &Query, patch: Value, guards: &[Guard]) -> Result<Vec<Value>, StoreError> {
        let patch = stamp_patch(query.table, patch)?;
        let mut tables = self.tables.write().await;
        let rows = tables.entry(query.table).or_default();
        check_guards(rows, guards)?;

        let mut updated = Vec::new();
        for row in rows.iter_mut().filter(|r| matches_all(r, &query.conditions)) {
            apply_patch(row, &patch);
            updated.push(Value::Object(row.clone()));
        }
        Ok(updated)
    }

    async fn delete(&self, query: &Query) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(query.table).or_default();
        let before = rows.len();
        rows.retain(|r| !matches_all(r, &query.conditions));
        Ok((before - rows.len()) as u64)
    }

    async fn replace_all(&self, scope: &Query, retire: Value, new_rows: Vec<Value>) -> Result<Vec<Value>, StoreError> {
        let retire = stamp_patch(scope.table, retire)?;
        let stamped = new_rows
            .into_iter()
            .map(|r| stamp_new(scope.table, r))
            .collect::<Result<Vec<_>, _>>()?;

        let mut tables = self.tables.write().await;
        let rows = tables.entry(scope.table).or_default();
        for row in rows.iter_mut().filter(|r| matches_all(r, &scope.conditions)) {
            apply_patch(row, &retire);
        }
        rows.extend(stamped.iter().cloned());
        Ok(stamped.into_iter().map(Value::Object).collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

pub(crate) fn matches_all(row: &Row, conditions: &[Condition]) -> bool {
    conditions.iter().all(|c| matches(row, c))
}

fn matches(row: &Row, condition: &Condition) -> bool {
    let cell = row.get(condition.column()).unwrap_or(&Value::Null);
    match condition {
        Condition::Eq(_, v) => compare(cell, v) == Some(Ordering::Equal),
        // SQL semantics: NULL <> x is not true
        Condition::Neq(_, v) => matches!(compare(cell, v), Some(o) if o != Ordering::Equal),
        Condition::Gt(_, v) => compare(cell, v) == Some(Ordering::Greater),
        Condition::Gte(_, v) => matches!(compare(cell, v), Some(Ordering::Greater | Ordering::Equal)),
        Condition::Lt(_, v) => compare(cell, v) == Some(Ordering::Less),
        Condition::Lte(_, v) => matches!(compare(cell, v), Some(Ordering::Less | Ordering::Equal)),
        Condition::Contains(_, needle) => match cell {
            Value::Null => false,
            Value::String(s) => s.to_lowercase().contains(&needle.to_lowercase()),
            other => other.to_string().to_lowercase().contains(&needle.to_lowercase()),
        },
        Condition::In(_, values) => values.iter().any(|v| compare(cell, v) == Some(Ordering::Equal)),
        Condition::IsNull(_) => cell.is_null(),
        Condition::NotNull(_) => !cell.is_null(),
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn as_number(cell: &Value) -> Option<f64> {
    match cell {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Orders a stored JSON cell against a typed value; `None` when incomparable or NULL
fn compare(cell: &Value, value: &FieldValue) -> Option<Ordering> {
    if cell.is_null() {
        return None;
    }
    match value {
        FieldValue::Text(t) => match cell {
            Value::String(s) => Some(s.as_str().cmp(t.as_str())),
            Value::Number(_) => as_number(cell)?.partial_cmp(&t.parse::<f64>().ok()?),
            Value::Bool(b) => Some(b.to_string().as_str().cmp(t.as_str())),
            _ => None,
        },
        FieldValue::Int(i) => as_number(cell)?.partial_cmp(&(*i as f64)),
        FieldValue::Float(f) => as_number(cell)?.partial_cmp(f),
        FieldValue::Bool(b) => match cell {
            Value::Bool(c) => Some(c.cmp(b)),
            Value::String(s) => s.parse::<bool>().ok().map(|c| c.cmp(b)),
            _ => None,
        },
        FieldValue::Uuid(u) => {
            let s = cell.as_str()?;
            match Uuid::parse_str(s) {
                Ok(c) => Some(c.cmp(u)),
                Err(_) => Some(s.cmp(u.to_string().as_str())),
            }
        }
        FieldValue::Timestamp(t) => parse_timestamp(cell.as_str()?).map(|c| c.cmp(t)),
        FieldValue::Date(d) => {
            let s = cell.as_str()?;
            NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok().map(|c| c.cmp(d))
        }
    }
}

fn compare_cells(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        // NULLS LAST, as Postgres does for ascending order
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => {
            x.as_f64().partial_cmp(&y.as_f64()).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => match (parse_timestamp(x), parse_timestamp(y)) {
            (Some(tx), Some(ty)) if x.len() > 10 || y.len() > 10 => tx.cmp(&ty),
            _ => x.cmp(y),
        },
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn compare_rows(a: &Row, b: &Row, order: &[OrderBy]) -> Ordering {
    for o in order {
        let left = a.get(&o.column).unwrap_or(&Value::Null);
        let right = b.get(&o.column).unwrap_or(&Value::Null);
        let ord = compare_cells(left, right);
        let ord = match o.sort {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
