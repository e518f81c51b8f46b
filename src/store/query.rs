use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use uuid::Uuid;

/// Tables the API reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Users,
    Doctors,
    Patients,
    PatientDoctors,
    Appointments,
    Finances,
    OdontogramTreatments,
    ToothStates,
    PatientDocs,
    PatientImages,
    Subscriptions,
    ActivityLogs,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Doctors => "doctors",
            Table::Patients => "patients",
            Table::PatientDoctors => "patient_doctors",
            Table::Appointments => "appointments",
            Table::Finances => "finances",
            Table::OdontogramTreatments => "odontogram_treatments",
            Table::ToothStates => "tooth_states",
            Table::PatientDocs => "patient_docs",
            Table::PatientImages => "patient_images",
            Table::Subscriptions => "subscriptions",
            Table::ActivityLogs => "activity_logs",
        }
    }

    /// Whether rows carry an `updated_at` column that writes should refresh
    pub fn tracks_updates(&self) -> bool {
        !matches!(self, Table::PatientDoctors | Table::ActivityLogs)
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed scalar used on the right-hand side of a condition
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
}

impl FieldValue {
    /// Wire form used by the REST backend and for JSON comparisons
    pub fn to_param(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Int(i) => i.to_string(),
            FieldValue::Float(f) => f.to_string(),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Uuid(u) => u.to_string(),
            FieldValue::Timestamp(t) => t.to_rfc3339(),
            FieldValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Int(i) => Value::from(*i),
            FieldValue::Float(f) => Value::from(*f),
            FieldValue::Bool(b) => Value::Bool(*b),
            other => Value::String(other.to_param()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int(v as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<Uuid> for FieldValue {
    fn from(v: Uuid) -> Self {
        FieldValue::Uuid(v)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(v: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(v)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(v: NaiveDate) -> Self {
        FieldValue::Date(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// One predicate over a single column
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(String, FieldValue),
    Neq(String, FieldValue),
    Gt(String, FieldValue),
    Gte(String, FieldValue),
    Lt(String, FieldValue),
    Lte(String, FieldValue),
    /// Case-insensitive substring match
    Contains(String, String),
    In(String, Vec<FieldValue>),
    IsNull(String),
    NotNull(String),
}

impl Condition {
    pub fn column(&self) -> &str {
        match self {
            Condition::Eq(c, _)
            | Condition::Neq(c, _)
            | Condition::Gt(c, _)
            | Condition::Gte(c, _)
            | Condition::Lt(c, _)
            | Condition::Lte(c, _)
            | Condition::Contains(c, _)
            | Condition::In(c, _)
            | Condition::IsNull(c)
            | Condition::NotNull(c) => c,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub sort: SortDirection,
}

/// Select/count/update/delete target: a table plus conjunctive conditions
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: Table,
    pub conditions: Vec<Condition>,
    pub order: Vec<OrderBy>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Query {
    pub fn from(table: Table) -> Self {
        Self {
            table,
            conditions: vec![],
            order: vec![],
            limit: None,
            offset: None,
        }
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn eq(self, column: &str, value: impl Into<FieldValue>) -> Self {
        self.filter(Condition::Eq(column.to_string(), value.into()))
    }

    pub fn neq(self, column: &str, value: impl Into<FieldValue>) -> Self {
        self.filter(Condition::Neq(column.to_string(), value.into()))
    }

    pub fn gt(self, column: &str, value: impl Into<FieldValue>) -> Self {
        self.filter(Condition::Gt(column.to_string(), value.into()))
    }

    pub fn gte(self, column: &str, value: impl Into<FieldValue>) -> Self {
        self.filter(Condition::Gte(column.to_string(), value.into()))
    }

    pub fn lt(self, column: &str, value: impl Into<FieldValue>) -> Self {
        self.filter(Condition::Lt(column.to_string(), value.into()))
    }

    pub fn lte(self, column: &str, value: impl Into<FieldValue>) -> Self {
        self.filter(Condition::Lte(column.to_string(), value.into()))
    }

    pub fn contains(self, column: &str, needle: impl Into<String>) -> Self {
        self.filter(Condition::Contains(column.to_string(), needle.into()))
    }

    pub fn one_of<V: Into<FieldValue>>(self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.filter(Condition::In(column.to_string(), values))
    }

    pub fn is_null(self, column: &str) -> Self {
        self.filter(Condition::IsNull(column.to_string()))
    }

    pub fn not_null(self, column: &str) -> Self {
        self.filter(Condition::NotNull(column.to_string()))
    }

    /// Shorthand for the soft-delete filter every live read applies
    pub fn live(self) -> Self {
        self.is_null("deleted_at")
    }

    pub fn order_asc(mut self, column: &str) -> Self {
        self.order.push(OrderBy { column: column.to_string(), sort: SortDirection::Asc });
        self
    }

    pub fn order_desc(mut self, column: &str) -> Self {
        self.order.push(OrderBy { column: column.to_string(), sort: SortDirection::Desc });
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Applies `page`/`limit` paging; page is 1-based and the offset saturates
    pub fn page(mut self, page: i64, limit: i64) -> Self {
        let page = page.max(1);
        let limit = limit.max(0);
        self.limit = Some(limit);
        self.offset = Some((page - 1).saturating_mul(limit));
        self
    }

    /// Same table and conditions without ordering or paging, used for totals
    pub fn without_paging(&self) -> Self {
        Self {
            table: self.table,
            conditions: self.conditions.clone(),
            order: vec![],
            limit: None,
            offset: None,
        }
    }
}

/// A named uniqueness predicate checked atomically with a write.
///
/// The name matches the unique index backing it in `schema/sisdental.sql`, so
/// conflicts raised by the database and by the guard check surface the same way.
#[derive(Debug, Clone, PartialEq)]
pub struct Guard {
    pub name: &'static str,
    pub conditions: Vec<Condition>,
}

impl Guard {
    pub fn new(name: &'static str) -> Self {
        Self { name, conditions: vec![] }
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn eq(self, column: &str, value: impl Into<FieldValue>) -> Self {
        self.when(Condition::Eq(column.to_string(), value.into()))
    }

    pub fn neq(self, column: &str, value: impl Into<FieldValue>) -> Self {
        self.when(Condition::Neq(column.to_string(), value.into()))
    }

    pub fn live(self) -> Self {
        self.when(Condition::IsNull("deleted_at".to_string()))
    }

    /// Query that finds rows violating this guard in `table`
    pub fn to_query(&self, table: Table) -> Query {
        Query {
            table,
            conditions: self.conditions.clone(),
            order: vec![],
            limit: Some(1),
            offset: None,
        }
    }
}
