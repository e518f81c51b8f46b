use crate::store::{Query, Table};

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{FilterWhereOptions, SqlResult};

/// Alias every generated statement gives its target table
const ALIAS: &str = "t";

/// Renders a typed [`Query`] into parameterised Postgres statements.
///
/// Rows travel as `jsonb`: reads return `to_jsonb(t)` and writes go through
/// `jsonb_populate_record`, so the column set never has to be known up front.
pub struct Filter {
    table_name: &'static str,
    query: Query,
    options: FilterWhereOptions,
}

impl Filter {
    pub fn new(query: &Query) -> Result<Self, FilterError> {
        let table_name = query.table.name();
        validate_identifier(table_name).map_err(FilterError::InvalidTableName)?;
        if let Some(limit) = query.limit {
            if limit < 0 {
                return Err(FilterError::InvalidLimit("Limit must be non-negative".to_string()));
            }
        }
        if let Some(offset) = query.offset {
            if offset < 0 {
                return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string()));
            }
        }
        Ok(Self {
            table_name,
            query: query.clone(),
            options: FilterWhereOptions::qualified(ALIAS),
        })
    }

    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let (where_clause, params) = self.where_clause(0)?;
        let order_clause = FilterOrder::generate(&self.query.order, Some(ALIAS))?;
        let limit_clause = self.build_limit_clause();

        let query = [
            "SELECT to_jsonb(t) AS row".to_string(),
            format!("FROM \"{}\" AS {}", self.table_name, ALIAS),
            where_clause,
            order_clause,
            limit_clause,
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        Ok(SqlResult { query, params })
    }

    pub fn to_count_sql(&self) -> Result<SqlResult, FilterError> {
        let (where_clause, params) = self.where_clause(0)?;
        let query = format!("SELECT COUNT(*) AS count FROM \"{}\" AS {} {}", self.table_name, ALIAS, where_clause);
        Ok(SqlResult { query: query.trim_end().to_string(), params })
    }

    pub fn to_delete_sql(&self) -> Result<SqlResult, FilterError> {
        let (where_clause, params) = self.where_clause(0)?;
        let query = format!("DELETE FROM \"{}\" AS {} {}", self.table_name, ALIAS, where_clause);
        Ok(SqlResult { query: query.trim_end().to_string(), params })
    }

    /// `UPDATE` that copies `columns` from the jsonb patch bound as `$1`
    pub fn to_update_sql(&self, columns: &[String]) -> Result<SqlResult, FilterError> {
        if columns.is_empty() {
            return Err(FilterError::EmptyWrite(format!("no columns to update on {}", self.table_name)));
        }
        let assignments = columns
            .iter()
            .map(|c| {
                validate_identifier(c).map_err(FilterError::InvalidColumn)?;
                Ok(format!("\"{}\" = r.\"{}\"", c, c))
            })
            .collect::<Result<Vec<_>, FilterError>>()?;

        let (where_clause, params) = self.where_clause(1)?;
        let query = format!(
            "UPDATE \"{table}\" AS {alias} SET {assignments} FROM jsonb_populate_record(NULL::\"{table}\", $1) AS r {where_clause} RETURNING to_jsonb({alias}) AS row",
            table = self.table_name,
            alias = ALIAS,
            assignments = assignments.join(", "),
            where_clause = where_clause,
        );
        Ok(SqlResult { query, params })
    }

    /// `INSERT` of one row taken from the jsonb value bound as `$1`
    pub fn insert_sql(table: Table, columns: &[String]) -> Result<String, FilterError> {
        if columns.is_empty() {
            return Err(FilterError::EmptyWrite(format!("no columns to insert into {}", table)));
        }
        for c in columns {
            validate_identifier(c).map_err(FilterError::InvalidColumn)?;
        }
        let list = columns.iter().map(|c| format!("\"{}\"", c)).collect::<Vec<_>>().join(", ");
        Ok(format!(
            "INSERT INTO \"{table}\" AS {alias} ({list}) SELECT {list} FROM jsonb_populate_record(NULL::\"{table}\", $1) RETURNING to_jsonb({alias}) AS row",
            table = table.name(),
            alias = ALIAS,
            list = list,
        ))
    }

    fn where_clause(&self, starting_param_index: usize) -> Result<(String, Vec<crate::store::FieldValue>), FilterError> {
        if self.query.conditions.is_empty() {
            return Ok((String::new(), vec![]));
        }
        let (sql, params) = FilterWhere::generate(&self.query.conditions, starting_param_index, &self.options)?;
        Ok((format!("WHERE {}", sql), params))
    }

    fn build_limit_clause(&self) -> String {
        match (self.query.limit, self.query.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            (None, Some(o)) => format!("OFFSET {}", o),
            (None, None) => String::new(),
        }
    }
}

/// Accepts `[A-Za-z_][A-Za-z0-9_]*`; anything else is returned as the error message
pub fn validate_identifier(name: &str) -> Result<(), String> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => (first.is_ascii_alphabetic() || first == '_') && chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(format!("Invalid identifier format: {:?}", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn select_with_conditions_order_and_paging() {
        let doctor = Uuid::nil();
        let q = Query::from(Table::Finances)
            .eq("doctor_id", doctor)
            .live()
            .order_asc("due_at")
            .page(2, 10);
        let sql = Filter::new(&q).unwrap().to_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT to_jsonb(t) AS row FROM \"finances\" AS t WHERE t.\"doctor_id\" = $1 AND t.\"deleted_at\" IS NULL ORDER BY t.\"due_at\" ASC LIMIT 10 OFFSET 10"
        );
        assert_eq!(sql.params.len(), 1);
    }

    #[test]
    fn count_ignores_order_and_paging() {
        let q = Query::from(Table::Patients).live().order_asc("name").page(1, 5);
        let sql = Filter::new(&q).unwrap().to_count_sql().unwrap();
        assert_eq!(sql.query, "SELECT COUNT(*) AS count FROM \"patients\" AS t WHERE t.\"deleted_at\" IS NULL");
    }

    #[test]
    fn update_binds_patch_first() {
        let q = Query::from(Table::Appointments).eq("id", Uuid::nil());
        let sql = Filter::new(&q)
            .unwrap()
            .to_update_sql(&["status".to_string(), "updated_at".to_string()])
            .unwrap();
        assert!(sql.query.starts_with("UPDATE \"appointments\" AS t SET \"status\" = r.\"status\", \"updated_at\" = r.\"updated_at\""));
        assert!(sql.query.contains("WHERE t.\"id\" = $2"));
    }

    #[test]
    fn insert_lists_columns_twice() {
        let sql = Filter::insert_sql(Table::Doctors, &["id".to_string(), "user_id".to_string()]).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"doctors\" AS t (\"id\", \"user_id\") SELECT \"id\", \"user_id\" FROM jsonb_populate_record(NULL::\"doctors\", $1) RETURNING to_jsonb(t) AS row"
        );
    }

    #[test]
    fn rejects_negative_limit() {
        let mut q = Query::from(Table::Patients);
        q.limit = Some(-1);
        assert!(Filter::new(&q).is_err());
    }
}
