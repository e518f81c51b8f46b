use crate::store::{Condition, FieldValue};

use super::error::FilterError;
use super::filter::validate_identifier;
use super::types::FilterWhereOptions;

pub struct FilterWhere {
    param_values: Vec<FieldValue>,
    param_index: usize,
    qualifier: Option<String>,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize, options: &FilterWhereOptions) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
            qualifier: options.qualifier.clone(),
        }
    }

    /// Renders conditions joined by AND. Placeholders start after `starting_param_index`,
    /// so a caller that already bound `$1` passes 1 and gets `$2` onwards.
    pub fn generate(
        conditions: &[Condition],
        starting_param_index: usize,
        options: &FilterWhereOptions,
    ) -> Result<(String, Vec<FieldValue>), FilterError> {
        let mut filter_where = Self::new(starting_param_index, options);
        filter_where.build(conditions)
    }

    fn build(&mut self, conditions: &[Condition]) -> Result<(String, Vec<FieldValue>), FilterError> {
        let mut sql_conditions = Vec::with_capacity(conditions.len());
        for condition in conditions {
            sql_conditions.push(self.build_sql_condition(condition)?);
        }
        Ok((sql_conditions.join(" AND "), std::mem::take(&mut self.param_values)))
    }

    fn build_sql_condition(&mut self, condition: &Condition) -> Result<String, FilterError> {
        let column = self.column(condition.column())?;
        Ok(match condition {
            Condition::Eq(_, v) => format!("{} = {}", column, self.param(v.clone())),
            Condition::Neq(_, v) => format!("{} <> {}", column, self.param(v.clone())),
            Condition::Gt(_, v) => format!("{} > {}", column, self.param(v.clone())),
            Condition::Gte(_, v) => format!("{} >= {}", column, self.param(v.clone())),
            Condition::Lt(_, v) => format!("{} < {}", column, self.param(v.clone())),
            Condition::Lte(_, v) => format!("{} <= {}", column, self.param(v.clone())),
            Condition::Contains(_, needle) => {
                let pattern = format!("%{}%", escape_like(needle));
                format!("{}::text ILIKE {}", column, self.param(FieldValue::Text(pattern)))
            }
            Condition::In(_, values) => {
                if values.is_empty() {
                    return Ok("1=0".to_string());
                }
                let params: Vec<String> = values.iter().map(|v| self.param(v.clone())).collect();
                format!("{} IN ({})", column, params.join(", "))
            }
            Condition::IsNull(_) => format!("{} IS NULL", column),
            Condition::NotNull(_) => format!("{} IS NOT NULL", column),
        })
    }

    fn column(&self, name: &str) -> Result<String, FilterError> {
        validate_identifier(name).map_err(FilterError::InvalidColumn)?;
        Ok(match &self.qualifier {
            Some(alias) => format!("{}.\"{}\"", alias, name),
            None => format!("\"{}\"", name),
        })
    }

    fn param(&mut self, value: FieldValue) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

fn escape_like(needle: &str) -> String {
    needle.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
