use crate::store::OrderBy;

use super::error::FilterError;
use super::filter::validate_identifier;

pub struct FilterOrder;

impl FilterOrder {
    pub fn generate(infos: &[OrderBy], qualifier: Option<&str>) -> Result<String, FilterError> {
        if infos.is_empty() {
            return Ok(String::new());
        }
        let mut parts = Vec::with_capacity(infos.len());
        for info in infos {
            validate_identifier(&info.column).map_err(FilterError::InvalidColumn)?;
            let column = match qualifier {
                Some(alias) => format!("{}.\"{}\"", alias, info.column),
                None => format!("\"{}\"", info.column),
            };
            parts.push(format!("{} {}", column, info.sort.to_sql()));
        }
        Ok(format!("ORDER BY {}", parts.join(", ")))
    }
}
