use crate::store::FieldValue;

#[derive(Debug, Clone, Default)]
pub struct FilterWhereOptions {
    /// Table alias prefixed to every column, e.g. `t` renders `t."name"`
    pub qualifier: Option<String>,
}

impl FilterWhereOptions {
    pub fn qualified(alias: &str) -> Self {
        Self { qualifier: Some(alias.to_string()) }
    }
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<FieldValue>,
}
