use thiserror::Error;

/// Errors surfaced by every record store backend
#[derive(Debug, Error)]
pub enum StoreError {
    /// A guard or unique index rejected the write; carries the guard/index name
    #[error("Conflict on {0}")]
    Conflict(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Malformed row: {0}")]
    Malformed(String),
}

impl StoreError {
    pub fn is_conflict(&self, name: &str) -> bool {
        matches!(self, StoreError::Conflict(n) if n == name)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                StoreError::Conflict(db.constraint().unwrap_or("unique").to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::Upstream(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            StoreError::Unavailable(err.to_string())
        } else {
            StoreError::Upstream(err.to_string())
        }
    }
}

impl From<crate::filter::FilterError> for StoreError {
    fn from(err: crate::filter::FilterError) -> Self {
        StoreError::InvalidQuery(err.to_string())
    }
}

impl From<crate::database::DatabaseError> for StoreError {
    fn from(err: crate::database::DatabaseError) -> Self {
        match err {
            crate::database::DatabaseError::Sqlx(e) => e.into(),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}
