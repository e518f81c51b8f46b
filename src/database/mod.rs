pub mod manager;
pub mod models;
pub mod pg_store;
pub mod query_builder;

pub use manager::{DatabaseError, DatabaseManager};
pub use pg_store::PgStore;
