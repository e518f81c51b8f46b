// handlers/protected/mod.rs - endpoints behind bearer authentication
//
// `account`, `subscriptions` and `billing` only need the caller's identity.
// Everything else also runs behind tenant resolution and receives a `Tenant`.

pub mod account;
pub mod appointments;
pub mod billing;
pub mod documents;
pub mod finances;
pub mod odontogram;
pub mod patients;
pub mod reports;
pub mod search;
pub mod settings;
pub mod subscriptions;
pub mod upload;
