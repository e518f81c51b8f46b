// handlers/public/mod.rs - endpoints reachable without a bearer token
//
// Account entry points, the billing catalogue, provider callbacks and health.

pub mod auth;
pub mod billing;
pub mod health;
