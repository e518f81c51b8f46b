pub mod app;
pub mod auth;
pub mod billing;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod services;
pub mod store;
