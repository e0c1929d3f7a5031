//! Personal-finance ledger engine.
//!
//! Accounts, incomes, expenses and transfers for many owners, with every
//! account's stored balance kept equal to the balance derived from its
//! ledger rows. The library exposes the services over a pluggable store
//! (PostgreSQL or in-memory) and an axum router on top of them.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
