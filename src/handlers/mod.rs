//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, query)
//! 2. Calls the matching service with the caller's owner id
//! 3. Returns HTTP response (JSON, status code)
//!
//! Handlers are generic over the store so the same router serves the
//! PostgreSQL and in-memory backends.

/// Account management endpoints
pub mod accounts;

/// Income and expense endpoints
pub mod entries;

/// Savings goal endpoints
pub mod goals;

pub mod health;

/// Unassigned-entry migration endpoints
pub mod migration;

/// Transfer endpoints
pub mod transfers;
