//! HTTP middleware components.
//!
//! Middleware run before route handlers. They can:
//! - Authenticate requests and attach the owner identity
//! - Short-circuit requests (reject unauthorized or throttled callers)

/// API key authentication middleware
pub mod auth;

/// Failed-attempt throttling used by `auth`
pub mod rate_limit;
