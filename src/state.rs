//! Shared router state.

use crate::{middleware::rate_limit::RateLimiter, store::LedgerStore};

/// Everything handlers and middleware share: the ledger store and the
/// authentication rate limiter.
#[derive(Debug, Clone)]
pub struct AppState<S> {
    pub store: S,
    pub limiter: RateLimiter,
}

impl<S: LedgerStore> AppState<S> {
    pub fn new(store: S, limiter: RateLimiter) -> Self {
        Self { store, limiter }
    }
}
