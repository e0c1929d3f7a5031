//! API key authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Refuse clients that failed too often recently (HTTP 429)
//! 2. Extract the API key from the Authorization header
//! 3. Hash it and resolve the owner it belongs to
//! 4. Inject the owner identity into the request
//!
//! Failed attempts are counted per client address in the shared
//! [`RateLimiter`](crate::middleware::rate_limit::RateLimiter).

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::{error::AppError, models::api_key::hash_api_key, state::AppState, store::LedgerStore};

/// Authentication context attached to authenticated requests.
///
/// Handlers extract it with `Extension<AuthContext>`; every service call is
/// scoped by `owner_id`.
#[derive(Debug, Clone, Copy)]
pub struct AuthContext {
    pub owner_id: Uuid,
}

/// Rate-limiting key for the caller: its socket address when the server was
/// started with connect info, otherwise a shared bucket.
fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|key| !key.is_empty())
}

/// API key authentication middleware function.
///
/// # Headers
///
/// ```text
/// Authorization: Bearer abc123xyz
/// ```
///
/// # Returns
///
/// - the downstream response when the key maps to an owner
/// - 401 `invalid_api_key` for a missing, malformed or unknown key
/// - 429 `rate_limited` with `Retry-After` once the client exhausted its attempts
pub async fn auth_middleware<S: LedgerStore>(
    State(state): State<AppState<S>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client = client_key(&request);

    if state.limiter.is_blocked(&client) {
        tracing::warn!(%client, "authentication throttled");
        let retry_after = state.limiter.window().as_secs().to_string();
        return Ok(([(header::RETRY_AFTER, retry_after)], AppError::RateLimited).into_response());
    }

    // Hash before awaiting so no borrow of the request is held across the lookup
    let key_hash = bearer_token(&request).map(hash_api_key);
    let owner_id = match key_hash {
        Some(hash) => state.store.owner_for_key_hash(&hash).await?,
        None => None,
    };

    let Some(owner_id) = owner_id else {
        state.limiter.record_failure(&client);
        tracing::warn!(%client, "authentication failed");
        return Err(AppError::InvalidApiKey);
    };

    state.limiter.reset(&client);
    request.extensions_mut().insert(AuthContext { owner_id });

    Ok(next.run(request).await)
}
