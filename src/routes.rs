//! Router assembly.
//!
//! Public routes (`/health`) sit outside the authentication layer; every
//! `/api/v1` route requires an API key.

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post, put},
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{handlers, middleware, state::AppState, store::LedgerStore};

/// CORS policy for the given browser origins. Unparseable origins are skipped.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Build the full application router over any store backend.
pub fn build_router<S: LedgerStore>(state: AppState<S>, cors: CorsLayer) -> Router {
    let authenticated_routes = Router::new()
        // Accounts
        .route(
            "/api/v1/accounts",
            post(handlers::accounts::create_account::<S>).get(handlers::accounts::list_accounts::<S>),
        )
        .route(
            "/api/v1/accounts/default",
            get(handlers::accounts::default_account::<S>),
        )
        .route(
            "/api/v1/accounts/{id}",
            get(handlers::accounts::get_account::<S>)
                .put(handlers::accounts::update_account::<S>)
                .delete(handlers::accounts::delete_account::<S>),
        )
        // Incomes
        .route(
            "/api/v1/incomes",
            post(handlers::entries::create_income::<S>).get(handlers::entries::list_incomes::<S>),
        )
        .route(
            "/api/v1/incomes/{id}",
            put(handlers::entries::update_income::<S>).delete(handlers::entries::delete_income::<S>),
        )
        // Expenses
        .route(
            "/api/v1/expenses",
            post(handlers::entries::create_expense::<S>).get(handlers::entries::list_expenses::<S>),
        )
        .route(
            "/api/v1/expenses/{id}",
            put(handlers::entries::update_expense::<S>).delete(handlers::entries::delete_expense::<S>),
        )
        // Transfers
        .route(
            "/api/v1/transfers",
            post(handlers::transfers::create_transfer::<S>).get(handlers::transfers::list_transfers::<S>),
        )
        // Savings goals
        .route(
            "/api/v1/goals",
            post(handlers::goals::create_goal::<S>).get(handlers::goals::list_goals::<S>),
        )
        .route(
            "/api/v1/goals/{id}",
            put(handlers::goals::update_goal::<S>).delete(handlers::goals::delete_goal::<S>),
        )
        .route(
            "/api/v1/goals/{id}/contributions",
            post(handlers::goals::contribute::<S>),
        )
        // Unassigned-entry migration
        .route(
            "/api/v1/migration/unlinked",
            get(handlers::migration::unlinked_summary::<S>).post(handlers::migration::migrate_unlinked::<S>),
        )
        // Apply authentication middleware to all routes in this group
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware::<S>,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_check::<S>))
        .merge(authenticated_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
