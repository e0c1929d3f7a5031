//! Account management HTTP handlers.
//!
//! - POST /api/v1/accounts - Create new account
//! - GET /api/v1/accounts - List accounts with balances and net worth
//! - GET /api/v1/accounts/default - Id of the default account, created on demand
//! - GET /api/v1/accounts/{id} - Get account by ID
//! - PUT /api/v1/accounts/{id} - Edit name, type and opening balance
//! - DELETE /api/v1/accounts/{id} - Delete an unreferenced account

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::account::{
        AccountListResponse, AccountResponse, CreateAccountRequest, DefaultAccountResponse,
        UpdateAccountRequest,
    },
    services::{accounts, provisioner},
    state::AppState,
    store::LedgerStore,
};

/// Create a new account.
///
/// # Request Body
///
/// ```json
/// {
///   "name": "Savings",
///   "account_type": "savings",
///   "opening_balance": "100.00"
/// }
/// ```
///
/// # Response
///
/// - **201 Created**: the account with its balance (equal to the opening balance)
/// - **400**: blank name
/// - **409**: the name is reserved for the default account
pub async fn create_account<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), AppError> {
    let account = accounts::create_account(&state.store, auth.owner_id, request).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// List all accounts of the caller, newest first, plus their net worth.
pub async fn list_accounts<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<AccountListResponse>, AppError> {
    let listing = accounts::list_accounts(&state.store, auth.owner_id).await?;
    Ok(Json(listing))
}

/// Get a specific account by ID.
///
/// Returns 404 if the account doesn't exist OR belongs to another owner, so
/// existence of other owners' accounts is never leaked.
pub async fn get_account<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthContext>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<AccountResponse>, AppError> {
    let account = accounts::get_account(&state.store, auth.owner_id, account_id).await?;
    Ok(Json(account))
}

pub async fn default_account<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<DefaultAccountResponse>, AppError> {
    let account_id = provisioner::ensure_default_account(&state.store, auth.owner_id).await?;
    Ok(Json(DefaultAccountResponse { account_id }))
}

/// Edit an account and recompute its balance.
///
/// The default account keeps its name; any other account may not take it.
pub async fn update_account<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthContext>,
    Path(account_id): Path<Uuid>,
    Json(request): Json<UpdateAccountRequest>,
) -> Result<Json<AccountResponse>, AppError> {
    let account = accounts::update_account(&state.store, auth.owner_id, account_id, request).await?;
    Ok(Json(account))
}

/// Delete an account.
///
/// # Response
///
/// - **204 No Content**: deleted
/// - **409**: default account, or still referenced by entries or transfers
pub async fn delete_account<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthContext>,
    Path(account_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    accounts::delete_account(&state.store, auth.owner_id, account_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
