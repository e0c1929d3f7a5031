//! Transfer HTTP handlers.

use axum::{Extension, Json, extract::State, http::StatusCode};

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::transfer::{TransferDraft, TransferReceipt, TransferRequest, TransferResponse},
    services::transfers,
    state::AppState,
    store::LedgerStore,
};

/// Move money between two of the caller's accounts.
///
/// # Request Body
///
/// ```json
/// {
///   "from_account_id": "550e8400-e29b-41d4-a716-446655440000",
///   "to_account_id": "660e8400-e29b-41d4-a716-446655440001",
///   "amount": "50.00",
///   "idempotency_key": "rent-2025-12"
/// }
/// ```
///
/// # Response
///
/// - **201 Created**: new transfer with both resulting balances
/// - **200 OK**: the idempotency key was already used; the earlier transfer is returned
/// - **400**: same account on both sides, or non-positive amount
/// - **403**: one of the accounts is not the caller's
/// - **422**: source balance lower than the amount
pub async fn create_transfer<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<TransferRequest>,
) -> Result<(StatusCode, Json<TransferReceipt>), AppError> {
    let draft = TransferDraft::from_request(request)?;
    let outcome = transfers::execute_transfer(&state.store, auth.owner_id, draft).await?;

    let status = if outcome.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(outcome.into())))
}

pub async fn list_transfers<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<TransferResponse>>, AppError> {
    let transfers = transfers::list_transfers(&state.store, auth.owner_id).await?;
    Ok(Json(transfers.into_iter().map(Into::into).collect()))
}
