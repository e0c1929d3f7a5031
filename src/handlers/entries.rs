//! Income and expense HTTP handlers.
//!
//! Both kinds share one reconciliation path; the handlers only build the
//! right draft and pick the kind for lookups.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::entry::{Entry, EntryDraft, EntryFilter, EntryKind, EntryResponse, ExpenseRequest, IncomeRequest},
    services::reconciliation,
    state::AppState,
    store::LedgerStore,
};

fn income_draft(request: IncomeRequest) -> Result<EntryDraft, AppError> {
    EntryDraft::income(
        request.description,
        request.amount,
        request.date,
        request.account_id.into(),
    )
}

fn responses(entries: Vec<Entry>) -> Json<Vec<EntryResponse>> {
    Json(entries.into_iter().map(Into::into).collect())
}

/// Record an income.
///
/// # Request Body
///
/// ```json
/// { "description": "Salary", "amount": "3200.00", "account_id": null }
/// ```
///
/// Without `account_id` the income lands on the default account, which is
/// created if the caller has none yet.
pub async fn create_income<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<IncomeRequest>,
) -> Result<(StatusCode, Json<EntryResponse>), AppError> {
    let draft = income_draft(request)?;
    let entry = reconciliation::create_entry(&state.store, auth.owner_id, draft).await?;
    Ok((StatusCode::CREATED, Json(entry.into())))
}

/// `GET /api/v1/incomes?month=12&year=2025`
pub async fn list_incomes<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthContext>,
    Query(filter): Query<EntryFilter>,
) -> Result<Json<Vec<EntryResponse>>, AppError> {
    let entries =
        reconciliation::list_entries(&state.store, auth.owner_id, EntryKind::Income, filter).await?;
    Ok(responses(entries))
}

pub async fn update_income<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<IncomeRequest>,
) -> Result<Json<EntryResponse>, AppError> {
    let draft = income_draft(request)?;
    let entry = reconciliation::update_entry(&state.store, auth.owner_id, id, draft).await?;
    Ok(Json(entry.into()))
}

pub async fn delete_income<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    reconciliation::delete_entry(&state.store, auth.owner_id, EntryKind::Income, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Record an expense.
///
/// # Request Body
///
/// ```json
/// {
///   "description": "Groceries",
///   "amount": "54.90",
///   "category": "food",
///   "group": "essential",
///   "payment_method": "debit",
///   "account_id": "550e8400-e29b-41d4-a716-446655440000"
/// }
/// ```
pub async fn create_expense<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<ExpenseRequest>,
) -> Result<(StatusCode, Json<EntryResponse>), AppError> {
    let draft = EntryDraft::expense(request)?;
    let entry = reconciliation::create_entry(&state.store, auth.owner_id, draft).await?;
    Ok((StatusCode::CREATED, Json(entry.into())))
}

/// `GET /api/v1/expenses?month=12&year=2025`
pub async fn list_expenses<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthContext>,
    Query(filter): Query<EntryFilter>,
) -> Result<Json<Vec<EntryResponse>>, AppError> {
    let entries =
        reconciliation::list_entries(&state.store, auth.owner_id, EntryKind::Expense, filter).await?;
    Ok(responses(entries))
}

pub async fn update_expense<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<ExpenseRequest>,
) -> Result<Json<EntryResponse>, AppError> {
    let draft = EntryDraft::expense(request)?;
    let entry = reconciliation::update_entry(&state.store, auth.owner_id, id, draft).await?;
    Ok(Json(entry.into()))
}

pub async fn delete_expense<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    reconciliation::delete_entry(&state.store, auth.owner_id, EntryKind::Expense, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
