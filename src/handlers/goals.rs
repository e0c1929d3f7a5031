//! Savings goal HTTP handlers.
//!
//! - POST /api/v1/goals - Create a goal
//! - GET /api/v1/goals - List goals with progress
//! - PUT /api/v1/goals/{id} - Replace a goal
//! - DELETE /api/v1/goals/{id} - Delete a goal
//! - POST /api/v1/goals/{id}/contributions - Move money from an account into a goal

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::goal::{ContributionReceipt, ContributionRequest, GoalDraft, GoalRequest, GoalResponse},
    services::goals,
    state::AppState,
    store::LedgerStore,
};

pub async fn create_goal<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<GoalRequest>,
) -> Result<(StatusCode, Json<GoalResponse>), AppError> {
    let draft = GoalDraft::from_request(request)?;
    let goal = goals::create_goal(&state.store, auth.owner_id, draft).await?;
    Ok((StatusCode::CREATED, Json(goal.into())))
}

pub async fn list_goals<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<GoalResponse>>, AppError> {
    let goals = goals::list_goals(&state.store, auth.owner_id).await?;
    Ok(Json(goals.into_iter().map(Into::into).collect()))
}

pub async fn update_goal<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<GoalRequest>,
) -> Result<Json<GoalResponse>, AppError> {
    let draft = GoalDraft::from_request(request)?;
    let goal = goals::update_goal(&state.store, auth.owner_id, id, draft).await?;
    Ok(Json(goal.into()))
}

pub async fn delete_goal<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    goals::delete_goal(&state.store, auth.owner_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Move money into a goal.
///
/// # Request Body
///
/// ```json
/// { "amount": "150.00", "account_id": "550e8400-e29b-41d4-a716-446655440000" }
/// ```
///
/// # Response
///
/// - **201 Created**: the goal, the expense booked on the account, and the account balance
/// - **403**: the account is not the caller's
/// - **404**: no such goal
/// - **422**: the account cannot cover the amount
pub async fn contribute<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<ContributionRequest>,
) -> Result<(StatusCode, Json<ContributionReceipt>), AppError> {
    let contribution = goals::contribute(
        &state.store,
        auth.owner_id,
        id,
        request.amount,
        request.account_id.into(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(contribution.into())))
}
