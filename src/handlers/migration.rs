//! Unassigned-entry migration handlers.
//!
//! - GET /api/v1/migration/unlinked - What a migration would move
//! - POST /api/v1/migration/unlinked - Move everything onto the default account

use axum::{Extension, Json, extract::State};

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    services::migration::{self, MigrationReport, UnlinkedSummary},
    state::AppState,
    store::LedgerStore,
};

pub async fn unlinked_summary<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<UnlinkedSummary>, AppError> {
    let summary = migration::unlinked_summary(&state.store, auth.owner_id).await?;
    Ok(Json(summary))
}

pub async fn migrate_unlinked<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<MigrationReport>, AppError> {
    let report = migration::migrate_unlinked(&state.store, auth.owner_id).await?;
    Ok(Json(report))
}
