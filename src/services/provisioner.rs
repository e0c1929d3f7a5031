//! Default account provisioning.
//!
//! Every owner has exactly one "General Wallet". It is created lazily the
//! first time an entry arrives without an account, or when a client asks for
//! it explicitly.

use uuid::Uuid;

use crate::{
    error::AppError,
    models::account::Account,
    store::{LedgerStore, LedgerTx},
};

/// Return the id of the owner's default account, creating it if needed.
///
/// Safe to call concurrently for one owner: the store's uniqueness rule lets
/// only one insert win and the loser re-reads the winner's row.
#[tracing::instrument(skip(store))]
pub async fn ensure_default_account<S: LedgerStore>(store: &S, owner_id: Uuid) -> Result<Uuid, AppError> {
    let mut tx = store.begin().await?;
    let account = resolve_default(&mut tx, owner_id).await?;
    tx.commit().await?;

    Ok(account.id)
}

/// Find or create the default account inside an open transaction.
pub async fn resolve_default<T: LedgerTx>(tx: &mut T, owner_id: Uuid) -> Result<Account, AppError> {
    if let Some(account) = tx.find_default_account(owner_id).await? {
        return Ok(account);
    }

    if let Some(account) = tx.insert_default_account(owner_id).await? {
        tracing::info!(%owner_id, account_id = %account.id, "default account created");
        return Ok(account);
    }

    // A concurrent transaction created it between our read and our insert
    tx.find_default_account(owner_id).await?.ok_or_else(|| {
        AppError::Conflict("Default account could not be provisioned".to_string())
    })
}
