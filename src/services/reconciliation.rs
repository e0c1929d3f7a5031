//! Reconciliation of incomes and expenses.
//!
//! Every entry mutation runs in one store transaction that:
//! 1. Resolves the target account (the default account when unassigned)
//! 2. Locks every account the mutation touches, old and new
//! 3. Writes the entry
//! 4. Recomputes each touched account from the ledger and stores the result
//! 5. Commits, or rolls back everything on the first error
//!
//! Balances are always fully recomputed rather than adjusted by a delta, so
//! an account reassignment or deletion can never leave a cache drifting.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        account::Account,
        entry::{AccountRef, Entry, EntryDraft, EntryFilter, EntryKind},
    },
    services::{balance, provisioner},
    store::{LedgerStore, LedgerTx},
};

/// Resolve an account reference to a concrete id inside a transaction.
pub(crate) async fn resolve_account<T: LedgerTx>(tx: &mut T, owner_id: Uuid, account: AccountRef) -> Result<Uuid, AppError> {
    match account {
        AccountRef::Account(id) => Ok(id),
        AccountRef::Unassigned => Ok(provisioner::resolve_default(tx, owner_id).await?.id),
    }
}

fn not_owned() -> AppError {
    AppError::Forbidden("Account does not belong to this owner".to_string())
}

/// Record a new income or expense and reconcile its account.
///
/// # Errors
///
/// - `InvalidRequest`: amount not positive or description blank
/// - `Forbidden`: the account is not one of the owner's accounts
/// - `Database`: store failure, nothing was written
#[tracing::instrument(skip(store, draft), fields(kind = %draft.kind))]
pub async fn create_entry<S: LedgerStore>(store: &S, owner_id: Uuid, draft: EntryDraft) -> Result<Entry, AppError> {
    draft.validate()?;

    let mut tx = store.begin().await?;

    let account_id = resolve_account(&mut tx, owner_id, draft.account).await?;
    let account = tx
        .lock_account(owner_id, account_id)
        .await?
        .ok_or_else(not_owned)?;

    let entry = tx
        .insert_entry(owner_id, &draft.into_record(account.id))
        .await?;
    let balance = balance::reconcile(&mut tx, owner_id, &account).await?;

    tx.commit().await?;

    tracing::info!(
        %owner_id,
        entry_id = %entry.id,
        account_id = %account.id,
        %balance,
        "entry created"
    );
    Ok(entry)
}

/// Replace an entry's fields and reconcile both its old and new account.
///
/// When the account does not change the net effect is the amount delta;
/// when it does, the old account loses the old effect and the new one gains
/// the new effect. Both come out of a full recompute.
#[tracing::instrument(skip(store, draft), fields(kind = %draft.kind))]
pub async fn update_entry<S: LedgerStore>(
    store: &S,
    owner_id: Uuid,
    entry_id: Uuid,
    draft: EntryDraft,
) -> Result<Entry, AppError> {
    draft.validate()?;

    let mut tx = store.begin().await?;

    // Read the prior state inside the same transaction as the write
    let previous = tx
        .lock_entry(owner_id, draft.kind, entry_id)
        .await?
        .ok_or(AppError::EntryNotFound)?;

    let new_account_id = resolve_account(&mut tx, owner_id, draft.account).await?;

    let mut touched = vec![new_account_id];
    if let Some(old) = previous.account_id {
        touched.push(old);
    }
    let accounts = tx.lock_accounts(owner_id, &touched).await?;
    if !accounts.iter().any(|a| a.id == new_account_id) {
        return Err(not_owned());
    }

    let entry = tx
        .update_entry(owner_id, entry_id, &draft.into_record(new_account_id))
        .await?;

    reconcile_all(&mut tx, owner_id, &accounts).await?;

    tx.commit().await?;

    tracing::info!(
        %owner_id,
        entry_id = %entry.id,
        previous_account = ?previous.account_id,
        account_id = %new_account_id,
        "entry updated"
    );
    Ok(entry)
}

/// Delete an entry and reverse its effect on its account.
#[tracing::instrument(skip(store))]
pub async fn delete_entry<S: LedgerStore>(
    store: &S,
    owner_id: Uuid,
    kind: EntryKind,
    entry_id: Uuid,
) -> Result<(), AppError> {
    let mut tx = store.begin().await?;

    let entry = tx
        .lock_entry(owner_id, kind, entry_id)
        .await?
        .ok_or(AppError::EntryNotFound)?;

    let accounts = match entry.account_id {
        Some(account_id) => tx.lock_accounts(owner_id, &[account_id]).await?,
        None => Vec::new(),
    };

    if !tx.delete_entry(owner_id, kind, entry_id).await? {
        return Err(AppError::EntryNotFound);
    }

    reconcile_all(&mut tx, owner_id, &accounts).await?;

    tx.commit().await?;

    tracing::info!(
        %owner_id,
        %entry_id,
        amount = %entry.amount,
        account_id = ?entry.account_id,
        "entry deleted"
    );
    Ok(())
}

/// Entries of one kind, optionally restricted to a month and/or year.
pub async fn list_entries<S: LedgerStore>(
    store: &S,
    owner_id: Uuid,
    kind: EntryKind,
    filter: EntryFilter,
) -> Result<Vec<Entry>, AppError> {
    filter.validate()?;

    let mut tx = store.begin().await?;
    let entries = tx.list_entries(owner_id, kind, filter).await?;
    tx.commit().await?;

    Ok(entries)
}

/// Recompute every account in `accounts` (already locked by the caller).
pub(crate) async fn reconcile_all<T: LedgerTx>(
    tx: &mut T,
    owner_id: Uuid,
    accounts: &[Account],
) -> Result<Vec<Decimal>, AppError> {
    let mut balances = Vec::with_capacity(accounts.len());
    for account in accounts {
        balances.push(balance::reconcile(tx, owner_id, account).await?);
    }
    Ok(balances)
}
