//! Transfer service - moves money between two accounts of one owner.
//!
//! # Stages
//!
//! A transfer advances through `Validated → Funded → Recorded → Reconciled`
//! and only the last stage commits. Any failure before that drops the store
//! transaction, so a rejected transfer leaves no row and no balance change.
//!
//! # Atomicity Guarantees
//!
//! Both account rows are locked before the source balance is computed, the
//! transfer row is inserted under those locks, and both balances are
//! recomputed before the single commit.

use rust_decimal::Decimal;
use std::fmt;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        account::Account,
        transfer::{Transfer, TransferDraft, TransferOutcome},
    },
    services::{balance, reconciliation::reconcile_all},
    store::{LedgerStore, LedgerTx},
};

/// Progress of a transfer through its single-shot protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStage {
    /// Input checked: distinct endpoints, positive amount
    Validated,
    /// Both accounts owned by the caller and the source covers the amount
    Funded,
    /// Transfer row written
    Recorded,
    /// Both balances recomputed and committed
    Reconciled,
}

impl fmt::Display for TransferStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferStage::Validated => "validated",
            TransferStage::Funded => "funded",
            TransferStage::Recorded => "recorded",
            TransferStage::Reconciled => "reconciled",
        };
        f.write_str(name)
    }
}

/// Execute a transfer.
///
/// # Process
///
/// 1. Return the earlier transfer if the idempotency key was already used
///    for the same accounts and amount
/// 2. Lock both accounts; both must belong to the owner
/// 3. Compute the source's effective balance and reject if short
/// 4. Insert the transfer row
/// 5. Recompute and store both balances
/// 6. Commit
///
/// # Errors
///
/// - `Forbidden`: one or both accounts are not the owner's
/// - `InsufficientFunds`: source balance lower than the amount
/// - `Conflict`: the idempotency key was used for a different transfer, or
///   taken by a concurrent request
/// - `Database`: store failure, nothing was written
#[tracing::instrument(skip(store, draft), fields(from = %draft.from_account_id, to = %draft.to_account_id))]
pub async fn execute_transfer<S: LedgerStore>(
    store: &S,
    owner_id: Uuid,
    draft: TransferDraft,
) -> Result<TransferOutcome, AppError> {
    // TransferDraft construction already validated endpoints and amount
    let mut stage = TransferStage::Validated;
    tracing::debug!(%stage, "transfer accepted");

    let mut tx = store.begin().await?;

    if let Some(key) = draft.idempotency_key.as_deref() {
        if let Some(existing) = tx.find_transfer_by_key(owner_id, key).await? {
            if !draft.matches(&existing) {
                tx.rollback().await?;
                tracing::warn!(%owner_id, transfer_id = %existing.id, "idempotency key reused with a different payload");
                return Err(AppError::Conflict(
                    "Idempotency key was already used for a different transfer".to_string(),
                ));
            }
            return replay(tx, owner_id, existing).await;
        }
    }

    // Lock both endpoints in id order
    let accounts = tx
        .lock_accounts(owner_id, &[draft.from_account_id, draft.to_account_id])
        .await?;
    if accounts.len() != 2 {
        tx.rollback().await?;
        tracing::warn!(%owner_id, %stage, "transfer rejected: account ownership");
        return Err(AppError::Forbidden(
            "Both accounts must belong to this owner".to_string(),
        ));
    }

    let source = accounts
        .iter()
        .find(|a| a.id == draft.from_account_id)
        .ok_or(AppError::AccountNotFound)?;
    let available = balance::compute(&mut tx, owner_id, source).await?;
    if available < draft.amount {
        tx.rollback().await?;
        tracing::warn!(
            %owner_id,
            %stage,
            %available,
            requested = %draft.amount,
            "transfer rejected: insufficient funds"
        );
        return Err(AppError::InsufficientFunds);
    }
    stage = TransferStage::Funded;
    tracing::debug!(%stage, %available);

    let transfer = tx.insert_transfer(owner_id, &draft).await?;
    stage = TransferStage::Recorded;
    tracing::debug!(%stage, transfer_id = %transfer.id);

    let balances = reconcile_all(&mut tx, owner_id, &accounts).await?;
    tx.commit().await?;
    stage = TransferStage::Reconciled;

    let (from_balance, to_balance) = ordered_balances(&accounts, &balances, &transfer)?;
    tracing::info!(
        %owner_id,
        %stage,
        transfer_id = %transfer.id,
        amount = %transfer.amount,
        %from_balance,
        %to_balance,
        "transfer completed"
    );

    Ok(TransferOutcome {
        transfer,
        from_balance,
        to_balance,
        replayed: false,
    })
}

/// Answer a retried request with the transfer already on record.
async fn replay<T: LedgerTx>(mut tx: T, owner_id: Uuid, transfer: Transfer) -> Result<TransferOutcome, AppError> {
    let accounts = tx
        .lock_accounts(owner_id, &[transfer.from_account_id, transfer.to_account_id])
        .await?;
    let mut balances = Vec::with_capacity(accounts.len());
    for account in &accounts {
        balances.push(balance::compute(&mut tx, owner_id, account).await?);
    }
    tx.commit().await?;

    let (from_balance, to_balance) = ordered_balances(&accounts, &balances, &transfer)?;
    tracing::info!(%owner_id, transfer_id = %transfer.id, "transfer replayed for idempotency key");

    Ok(TransferOutcome {
        transfer,
        from_balance,
        to_balance,
        replayed: true,
    })
}

/// Pick source and destination balances out of the id-ordered results.
fn ordered_balances(
    accounts: &[Account],
    balances: &[Decimal],
    transfer: &Transfer,
) -> Result<(Decimal, Decimal), AppError> {
    let find = |id: Uuid| {
        accounts
            .iter()
            .zip(balances)
            .find(|(a, _)| a.id == id)
            .map(|(_, b)| *b)
            .ok_or(AppError::AccountNotFound)
    };
    Ok((find(transfer.from_account_id)?, find(transfer.to_account_id)?))
}

/// Transfers of the owner, newest first.
pub async fn list_transfers<S: LedgerStore>(store: &S, owner_id: Uuid) -> Result<Vec<Transfer>, AppError> {
    let mut tx = store.begin().await?;
    let transfers = tx.list_transfers(owner_id).await?;
    tx.commit().await?;

    Ok(transfers)
}
