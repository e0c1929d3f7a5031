//! Balance calculator and account reconciliation.
//!
//! The effective balance of an account is derived, never trusted:
//!
//! ```text
//! effective = opening
//!           + incomes  - expenses
//!           + transfers_in - transfers_out
//! ```
//!
//! `opening` is the account's opening balance, or its stored balance for
//! legacy accounts that never had one. `reconcile` writes the effective
//! balance back into the cached `stored_balance` column and, for a legacy
//! account, pins the fallback into `opening_balance` so that the next
//! computation starts from the same point instead of from the new cache.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{account::Account, money},
    store::{BalanceTotals, LedgerTx},
};

/// The starting point of an account's balance.
pub fn effective_opening(account: &Account) -> Decimal {
    account.opening_balance.unwrap_or(account.stored_balance)
}

/// Pure balance formula over pre-aggregated totals.
///
/// Fails with `InvalidRequest` instead of overflowing.
pub fn effective_balance(account: &Account, totals: &BalanceTotals) -> Result<Decimal, AppError> {
    let balance = money::checked_add(effective_opening(account), totals.incomes)?;
    let balance = money::checked_sub(balance, totals.expenses)?;
    let balance = money::checked_add(balance, totals.transfers_in)?;
    money::checked_sub(balance, totals.transfers_out)
}

/// Effective balance of an account, aggregated from the store.
///
/// Read-only: calling it twice with no mutation in between yields the same
/// value.
pub async fn compute<T: LedgerTx>(tx: &mut T, owner_id: Uuid, account: &Account) -> Result<Decimal, AppError> {
    let totals = tx.balance_totals(owner_id, account.id).await?;
    effective_balance(account, &totals)
}

/// Recompute an account and overwrite its cached balance.
///
/// `account` must be the row as locked in this transaction. Returns the new
/// balance.
pub async fn reconcile<T: LedgerTx>(tx: &mut T, owner_id: Uuid, account: &Account) -> Result<Decimal, AppError> {
    let balance = compute(tx, owner_id, account).await?;
    let pinned_opening = match account.opening_balance {
        Some(_) => None,
        None => Some(account.stored_balance),
    };

    tx.write_balance(owner_id, account.id, balance, pinned_opening)
        .await?;

    tracing::debug!(
        %owner_id,
        account_id = %account.id,
        %balance,
        legacy = pinned_opening.is_some(),
        "account reconciled"
    );

    Ok(balance)
}
