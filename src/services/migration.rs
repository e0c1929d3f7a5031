//! Migration of unassigned entries onto the default account.
//!
//! Entries recorded before every entry had to carry an account have no
//! account and therefore affect no balance. This service reports them and
//! moves them, in one transaction, onto the owner's default account.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::money,
    services::{balance, provisioner},
    store::{LedgerStore, LedgerTx},
};

/// What a migration would move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnlinkedSummary {
    pub has_unlinked: bool,
    pub unlinked_incomes: i64,
    pub unlinked_expenses: i64,
    pub total_unlinked: i64,
    /// Net effect on the default account once migrated
    pub balance_impact: Decimal,
}

/// What a migration moved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub account_id: Uuid,
    pub incomes_migrated: u64,
    pub expenses_migrated: u64,
    pub total_migrated: u64,
    pub new_balance: Decimal,
}

pub async fn unlinked_summary<S: LedgerStore>(store: &S, owner_id: Uuid) -> Result<UnlinkedSummary, AppError> {
    let mut tx = store.begin().await?;
    let totals = tx.unlinked_totals(owner_id).await?;
    tx.commit().await?;

    let total = totals.incomes + totals.expenses;
    Ok(UnlinkedSummary {
        has_unlinked: total > 0,
        unlinked_incomes: totals.incomes,
        unlinked_expenses: totals.expenses,
        total_unlinked: total,
        balance_impact: money::checked_sub(totals.income_amount, totals.expense_amount)?,
    })
}

/// Bind every unassigned entry to the default account and recompute it.
#[tracing::instrument(skip(store))]
pub async fn migrate_unlinked<S: LedgerStore>(store: &S, owner_id: Uuid) -> Result<MigrationReport, AppError> {
    let mut tx = store.begin().await?;

    let default = provisioner::resolve_default(&mut tx, owner_id).await?;
    let account = tx
        .lock_account(owner_id, default.id)
        .await?
        .ok_or(AppError::AccountNotFound)?;

    let (incomes, expenses) = tx.assign_unlinked(owner_id, account.id).await?;
    let new_balance = balance::reconcile(&mut tx, owner_id, &account).await?;

    tx.commit().await?;

    tracing::info!(
        %owner_id,
        account_id = %account.id,
        incomes,
        expenses,
        %new_balance,
        "unassigned entries migrated"
    );

    Ok(MigrationReport {
        account_id: account.id,
        incomes_migrated: incomes,
        expenses_migrated: expenses,
        total_migrated: incomes + expenses,
        new_balance,
    })
}
