//! Persistent store abstraction.
//!
//! The services never talk to a database directly. They open a transaction
//! with [`LedgerStore::begin`], run every read and write of one operation
//! through the returned [`LedgerTx`], and finish with `commit`. Dropping a
//! transaction without committing rolls it back, so an early `?` return
//! never leaves a partial write behind.
//!
//! Two backends implement the contract:
//! - [`postgres::PgStore`]: sqlx over PostgreSQL, with `FOR UPDATE` row locks
//! - [`memory::MemoryStore`]: a mutex-guarded in-process store, fully
//!   serialised, used by tests and database-less local runs

pub mod memory;
pub mod postgres;

use rust_decimal::Decimal;
use serde::Serialize;
use std::future::Future;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        account::{Account, AccountDraft, AccountPatch},
        entry::{Entry, EntryFilter, EntryKind, EntryRecord},
        goal::{Goal, GoalDraft},
        transfer::{Transfer, TransferDraft},
    },
};

/// Aggregates of every ledger row that references one account.
///
/// Sums over zero rows are zero, never missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct BalanceTotals {
    pub incomes: Decimal,
    pub expenses: Decimal,
    pub transfers_in: Decimal,
    pub transfers_out: Decimal,
}

/// Entries of an owner that are not bound to any account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct UnlinkedTotals {
    pub incomes: i64,
    pub expenses: i64,
    pub income_amount: Decimal,
    pub expense_amount: Decimal,
}

/// Factory for transactions plus a few pool-level queries.
pub trait LedgerStore: Clone + Send + Sync + 'static {
    type Tx: LedgerTx;

    /// Start a new atomic unit of work.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx, AppError>> + Send;

    /// Owner identity for an active API key hash.
    fn owner_for_key_hash(
        &self,
        key_hash: &str,
    ) -> impl Future<Output = Result<Option<Uuid>, AppError>> + Send;

    /// Cheap connectivity check.
    fn ping(&self) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// One store transaction. Every method is scoped by owner.
pub trait LedgerTx: Send {
    /// Lock and return the owner's accounts among `ids`, ordered by id.
    ///
    /// Ids that do not exist or belong to someone else are simply absent
    /// from the result.
    fn lock_accounts(
        &mut self,
        owner_id: Uuid,
        ids: &[Uuid],
    ) -> impl Future<Output = Result<Vec<Account>, AppError>> + Send;

    /// Lock and return a single account.
    fn lock_account(
        &mut self,
        owner_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<Account>, AppError>> + Send {
        async move {
            let mut accounts = self.lock_accounts(owner_id, &[id]).await?;
            Ok(accounts.pop())
        }
    }

    /// All accounts of the owner, newest first.
    fn list_accounts(
        &mut self,
        owner_id: Uuid,
    ) -> impl Future<Output = Result<Vec<Account>, AppError>> + Send;

    /// The earliest-created account with the reserved default name.
    fn find_default_account(
        &mut self,
        owner_id: Uuid,
    ) -> impl Future<Output = Result<Option<Account>, AppError>> + Send;

    /// Insert the reserved default account unless one already exists.
    ///
    /// Returns `None` when a concurrent transaction created it first.
    fn insert_default_account(
        &mut self,
        owner_id: Uuid,
    ) -> impl Future<Output = Result<Option<Account>, AppError>> + Send;

    /// Insert a regular account; the stored balance starts at the opening balance.
    fn insert_account(
        &mut self,
        owner_id: Uuid,
        draft: &AccountDraft,
    ) -> impl Future<Output = Result<Account, AppError>> + Send;

    fn update_account(
        &mut self,
        owner_id: Uuid,
        id: Uuid,
        patch: &AccountPatch,
    ) -> impl Future<Output = Result<Account, AppError>> + Send;

    /// Returns false if nothing was deleted.
    fn delete_account(
        &mut self,
        owner_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Number of entries and transfers referencing the account.
    fn count_account_references(
        &mut self,
        owner_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = Result<i64, AppError>> + Send;

    fn balance_totals(
        &mut self,
        owner_id: Uuid,
        account_id: Uuid,
    ) -> impl Future<Output = Result<BalanceTotals, AppError>> + Send;

    /// Overwrite the cached balance, and the opening balance when given.
    fn write_balance(
        &mut self,
        owner_id: Uuid,
        account_id: Uuid,
        stored_balance: Decimal,
        opening_balance: Option<Decimal>,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    fn insert_entry(
        &mut self,
        owner_id: Uuid,
        record: &EntryRecord,
    ) -> impl Future<Output = Result<Entry, AppError>> + Send;

    /// Lock and return an entry of the given kind.
    fn lock_entry(
        &mut self,
        owner_id: Uuid,
        kind: EntryKind,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<Entry>, AppError>> + Send;

    fn update_entry(
        &mut self,
        owner_id: Uuid,
        id: Uuid,
        record: &EntryRecord,
    ) -> impl Future<Output = Result<Entry, AppError>> + Send;

    /// Returns false if nothing was deleted.
    fn delete_entry(
        &mut self,
        owner_id: Uuid,
        kind: EntryKind,
        id: Uuid,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Entries of one kind, newest date first.
    fn list_entries(
        &mut self,
        owner_id: Uuid,
        kind: EntryKind,
        filter: EntryFilter,
    ) -> impl Future<Output = Result<Vec<Entry>, AppError>> + Send;

    fn unlinked_totals(
        &mut self,
        owner_id: Uuid,
    ) -> impl Future<Output = Result<UnlinkedTotals, AppError>> + Send;

    /// Bind every unassigned entry to `account_id`; returns (incomes, expenses) moved.
    fn assign_unlinked(
        &mut self,
        owner_id: Uuid,
        account_id: Uuid,
    ) -> impl Future<Output = Result<(u64, u64), AppError>> + Send;

    fn insert_transfer(
        &mut self,
        owner_id: Uuid,
        draft: &TransferDraft,
    ) -> impl Future<Output = Result<Transfer, AppError>> + Send;

    fn find_transfer_by_key(
        &mut self,
        owner_id: Uuid,
        idempotency_key: &str,
    ) -> impl Future<Output = Result<Option<Transfer>, AppError>> + Send;

    /// Transfers of the owner, newest first.
    fn list_transfers(
        &mut self,
        owner_id: Uuid,
    ) -> impl Future<Output = Result<Vec<Transfer>, AppError>> + Send;

    /// Insert a goal; it is marked completed if it already meets its target.
    fn insert_goal(
        &mut self,
        owner_id: Uuid,
        draft: &GoalDraft,
    ) -> impl Future<Output = Result<Goal, AppError>> + Send;

    /// Open goals first (newest first), then completed ones by completion time.
    fn list_goals(
        &mut self,
        owner_id: Uuid,
    ) -> impl Future<Output = Result<Vec<Goal>, AppError>> + Send;

    fn lock_goal(
        &mut self,
        owner_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<Goal>, AppError>> + Send;

    /// Replace every field of a goal and re-evaluate its completion.
    fn update_goal(
        &mut self,
        owner_id: Uuid,
        id: Uuid,
        draft: &GoalDraft,
    ) -> impl Future<Output = Result<Goal, AppError>> + Send;

    /// Set the saved amount and re-evaluate completion.
    fn set_goal_amount(
        &mut self,
        owner_id: Uuid,
        id: Uuid,
        current_amount: Decimal,
    ) -> impl Future<Output = Result<Goal, AppError>> + Send;

    /// Returns false if nothing was deleted.
    fn delete_goal(
        &mut self,
        owner_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    fn commit(self) -> impl Future<Output = Result<(), AppError>> + Send;

    fn rollback(self) -> impl Future<Output = Result<(), AppError>> + Send;
}
