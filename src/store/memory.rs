//! In-process backend.
//!
//! A transaction takes the store-wide lock for its whole lifetime and works on
//! a private copy of the state. `commit` publishes the copy; dropping the
//! transaction discards it. Transactions are therefore fully serialised and a
//! failed operation can never leave partial writes behind.
//!
//! The same integrity rules as the SQL schema are enforced: one default
//! account per owner, entries and transfers may only reference the owner's
//! own accounts, referenced accounts cannot be deleted, idempotency keys are
//! unique per owner.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        account::{Account, AccountDraft, AccountPatch, DEFAULT_ACCOUNT_NAME},
        money::checked_add,
        api_key::{ApiKey, hash_api_key},
        entry::{Entry, EntryFilter, EntryKind, EntryRecord},
        goal::{Goal, GoalDraft},
        transfer::{Transfer, TransferDraft},
    },
    store::{BalanceTotals, LedgerStore, LedgerTx, UnlinkedTotals},
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    /// Insertion order doubles as creation order
    accounts: Vec<Account>,
    entries: Vec<Entry>,
    transfers: Vec<Transfer>,
    goals: Vec<Goal>,
    /// Keyed by hash
    api_keys: HashMap<String, ApiKey>,
}

impl MemoryState {
    fn account(&self, owner_id: Uuid, id: Uuid) -> Option<&Account> {
        self.accounts
            .iter()
            .find(|a| a.id == id && a.owner_id == owner_id)
    }

    fn default_exists(&self, owner_id: Uuid, except: Option<Uuid>) -> bool {
        self.accounts.iter().any(|a| {
            a.owner_id == owner_id && a.name == DEFAULT_ACCOUNT_NAME && Some(a.id) != except
        })
    }

    fn new_account(owner_id: Uuid, draft: &AccountDraft) -> Account {
        let now = Utc::now();
        Account {
            id: Uuid::new_v4(),
            owner_id,
            name: draft.name.clone(),
            account_type: draft.account_type,
            opening_balance: Some(draft.opening_balance),
            stored_balance: draft.opening_balance,
            created_at: now,
            updated_at: now,
        }
    }

    fn check_entry_account(&self, owner_id: Uuid, account_id: Uuid) -> Result<(), AppError> {
        match self.account(owner_id, account_id) {
            Some(_) => Ok(()),
            None => Err(AppError::Conflict(
                "Account does not belong to this owner".to_string(),
            )),
        }
    }
}

/// Completion timestamp after a goal's amounts change: kept while the target
/// stays met, set now when first met, cleared otherwise.
fn completion(current: Decimal, target: Decimal, previous: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    (current >= target).then(|| previous.unwrap_or_else(Utc::now))
}

/// Shared in-memory store. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plaintext API key for an owner.
    pub async fn register_api_key(&self, api_key: &str, owner_id: Uuid) {
        let key = ApiKey {
            id: Uuid::new_v4(),
            key_hash: hash_api_key(api_key),
            owner_id,
            label: String::new(),
            created_at: Utc::now(),
            is_active: true,
        };
        self.state
            .lock()
            .await
            .api_keys
            .insert(key.key_hash.clone(), key);
    }

    /// Mark a key inactive; it stops authenticating immediately.
    pub async fn revoke_api_key(&self, api_key: &str) {
        if let Some(key) = self.state.lock().await.api_keys.get_mut(&hash_api_key(api_key)) {
            key.is_active = false;
        }
    }

    /// Load an existing account row as-is, e.g. one imported from an older
    /// system with no opening balance.
    pub async fn seed_account(&self, account: Account) {
        self.state.lock().await.accounts.push(account);
    }

    /// Load an existing entry row as-is, including ones with no account.
    pub async fn seed_entry(&self, entry: Entry) {
        self.state.lock().await.entries.push(entry);
    }

    /// Number of recorded transfers across all owners.
    pub async fn transfer_count(&self) -> usize {
        self.state.lock().await.transfers.len()
    }
}

/// Transaction over a private copy of the state.
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

impl LedgerStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, AppError> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(MemoryTx { guard, work })
    }

    async fn owner_for_key_hash(&self, key_hash: &str) -> Result<Option<Uuid>, AppError> {
        Ok(self
            .state
            .lock()
            .await
            .api_keys
            .get(key_hash)
            .filter(|k| k.is_active)
            .map(|k| k.owner_id))
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

impl LedgerTx for MemoryTx {
    async fn lock_accounts(&mut self, owner_id: Uuid, ids: &[Uuid]) -> Result<Vec<Account>, AppError> {
        let mut accounts: Vec<Account> = self
            .work
            .accounts
            .iter()
            .filter(|a| a.owner_id == owner_id && ids.contains(&a.id))
            .cloned()
            .collect();
        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }

    async fn list_accounts(&mut self, owner_id: Uuid) -> Result<Vec<Account>, AppError> {
        Ok(self
            .work
            .accounts
            .iter()
            .rev()
            .filter(|a| a.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn find_default_account(&mut self, owner_id: Uuid) -> Result<Option<Account>, AppError> {
        Ok(self
            .work
            .accounts
            .iter()
            .find(|a| a.owner_id == owner_id && a.name == DEFAULT_ACCOUNT_NAME)
            .cloned())
    }

    async fn insert_default_account(&mut self, owner_id: Uuid) -> Result<Option<Account>, AppError> {
        if self.work.default_exists(owner_id, None) {
            return Ok(None);
        }
        let account = MemoryState::new_account(owner_id, &AccountDraft::default_wallet());
        self.work.accounts.push(account.clone());
        Ok(Some(account))
    }

    async fn insert_account(&mut self, owner_id: Uuid, draft: &AccountDraft) -> Result<Account, AppError> {
        if draft.name == DEFAULT_ACCOUNT_NAME && self.work.default_exists(owner_id, None) {
            return Err(AppError::Conflict(
                "The default account name is reserved".to_string(),
            ));
        }
        let account = MemoryState::new_account(owner_id, draft);
        self.work.accounts.push(account.clone());
        Ok(account)
    }

    async fn update_account(
        &mut self,
        owner_id: Uuid,
        id: Uuid,
        patch: &AccountPatch,
    ) -> Result<Account, AppError> {
        if patch.name == DEFAULT_ACCOUNT_NAME && self.work.default_exists(owner_id, Some(id)) {
            return Err(AppError::Conflict(
                "The default account name is reserved".to_string(),
            ));
        }
        let account = self
            .work
            .accounts
            .iter_mut()
            .find(|a| a.id == id && a.owner_id == owner_id)
            .ok_or(AppError::AccountNotFound)?;

        account.name = patch.name.clone();
        if let Some(account_type) = patch.account_type {
            account.account_type = account_type;
        }
        if let Some(opening) = patch.opening_balance {
            account.opening_balance = Some(opening);
        }
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    async fn delete_account(&mut self, owner_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        if self.count_account_references(owner_id, id).await? > 0 {
            return Err(AppError::Conflict(
                "Account is still referenced by ledger entries".to_string(),
            ));
        }
        let before = self.work.accounts.len();
        self.work
            .accounts
            .retain(|a| !(a.id == id && a.owner_id == owner_id));
        Ok(self.work.accounts.len() < before)
    }

    async fn count_account_references(&mut self, owner_id: Uuid, id: Uuid) -> Result<i64, AppError> {
        let entries = self
            .work
            .entries
            .iter()
            .filter(|e| e.owner_id == owner_id && e.account_id == Some(id))
            .count();
        let transfers = self
            .work
            .transfers
            .iter()
            .filter(|t| t.owner_id == owner_id && (t.from_account_id == id || t.to_account_id == id))
            .count();
        Ok((entries + transfers) as i64)
    }

    async fn balance_totals(&mut self, owner_id: Uuid, account_id: Uuid) -> Result<BalanceTotals, AppError> {
        let mut totals = BalanceTotals::default();
        for entry in self
            .work
            .entries
            .iter()
            .filter(|e| e.owner_id == owner_id && e.account_id == Some(account_id))
        {
            let sum = match entry.kind {
                EntryKind::Income => &mut totals.incomes,
                EntryKind::Expense => &mut totals.expenses,
            };
            *sum = checked_add(*sum, entry.amount)?;
        }
        for transfer in self.work.transfers.iter().filter(|t| t.owner_id == owner_id) {
            if transfer.to_account_id == account_id {
                totals.transfers_in = checked_add(totals.transfers_in, transfer.amount)?;
            }
            if transfer.from_account_id == account_id {
                totals.transfers_out = checked_add(totals.transfers_out, transfer.amount)?;
            }
        }
        Ok(totals)
    }

    async fn write_balance(
        &mut self,
        owner_id: Uuid,
        account_id: Uuid,
        stored_balance: Decimal,
        opening_balance: Option<Decimal>,
    ) -> Result<(), AppError> {
        if let Some(account) = self
            .work
            .accounts
            .iter_mut()
            .find(|a| a.id == account_id && a.owner_id == owner_id)
        {
            account.stored_balance = stored_balance;
            if opening_balance.is_some() {
                account.opening_balance = opening_balance;
            }
            account.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn insert_entry(&mut self, owner_id: Uuid, record: &EntryRecord) -> Result<Entry, AppError> {
        self.work.check_entry_account(owner_id, record.account_id)?;
        let now = Utc::now();
        let entry = Entry {
            id: Uuid::new_v4(),
            owner_id,
            kind: record.kind,
            description: record.description.clone(),
            amount: record.amount,
            date: record.date,
            category: record.category.clone(),
            group: record.group,
            payment_method: record.payment_method.clone(),
            account_id: Some(record.account_id),
            created_at: now,
            updated_at: now,
        };
        self.work.entries.push(entry.clone());
        Ok(entry)
    }

    async fn lock_entry(&mut self, owner_id: Uuid, kind: EntryKind, id: Uuid) -> Result<Option<Entry>, AppError> {
        Ok(self
            .work
            .entries
            .iter()
            .find(|e| e.id == id && e.owner_id == owner_id && e.kind == kind)
            .cloned())
    }

    async fn update_entry(&mut self, owner_id: Uuid, id: Uuid, record: &EntryRecord) -> Result<Entry, AppError> {
        self.work.check_entry_account(owner_id, record.account_id)?;
        let entry = self
            .work
            .entries
            .iter_mut()
            .find(|e| e.id == id && e.owner_id == owner_id && e.kind == record.kind)
            .ok_or(AppError::EntryNotFound)?;

        entry.description = record.description.clone();
        entry.amount = record.amount;
        entry.date = record.date;
        entry.category = record.category.clone();
        entry.group = record.group;
        entry.payment_method = record.payment_method.clone();
        entry.account_id = Some(record.account_id);
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn delete_entry(&mut self, owner_id: Uuid, kind: EntryKind, id: Uuid) -> Result<bool, AppError> {
        let before = self.work.entries.len();
        self.work
            .entries
            .retain(|e| !(e.id == id && e.owner_id == owner_id && e.kind == kind));
        Ok(self.work.entries.len() < before)
    }

    async fn list_entries(
        &mut self,
        owner_id: Uuid,
        kind: EntryKind,
        filter: EntryFilter,
    ) -> Result<Vec<Entry>, AppError> {
        let mut entries: Vec<Entry> = self
            .work
            .entries
            .iter()
            .rev()
            .filter(|e| e.owner_id == owner_id && e.kind == kind && filter.matches(e.date))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(entries)
    }

    async fn unlinked_totals(&mut self, owner_id: Uuid) -> Result<UnlinkedTotals, AppError> {
        let mut totals = UnlinkedTotals::default();
        for entry in self
            .work
            .entries
            .iter()
            .filter(|e| e.owner_id == owner_id && e.account_id.is_none())
        {
            match entry.kind {
                EntryKind::Income => {
                    totals.incomes += 1;
                    totals.income_amount = checked_add(totals.income_amount, entry.amount)?;
                }
                EntryKind::Expense => {
                    totals.expenses += 1;
                    totals.expense_amount = checked_add(totals.expense_amount, entry.amount)?;
                }
            }
        }
        Ok(totals)
    }

    async fn assign_unlinked(&mut self, owner_id: Uuid, account_id: Uuid) -> Result<(u64, u64), AppError> {
        self.work.check_entry_account(owner_id, account_id)?;
        let (mut incomes, mut expenses) = (0, 0);
        let now = Utc::now();
        for entry in self
            .work
            .entries
            .iter_mut()
            .filter(|e| e.owner_id == owner_id && e.account_id.is_none())
        {
            entry.account_id = Some(account_id);
            entry.updated_at = now;
            match entry.kind {
                EntryKind::Income => incomes += 1,
                EntryKind::Expense => expenses += 1,
            }
        }
        Ok((incomes, expenses))
    }

    async fn insert_transfer(&mut self, owner_id: Uuid, draft: &TransferDraft) -> Result<Transfer, AppError> {
        self.work.check_entry_account(owner_id, draft.from_account_id)?;
        self.work.check_entry_account(owner_id, draft.to_account_id)?;
        if let Some(key) = &draft.idempotency_key {
            if self.find_transfer_by_key(owner_id, key).await?.is_some() {
                return Err(AppError::Conflict("Idempotency key already used".to_string()));
            }
        }
        let transfer = Transfer {
            id: Uuid::new_v4(),
            owner_id,
            from_account_id: draft.from_account_id,
            to_account_id: draft.to_account_id,
            amount: draft.amount,
            date: draft.date,
            description: draft.description.clone(),
            idempotency_key: draft.idempotency_key.clone(),
            created_at: Utc::now(),
        };
        self.work.transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn find_transfer_by_key(
        &mut self,
        owner_id: Uuid,
        idempotency_key: &str,
    ) -> Result<Option<Transfer>, AppError> {
        Ok(self
            .work
            .transfers
            .iter()
            .find(|t| t.owner_id == owner_id && t.idempotency_key.as_deref() == Some(idempotency_key))
            .cloned())
    }

    async fn list_transfers(&mut self, owner_id: Uuid) -> Result<Vec<Transfer>, AppError> {
        let mut transfers: Vec<Transfer> = self
            .work
            .transfers
            .iter()
            .rev()
            .filter(|t| t.owner_id == owner_id)
            .cloned()
            .collect();
        transfers.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(transfers)
    }

    async fn insert_goal(&mut self, owner_id: Uuid, draft: &GoalDraft) -> Result<Goal, AppError> {
        let now = Utc::now();
        let goal = Goal {
            id: Uuid::new_v4(),
            owner_id,
            name: draft.name.clone(),
            target_amount: draft.target_amount,
            current_amount: draft.current_amount,
            deadline: draft.deadline,
            completed_at: completion(draft.current_amount, draft.target_amount, None),
            created_at: now,
            updated_at: now,
        };
        self.work.goals.push(goal.clone());
        Ok(goal)
    }

    async fn list_goals(&mut self, owner_id: Uuid) -> Result<Vec<Goal>, AppError> {
        let mut goals: Vec<Goal> = self
            .work
            .goals
            .iter()
            .rev()
            .filter(|g| g.owner_id == owner_id)
            .cloned()
            .collect();
        // Stable sort keeps newest-first among open goals
        goals.sort_by_key(|g| (g.completed_at.is_some(), g.completed_at));
        Ok(goals)
    }

    async fn lock_goal(&mut self, owner_id: Uuid, id: Uuid) -> Result<Option<Goal>, AppError> {
        Ok(self
            .work
            .goals
            .iter()
            .find(|g| g.id == id && g.owner_id == owner_id)
            .cloned())
    }

    async fn update_goal(&mut self, owner_id: Uuid, id: Uuid, draft: &GoalDraft) -> Result<Goal, AppError> {
        let goal = self
            .work
            .goals
            .iter_mut()
            .find(|g| g.id == id && g.owner_id == owner_id)
            .ok_or(AppError::GoalNotFound)?;

        goal.name = draft.name.clone();
        goal.target_amount = draft.target_amount;
        goal.current_amount = draft.current_amount;
        goal.deadline = draft.deadline;
        goal.completed_at = completion(draft.current_amount, draft.target_amount, goal.completed_at);
        goal.updated_at = Utc::now();
        Ok(goal.clone())
    }

    async fn set_goal_amount(&mut self, owner_id: Uuid, id: Uuid, current_amount: Decimal) -> Result<Goal, AppError> {
        let goal = self
            .work
            .goals
            .iter_mut()
            .find(|g| g.id == id && g.owner_id == owner_id)
            .ok_or(AppError::GoalNotFound)?;

        goal.current_amount = current_amount;
        goal.completed_at = completion(current_amount, goal.target_amount, goal.completed_at);
        goal.updated_at = Utc::now();
        Ok(goal.clone())
    }

    async fn delete_goal(&mut self, owner_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let before = self.work.goals.len();
        self.work
            .goals
            .retain(|g| !(g.id == id && g.owner_id == owner_id));
        Ok(self.work.goals.len() < before)
    }

    async fn commit(mut self) -> Result<(), AppError> {
        *self.guard = self.work;
        Ok(())
    }

    async fn rollback(self) -> Result<(), AppError> {
        Ok(())
    }
}
