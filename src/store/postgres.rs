//! PostgreSQL backend.
//!
//! # Locking
//!
//! Every balance-affecting operation locks the account rows it touches with
//! `SELECT ... FOR UPDATE` before reading their aggregates, always in
//! ascending id order so two transactions locking the same pair cannot
//! deadlock. The balance check and the balance write therefore happen while
//! the rows are held, even under the default READ COMMITTED isolation.

use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction as SqlxTransaction};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        account::{Account, AccountDraft, AccountPatch, DEFAULT_ACCOUNT_NAME},
        api_key::ApiKey,
        entry::{Entry, EntryFilter, EntryKind, EntryRecord},
        goal::{Goal, GoalDraft},
        transfer::{Transfer, TransferDraft},
    },
    store::{BalanceTotals, LedgerStore, LedgerTx, UnlinkedTotals},
};

/// Store backed by a PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// One PostgreSQL transaction. Rolled back by sqlx when dropped uncommitted.
pub struct PgTx {
    tx: SqlxTransaction<'static, Postgres>,
}

impl LedgerStore for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx, AppError> {
        Ok(PgTx {
            tx: self.pool.begin().await?,
        })
    }

    async fn owner_for_key_hash(&self, key_hash: &str) -> Result<Option<Uuid>, AppError> {
        let key = sqlx::query_as::<_, ApiKey>(
            r#"
            SELECT id, key_hash, owner_id, label, created_at, is_active
            FROM api_keys
            WHERE key_hash = $1 AND is_active = true
            "#,
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(key.map(|k| k.owner_id))
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

impl LedgerTx for PgTx {
    async fn lock_accounts(&mut self, owner_id: Uuid, ids: &[Uuid]) -> Result<Vec<Account>, AppError> {
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();

        let accounts = sqlx::query_as::<_, Account>(
            r#"
            SELECT * FROM accounts
            WHERE owner_id = $1 AND id = ANY($2)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(owner_id)
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(accounts)
    }

    async fn list_accounts(&mut self, owner_id: Uuid) -> Result<Vec<Account>, AppError> {
        let accounts = sqlx::query_as::<_, Account>(
            "SELECT * FROM accounts WHERE owner_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(accounts)
    }

    async fn find_default_account(&mut self, owner_id: Uuid) -> Result<Option<Account>, AppError> {
        // Earliest first keeps the answer stable should duplicates ever exist
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT * FROM accounts
            WHERE owner_id = $1 AND name = $2
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(owner_id)
        .bind(DEFAULT_ACCOUNT_NAME)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(account)
    }

    async fn insert_default_account(&mut self, owner_id: Uuid) -> Result<Option<Account>, AppError> {
        let draft = AccountDraft::default_wallet();

        // The partial unique index makes a concurrent insert wait for the
        // other transaction and then do nothing.
        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (owner_id, name, account_type, opening_balance, stored_balance)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (owner_id) WHERE name = 'General Wallet' DO NOTHING
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(&draft.name)
        .bind(draft.account_type)
        .bind(draft.opening_balance)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(account)
    }

    async fn insert_account(&mut self, owner_id: Uuid, draft: &AccountDraft) -> Result<Account, AppError> {
        sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (owner_id, name, account_type, opening_balance, stored_balance)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(&draft.name)
        .bind(draft.account_type)
        .bind(draft.opening_balance)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| AppError::integrity(e, "The default account name is reserved"))
    }

    async fn update_account(
        &mut self,
        owner_id: Uuid,
        id: Uuid,
        patch: &AccountPatch,
    ) -> Result<Account, AppError> {
        sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET name = $3,
                account_type = COALESCE($4, account_type),
                opening_balance = COALESCE($5, opening_balance),
                updated_at = NOW()
            WHERE owner_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(id)
        .bind(&patch.name)
        .bind(patch.account_type)
        .bind(patch.opening_balance)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| AppError::integrity(e, "The default account name is reserved"))?
        .ok_or(AppError::AccountNotFound)
    }

    async fn delete_account(&mut self, owner_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let deleted = sqlx::query("DELETE FROM accounts WHERE owner_id = $1 AND id = $2")
            .bind(owner_id)
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| AppError::integrity(e, "Account is still referenced by ledger entries"))?
            .rows_affected();

        Ok(deleted > 0)
    }

    async fn count_account_references(&mut self, owner_id: Uuid, id: Uuid) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT
                (SELECT COUNT(*) FROM entries WHERE owner_id = $1 AND account_id = $2)
              + (SELECT COUNT(*) FROM transfers
                 WHERE owner_id = $1 AND (from_account_id = $2 OR to_account_id = $2))
            "#,
        )
        .bind(owner_id)
        .bind(id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(count)
    }

    async fn balance_totals(&mut self, owner_id: Uuid, account_id: Uuid) -> Result<BalanceTotals, AppError> {
        let totals = sqlx::query_as::<_, BalanceTotals>(
            r#"
            SELECT
                (SELECT COALESCE(SUM(amount), 0) FROM entries
                 WHERE owner_id = $1 AND account_id = $2 AND kind = 'income') AS incomes,
                (SELECT COALESCE(SUM(amount), 0) FROM entries
                 WHERE owner_id = $1 AND account_id = $2 AND kind = 'expense') AS expenses,
                (SELECT COALESCE(SUM(amount), 0) FROM transfers
                 WHERE owner_id = $1 AND to_account_id = $2) AS transfers_in,
                (SELECT COALESCE(SUM(amount), 0) FROM transfers
                 WHERE owner_id = $1 AND from_account_id = $2) AS transfers_out
            "#,
        )
        .bind(owner_id)
        .bind(account_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(totals)
    }

    async fn write_balance(
        &mut self,
        owner_id: Uuid,
        account_id: Uuid,
        stored_balance: Decimal,
        opening_balance: Option<Decimal>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET stored_balance = $3,
                opening_balance = COALESCE($4, opening_balance),
                updated_at = NOW()
            WHERE owner_id = $1 AND id = $2
            "#,
        )
        .bind(owner_id)
        .bind(account_id)
        .bind(stored_balance)
        .bind(opening_balance)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_entry(&mut self, owner_id: Uuid, record: &EntryRecord) -> Result<Entry, AppError> {
        sqlx::query_as::<_, Entry>(
            r#"
            INSERT INTO entries (
                owner_id,
                kind,
                description,
                amount,
                entry_date,
                category,
                expense_group,
                payment_method,
                account_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(record.kind)
        .bind(&record.description)
        .bind(record.amount)
        .bind(record.date)
        .bind(&record.category)
        .bind(record.group)
        .bind(&record.payment_method)
        .bind(record.account_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| AppError::integrity(e, "Account does not belong to this owner"))
    }

    async fn lock_entry(&mut self, owner_id: Uuid, kind: EntryKind, id: Uuid) -> Result<Option<Entry>, AppError> {
        let entry = sqlx::query_as::<_, Entry>(
            "SELECT * FROM entries WHERE owner_id = $1 AND kind = $2 AND id = $3 FOR UPDATE",
        )
        .bind(owner_id)
        .bind(kind)
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(entry)
    }

    async fn update_entry(&mut self, owner_id: Uuid, id: Uuid, record: &EntryRecord) -> Result<Entry, AppError> {
        sqlx::query_as::<_, Entry>(
            r#"
            UPDATE entries
            SET description = $4,
                amount = $5,
                entry_date = $6,
                category = $7,
                expense_group = $8,
                payment_method = $9,
                account_id = $10,
                updated_at = NOW()
            WHERE owner_id = $1 AND id = $2 AND kind = $3
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(id)
        .bind(record.kind)
        .bind(&record.description)
        .bind(record.amount)
        .bind(record.date)
        .bind(&record.category)
        .bind(record.group)
        .bind(&record.payment_method)
        .bind(record.account_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| AppError::integrity(e, "Account does not belong to this owner"))?
        .ok_or(AppError::EntryNotFound)
    }

    async fn delete_entry(&mut self, owner_id: Uuid, kind: EntryKind, id: Uuid) -> Result<bool, AppError> {
        let deleted = sqlx::query("DELETE FROM entries WHERE owner_id = $1 AND kind = $2 AND id = $3")
            .bind(owner_id)
            .bind(kind)
            .bind(id)
            .execute(&mut *self.tx)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    async fn list_entries(
        &mut self,
        owner_id: Uuid,
        kind: EntryKind,
        filter: EntryFilter,
    ) -> Result<Vec<Entry>, AppError> {
        let entries = sqlx::query_as::<_, Entry>(
            r#"
            SELECT * FROM entries
            WHERE owner_id = $1
              AND kind = $2
              AND ($3::INT IS NULL OR EXTRACT(MONTH FROM entry_date)::INT = $3)
              AND ($4::INT IS NULL OR EXTRACT(YEAR FROM entry_date)::INT = $4)
            ORDER BY entry_date DESC, created_at DESC
            "#,
        )
        .bind(owner_id)
        .bind(kind)
        .bind(filter.month.map(|m| m as i32))
        .bind(filter.year)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(entries)
    }

    async fn unlinked_totals(&mut self, owner_id: Uuid) -> Result<UnlinkedTotals, AppError> {
        let totals = sqlx::query_as::<_, UnlinkedTotals>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE kind = 'income') AS incomes,
                COUNT(*) FILTER (WHERE kind = 'expense') AS expenses,
                COALESCE(SUM(amount) FILTER (WHERE kind = 'income'), 0) AS income_amount,
                COALESCE(SUM(amount) FILTER (WHERE kind = 'expense'), 0) AS expense_amount
            FROM entries
            WHERE owner_id = $1 AND account_id IS NULL
            "#,
        )
        .bind(owner_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(totals)
    }

    async fn assign_unlinked(&mut self, owner_id: Uuid, account_id: Uuid) -> Result<(u64, u64), AppError> {
        let kinds = sqlx::query_scalar::<_, EntryKind>(
            r#"
            UPDATE entries
            SET account_id = $2, updated_at = NOW()
            WHERE owner_id = $1 AND account_id IS NULL
            RETURNING kind
            "#,
        )
        .bind(owner_id)
        .bind(account_id)
        .fetch_all(&mut *self.tx)
        .await?;

        let incomes = kinds.iter().filter(|k| **k == EntryKind::Income).count() as u64;
        Ok((incomes, kinds.len() as u64 - incomes))
    }

    async fn insert_transfer(&mut self, owner_id: Uuid, draft: &TransferDraft) -> Result<Transfer, AppError> {
        sqlx::query_as::<_, Transfer>(
            r#"
            INSERT INTO transfers (
                owner_id,
                from_account_id,
                to_account_id,
                amount,
                transfer_date,
                description,
                idempotency_key
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(draft.from_account_id)
        .bind(draft.to_account_id)
        .bind(draft.amount)
        .bind(draft.date)
        .bind(&draft.description)
        .bind(&draft.idempotency_key)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| AppError::integrity(e, "Idempotency key already used"))
    }

    async fn find_transfer_by_key(
        &mut self,
        owner_id: Uuid,
        idempotency_key: &str,
    ) -> Result<Option<Transfer>, AppError> {
        let transfer = sqlx::query_as::<_, Transfer>(
            "SELECT * FROM transfers WHERE owner_id = $1 AND idempotency_key = $2",
        )
        .bind(owner_id)
        .bind(idempotency_key)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(transfer)
    }

    async fn list_transfers(&mut self, owner_id: Uuid) -> Result<Vec<Transfer>, AppError> {
        let transfers = sqlx::query_as::<_, Transfer>(
            "SELECT * FROM transfers WHERE owner_id = $1 ORDER BY transfer_date DESC, created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(transfers)
    }

    async fn insert_goal(&mut self, owner_id: Uuid, draft: &GoalDraft) -> Result<Goal, AppError> {
        let goal = sqlx::query_as::<_, Goal>(
            r#"
            INSERT INTO goals (owner_id, name, target_amount, current_amount, deadline, completed_at)
            VALUES ($1, $2, $3, $4, $5, CASE WHEN $4 >= $3 THEN NOW() END)
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(&draft.name)
        .bind(draft.target_amount)
        .bind(draft.current_amount)
        .bind(draft.deadline)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(goal)
    }

    async fn list_goals(&mut self, owner_id: Uuid) -> Result<Vec<Goal>, AppError> {
        let goals = sqlx::query_as::<_, Goal>(
            r#"
            SELECT * FROM goals
            WHERE owner_id = $1
            ORDER BY completed_at NULLS FIRST, created_at DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(goals)
    }

    async fn lock_goal(&mut self, owner_id: Uuid, id: Uuid) -> Result<Option<Goal>, AppError> {
        let goal = sqlx::query_as::<_, Goal>(
            "SELECT * FROM goals WHERE owner_id = $1 AND id = $2 FOR UPDATE",
        )
        .bind(owner_id)
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(goal)
    }

    async fn update_goal(&mut self, owner_id: Uuid, id: Uuid, draft: &GoalDraft) -> Result<Goal, AppError> {
        sqlx::query_as::<_, Goal>(
            r#"
            UPDATE goals
            SET name = $3,
                target_amount = $4,
                current_amount = $5,
                deadline = $6,
                completed_at = CASE WHEN $5 >= $4 THEN COALESCE(completed_at, NOW()) END,
                updated_at = NOW()
            WHERE owner_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(id)
        .bind(&draft.name)
        .bind(draft.target_amount)
        .bind(draft.current_amount)
        .bind(draft.deadline)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(AppError::GoalNotFound)
    }

    async fn set_goal_amount(&mut self, owner_id: Uuid, id: Uuid, current_amount: Decimal) -> Result<Goal, AppError> {
        sqlx::query_as::<_, Goal>(
            r#"
            UPDATE goals
            SET current_amount = $3,
                completed_at = CASE WHEN $3 >= target_amount THEN COALESCE(completed_at, NOW()) END,
                updated_at = NOW()
            WHERE owner_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(id)
        .bind(current_amount)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(AppError::GoalNotFound)
    }

    async fn delete_goal(&mut self, owner_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let deleted = sqlx::query("DELETE FROM goals WHERE owner_id = $1 AND id = $2")
            .bind(owner_id)
            .bind(id)
            .execute(&mut *self.tx)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    async fn commit(self) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), AppError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
