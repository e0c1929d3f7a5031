//! Savings goals.
//!
//! Creating, editing and deleting a goal never touches an account. Money
//! enters a goal through [`contribute`], which books an expense on the
//! funding account and raises the goal's saved amount in the same
//! transaction, so the account's cached balance is recomputed like for any
//! other expense.

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        entry::{AccountRef, EntryKind, EntryRecord, ExpenseGroup},
        goal::{GOAL_CATEGORY, Goal, GoalContribution, GoalDraft},
        money,
    },
    services::{balance, reconciliation::resolve_account},
    store::{LedgerStore, LedgerTx},
};

pub async fn create_goal<S: LedgerStore>(store: &S, owner_id: Uuid, draft: GoalDraft) -> Result<Goal, AppError> {
    let mut tx = store.begin().await?;
    let goal = tx.insert_goal(owner_id, &draft).await?;
    tx.commit().await?;

    tracing::info!(%owner_id, goal_id = %goal.id, target = %goal.target_amount, "goal created");
    Ok(goal)
}

/// Open goals first, then completed ones.
pub async fn list_goals<S: LedgerStore>(store: &S, owner_id: Uuid) -> Result<Vec<Goal>, AppError> {
    let mut tx = store.begin().await?;
    let goals = tx.list_goals(owner_id).await?;
    tx.commit().await?;

    Ok(goals)
}

/// Replace a goal's fields. Editing `current_amount` here moves no money.
pub async fn update_goal<S: LedgerStore>(
    store: &S,
    owner_id: Uuid,
    goal_id: Uuid,
    draft: GoalDraft,
) -> Result<Goal, AppError> {
    let mut tx = store.begin().await?;
    let goal = tx.update_goal(owner_id, goal_id, &draft).await?;
    tx.commit().await?;

    tracing::info!(%owner_id, %goal_id, completed = goal.completed_at.is_some(), "goal updated");
    Ok(goal)
}

/// Delete a goal. Expenses booked by its contributions stay on record.
pub async fn delete_goal<S: LedgerStore>(store: &S, owner_id: Uuid, goal_id: Uuid) -> Result<(), AppError> {
    let mut tx = store.begin().await?;
    if !tx.delete_goal(owner_id, goal_id).await? {
        return Err(AppError::GoalNotFound);
    }
    tx.commit().await?;

    tracing::info!(%owner_id, %goal_id, "goal deleted");
    Ok(())
}

/// Move money from an account into a goal.
///
/// # Process
///
/// 1. Lock the goal and the funding account (the default account when none is given)
/// 2. Reject if the account's effective balance is below the amount
/// 3. Book an expense for the amount on the account
/// 4. Raise the goal's saved amount, completing it once the target is met
/// 5. Recompute the account and commit
///
/// # Errors
///
/// - `InvalidRequest`: amount not positive, not storable, or the goal total would overflow
/// - `GoalNotFound`: no such goal for this owner
/// - `Forbidden`: the account is not one of the owner's accounts
/// - `InsufficientFunds`: the account cannot cover the amount
#[tracing::instrument(skip(store))]
pub async fn contribute<S: LedgerStore>(
    store: &S,
    owner_id: Uuid,
    goal_id: Uuid,
    amount: Decimal,
    account: AccountRef,
) -> Result<GoalContribution, AppError> {
    let amount = money::positive("Amount", amount)?;

    let mut tx = store.begin().await?;

    let goal = tx
        .lock_goal(owner_id, goal_id)
        .await?
        .ok_or(AppError::GoalNotFound)?;
    let saved = money::check_range("Goal amount", money::checked_add(goal.current_amount, amount)?)?;

    let account_id = resolve_account(&mut tx, owner_id, account).await?;
    let account = tx
        .lock_account(owner_id, account_id)
        .await?
        .ok_or_else(|| AppError::Forbidden("Account does not belong to this owner".to_string()))?;

    let available = balance::compute(&mut tx, owner_id, &account).await?;
    if available < amount {
        tx.rollback().await?;
        tracing::warn!(
            %owner_id,
            %goal_id,
            %available,
            requested = %amount,
            "goal contribution rejected: insufficient funds"
        );
        return Err(AppError::InsufficientFunds);
    }

    let record = EntryRecord {
        kind: EntryKind::Expense,
        description: format!("Goal: {}", goal.name),
        amount,
        date: Utc::now().date_naive(),
        category: Some(GOAL_CATEGORY.to_string()),
        group: Some(ExpenseGroup::Investment),
        payment_method: None,
        account_id: account.id,
    };
    let entry = tx.insert_entry(owner_id, &record).await?;
    let goal = tx.set_goal_amount(owner_id, goal_id, saved).await?;
    let account_balance = balance::reconcile(&mut tx, owner_id, &account).await?;

    tx.commit().await?;

    tracing::info!(
        %owner_id,
        %goal_id,
        account_id = %account.id,
        entry_id = %entry.id,
        %amount,
        %account_balance,
        completed = goal.completed_at.is_some(),
        "goal contribution booked"
    );

    Ok(GoalContribution {
        goal,
        entry,
        account_balance,
    })
}
