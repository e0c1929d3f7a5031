//! Account service - creation, edits, deletion and balance listing.
//!
//! The reserved default account can be edited (type, opening balance) but
//! never renamed or deleted, and no other account may take its name.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        account::{
            Account, AccountDraft, AccountListResponse, AccountPatch, AccountResponse,
            CreateAccountRequest, DEFAULT_ACCOUNT_NAME, UpdateAccountRequest,
        },
        money,
    },
    services::balance,
    store::{LedgerStore, LedgerTx},
};

fn validated_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidRequest(
            "Account name is required".to_string(),
        ));
    }
    Ok(name.to_string())
}

fn reserved_name() -> AppError {
    AppError::Conflict(format!("\"{DEFAULT_ACCOUNT_NAME}\" is reserved for the default account"))
}

/// Build the client view of an account with its computed balance.
async fn view<T: LedgerTx>(tx: &mut T, owner_id: Uuid, account: Account) -> Result<AccountResponse, AppError> {
    let balance = balance::compute(tx, owner_id, &account).await?;
    Ok(AccountResponse {
        id: account.id,
        opening_balance: balance::effective_opening(&account),
        is_default: account.is_default(),
        name: account.name,
        account_type: account.account_type,
        balance,
        created_at: account.created_at,
        updated_at: account.updated_at,
    })
}

/// Create a regular account. Its stored balance starts at the opening balance.
#[tracing::instrument(skip(store, request), fields(name = %request.name))]
pub async fn create_account<S: LedgerStore>(
    store: &S,
    owner_id: Uuid,
    request: CreateAccountRequest,
) -> Result<AccountResponse, AppError> {
    let name = validated_name(&request.name)?;
    if name == DEFAULT_ACCOUNT_NAME {
        return Err(reserved_name());
    }

    let draft = AccountDraft {
        name,
        account_type: request.account_type,
        opening_balance: money::check_range("Opening balance", request.opening_balance)?,
    };

    let mut tx = store.begin().await?;
    let account = tx.insert_account(owner_id, &draft).await?;
    let response = view(&mut tx, owner_id, account).await?;
    tx.commit().await?;

    tracing::info!(%owner_id, account_id = %response.id, "account created");
    Ok(response)
}

/// One account with its computed balance.
pub async fn get_account<S: LedgerStore>(
    store: &S,
    owner_id: Uuid,
    account_id: Uuid,
) -> Result<AccountResponse, AppError> {
    let mut tx = store.begin().await?;
    let account = tx
        .lock_account(owner_id, account_id)
        .await?
        .ok_or(AppError::AccountNotFound)?;
    let response = view(&mut tx, owner_id, account).await?;
    tx.commit().await?;

    Ok(response)
}

/// All accounts of the owner with computed balances and their sum.
pub async fn list_accounts<S: LedgerStore>(store: &S, owner_id: Uuid) -> Result<AccountListResponse, AppError> {
    let mut tx = store.begin().await?;
    let accounts = tx.list_accounts(owner_id).await?;

    let mut views = Vec::with_capacity(accounts.len());
    for account in accounts {
        views.push(view(&mut tx, owner_id, account).await?);
    }
    tx.commit().await?;

    let net_worth = views
        .iter()
        .try_fold(Decimal::ZERO, |sum, a| money::checked_add(sum, a.balance))?;
    Ok(AccountListResponse {
        accounts: views,
        net_worth,
    })
}

/// Sum of all the owner's effective balances.
pub async fn net_worth<S: LedgerStore>(store: &S, owner_id: Uuid) -> Result<Decimal, AppError> {
    Ok(list_accounts(store, owner_id).await?.net_worth)
}

/// Edit name, type and opening balance, then recompute the account.
///
/// An omitted type or opening balance keeps its current value.
///
/// # Errors
///
/// - `AccountNotFound`: no such account for this owner
/// - `Conflict`: renaming the default account, or taking its name
#[tracing::instrument(skip(store, request))]
pub async fn update_account<S: LedgerStore>(
    store: &S,
    owner_id: Uuid,
    account_id: Uuid,
    request: UpdateAccountRequest,
) -> Result<AccountResponse, AppError> {
    let name = validated_name(&request.name)?;
    let opening_balance = request
        .opening_balance
        .map(|opening| money::check_range("Opening balance", opening))
        .transpose()?;

    let mut tx = store.begin().await?;
    let current = tx
        .lock_account(owner_id, account_id)
        .await?
        .ok_or(AppError::AccountNotFound)?;

    if current.is_default() && name != DEFAULT_ACCOUNT_NAME {
        tx.rollback().await?;
        tracing::warn!(%owner_id, %account_id, "rename of default account refused");
        return Err(AppError::Conflict(
            "The default account cannot be renamed".to_string(),
        ));
    }
    if !current.is_default() && name == DEFAULT_ACCOUNT_NAME {
        tx.rollback().await?;
        return Err(reserved_name());
    }

    let patch = AccountPatch {
        name,
        account_type: request.account_type,
        opening_balance,
    };
    let updated = tx.update_account(owner_id, account_id, &patch).await?;
    balance::reconcile(&mut tx, owner_id, &updated).await?;

    let refreshed = tx
        .lock_account(owner_id, account_id)
        .await?
        .ok_or(AppError::AccountNotFound)?;
    let response = view(&mut tx, owner_id, refreshed).await?;
    tx.commit().await?;

    tracing::info!(%owner_id, %account_id, balance = %response.balance, "account updated");
    Ok(response)
}

/// Delete an account that nothing references.
///
/// # Errors
///
/// - `AccountNotFound`: no such account for this owner
/// - `Conflict`: it is the default account, or entries/transfers still use it
#[tracing::instrument(skip(store))]
pub async fn delete_account<S: LedgerStore>(store: &S, owner_id: Uuid, account_id: Uuid) -> Result<(), AppError> {
    let mut tx = store.begin().await?;
    let account = tx
        .lock_account(owner_id, account_id)
        .await?
        .ok_or(AppError::AccountNotFound)?;

    if account.is_default() {
        tx.rollback().await?;
        tracing::warn!(%owner_id, %account_id, "delete of default account refused");
        return Err(AppError::Conflict(
            "The default account cannot be deleted".to_string(),
        ));
    }

    let references = tx.count_account_references(owner_id, account_id).await?;
    if references > 0 {
        tx.rollback().await?;
        return Err(AppError::Conflict(format!(
            "Account is still referenced by {references} ledger entries"
        )));
    }

    if !tx.delete_account(owner_id, account_id).await? {
        return Err(AppError::AccountNotFound);
    }
    tx.commit().await?;

    tracing::info!(%owner_id, %account_id, "account deleted");
    Ok(())
}
