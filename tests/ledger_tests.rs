//! Ledger behaviour against the in-memory store.

use chrono::{NaiveDate, Utc};
use ledger_engine::{
    error::{AppError, ErrorClass},
    models::{
        account::{Account, AccountType, CreateAccountRequest, DEFAULT_ACCOUNT_NAME, UpdateAccountRequest},
        entry::{AccountRef, Entry, EntryDraft, EntryFilter, EntryKind, ExpenseGroup, ExpenseRequest},
        goal::{GOAL_CATEGORY, Goal, GoalDraft, GoalRequest},
        transfer::{TransferDraft, TransferRequest},
    },
    services::{accounts, balance, goals, migration, provisioner, reconciliation, transfers},
    store::{LedgerStore, LedgerTx, memory::MemoryStore},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

async fn open_account(store: &MemoryStore, owner: Uuid, name: &str, opening: Decimal) -> Uuid {
    accounts::create_account(
        store,
        owner,
        CreateAccountRequest {
            name: name.to_string(),
            account_type: AccountType::Checking,
            opening_balance: opening,
        },
    )
    .await
    .unwrap()
    .id
}

fn expense(amount: Decimal, account: Option<Uuid>) -> EntryDraft {
    EntryDraft::expense(ExpenseRequest {
        description: "Groceries".to_string(),
        amount,
        date: None,
        category: Some("food".to_string()),
        group: None,
        payment_method: None,
        account_id: account,
    })
    .unwrap()
}

fn income(amount: Decimal, account: Option<Uuid>) -> EntryDraft {
    EntryDraft::income("Salary".to_string(), amount, None, AccountRef::from(account)).unwrap()
}

fn transfer(from: Uuid, to: Uuid, amount: Decimal, key: Option<&str>) -> TransferDraft {
    TransferDraft::from_request(TransferRequest {
        from_account_id: from,
        to_account_id: to,
        amount,
        date: None,
        description: Some("move".to_string()),
        idempotency_key: key.map(str::to_string),
    })
    .unwrap()
}

async fn balance_of(store: &MemoryStore, owner: Uuid, account_id: Uuid) -> Decimal {
    accounts::get_account(store, owner, account_id)
        .await
        .unwrap()
        .balance
}

async fn stored_row(store: &MemoryStore, owner: Uuid, account_id: Uuid) -> Account {
    let mut tx = store.begin().await.unwrap();
    tx.lock_account(owner, account_id).await.unwrap().unwrap()
}

/// Every account's cached balance equals its freshly computed balance.
async fn assert_reconciled(store: &MemoryStore, owner: Uuid) {
    let mut tx = store.begin().await.unwrap();
    for account in tx.list_accounts(owner).await.unwrap() {
        let computed = balance::compute(&mut tx, owner, &account).await.unwrap();
        assert_eq!(
            account.stored_balance, computed,
            "account {} drifted from its ledger",
            account.name
        );
    }
}

#[tokio::test]
async fn expense_transfer_delete_scenario() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let a = open_account(&store, owner, "A", dec!(100)).await;
    let b = open_account(&store, owner, "B", dec!(0)).await;

    let spent = reconciliation::create_entry(&store, owner, expense(dec!(30), Some(a)))
        .await
        .unwrap();
    assert_eq!(balance_of(&store, owner, a).await, dec!(70));
    assert_reconciled(&store, owner).await;

    let outcome = transfers::execute_transfer(&store, owner, transfer(a, b, dec!(20), None))
        .await
        .unwrap();
    assert_eq!(outcome.from_balance, dec!(50));
    assert_eq!(outcome.to_balance, dec!(20));
    assert_reconciled(&store, owner).await;

    reconciliation::delete_entry(&store, owner, EntryKind::Expense, spent.id)
        .await
        .unwrap();
    assert_eq!(balance_of(&store, owner, a).await, dec!(80));
    assert_eq!(balance_of(&store, owner, b).await, dec!(20));
    assert_reconciled(&store, owner).await;
}

#[tokio::test]
async fn insufficient_funds_changes_nothing() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let a = open_account(&store, owner, "A", dec!(50)).await;
    let b = open_account(&store, owner, "B", dec!(0)).await;

    let err = transfers::execute_transfer(&store, owner, transfer(a, b, dec!(1000), None))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InsufficientFunds));
    assert_eq!(err.class(), ErrorClass::InsufficientFunds);
    assert_eq!(store.transfer_count().await, 0);
    assert_eq!(balance_of(&store, owner, a).await, dec!(50));
    assert_eq!(balance_of(&store, owner, b).await, dec!(0));
    assert!(transfers::list_transfers(&store, owner).await.unwrap().is_empty());
}

#[tokio::test]
async fn transfer_conserves_net_worth() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let a = open_account(&store, owner, "A", dec!(120.50)).await;
    let b = open_account(&store, owner, "B", dec!(-40)).await;
    let before = accounts::net_worth(&store, owner).await.unwrap();

    transfers::execute_transfer(&store, owner, transfer(a, b, dec!(75.25), None))
        .await
        .unwrap();

    assert_eq!(balance_of(&store, owner, a).await, dec!(45.25));
    assert_eq!(balance_of(&store, owner, b).await, dec!(35.25));
    assert_eq!(accounts::net_worth(&store, owner).await.unwrap(), before);
    assert_reconciled(&store, owner).await;
}

#[tokio::test]
async fn exact_balance_can_be_transferred() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let a = open_account(&store, owner, "A", dec!(20)).await;
    let b = open_account(&store, owner, "B", dec!(0)).await;

    let outcome = transfers::execute_transfer(&store, owner, transfer(a, b, dec!(20), None))
        .await
        .unwrap();
    assert_eq!(outcome.from_balance, Decimal::ZERO);
}

#[tokio::test]
async fn calculation_is_idempotent() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let a = open_account(&store, owner, "A", dec!(10)).await;
    reconciliation::create_entry(&store, owner, income(dec!(5), Some(a)))
        .await
        .unwrap();

    let mut tx = store.begin().await.unwrap();
    let account = tx.lock_account(owner, a).await.unwrap().unwrap();
    let first = balance::compute(&mut tx, owner, &account).await.unwrap();
    let second = balance::compute(&mut tx, owner, &account).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first, dec!(15));
}

#[tokio::test]
async fn default_account_is_a_singleton() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();

    let first = provisioner::ensure_default_account(&store, owner).await.unwrap();
    let second = provisioner::ensure_default_account(&store, owner).await.unwrap();
    assert_eq!(first, second);

    let entry = reconciliation::create_entry(&store, owner, income(dec!(12), None))
        .await
        .unwrap();
    assert_eq!(entry.account_id, Some(first));
    assert_eq!(balance_of(&store, owner, first).await, dec!(12));
}

#[tokio::test]
async fn concurrent_provisioning_converges() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { provisioner::ensure_default_account(&store, owner).await })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);

    let listing = accounts::list_accounts(&store, owner).await.unwrap();
    assert_eq!(listing.accounts.len(), 1);
    assert!(listing.accounts[0].is_default);
}

#[tokio::test]
async fn unassigned_entry_provisions_default_account() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();

    let entry = reconciliation::create_entry(&store, owner, expense(dec!(8), None))
        .await
        .unwrap();

    let listing = accounts::list_accounts(&store, owner).await.unwrap();
    assert_eq!(listing.accounts.len(), 1);
    let wallet = &listing.accounts[0];
    assert_eq!(wallet.name, DEFAULT_ACCOUNT_NAME);
    assert_eq!(wallet.account_type, AccountType::Checking);
    assert_eq!(entry.account_id, Some(wallet.id));
    assert_eq!(wallet.balance, dec!(-8));
}

#[tokio::test]
async fn reserved_account_is_protected() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let wallet = provisioner::ensure_default_account(&store, owner).await.unwrap();

    let rename = accounts::update_account(
        &store,
        owner,
        wallet,
        UpdateAccountRequest {
            name: "Pocket".to_string(),
            account_type: Some(AccountType::Checking),
            opening_balance: None,
        },
    )
    .await;
    assert!(matches!(rename, Err(AppError::Conflict(_))));

    // Without referencing entries
    let delete = accounts::delete_account(&store, owner, wallet).await;
    assert!(matches!(delete, Err(AppError::Conflict(_))));

    // And with them
    reconciliation::create_entry(&store, owner, income(dec!(1), None))
        .await
        .unwrap();
    let delete = accounts::delete_account(&store, owner, wallet).await;
    assert_eq!(delete.unwrap_err().class(), ErrorClass::Conflict);

    let listing = accounts::list_accounts(&store, owner).await.unwrap();
    assert_eq!(listing.accounts.len(), 1);
    assert_eq!(listing.accounts[0].name, DEFAULT_ACCOUNT_NAME);
}

#[tokio::test]
async fn reserved_name_cannot_be_taken() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();

    let created = accounts::create_account(
        &store,
        owner,
        CreateAccountRequest {
            name: DEFAULT_ACCOUNT_NAME.to_string(),
            account_type: AccountType::Savings,
            opening_balance: Decimal::ZERO,
        },
    )
    .await;
    assert!(matches!(created, Err(AppError::Conflict(_))));

    let other = open_account(&store, owner, "Bank", dec!(5)).await;
    let renamed = accounts::update_account(
        &store,
        owner,
        other,
        UpdateAccountRequest {
            name: DEFAULT_ACCOUNT_NAME.to_string(),
            account_type: Some(AccountType::Checking),
            opening_balance: None,
        },
    )
    .await;
    assert!(matches!(renamed, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn default_account_type_and_opening_are_editable() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let wallet = provisioner::ensure_default_account(&store, owner).await.unwrap();
    reconciliation::create_entry(&store, owner, income(dec!(40), None))
        .await
        .unwrap();

    let updated = accounts::update_account(
        &store,
        owner,
        wallet,
        UpdateAccountRequest {
            name: DEFAULT_ACCOUNT_NAME.to_string(),
            account_type: Some(AccountType::Savings),
            opening_balance: Some(dec!(60)),
        },
    )
    .await
    .unwrap();

    assert_eq!(updated.account_type, AccountType::Savings);
    assert_eq!(updated.opening_balance, dec!(60));
    assert_eq!(updated.balance, dec!(100));
    assert_reconciled(&store, owner).await;
}

#[tokio::test]
async fn update_moves_effect_between_accounts() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let a = open_account(&store, owner, "A", dec!(100)).await;
    let b = open_account(&store, owner, "B", dec!(0)).await;

    let entry = reconciliation::create_entry(&store, owner, income(dec!(50), Some(a)))
        .await
        .unwrap();
    assert_eq!(balance_of(&store, owner, a).await, dec!(150));

    // Same account: only the delta applies
    reconciliation::update_entry(&store, owner, entry.id, income(dec!(70), Some(a)))
        .await
        .unwrap();
    assert_eq!(balance_of(&store, owner, a).await, dec!(170));

    // Reassigned: the old account loses it, the new one gains the new amount
    let moved = reconciliation::update_entry(&store, owner, entry.id, income(dec!(60), Some(b)))
        .await
        .unwrap();
    assert_eq!(moved.account_id, Some(b));
    assert_eq!(balance_of(&store, owner, a).await, dec!(100));
    assert_eq!(balance_of(&store, owner, b).await, dec!(60));
    assert_reconciled(&store, owner).await;
}

#[tokio::test]
async fn update_of_missing_entry_is_not_found() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let a = open_account(&store, owner, "A", dec!(0)).await;
    let entry = reconciliation::create_entry(&store, owner, income(dec!(5), Some(a)))
        .await
        .unwrap();

    // An income id is not an expense id
    let wrong_kind = reconciliation::update_entry(&store, owner, entry.id, expense(dec!(5), Some(a))).await;
    assert!(matches!(wrong_kind, Err(AppError::EntryNotFound)));

    let missing = reconciliation::delete_entry(&store, owner, EntryKind::Income, Uuid::new_v4()).await;
    assert!(matches!(missing, Err(AppError::EntryNotFound)));
}

#[tokio::test]
async fn referenced_account_cannot_be_deleted() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let a = open_account(&store, owner, "A", dec!(0)).await;
    let spare = open_account(&store, owner, "Spare", dec!(0)).await;

    let entry = reconciliation::create_entry(&store, owner, income(dec!(9), Some(a)))
        .await
        .unwrap();
    let err = accounts::delete_account(&store, owner, a).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Conflict);

    reconciliation::delete_entry(&store, owner, EntryKind::Income, entry.id)
        .await
        .unwrap();
    accounts::delete_account(&store, owner, a).await.unwrap();
    accounts::delete_account(&store, owner, spare).await.unwrap();

    assert!(accounts::list_accounts(&store, owner).await.unwrap().accounts.is_empty());
    assert!(matches!(
        accounts::get_account(&store, owner, a).await,
        Err(AppError::AccountNotFound)
    ));
}

#[tokio::test]
async fn foreign_accounts_are_forbidden() {
    let store = MemoryStore::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let alices = open_account(&store, alice, "Alice", dec!(500)).await;
    let bobs = open_account(&store, bob, "Bob", dec!(0)).await;

    let err = transfers::execute_transfer(&store, alice, transfer(alices, bobs, dec!(10), None))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    assert_eq!(err.class(), ErrorClass::Authorization);
    assert_eq!(store.transfer_count().await, 0);

    let err = reconciliation::create_entry(&store, alice, income(dec!(10), Some(bobs)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    assert!(matches!(
        accounts::get_account(&store, alice, bobs).await,
        Err(AppError::AccountNotFound)
    ));
    assert_eq!(balance_of(&store, bob, bobs).await, Decimal::ZERO);
    assert_eq!(balance_of(&store, alice, alices).await, dec!(500));
}

#[tokio::test]
async fn invalid_input_touches_nothing() {
    assert!(matches!(
        EntryDraft::income("Salary".to_string(), Decimal::ZERO, None, AccountRef::Unassigned),
        Err(AppError::InvalidRequest(_))
    ));

    let same = Uuid::new_v4();
    let err = TransferDraft::from_request(TransferRequest {
        from_account_id: same,
        to_account_id: same,
        amount: dec!(1),
        date: None,
        description: None,
        idempotency_key: None,
    })
    .unwrap_err();
    assert_eq!(err.class(), ErrorClass::Validation);

    // A draft that bypassed construction is still rejected before any write
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let mut draft = income(dec!(1), None);
    draft.amount = dec!(-3);
    let err = reconciliation::create_entry(&store, owner, draft).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidRequest(_)));
    assert!(accounts::list_accounts(&store, owner).await.unwrap().accounts.is_empty());
}

#[tokio::test]
async fn legacy_account_keeps_its_stored_balance_as_opening() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let now = Utc::now();
    let legacy = Account {
        id: Uuid::new_v4(),
        owner_id: owner,
        name: "Old bank".to_string(),
        account_type: AccountType::Checking,
        opening_balance: None,
        stored_balance: dec!(250),
        created_at: now,
        updated_at: now,
    };
    store.seed_account(legacy.clone()).await;

    assert_eq!(balance_of(&store, owner, legacy.id).await, dec!(250));

    reconciliation::create_entry(&store, owner, income(dec!(50), Some(legacy.id)))
        .await
        .unwrap();

    let row = stored_row(&store, owner, legacy.id).await;
    assert_eq!(row.opening_balance, Some(dec!(250)));
    assert_eq!(row.stored_balance, dec!(300));

    // Recomputing again must not fold the new cache into the opening point
    assert_eq!(balance_of(&store, owner, legacy.id).await, dec!(300));
    assert_reconciled(&store, owner).await;
}

#[tokio::test]
async fn explicit_zero_opening_is_respected() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let a = open_account(&store, owner, "Zero", Decimal::ZERO).await;
    reconciliation::create_entry(&store, owner, expense(dec!(15), Some(a)))
        .await
        .unwrap();
    reconciliation::create_entry(&store, owner, expense(dec!(5), Some(a)))
        .await
        .unwrap();

    assert_eq!(balance_of(&store, owner, a).await, dec!(-20));
    assert_reconciled(&store, owner).await;
}

fn unlinked(owner: Uuid, kind: EntryKind, amount: Decimal) -> Entry {
    let now = Utc::now();
    Entry {
        id: Uuid::new_v4(),
        owner_id: owner,
        kind,
        description: "imported".to_string(),
        amount,
        date: now.date_naive(),
        category: None,
        group: None,
        payment_method: None,
        account_id: None,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn migration_moves_unassigned_entries_to_default() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let other = Uuid::new_v4();
    store.seed_entry(unlinked(owner, EntryKind::Income, dec!(100))).await;
    store.seed_entry(unlinked(owner, EntryKind::Income, dec!(20))).await;
    store.seed_entry(unlinked(owner, EntryKind::Expense, dec!(45))).await;
    store.seed_entry(unlinked(other, EntryKind::Expense, dec!(999))).await;

    let summary = migration::unlinked_summary(&store, owner).await.unwrap();
    assert!(summary.has_unlinked);
    assert_eq!(summary.unlinked_incomes, 2);
    assert_eq!(summary.unlinked_expenses, 1);
    assert_eq!(summary.total_unlinked, 3);
    assert_eq!(summary.balance_impact, dec!(75));

    let report = migration::migrate_unlinked(&store, owner).await.unwrap();
    assert_eq!(report.incomes_migrated, 2);
    assert_eq!(report.expenses_migrated, 1);
    assert_eq!(report.total_migrated, 3);
    assert_eq!(report.new_balance, dec!(75));

    let wallet = provisioner::ensure_default_account(&store, owner).await.unwrap();
    assert_eq!(report.account_id, wallet);
    assert_eq!(balance_of(&store, owner, wallet).await, dec!(75));
    assert_reconciled(&store, owner).await;

    let after = migration::unlinked_summary(&store, owner).await.unwrap();
    assert!(!after.has_unlinked);
    assert_eq!(after.balance_impact, Decimal::ZERO);

    // Other owners are untouched
    assert_eq!(migration::unlinked_summary(&store, other).await.unwrap().total_unlinked, 1);
}

#[tokio::test]
async fn idempotency_key_replays_transfer() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let a = open_account(&store, owner, "A", dec!(100)).await;
    let b = open_account(&store, owner, "B", dec!(0)).await;

    let first = transfers::execute_transfer(&store, owner, transfer(a, b, dec!(30), Some("rent-12")))
        .await
        .unwrap();
    let second = transfers::execute_transfer(&store, owner, transfer(a, b, dec!(30), Some("rent-12")))
        .await
        .unwrap();

    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(first.transfer.id, second.transfer.id);
    assert_eq!(second.from_balance, dec!(70));
    assert_eq!(store.transfer_count().await, 1);

    // The same key is free for another owner
    let other = Uuid::new_v4();
    let c = open_account(&store, other, "C", dec!(10)).await;
    let d = open_account(&store, other, "D", dec!(0)).await;
    let theirs = transfers::execute_transfer(&store, other, transfer(c, d, dec!(1), Some("rent-12")))
        .await
        .unwrap();
    assert!(!theirs.replayed);
    assert_eq!(store.transfer_count().await, 2);
}

#[tokio::test]
async fn listings_filter_by_month_and_year() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let a = open_account(&store, owner, "A", dec!(0)).await;

    for (y, m, d) in [(2025, 1, 10), (2025, 2, 3), (2024, 2, 20)] {
        let draft = EntryDraft::income(
            "Pay".to_string(),
            dec!(10),
            NaiveDate::from_ymd_opt(y, m, d),
            AccountRef::Account(a),
        )
        .unwrap();
        reconciliation::create_entry(&store, owner, draft).await.unwrap();
    }
    reconciliation::create_entry(&store, owner, expense(dec!(1), Some(a)))
        .await
        .unwrap();

    let all = reconciliation::list_entries(&store, owner, EntryKind::Income, EntryFilter::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].date, NaiveDate::from_ymd_opt(2025, 2, 3).unwrap());

    let february = EntryFilter {
        month: Some(2),
        year: None,
    };
    assert_eq!(
        reconciliation::list_entries(&store, owner, EntryKind::Income, february)
            .await
            .unwrap()
            .len(),
        2
    );

    let feb_2025 = EntryFilter {
        month: Some(2),
        year: Some(2025),
    };
    assert_eq!(
        reconciliation::list_entries(&store, owner, EntryKind::Income, feb_2025)
            .await
            .unwrap()
            .len(),
        1
    );

    let bad = EntryFilter {
        month: Some(13),
        year: None,
    };
    assert!(matches!(
        reconciliation::list_entries(&store, owner, EntryKind::Income, bad).await,
        Err(AppError::InvalidRequest(_))
    ));
}

#[tokio::test]
async fn expense_group_is_normalised() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();

    let draft = EntryDraft::expense(ExpenseRequest {
        description: "Cinema".to_string(),
        amount: dec!(12),
        date: None,
        category: Some("  ".to_string()),
        group: Some("LEISURE".to_string()),
        payment_method: Some("card".to_string()),
        account_id: None,
    })
    .unwrap();
    let entry = reconciliation::create_entry(&store, owner, draft).await.unwrap();
    assert_eq!(entry.group, Some(ExpenseGroup::Leisure));
    assert_eq!(entry.category, None);

    let entry = reconciliation::create_entry(&store, owner, expense(dec!(3), None))
        .await
        .unwrap();
    assert_eq!(entry.group, Some(ExpenseGroup::Essential));
    assert_eq!(entry.date, Utc::now().date_naive());
}

#[tokio::test]
async fn unstorable_amounts_are_rejected_without_panicking() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();

    let err = accounts::create_account(
        &store,
        owner,
        CreateAccountRequest {
            name: "Huge".to_string(),
            account_type: AccountType::Checking,
            opening_balance: Decimal::MAX,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidRequest(_)));
    assert!(accounts::list_accounts(&store, owner).await.unwrap().accounts.is_empty());

    assert!(matches!(
        EntryDraft::income("Tip".to_string(), dec!(0.001), None, AccountRef::Unassigned),
        Err(AppError::InvalidRequest(_))
    ));

    // A row already at the limit of the decimal type
    let now = Utc::now();
    let full = Account {
        id: Uuid::new_v4(),
        owner_id: owner,
        name: "Full".to_string(),
        account_type: AccountType::Investment,
        opening_balance: Some(Decimal::MAX),
        stored_balance: Decimal::MAX,
        created_at: now,
        updated_at: now,
    };
    store.seed_account(full.clone()).await;

    let err = reconciliation::create_entry(&store, owner, income(dec!(999999999999.99), Some(full.id)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidRequest(_)));

    let incomes = reconciliation::list_entries(&store, owner, EntryKind::Income, EntryFilter::default())
        .await
        .unwrap();
    assert!(incomes.is_empty());
    assert_eq!(stored_row(&store, owner, full.id).await.stored_balance, Decimal::MAX);
}

#[tokio::test]
async fn rename_keeps_account_type_and_opening() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let savings = accounts::create_account(
        &store,
        owner,
        CreateAccountRequest {
            name: "Savings".to_string(),
            account_type: AccountType::Savings,
            opening_balance: dec!(10),
        },
    )
    .await
    .unwrap();

    let renamed = accounts::update_account(
        &store,
        owner,
        savings.id,
        UpdateAccountRequest {
            name: "Rainy day".to_string(),
            account_type: None,
            opening_balance: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(renamed.name, "Rainy day");
    assert_eq!(renamed.account_type, AccountType::Savings);
    assert_eq!(renamed.opening_balance, dec!(10));

    let retyped = accounts::update_account(
        &store,
        owner,
        savings.id,
        UpdateAccountRequest {
            name: "Rainy day".to_string(),
            account_type: Some(AccountType::Card),
            opening_balance: Some(dec!(0.005)),
        },
    )
    .await;
    assert!(matches!(retyped, Err(AppError::InvalidRequest(_))));
    assert_eq!(stored_row(&store, owner, savings.id).await.account_type, AccountType::Savings);
}

#[tokio::test]
async fn reused_idempotency_key_with_other_payload_conflicts() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let a = open_account(&store, owner, "A", dec!(100)).await;
    let b = open_account(&store, owner, "B", dec!(0)).await;

    transfers::execute_transfer(&store, owner, transfer(a, b, dec!(30), Some("rent-12")))
        .await
        .unwrap();

    let other_amount =
        transfers::execute_transfer(&store, owner, transfer(a, b, dec!(40), Some("rent-12"))).await;
    assert!(matches!(other_amount, Err(AppError::Conflict(_))));

    let reversed =
        transfers::execute_transfer(&store, owner, transfer(b, a, dec!(30), Some("rent-12"))).await;
    assert!(matches!(reversed, Err(AppError::Conflict(_))));

    // Same amount written differently is still the same request
    let replay = transfers::execute_transfer(&store, owner, transfer(a, b, dec!(30.00), Some("rent-12")))
        .await
        .unwrap();
    assert!(replay.replayed);

    assert_eq!(store.transfer_count().await, 1);
    assert_eq!(balance_of(&store, owner, a).await, dec!(70));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_transfers_cannot_overdraw() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let a = open_account(&store, owner, "A", dec!(100)).await;
    let b = open_account(&store, owner, "B", dec!(0)).await;

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                transfers::execute_transfer(&store, owner, transfer(a, b, dec!(60), None)).await
            })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(AppError::InsufficientFunds))));
    assert_eq!(store.transfer_count().await, 1);
    assert_eq!(balance_of(&store, owner, a).await, dec!(40));
    assert_eq!(balance_of(&store, owner, b).await, dec!(60));
    assert_reconciled(&store, owner).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_entry_edits_stay_reconciled() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let a = open_account(&store, owner, "A", dec!(0)).await;

    let mut existing = Vec::new();
    for _ in 0..4 {
        let entry = reconciliation::create_entry(&store, owner, income(dec!(10), Some(a)))
            .await
            .unwrap();
        existing.push(entry.id);
    }

    let mut handles = Vec::new();
    for id in existing {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            reconciliation::update_entry(&store, owner, id, income(dec!(20), Some(a)))
                .await
                .map(|_| ())
        }));
    }
    for _ in 0..4 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            reconciliation::create_entry(&store, owner, income(dec!(5), Some(a)))
                .await
                .map(|_| ())
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(balance_of(&store, owner, a).await, dec!(100));
    assert_eq!(stored_row(&store, owner, a).await.stored_balance, dec!(100));
    assert_reconciled(&store, owner).await;
}

async fn new_goal(store: &MemoryStore, owner: Uuid, target: Decimal, current: Decimal) -> Goal {
    let draft = GoalDraft::from_request(GoalRequest {
        name: "Trip".to_string(),
        target_amount: target,
        current_amount: current,
        deadline: NaiveDate::from_ymd_opt(2026, 6, 30),
    })
    .unwrap();
    goals::create_goal(store, owner, draft).await.unwrap()
}

#[tokio::test]
async fn goal_contribution_books_an_expense() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let a = open_account(&store, owner, "A", dec!(500)).await;
    let goal = new_goal(&store, owner, dec!(300), Decimal::ZERO).await;

    let first = goals::contribute(&store, owner, goal.id, dec!(200), AccountRef::Account(a))
        .await
        .unwrap();
    assert_eq!(first.account_balance, dec!(300));
    assert_eq!(first.goal.current_amount, dec!(200));
    assert!(first.goal.completed_at.is_none());
    assert_eq!(first.entry.kind, EntryKind::Expense);
    assert_eq!(first.entry.account_id, Some(a));
    assert_eq!(first.entry.category.as_deref(), Some(GOAL_CATEGORY));
    assert_eq!(balance_of(&store, owner, a).await, dec!(300));
    assert_reconciled(&store, owner).await;

    let second = goals::contribute(&store, owner, goal.id, dec!(100), AccountRef::Account(a))
        .await
        .unwrap();
    assert!(second.goal.completed_at.is_some());
    assert_eq!(second.goal.progress(), dec!(100));
    assert_eq!(second.account_balance, dec!(200));

    let expenses = reconciliation::list_entries(&store, owner, EntryKind::Expense, EntryFilter::default())
        .await
        .unwrap();
    assert_eq!(expenses.len(), 2);
    assert_reconciled(&store, owner).await;
}

#[tokio::test]
async fn goal_contribution_is_checked_like_a_transfer() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    let a = open_account(&store, owner, "A", dec!(50)).await;
    let theirs = open_account(&store, stranger, "Theirs", dec!(1000)).await;
    let goal = new_goal(&store, owner, dec!(1000), Decimal::ZERO).await;

    let short = goals::contribute(&store, owner, goal.id, dec!(80), AccountRef::Account(a)).await;
    assert!(matches!(short, Err(AppError::InsufficientFunds)));

    let foreign = goals::contribute(&store, owner, goal.id, dec!(10), AccountRef::Account(theirs)).await;
    assert!(matches!(foreign, Err(AppError::Forbidden(_))));

    let missing = goals::contribute(&store, owner, Uuid::new_v4(), dec!(10), AccountRef::Account(a)).await;
    assert!(matches!(missing, Err(AppError::GoalNotFound)));

    let precise = goals::contribute(&store, owner, goal.id, dec!(0.001), AccountRef::Account(a)).await;
    assert!(matches!(precise, Err(AppError::InvalidRequest(_))));

    // Nothing moved
    assert_eq!(balance_of(&store, owner, a).await, dec!(50));
    assert_eq!(balance_of(&store, stranger, theirs).await, dec!(1000));
    let listed = goals::list_goals(&store, owner).await.unwrap();
    assert_eq!(listed[0].current_amount, Decimal::ZERO);
    assert!(reconciliation::list_entries(&store, owner, EntryKind::Expense, EntryFilter::default())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn unassigned_contribution_draws_on_default_account() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    reconciliation::create_entry(&store, owner, income(dec!(100), None))
        .await
        .unwrap();
    let goal = new_goal(&store, owner, dec!(500), Decimal::ZERO).await;

    let contribution = goals::contribute(&store, owner, goal.id, dec!(40), AccountRef::Unassigned)
        .await
        .unwrap();

    let wallet = provisioner::ensure_default_account(&store, owner).await.unwrap();
    assert_eq!(contribution.entry.account_id, Some(wallet));
    assert_eq!(balance_of(&store, owner, wallet).await, dec!(60));
    assert_reconciled(&store, owner).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_contributions_cannot_overdraw() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let a = open_account(&store, owner, "A", dec!(100)).await;
    let goal = new_goal(&store, owner, dec!(1000), Decimal::ZERO).await;

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                goals::contribute(&store, owner, goal.id, dec!(40), AccountRef::Account(a)).await
            })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(err) => assert!(matches!(err, AppError::InsufficientFunds)),
        }
    }

    assert_eq!(succeeded, 2);
    assert_eq!(balance_of(&store, owner, a).await, dec!(20));
    assert_eq!(goals::list_goals(&store, owner).await.unwrap()[0].current_amount, dec!(80));
    assert_reconciled(&store, owner).await;
}

#[tokio::test]
async fn goals_are_listed_updated_and_deleted() {
    let store = MemoryStore::new();
    let owner = Uuid::new_v4();
    let reached = new_goal(&store, owner, dec!(50), dec!(50)).await;
    let open = new_goal(&store, owner, dec!(100), Decimal::ZERO).await;
    assert!(reached.completed_at.is_some());

    let listed = goals::list_goals(&store, owner).await.unwrap();
    assert_eq!(
        listed.iter().map(|g| g.id).collect::<Vec<_>>(),
        vec![open.id, reached.id]
    );

    let draft = |current: Decimal| {
        GoalDraft::from_request(GoalRequest {
            name: "Bike".to_string(),
            target_amount: dec!(100),
            current_amount: current,
            deadline: None,
        })
        .unwrap()
    };
    let done = goals::update_goal(&store, owner, open.id, draft(dec!(100))).await.unwrap();
    assert_eq!(done.name, "Bike");
    assert!(done.completed_at.is_some());
    let reopened = goals::update_goal(&store, owner, open.id, draft(dec!(10))).await.unwrap();
    assert!(reopened.completed_at.is_none());

    let foreign = goals::update_goal(&store, Uuid::new_v4(), open.id, draft(dec!(1))).await;
    assert!(matches!(foreign, Err(AppError::GoalNotFound)));

    goals::delete_goal(&store, owner, reached.id).await.unwrap();
    assert!(matches!(
        goals::delete_goal(&store, owner, reached.id).await,
        Err(AppError::GoalNotFound)
    ));
    assert_eq!(goals::list_goals(&store, owner).await.unwrap().len(), 1);
}
