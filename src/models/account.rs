//! Account data models and API request/response types.
//!
//! This module defines:
//! - `Account`: Database entity representing an owner's account
//! - `AccountType`: The fixed set of account kinds
//! - `CreateAccountRequest` / `UpdateAccountRequest`: Request bodies
//! - `AccountResponse` / `AccountListResponse`: Response bodies returned to clients

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Reserved name of the per-owner fallback account.
///
/// Exactly one account per owner carries this name. It is created on demand
/// by the provisioner and can never be renamed or deleted.
pub const DEFAULT_ACCOUNT_NAME: &str = "General Wallet";

/// Kind of account.
///
/// Stored as lowercase text in the `account_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Everyday current account; the type of the default account
    #[default]
    Checking,
    Savings,
    Card,
    Investment,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Checking => "checking",
            AccountType::Savings => "savings",
            AccountType::Card => "card",
            AccountType::Investment => "investment",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents an account record from the store.
///
/// # Balances
///
/// - `opening_balance` is the "as of" starting point entered when the account
///   was created. `None` marks a legacy account created before opening
///   balances existed; for those the stored balance is the starting point.
/// - `stored_balance` is a cache of the effective balance. Only the
///   reconciliation services write it.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
pub struct Account {
    /// Unique identifier for this account
    pub id: Uuid,

    /// Owner (user) this account belongs to
    ///
    /// Every query filters by owner so one user can never see or touch
    /// another user's accounts.
    pub owner_id: Uuid,

    /// Human-readable name
    pub name: String,

    pub account_type: AccountType,

    /// Starting balance, `None` for legacy rows
    pub opening_balance: Option<Decimal>,

    /// Cached effective balance
    pub stored_balance: Decimal,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Whether this is the reserved fallback account.
    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_ACCOUNT_NAME
    }
}

/// Validated input for creating an account row.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountDraft {
    pub name: String,
    pub account_type: AccountType,
    pub opening_balance: Decimal,
}

impl AccountDraft {
    /// Draft for the reserved default account: checking, zero balances.
    pub fn default_wallet() -> Self {
        Self {
            name: DEFAULT_ACCOUNT_NAME.to_string(),
            account_type: AccountType::Checking,
            opening_balance: Decimal::ZERO,
        }
    }
}

/// Validated changes applied to an existing account.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountPatch {
    pub name: String,
    /// New type; `None` keeps the current one
    pub account_type: Option<AccountType>,
    /// New opening balance; `None` keeps the current one
    pub opening_balance: Option<Decimal>,
}

/// Request body for creating a new account.
///
/// # JSON Example
///
/// ```json
/// {
///   "name": "Savings",
///   "account_type": "savings",
///   "opening_balance": "1500.00"
/// }
/// ```
///
/// # Validation
///
/// - `name`: Required, non-blank, must not be the reserved default name
/// - `account_type`: Optional, defaults to "checking"
/// - `opening_balance`: Optional, defaults to 0 (may be negative, e.g. a card);
///   at most two decimal places and twelve integer digits
#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub name: String,

    #[serde(default)]
    pub account_type: AccountType,

    #[serde(default)]
    pub opening_balance: Decimal,
}

/// Request body for editing an account.
///
/// Omitting `account_type` or `opening_balance` leaves it unchanged.
#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    pub name: String,

    #[serde(default)]
    pub account_type: Option<AccountType>,

    #[serde(default)]
    pub opening_balance: Option<Decimal>,
}

/// Account as seen by clients, with its computed balance.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "name": "General Wallet",
///   "account_type": "checking",
///   "opening_balance": "0",
///   "balance": "70.00",
///   "is_default": true,
///   "created_at": "2025-12-20T10:00:00Z",
///   "updated_at": "2025-12-20T10:00:00Z"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountResponse {
    pub id: Uuid,
    pub name: String,
    pub account_type: AccountType,

    /// Effective opening point (legacy accounts report their stored balance)
    pub opening_balance: Decimal,

    /// Effective balance computed from the ledger
    pub balance: Decimal,

    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Account list plus the owner's aggregated net worth.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountListResponse {
    pub accounts: Vec<AccountResponse>,
    pub net_worth: Decimal,
}

/// Response for `GET /api/v1/accounts/default`.
#[derive(Debug, Serialize, Deserialize)]
pub struct DefaultAccountResponse {
    pub account_id: Uuid,
}
