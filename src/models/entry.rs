//! Ledger entry models: incomes and expenses.
//!
//! Both kinds share one record shape and one table. An entry affects exactly
//! one account: incomes add to it, expenses subtract from it.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{error::AppError, models::money};

/// Income or expense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Income,
    Expense,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Income => "income",
            EntryKind::Expense => "expense",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Budget group of an expense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ExpenseGroup {
    #[default]
    Essential,
    Leisure,
    Investment,
}

impl ExpenseGroup {
    /// Lenient parse: empty or unknown input falls back to `Essential`.
    pub fn normalize(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("leisure") => ExpenseGroup::Leisure,
            Some("investment") => ExpenseGroup::Investment,
            _ => ExpenseGroup::Essential,
        }
    }
}

/// Account reference of an entry before it reaches the store.
///
/// `Unassigned` is resolved to the owner's default account by the
/// provisioner, so the reconciliation logic only ever sees a concrete id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountRef {
    Unassigned,
    Account(Uuid),
}

impl From<Option<Uuid>> for AccountRef {
    fn from(id: Option<Uuid>) -> Self {
        match id {
            Some(id) => AccountRef::Account(id),
            None => AccountRef::Unassigned,
        }
    }
}

/// Represents an income or expense record from the store.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
pub struct Entry {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub kind: EntryKind,
    pub description: String,

    /// Always positive; the sign comes from `kind`
    pub amount: Decimal,

    #[sqlx(rename = "entry_date")]
    pub date: NaiveDate,

    /// Free-text category (expenses only)
    pub category: Option<String>,

    /// Budget group (expenses only)
    #[sqlx(rename = "expense_group")]
    pub group: Option<ExpenseGroup>,

    /// Free-text payment method (expenses only)
    pub payment_method: Option<String>,

    /// `None` only for legacy rows written before every entry had an account
    pub account_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated entry input, before account resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryDraft {
    pub kind: EntryKind,
    pub description: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub category: Option<String>,
    pub group: Option<ExpenseGroup>,
    pub payment_method: Option<String>,
    pub account: AccountRef,
}

impl EntryDraft {
    /// Build an income draft; rejects non-positive or unstorable amounts.
    pub fn income(
        description: String,
        amount: Decimal,
        date: Option<NaiveDate>,
        account: AccountRef,
    ) -> Result<Self, AppError> {
        let draft = Self {
            kind: EntryKind::Income,
            description: description.trim().to_string(),
            amount,
            date: date.unwrap_or_else(today),
            category: None,
            group: None,
            payment_method: None,
            account,
        };
        draft.validate()?;
        Ok(draft)
    }

    /// Build an expense draft; the group is normalised, never rejected.
    pub fn expense(request: ExpenseRequest) -> Result<Self, AppError> {
        let draft = Self {
            kind: EntryKind::Expense,
            description: request.description.trim().to_string(),
            amount: request.amount,
            date: request.date.unwrap_or_else(today),
            category: non_blank(request.category),
            group: Some(ExpenseGroup::normalize(request.group.as_deref())),
            payment_method: non_blank(request.payment_method),
            account: request.account_id.into(),
        };
        draft.validate()?;
        Ok(draft)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        money::positive("Amount", self.amount)?;
        if self.description.is_empty() {
            return Err(AppError::InvalidRequest(
                "Description is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Attach the resolved account id.
    pub fn into_record(self, account_id: Uuid) -> EntryRecord {
        EntryRecord {
            kind: self.kind,
            description: self.description,
            amount: self.amount,
            date: self.date,
            category: self.category,
            group: self.group,
            payment_method: self.payment_method,
            account_id,
        }
    }
}

/// Entry fields as written to the store, with a concrete account.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryRecord {
    pub kind: EntryKind,
    pub description: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub category: Option<String>,
    pub group: Option<ExpenseGroup>,
    pub payment_method: Option<String>,
    pub account_id: Uuid,
}

/// Optional month/year filter for entry listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct EntryFilter {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

impl EntryFilter {
    pub fn validate(&self) -> Result<(), AppError> {
        match self.month {
            Some(m) if !(1..=12).contains(&m) => Err(AppError::InvalidRequest(
                "Month must be between 1 and 12".to_string(),
            )),
            _ => Ok(()),
        }
    }

    pub fn matches(&self, date: NaiveDate) -> bool {
        self.month.is_none_or(|m| date.month() == m) && self.year.is_none_or(|y| date.year() == y)
    }
}

/// Request body for creating or replacing an income.
///
/// # JSON Example
///
/// ```json
/// {
///   "description": "Salary",
///   "amount": "3200.00",
///   "date": "2025-12-05",
///   "account_id": null
/// }
/// ```
///
/// A missing `account_id` books the income on the default account. A missing
/// `date` means today (UTC).
#[derive(Debug, Deserialize)]
pub struct IncomeRequest {
    pub description: String,
    pub amount: Decimal,
    pub date: Option<NaiveDate>,
    pub account_id: Option<Uuid>,
}

/// Request body for creating or replacing an expense.
///
/// `group` is one of `essential`, `leisure`, `investment`; anything else
/// (including nothing) is stored as `essential`.
#[derive(Debug, Deserialize)]
pub struct ExpenseRequest {
    pub description: String,
    pub amount: Decimal,
    pub date: Option<NaiveDate>,
    pub category: Option<String>,
    pub group: Option<String>,
    pub payment_method: Option<String>,
    pub account_id: Option<Uuid>,
}

/// Entry as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntryResponse {
    pub id: Uuid,
    pub kind: EntryKind,
    pub description: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<ExpenseGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    pub account_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Removes the internal `owner_id` field.
impl From<Entry> for EntryResponse {
    fn from(entry: Entry) -> Self {
        Self {
            id: entry.id,
            kind: entry.kind,
            description: entry.description,
            amount: entry.amount,
            date: entry.date,
            category: entry.category,
            group: entry.group,
            payment_method: entry.payment_method,
            account_id: entry.account_id,
            created_at: entry.created_at,
        }
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
