//! Transfer data models and API request/response types.
//!
//! A transfer moves money between two accounts of the same owner. It never
//! creates or destroys money and is immutable once recorded.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, models::money};

/// Represents a transfer record from the store.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
pub struct Transfer {
    /// Unique identifier for this transfer
    pub id: Uuid,

    pub owner_id: Uuid,

    /// Account the money leaves
    pub from_account_id: Uuid,

    /// Account the money arrives in
    pub to_account_id: Uuid,

    /// Always positive
    pub amount: Decimal,

    #[sqlx(rename = "transfer_date")]
    pub date: NaiveDate,

    pub description: Option<String>,

    /// Optional client key for safe retries
    ///
    /// Unique per owner. Creating a transfer with a key that was already used
    /// returns the original transfer instead of recording a second one.
    pub idempotency_key: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Validated transfer input.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferDraft {
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub description: Option<String>,
    pub idempotency_key: Option<String>,
}

impl TransferDraft {
    /// Validate a request; nothing touches the store before this passes.
    pub fn from_request(request: TransferRequest) -> Result<Self, AppError> {
        // Prevent transferring to same account
        if request.from_account_id == request.to_account_id {
            return Err(AppError::InvalidRequest(
                "Cannot transfer to same account".to_string(),
            ));
        }

        let amount = money::positive("Amount", request.amount)?;

        Ok(Self {
            from_account_id: request.from_account_id,
            to_account_id: request.to_account_id,
            amount,
            date: request.date.unwrap_or_else(|| Utc::now().date_naive()),
            description: request
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            idempotency_key: request
                .idempotency_key
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
        })
    }

    /// Whether a recorded transfer moved the same money between the same
    /// accounts as this draft.
    pub fn matches(&self, transfer: &Transfer) -> bool {
        self.from_account_id == transfer.from_account_id
            && self.to_account_id == transfer.to_account_id
            && self.amount == transfer.amount
    }
}

/// Request to transfer money between two of the caller's accounts.
///
/// # JSON Example
///
/// ```json
/// {
///   "from_account_id": "550e8400-e29b-41d4-a716-446655440000",
///   "to_account_id": "660e8400-e29b-41d4-a716-446655440001",
///   "amount": "250.00",
///   "date": "2025-12-21",
///   "description": "Move to savings",
///   "idempotency_key": "savings-2025-12"
/// }
/// ```
///
/// # Atomicity Guarantee
///
/// The balance check, the transfer row and both balance updates commit in
/// one store transaction. A rejected transfer leaves no trace.
#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount: Decimal,
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
    pub idempotency_key: Option<String>,
}

/// Result of a transfer: the record and both balances after reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferOutcome {
    pub transfer: Transfer,
    pub from_balance: Decimal,
    pub to_balance: Decimal,
    /// True when an earlier transfer with the same idempotency key was returned
    pub replayed: bool,
}

/// Response returned for transfer operations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferResponse {
    pub id: Uuid,
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// This removes internal fields like `owner_id` and `idempotency_key`.
impl From<Transfer> for TransferResponse {
    fn from(transfer: Transfer) -> Self {
        Self {
            id: transfer.id,
            from_account_id: transfer.from_account_id,
            to_account_id: transfer.to_account_id,
            amount: transfer.amount,
            date: transfer.date,
            description: transfer.description,
            created_at: transfer.created_at,
        }
    }
}

/// Response for `POST /api/v1/transfers`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferReceipt {
    pub transfer: TransferResponse,
    pub from_balance: Decimal,
    pub to_balance: Decimal,
    pub replayed: bool,
}

impl From<TransferOutcome> for TransferReceipt {
    fn from(outcome: TransferOutcome) -> Self {
        Self {
            transfer: outcome.transfer.into(),
            from_balance: outcome.from_balance,
            to_balance: outcome.to_balance,
            replayed: outcome.replayed,
        }
    }
}
