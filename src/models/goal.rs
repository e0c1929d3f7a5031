//! Savings goal models.
//!
//! A goal tracks how much has been put aside towards a target. Its
//! `current_amount` is a counter, not a balance: money only leaves an account
//! through a contribution, which books an expense on that account.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        entry::{Entry, EntryResponse},
        money,
    },
};

/// Category given to the expenses booked by goal contributions.
pub const GOAL_CATEGORY: &str = "goal";

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
pub struct Goal {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub target_amount: Decimal,
    pub current_amount: Decimal,
    pub deadline: Option<NaiveDate>,

    /// Set when `current_amount` first reached the target; cleared if it drops below
    pub completed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Goal {
    /// Percentage of the target reached, capped at 100.
    pub fn progress(&self) -> Decimal {
        let hundred = Decimal::ONE_HUNDRED;
        self.current_amount
            .checked_mul(hundred)
            .and_then(|scaled| scaled.checked_div(self.target_amount))
            .map(|pct| pct.min(hundred).round_dp(2).normalize())
            .unwrap_or(Decimal::ZERO)
    }
}

/// Validated goal fields.
#[derive(Debug, Clone, PartialEq)]
pub struct GoalDraft {
    pub name: String,
    pub target_amount: Decimal,
    pub current_amount: Decimal,
    pub deadline: Option<NaiveDate>,
}

impl GoalDraft {
    pub fn from_request(request: GoalRequest) -> Result<Self, AppError> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::InvalidRequest("Goal name is required".to_string()));
        }

        let target_amount = money::positive("Target amount", request.target_amount)?;
        if request.current_amount < Decimal::ZERO {
            return Err(AppError::InvalidRequest(
                "Current amount must not be negative".to_string(),
            ));
        }
        let current_amount = money::check_range("Current amount", request.current_amount)?;

        Ok(Self {
            name,
            target_amount,
            current_amount,
            deadline: request.deadline,
        })
    }
}

/// Request body for creating or replacing a goal.
///
/// # JSON Example
///
/// ```json
/// {
///   "name": "Emergency fund",
///   "target_amount": "5000.00",
///   "current_amount": "0",
///   "deadline": "2026-06-30"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct GoalRequest {
    pub name: String,
    pub target_amount: Decimal,

    #[serde(default)]
    pub current_amount: Decimal,

    pub deadline: Option<NaiveDate>,
}

/// Request body for moving money from an account into a goal.
///
/// Without `account_id` the money comes from the default account.
#[derive(Debug, Deserialize)]
pub struct ContributionRequest {
    pub amount: Decimal,
    pub account_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoalResponse {
    pub id: Uuid,
    pub name: String,
    pub target_amount: Decimal,
    pub current_amount: Decimal,
    /// Percent of the target, 0 to 100
    pub progress: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Goal> for GoalResponse {
    fn from(goal: Goal) -> Self {
        Self {
            progress: goal.progress(),
            id: goal.id,
            name: goal.name,
            target_amount: goal.target_amount,
            current_amount: goal.current_amount,
            deadline: goal.deadline,
            completed_at: goal.completed_at,
            created_at: goal.created_at,
        }
    }
}

/// Result of a contribution.
#[derive(Debug, Clone, PartialEq)]
pub struct GoalContribution {
    pub goal: Goal,
    /// The expense booked on the funding account
    pub entry: Entry,
    pub account_balance: Decimal,
}

/// Response for a contribution: the goal, the booked expense and the
/// account's balance afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContributionReceipt {
    pub goal: GoalResponse,
    pub entry: EntryResponse,
    pub account_balance: Decimal,
}

impl From<GoalContribution> for ContributionReceipt {
    fn from(contribution: GoalContribution) -> Self {
        Self {
            goal: contribution.goal.into(),
            entry: contribution.entry.into(),
            account_balance: contribution.account_balance,
        }
    }
}
