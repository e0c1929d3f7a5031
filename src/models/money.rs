//! Monetary amount checks.
//!
//! Every amount column is `NUMERIC(14, 2)`: at most two decimal places and
//! twelve integer digits. Input outside that shape is rejected here, before
//! a transaction is opened, instead of surfacing as a store failure.

use rust_decimal::Decimal;

use crate::error::AppError;

/// Largest magnitude a stored amount or balance can hold.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 2);

/// Decimal places kept by the store.
pub const SCALE: u32 = 2;

/// Check that `value` fits the store's amount columns. Sign is not checked.
pub fn check_range(field: &str, value: Decimal) -> Result<Decimal, AppError> {
    if value.normalize().scale() > SCALE {
        return Err(AppError::InvalidRequest(format!(
            "{field} must have at most {SCALE} decimal places"
        )));
    }
    if value.abs() > MAX_AMOUNT {
        return Err(AppError::InvalidRequest(format!(
            "{field} must not exceed {MAX_AMOUNT} in magnitude"
        )));
    }
    Ok(value)
}

/// A strictly positive amount that fits the store.
pub fn positive(field: &str, value: Decimal) -> Result<Decimal, AppError> {
    if value <= Decimal::ZERO {
        return Err(AppError::InvalidRequest(format!("{field} must be positive")));
    }
    check_range(field, value)
}

/// Overflow-checked sum used by balance arithmetic.
pub fn checked_add(a: Decimal, b: Decimal) -> Result<Decimal, AppError> {
    a.checked_add(b).ok_or_else(out_of_range)
}

pub fn checked_sub(a: Decimal, b: Decimal) -> Result<Decimal, AppError> {
    a.checked_sub(b).ok_or_else(out_of_range)
}

fn out_of_range() -> AppError {
    AppError::InvalidRequest("Resulting balance is out of range".to_string())
}
