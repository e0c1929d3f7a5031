//! Data models representing stored entities and API bodies.

/// Account model and the reserved default account name
pub mod account;
/// API key authentication model
pub mod api_key;
/// Income and expense entries
pub mod entry;
/// Savings goals funded from accounts
pub mod goal;
/// Amount shape checks and overflow-checked arithmetic
pub mod money;
/// Transfers between accounts
pub mod transfer;
