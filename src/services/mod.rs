//! Business logic services.
//!
//! Services contain the ledger rules separated from HTTP handlers. Each
//! public operation takes the store and the owner id explicitly and runs as
//! one store transaction.

pub mod accounts;
pub mod balance;
pub mod goals;
pub mod migration;
pub mod provisioner;
pub mod reconciliation;
pub mod transfers;
