//! Change tracking
//!
//! Field-aware diffing of employee month records and the append-only
//! change ledger they feed. Every edit an operator makes is reduced to
//! atomic changes, each persisted as its own hash-chained ledger entry.

pub mod diff;
pub mod ledger;
pub mod types;

pub use ledger::{ChangeLedger, LedgerError};
pub use types::{AtomicChange, ChangeContext, ChangeField, ChangeType};
