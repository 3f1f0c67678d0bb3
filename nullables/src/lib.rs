//! Nullable infrastructure for deterministic testing.
//!
//! The ledger is abstracted behind `powers_ledger::LedgerClient`. This crate
//! provides an in-memory implementation that:
//! - Returns scripted values for every organization read
//! - Records every read and write in order, for assertions
//! - Can be told to fail specific reads, submissions, or batches
//! - Never touches the network
//!
//! Usage: swap a real ledger for [`NullLedger`] in tests.

pub mod events;
pub mod ledger;

pub use events::LedgerEvent;
pub use ledger::NullLedger;
