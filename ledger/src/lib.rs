//! Boundary to the ledger.
//!
//! The ledger (an EVM chain and its node) is an external collaborator. This
//! crate describes what the rest of the workspace needs from it: the async
//! [`LedgerClient`] trait, the call and transaction shapes passed through it,
//! and typed builders for the organization contract's read/write surface.

pub mod call;
pub mod client;
pub mod error;
pub mod powers;

pub use call::{ContractCall, DeployRequest, Receipt, Transaction, TxHandle, ViewCall};
pub use client::LedgerClient;
pub use error::LedgerError;
pub use powers::VoteData;
