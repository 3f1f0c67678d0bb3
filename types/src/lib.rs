//! Fundamental types for the Powers governance client.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! law and action identifiers, calldata, action lifecycle states, law conditions,
//! organizations, and the capabilities of the chain an organization lives on.

pub mod action;
pub mod calldata;
pub mod chain;
pub mod error;
pub mod ids;
pub mod law;
pub mod organization;

pub use action::{Action, ActionState};
pub use calldata::CallData;
pub use chain::{ChainCapabilities, ChainId};
pub use error::TypesError;
pub use ids::{ActionId, LawId, RoleId};
pub use law::{Conditions, Law};
pub use organization::Organization;

pub use alloy_primitives::{Address, Bytes, B256, U256};

/// A ledger block height.
pub type BlockNumber = u64;
